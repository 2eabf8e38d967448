use crate::{
    event::*,
    helper::{parse_streamer_login, MessageHelper},
    log_error, log_internal,
    logging::{PrintColor, Streamer},
    notification,
    plugin::*,
    poller::{announce_if_live, DiscordSink},
    twitch::StreamPlatform,
};
use anyhow::Result;
use serenity::all::Mentionable;
use std::sync::Arc;

const TITLE: &str = "Set Alert";

pub struct SetAlert;

#[serenity::async_trait]
impl Plugin for SetAlert {
    fn name(&self) -> &'static str {
        "set_alert"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(
            command_usage(
                ctx,
                self.name(),
                "ping a role the next time a Twitch streamer goes live",
            )
            .await,
        )
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = require_guild(ctx, msg).await? else {
            return Ok(EventHandled::Yes);
        };

        let Some(answer) = ask(
            ctx,
            msg,
            TITLE,
            "Please enter the Twitch streamer you want to set an alert for:",
        )
        .await?
        else {
            return Ok(EventHandled::Yes);
        };
        let streamer = parse_streamer_login(&answer.content);

        let Some(answer) = ask(
            ctx,
            msg,
            TITLE,
            "Please mention the role you want to ping when the streamer goes live:",
        )
        .await?
        else {
            return Ok(EventHandled::Yes);
        };
        let Some(role) = answer.mentioned_role() else {
            msg.channel_id
                .send_message(
                    ctx.cache_http,
                    notification::error("No role mentioned. Please mention a valid role."),
                )
                .await?;
            return Ok(EventHandled::Yes);
        };

        let broadcaster = match &streamer {
            Some(login) => match ctx.twitch.broadcaster(login).await {
                Ok(broadcaster) => broadcaster,
                Err(e) => return report_failure(ctx, msg, TWITCH_UNREACHABLE, e).await,
            },
            None => None,
        };
        let Some(broadcaster) = broadcaster else {
            msg.channel_id
                .send_message(
                    ctx.cache_http,
                    notification::error(
                        "Streamer not found. Please check the username and try again.",
                    ),
                )
                .await?;
            return Ok(EventHandled::Yes);
        };

        let entry = match ctx
            .registry
            .add_alert(guild_id, &broadcaster.login, role)
            .await
        {
            Ok(entry) => entry,
            Err(e) => return report_failure(ctx, msg, NOT_SAVED, e.into()).await,
        };
        log_internal!(
            "Alert set for {} in guild {} by {}",
            Streamer(&entry.streamer).color(),
            guild_id,
            msg.author.color()
        );

        msg.channel_id
            .send_message(
                ctx.cache_http,
                notification::success(
                    "Alert Set",
                    format!(
                        "Alert set for {}. Will ping {} when they go live.",
                        entry.streamer,
                        role.mention()
                    ),
                ),
            )
            .await?;

        // Someone who is already live would otherwise only be announced on the next poll.
        let sink = DiscordSink::new(Arc::clone(ctx.cache), Arc::clone(ctx.http));
        let outcome = announce_if_live(
            ctx.registry,
            ctx.twitch.as_ref(),
            &sink,
            guild_id,
            &entry,
        )
        .await;
        if let Err(e) = outcome {
            log_error!(
                "Could not check whether {} is live: {:#}",
                Streamer(&entry.streamer).color(),
                e
            );
        }

        Ok(EventHandled::Yes)
    }
}

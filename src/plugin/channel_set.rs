use crate::{event::*, helper::MessageHelper, log_internal, notification, plugin::*};
use anyhow::Result;
use serenity::all::Mentionable;

pub struct ChannelSet;

#[serenity::async_trait]
impl Plugin for ChannelSet {
    fn name(&self) -> &'static str {
        "channel_set"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(command_usage(ctx, self.name(), "choose where stream alerts are posted").await)
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
            "Set Channel",
            "Please mention the channel where you want the announcements to be sent:",
        )
        .await?
        else {
            return Ok(EventHandled::Yes);
        };

        // Only channels of this server; announcements elsewhere would never resolve.
        let channel_id = answer.mentioned_channel().filter(|channel_id| {
            ctx.cache
                .guild(guild_id)
                .is_some_and(|guild| guild.channels.contains_key(channel_id))
        });
        let Some(channel_id) = channel_id else {
            msg.channel_id
                .send_message(
                    ctx.cache_http,
                    notification::error("No channel mentioned. Please mention a valid channel."),
                )
                .await?;
            return Ok(EventHandled::Yes);
        };

        if let Err(e) = ctx.registry.set_default_channel(guild_id, channel_id).await {
            return report_failure(ctx, msg, NOT_SAVED, e.into()).await;
        }
        log_internal!(
            "Announcements for guild {} go to channel {}",
            guild_id,
            channel_id
        );

        msg.channel_id
            .send_message(
                ctx.cache_http,
                notification::success(
                    "Channel Set",
                    format!("Announcements will be sent to {}.", channel_id.mention()),
                ),
            )
            .await?;
        Ok(EventHandled::Yes)
    }
}

use crate::{
    event::*, helper::parse_position, log_internal, notification, plugin::*,
    registry::RegistryError,
};
use anyhow::Result;

const NO_ALERTS: &str = "There are no alerts set for this server.";
const INVALID_INDEX: &str = "Invalid alert number. Please try again.";

pub struct RemoveAlert;

#[serenity::async_trait]
impl Plugin for RemoveAlert {
    fn name(&self) -> &'static str {
        "remove_alert"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(command_usage(ctx, self.name(), "pick one of this server's alerts to delete").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = require_guild(ctx, msg).await? else {
            return Ok(EventHandled::Yes);
        };

        let alerts = ctx
            .registry
            .guild(guild_id)
            .await?
            .map(|guild| guild.alerts)
            .unwrap_or_default();
        if alerts.is_empty() {
            msg.channel_id
                .send_message(ctx.cache_http, notification::error(NO_ALERTS))
                .await?;
            return Ok(EventHandled::Yes);
        }

        let listing = alerts
            .iter()
            .enumerate()
            .map(|(i, alert)| format!("{}. {}", i + 1, alert.streamer))
            .collect::<Vec<_>>()
            .join("\n");
        msg.channel_id
            .send_message(ctx.cache_http, notification::info("Alerts", listing))
            .await?;

        let Some(answer) = ask(
            ctx,
            msg,
            "Remove Alert",
            "Please enter the number of the alert you want to remove:",
        )
        .await?
        else {
            return Ok(EventHandled::Yes);
        };

        // The poller may have consumed alerts since the list was shown; the registry checks the
        // number against the current list.
        let result = match parse_position(&answer.content) {
            Some(position) => ctx.registry.remove_alert(guild_id, position).await,
            None => Err(RegistryError::InvalidIndex {
                position: 0,
                len: alerts.len(),
            }),
        };

        let reply = match result {
            Ok(removed) => {
                log_internal!("Alert for {} removed from guild {}", removed.streamer, guild_id);
                notification::success(
                    "Alert Removed",
                    format!("Alert for {} removed.", removed.streamer),
                )
            }
            Err(RegistryError::InvalidIndex { .. }) => notification::error(INVALID_INDEX),
            Err(RegistryError::NoAlerts) => notification::error(NO_ALERTS),
            Err(e) => return report_failure(ctx, msg, NOT_SAVED, e.into()).await,
        };

        msg.channel_id.send_message(ctx.cache_http, reply).await?;
        Ok(EventHandled::Yes)
    }
}

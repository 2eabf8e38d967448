use crate::{event::*, notification, persistent_state::GuildConfig, plugin::*};
use anyhow::Result;
use serenity::all::Mentionable;

/// Lists the alerts waiting to fire in this server.
pub struct Alerts;

#[serenity::async_trait]
impl Plugin for Alerts {
    fn name(&self) -> &'static str {
        "alerts"
    }

    async fn usage(&self, ctx: &Context) -> Option<String> {
        Some(command_usage(ctx, self.name(), "list this server's pending stream alerts").await)
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Some((msg, _)) = event.is_bot_cmd(ctx, self.name()).await else {
            return Ok(EventHandled::No);
        };
        let Some(guild_id) = require_guild(ctx, msg).await? else {
            return Ok(EventHandled::Yes);
        };

        let guild = ctx.registry.guild(guild_id).await?.unwrap_or_default();
        msg.channel_id
            .send_message(ctx.cache_http, notification::info("Alerts", describe(&guild)))
            .await?;
        Ok(EventHandled::Yes)
    }
}

fn describe(guild: &GuildConfig) -> String {
    let mut lines: Vec<String> = guild
        .alerts
        .iter()
        .enumerate()
        .map(|(i, alert)| {
            let mut line = format!("{}. {} → {}", i + 1, alert.streamer, alert.role.mention());
            if let Some(channel) = alert.channel {
                line.push_str(&format!(" in {}", channel.mention()));
            }
            line
        })
        .collect();

    if lines.is_empty() {
        lines.push("There are no alerts set for this server.".to_owned());
    }

    lines.push(String::new());
    lines.push(match guild.default_channel {
        Some(channel) => format!("Announcements go to {}.", channel.mention()),
        None => "Announcements go to the server's system channel.".to_owned(),
    });

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent_state::AlertEntry;
    use serenity::all::{ChannelId, RoleId};

    #[test]
    fn test_describe_lists_alerts_and_destination() {
        let mut alert = AlertEntry::new("bob", RoleId::new(222));
        alert.channel = Some(ChannelId::new(7));
        let guild = GuildConfig {
            alerts: vec![AlertEntry::new("alice", RoleId::new(111)), alert],
            default_channel: Some(ChannelId::new(9)),
        };

        assert_eq!(
            describe(&guild),
            "1. alice → <@&111>\n2. bob → <@&222> in <#7>\n\nAnnouncements go to <#9>."
        );
    }

    #[test]
    fn test_describe_empty_guild() {
        assert_eq!(
            describe(&GuildConfig::default()),
            "There are no alerts set for this server.\n\n\
             Announcements go to the server's system channel."
        );
    }
}

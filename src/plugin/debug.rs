use crate::{event::*, log_event, logging::*, plugin::*};
use anyhow::Result;

/// Echoes every event to the terminal.  Never handles anything itself.
pub struct Debug;

#[serenity::async_trait]
impl Plugin for Debug {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        match event {
            Event::Ready(ready) => {
                let guilds = ready
                    .guilds
                    .iter()
                    .map(|guild| guild.id.to_string())
                    .collect::<Vec<_>>();
                log_event!(
                    "Connected as {} to {} server(s): {}",
                    ready.user.name,
                    guilds.len(),
                    guilds.join(", ")
                );
            }
            Event::Message(msg) => {
                let place = Place {
                    guild: msg.guild_id,
                    channel: msg.channel_id,
                };
                log_event!(
                    "{}{}{} {}",
                    place.color(ctx.cache),
                    Glue.color(),
                    msg.author.color(),
                    msg.content,
                );
            }
        }

        Ok(EventHandled::No)
    }
}

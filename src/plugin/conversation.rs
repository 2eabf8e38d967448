use crate::{event::*, plugin::*};
use anyhow::Result;

/// Routes a user's message to the command that is waiting for their answer.
pub struct Conversation;

#[serenity::async_trait]
impl Plugin for Conversation {
    fn name(&self) -> &'static str {
        "conversation"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Message(msg) = event else {
            return Ok(EventHandled::No);
        };

        let delivered =
            ctx.conversations
                .deliver(msg.channel_id, msg.author.id, &msg.content, msg.clone());

        Ok(if delivered {
            EventHandled::Yes
        } else {
            EventHandled::No
        })
    }
}

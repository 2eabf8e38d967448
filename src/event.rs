//! The Serenity crate we're using for the Discord API is designed around callbacks to handle
//! events.  However, this does not mesh well with our plugin framework here.  To resolve this,
//! the handler translates the callbacks a distinct Event enum.

use crate::{context::Context, log_error};
use serenity::all::{Message, Ready};

/// A Discord event
pub enum Event {
    Ready(Ready),
    Message(Message),
}

impl Event {
    // When an event occurs, iterate over all the plugins to see if any can/should handle it.
    pub async fn handle(self, ctx: Context<'_>) {
        for plugin in crate::plugin::plugins() {
            match plugin.handle(&ctx, &self).await {
                Ok(EventHandled::Yes) => return,
                Ok(EventHandled::No) => continue,
                Err(err) => log_error!("Error in plugin {}: {:#}", plugin.name(), err),
            }
        }
    }

    // Check if a message should be interpreted as a bot command, e.g. `!set_alert`.
    //
    // Returns the message and whatever followed the command name.
    pub async fn is_bot_cmd(&self, ctx: &Context<'_>, cmd: &str) -> Option<(&Message, &str)> {
        let Event::Message(msg) = self else {
            return None;
        };

        let cfg = ctx.cfg.read().await;
        let args = command_args(&msg.content, &cfg.general.command_prefix, cmd)?;
        Some((msg, args))
    }
}

fn command_args<'a>(content: &'a str, prefix: &str, cmd: &str) -> Option<&'a str> {
    let rest = content.trim_start().strip_prefix(prefix)?.strip_prefix(cmd)?;
    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() => Some(rest.trim()),
        // `!set_alerts` is not `!set_alert`
        Some(_) => None,
    }
}

pub enum EventHandled {
    Yes,
    No,
}

use crate::{
    context::Context,
    conversation::Reply,
    event::{Event, EventHandled},
    notification,
};
use anyhow::Result;
use serenity::all::{GuildId, Message};

mod alerts;
mod channel_set;
mod conversation;
mod debug;
mod help;
mod ignore_bots;
mod ready;
mod remove_alert;
mod set_alert;

#[serenity::async_trait]
pub trait Plugin: Sync + Send {
    /// Plugin name.  Doubles as the command name for command plugins.
    fn name(&self) -> &'static str;
    /// Help message line.  None if no help message
    async fn usage(&self, ctx: &Context) -> Option<String>;
    /// Potentially handle event.  Returns:
    /// - Ok(EventHandled::Yes) if the event has been handled and no other plugin should attempt to
    /// handle it
    /// - Ok(EventHandled::No) if another plugin should attempt to handle the event
    /// - Err if an error occurred
    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled>;
}

/// Ordered list of available plugins
pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        // Core bot operations
        Box::new(debug::Debug),
        Box::new(ready::Ready),
        Box::new(ignore_bots::IgnoreBots),
        // Answers to a command's questions.  Keep ahead of the commands.
        Box::new(conversation::Conversation),
        Box::new(help::Help),
        // Alert management
        Box::new(set_alert::SetAlert),
        Box::new(remove_alert::RemoveAlert),
        Box::new(channel_set::ChannelSet),
        Box::new(alerts::Alerts),
    ]
}

/// `usage` line for a command plugin
async fn command_usage(ctx: &Context<'_>, name: &str, description: &str) -> String {
    let prefix = &ctx.cfg.read().await.general.command_prefix;
    format!("{}{} - {}", prefix, name, description)
}

const NOT_SAVED: &str = "The alerts could not be saved, so nothing was changed. Please try again later.";
const TWITCH_UNREACHABLE: &str = "Could not reach Twitch. Please try again later.";

/// Tell the author the command failed through no fault of theirs, then hand the error on to be
/// logged.
async fn report_failure(
    ctx: &Context<'_>,
    msg: &Message,
    description: &str,
    error: anyhow::Error,
) -> Result<EventHandled> {
    msg.channel_id
        .send_message(ctx.cache_http, notification::error(description))
        .await?;
    Err(error)
}

/// Alert commands only make sense inside a server.
async fn require_guild(ctx: &Context<'_>, msg: &Message) -> Result<Option<GuildId>> {
    if msg.guild_id.is_none() {
        msg.channel_id
            .send_message(
                ctx.cache_http,
                notification::error("This command only works in a server."),
            )
            .await?;
    }
    Ok(msg.guild_id)
}

/// Ask the command's author a question and wait for their answer in the same channel.
///
/// `None` if they cancelled or never answered; they have already been told.
async fn ask(
    ctx: &Context<'_>,
    msg: &Message,
    title: &str,
    question: &str,
) -> Result<Option<Message>> {
    msg.channel_id
        .send_message(ctx.cache_http, notification::info(title, question))
        .await?;

    let timeout = ctx.cfg.read().await.conversation.prompt_timeout();
    let notice = match ctx
        .conversations
        .prompt(msg.channel_id, msg.author.id, timeout)
        .await
    {
        Reply::Answered(answer) => return Ok(Some(answer)),
        Reply::TimedOut => format!(
            "No answer after {} seconds.  Nothing was changed.",
            timeout.as_secs()
        ),
        Reply::Cancelled => "Cancelled.  Nothing was changed.".to_owned(),
    };

    msg.channel_id
        .send_message(ctx.cache_http, notification::info(title, notice))
        .await?;
    Ok(None)
}

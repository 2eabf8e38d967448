//! Messages the bot posts: the live alert itself, and the embeds used by the commands.

use serenity::all::{Colour, CreateEmbed, CreateMessage, Mentionable, RoleId};

const STREAM_BASE_URL: &str = "https://www.twitch.tv";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LivePhase {
    /// Observed going live by the poller
    NowLive,
    /// Already live when the alert was set
    AlreadyLive,
}

/// A "Stream Alert!" announcement.
#[derive(Clone, Debug)]
pub struct StreamAlert {
    pub streamer: String,
    pub profile_image_url: String,
    pub role: RoleId,
    pub phase: LivePhase,
}

impl StreamAlert {
    pub fn stream_url(&self) -> String {
        format!("{}/{}", STREAM_BASE_URL, self.streamer)
    }

    pub fn description(&self) -> String {
        let phase = match self.phase {
            LivePhase::NowLive => "now",
            LivePhase::AlreadyLive => "already",
        };
        format!(
            "[{} is {} live on Twitch!]({})",
            self.streamer,
            phase,
            self.stream_url()
        )
    }

    /// Role ping sent as message content so it actually notifies.
    pub fn content(&self) -> String {
        self.role.mention().to_string()
    }

    pub fn to_message(&self) -> CreateMessage {
        let mut embed = CreateEmbed::new()
            .title("Stream Alert!")
            .description(self.description())
            .colour(Colour::BLURPLE);
        if !self.profile_image_url.is_empty() {
            embed = embed.thumbnail(&self.profile_image_url);
        }

        CreateMessage::new().content(self.content()).embed(embed)
    }
}

/// Questions and listings in a command conversation
pub fn info(title: &str, description: impl Into<String>) -> CreateMessage {
    reply_embed(title, description, Colour::BLURPLE)
}

pub fn success(title: &str, description: impl Into<String>) -> CreateMessage {
    reply_embed(title, description, Colour::DARK_GREEN)
}

pub fn error(description: impl Into<String>) -> CreateMessage {
    reply_embed("Error", description, Colour::RED)
}

fn reply_embed(title: &str, description: impl Into<String>, colour: Colour) -> CreateMessage {
    CreateMessage::new().embed(
        CreateEmbed::new()
            .title(title)
            .description(description)
            .colour(colour),
    )
}

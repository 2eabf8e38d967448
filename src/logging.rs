//! Logging to the terminal with colors
//!
//! Every line starts with a colored marker: `*` for something that happened on Discord, `+` for
//! something the bot did on its own, `!` for a failure the bot survived.

use serenity::all::{Cache, ChannelId, GuildId};
use std::io::IsTerminal;
use std::sync::LazyLock;

const DEFAULT: &str = "\x1b[0m";
const FG_BLUE: &str = "\x1b[38;5;33m";
const FG_CYAN: &str = "\x1b[36m";
const FG_GRAY: &str = "\x1b[90m";
const FG_GREEN: &str = "\x1b[32m";
const FG_MAGENTA: &str = "\x1b[35m";
const FG_PURPLE: &str = "\x1b[38;5;135m";
const FG_RED: &str = "\x1b[31m";
const FG_YELLOW: &str = "\x1b[33m";

pub enum Color {
    Default,
    Event,
    Internal,
    Error,
    User,
    Channel,
    Guild,
    Streamer,
    Glue,
}

impl Color {
    fn code(&self) -> &'static str {
        match self {
            Color::Default => DEFAULT,
            Color::Event => FG_YELLOW,
            Color::Internal => FG_MAGENTA,
            Color::Error => FG_RED,
            Color::User => FG_GREEN,
            Color::Channel => FG_CYAN,
            Color::Guild => FG_BLUE,
            Color::Streamer => FG_PURPLE,
            Color::Glue => FG_GRAY,
        }
    }

    /// `text` wrapped in this color and a reset
    pub fn paint(&self, text: impl std::fmt::Display) -> String {
        format!("{}{}{}", self, text, Color::Default)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        // Output redirected to a file or journal gets no escape codes.  Checked once.
        static STDOUT_IS_TERMINAL: LazyLock<bool> =
            LazyLock::new(|| std::io::stdout().is_terminal());

        if *STDOUT_IS_TERMINAL {
            f.write_str(self.code())?;
        }
        Ok(())
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_line {
    ($print:ident, $color:ident, $marker:literal, $fmtstr:literal $(, $args:expr)* $(,)?) => {{
        $print!(
            concat!("{}", $marker, "{} ", $fmtstr),
            $crate::logging::Color::$color,
            $crate::logging::Color::Default,
            $($args),*
        )
    }};
}

/// Something that happened on Discord
#[macro_export]
macro_rules! log_event {
    ($($arg:tt)*) => {
        $crate::log_line!(println, Event, "*", $($arg)*)
    };
}

/// Something the bot did on its own, e.g. polling Twitch or saving alerts
#[macro_export]
macro_rules! log_internal {
    ($($arg:tt)*) => {
        $crate::log_line!(println, Internal, "+", $($arg)*)
    };
}

/// Something went wrong but the bot keeps running.  Printed to stderr.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::log_line!(eprintln, Error, "!", $($arg)*)
    };
}

pub trait PrintColor {
    fn color(&self) -> String;
}

/// Names that have to be looked up, resolved from the gateway cache only.  Nothing here waits on
/// the network; unknown ids print as placeholders.
pub trait CachedPrintColor {
    fn color(&self, cache: &Cache) -> String;
}

// Field separator
pub struct Glue;
impl PrintColor for Glue {
    fn color(&self) -> String {
        Color::Glue.paint(":")
    }
}

/// A Twitch login
pub struct Streamer<'a>(pub &'a str);
impl PrintColor for Streamer<'_> {
    fn color(&self) -> String {
        Color::Streamer.paint(self.0)
    }
}

impl PrintColor for serenity::all::CurrentUser {
    fn color(&self) -> String {
        Color::User.paint(&self.name)
    }
}

impl PrintColor for serenity::all::User {
    fn color(&self) -> String {
        Color::User.paint(&self.name)
    }
}

impl CachedPrintColor for GuildId {
    fn color(&self, cache: &Cache) -> String {
        match cache.guild(*self) {
            Some(guild) => Color::Guild.paint(&guild.name),
            None => Color::Guild.paint(format_args!("<unknown-guild-{}>", self)),
        }
    }
}

impl CachedPrintColor for Option<GuildId> {
    fn color(&self, cache: &Cache) -> String {
        match self {
            Some(guild_id) => guild_id.color(cache),
            None => Color::Guild.paint("<direct-message>"),
        }
    }
}

/// A channel, shown as `server:channel`
pub struct Place {
    pub guild: Option<GuildId>,
    pub channel: ChannelId,
}

impl CachedPrintColor for Place {
    fn color(&self, cache: &Cache) -> String {
        let channel = self
            .guild
            .and_then(|guild_id| {
                let guild = cache.guild(guild_id)?;
                let name = guild.channels.get(&self.channel).map(|c| c.name.clone());
                name
            })
            .unwrap_or_else(|| format!("<channel-{}>", self.channel));

        format!(
            "{}{}{}",
            self.guild.color(cache),
            Glue.color(),
            Color::Channel.paint(channel)
        )
    }
}

mod config;
mod context;
mod conversation;
mod event;
mod handler;
mod helper;
mod logging;
mod notification;
mod persistent_state;
mod plugin;
mod poller;
mod registry;
mod twitch;

use serenity::{all::GatewayIntents, Client};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = crate::config::Config::load().await?;
    let token = cfg.general.discord_token.clone();

    // A malformed alerts file is fatal; starting empty would overwrite it on the first save.
    let alerts_path = cfg.general.alerts_path.clone();
    let pstate = crate::persistent_state::PersistentState::load(&alerts_path).await?;
    log_internal!(
        "Loaded alerts for {} server(s) from {}",
        pstate.len(),
        alerts_path.to_string_lossy()
    );
    let registry = crate::registry::AlertRegistry::spawn(pstate, alerts_path);

    let twitch = Arc::new(crate::twitch::TwitchClient::new(&cfg.twitch)?);
    twitch.authenticate().await?;

    let handler = handler::Handler::new(cfg, registry, twitch);

    // Things we want discord to tell us about.
    let intents = GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    Client::builder(&token, intents)
        .event_handler(handler)
        .await?
        .start()
        .await
        .map_err(Into::into)
}

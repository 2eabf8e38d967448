use crate::{
    config::Config, context::Context, conversation::Conversations, event::Event,
    registry::AlertRegistry, twitch::TwitchClient,
};
use serenity::all::{Message, Ready};
use std::sync::{atomic::AtomicBool, Arc};
use tokio::sync::RwLock;

/// Discord event handler
pub struct Handler {
    cfg: RwLock<Config>,
    registry: AlertRegistry,
    twitch: Arc<TwitchClient>,
    conversations: Conversations,
    poller_started: AtomicBool,
}

impl<'a> Handler {
    pub fn new(cfg: Config, registry: AlertRegistry, twitch: Arc<TwitchClient>) -> Self {
        Self {
            cfg: RwLock::new(cfg),
            registry,
            twitch,
            conversations: Conversations::new(),
            poller_started: AtomicBool::new(false),
        }
    }

    fn ctx(&'a self, discord_ctx: &'a serenity::all::Context) -> Context<'a> {
        Context {
            cfg: &self.cfg,
            registry: &self.registry,
            twitch: &self.twitch,
            conversations: &self.conversations,
            poller_started: &self.poller_started,
            cache: &discord_ctx.cache,
            http: &discord_ctx.http,
            cache_http: discord_ctx,
        }
    }
}

#[serenity::async_trait]
impl serenity::all::EventHandler for Handler {
    async fn ready(&self, discord_ctx: serenity::all::Context, ready: Ready) {
        Event::Ready(ready).handle(self.ctx(&discord_ctx)).await;
    }

    async fn message(&self, discord_ctx: serenity::all::Context, msg: Message) {
        Event::Message(msg).handle(self.ctx(&discord_ctx)).await;
    }
}

use crate::{
    event::*,
    log_internal,
    plugin::*,
    poller::{DiscordSink, StatusPoller},
};
use anyhow::Result;
use std::sync::{atomic::Ordering, Arc};

/// Starts the status poller once the connection to Discord is ready.
pub struct Ready;

#[serenity::async_trait]
impl Plugin for Ready {
    fn name(&self) -> &'static str {
        "ready"
    }

    async fn usage(&self, _ctx: &Context) -> Option<String> {
        None
    }

    async fn handle(&self, ctx: &Context, event: &Event) -> Result<EventHandled> {
        let Event::Ready(_) = event else {
            return Ok(EventHandled::No);
        };

        // Ready is sent again after a reconnect; one poller is enough.
        if ctx.poller_started.swap(true, Ordering::SeqCst) {
            return Ok(EventHandled::Yes);
        }

        let (interval, startup_delay) = {
            let cfg = ctx.cfg.read().await;
            (cfg.poller.interval(), cfg.poller.startup_delay())
        };
        let sink = DiscordSink::new(Arc::clone(ctx.cache), Arc::clone(ctx.http));
        let poller = StatusPoller::new(
            ctx.registry.clone(),
            Arc::clone(ctx.twitch),
            Arc::new(sink),
            interval,
        );

        tokio::spawn(async move {
            // Give the gateway time to fill the guild cache before the first cycle.
            tokio::time::sleep(startup_delay).await;
            log_internal!(
                "Checking stream status every {} second(s)",
                interval.as_secs()
            );
            poller.run().await;
        });

        Ok(EventHandled::Yes)
    }
}

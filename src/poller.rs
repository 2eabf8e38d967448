//! Periodically checks every tracked broadcaster and announces the ones that went live.
//!
//! Alerts are one-shot: once announced, an entry is removed and has to be set again to fire on a
//! later stream.

use crate::{
    log_error, log_internal,
    logging::{PrintColor, Streamer},
    notification::{LivePhase, StreamAlert},
    persistent_state::AlertEntry,
    registry::AlertRegistry,
    twitch::StreamPlatform,
};
use anyhow::Result;
use serenity::all::{Cache, ChannelId, GuildId, Http};
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;

/// Where announcements are delivered.
#[serenity::async_trait]
pub trait ChatSink: Send + Sync {
    /// Whether the bot currently sees this guild.
    async fn knows_guild(&self, guild_id: GuildId) -> bool;
    /// An explicit channel must belong to the guild.  Without one, the guild's system channel.
    async fn destination(
        &self,
        guild_id: GuildId,
        preferred: Option<ChannelId>,
    ) -> Option<ChannelId>;
    async fn announce(&self, channel_id: ChannelId, alert: &StreamAlert) -> Result<()>;
}

/// Delivers through Serenity, resolving guilds and channels from the cache.
pub struct DiscordSink {
    cache: Arc<Cache>,
    http: Arc<Http>,
}

impl DiscordSink {
    pub fn new(cache: Arc<Cache>, http: Arc<Http>) -> Self {
        Self { cache, http }
    }

    fn cached_destination(
        &self,
        guild_id: GuildId,
        preferred: Option<ChannelId>,
    ) -> Option<ChannelId> {
        let guild = self.cache.guild(guild_id)?;
        match preferred {
            Some(channel_id) => guild
                .channels
                .contains_key(&channel_id)
                .then_some(channel_id),
            None => guild.system_channel_id,
        }
    }
}

#[serenity::async_trait]
impl ChatSink for DiscordSink {
    async fn knows_guild(&self, guild_id: GuildId) -> bool {
        self.cache.guild(guild_id).is_some()
    }

    async fn destination(
        &self,
        guild_id: GuildId,
        preferred: Option<ChannelId>,
    ) -> Option<ChannelId> {
        self.cached_destination(guild_id, preferred)
    }

    async fn announce(&self, channel_id: ChannelId, alert: &StreamAlert) -> Result<()> {
        channel_id
            .send_message((&self.cache, self.http.as_ref()), alert.to_message())
            .await?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryOutcome {
    UnknownStreamer,
    Offline,
    NoDestination,
    Announced,
    /// The alert was no longer stored when its turn came.
    NotPending,
}

/// Check one alert and announce it if its broadcaster is live.  The caller decides what to do
/// with the entry afterwards.
pub async fn check_entry<P, S>(
    platform: &P,
    sink: &S,
    guild_id: GuildId,
    entry: &AlertEntry,
    default_channel: Option<ChannelId>,
    phase: LivePhase,
) -> Result<EntryOutcome>
where
    P: StreamPlatform + ?Sized,
    S: ChatSink + ?Sized,
{
    let Some(broadcaster) = platform.broadcaster(&entry.streamer).await? else {
        return Ok(EntryOutcome::UnknownStreamer);
    };

    let Some(stream) = platform.live_stream(&broadcaster.id).await? else {
        return Ok(EntryOutcome::Offline);
    };

    let preferred = entry.channel.or(default_channel);
    let Some(channel_id) = sink.destination(guild_id, preferred).await else {
        return Ok(EntryOutcome::NoDestination);
    };

    let alert = StreamAlert {
        streamer: entry.streamer.clone(),
        profile_image_url: broadcaster.profile_image_url,
        role: entry.role,
        phase,
    };
    sink.announce(channel_id, &alert).await?;

    log_internal!(
        "Alert sent for {} (\"{}\") in guild {} channel {}",
        Streamer(&entry.streamer).color(),
        stream.title,
        guild_id,
        channel_id
    );
    Ok(EntryOutcome::Announced)
}

/// Announce a newly set alert straight away if its broadcaster is already live, consuming it.
///
/// Runs under the registry's announcing lock against the stored alerts, so an alert that a poll
/// cycle has just announced is not announced again, and vice versa.
pub async fn announce_if_live<P, S>(
    registry: &AlertRegistry,
    platform: &P,
    sink: &S,
    guild_id: GuildId,
    entry: &AlertEntry,
) -> Result<EntryOutcome>
where
    P: StreamPlatform + ?Sized,
    S: ChatSink + ?Sized,
{
    let _turn = registry.announcing().await;
    let Some(guild) = registry.guild(guild_id).await? else {
        return Ok(EntryOutcome::NotPending);
    };
    if !guild.alerts.contains(entry) {
        return Ok(EntryOutcome::NotPending);
    }

    let outcome = check_entry(
        platform,
        sink,
        guild_id,
        entry,
        guild.default_channel,
        LivePhase::AlreadyLive,
    )
    .await?;

    if outcome == EntryOutcome::Announced {
        registry.consume(guild_id, vec![entry.clone()]).await?;
    }
    Ok(outcome)
}

/// Tally of one polling cycle
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub announced: usize,
    pub offline: usize,
    pub unknown_streamers: usize,
    pub undeliverable: usize,
    pub failed: usize,
    pub skipped_guilds: usize,
}

pub struct StatusPoller<P: ?Sized, S: ?Sized> {
    registry: AlertRegistry,
    platform: Arc<P>,
    sink: Arc<S>,
    interval: Duration,
}

impl<P, S> StatusPoller<P, S>
where
    P: StreamPlatform + ?Sized,
    S: ChatSink + ?Sized,
{
    pub fn new(registry: AlertRegistry, platform: Arc<P>, sink: Arc<S>, interval: Duration) -> Self {
        Self {
            registry,
            platform,
            sink,
            interval,
        }
    }

    /// Poll forever.  The first cycle runs immediately.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let report = self.poll_once().await;
            log_internal!(
                "Poll finished: {} announced, {} offline, {} unknown, {} undeliverable, {} failed, {} server(s) skipped",
                report.announced,
                report.offline,
                report.unknown_streamers,
                report.undeliverable,
                report.failed,
                report.skipped_guilds,
            );
        }
    }

    pub async fn poll_once(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let snapshot = match self.registry.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log_error!("Could not read alerts: {}", e);
                return report;
            }
        };

        for guild_id in snapshot.guilds.keys().copied() {
            if !self.sink.knows_guild(guild_id).await {
                log_error!("Guild {} not found, skipping its alerts", guild_id);
                report.skipped_guilds += 1;
                continue;
            }

            // Commands keep editing while the cycle runs; take this guild's alerts as they are now.
            let _turn = self.registry.announcing().await;
            let guild = match self.registry.guild(guild_id).await {
                Ok(Some(guild)) => guild,
                Ok(None) => continue,
                Err(e) => {
                    log_error!("Could not read alerts: {}", e);
                    return report;
                }
            };
            log_internal!("Checking alerts for guild {}", guild_id);

            let mut fired = Vec::new();
            for entry in &guild.alerts {
                let outcome = check_entry(
                    self.platform.as_ref(),
                    self.sink.as_ref(),
                    guild_id,
                    entry,
                    guild.default_channel,
                    LivePhase::NowLive,
                )
                .await;

                match outcome {
                    Ok(EntryOutcome::Announced) => {
                        report.announced += 1;
                        fired.push(entry.clone());
                    }
                    Ok(EntryOutcome::Offline) => report.offline += 1,
                    Ok(EntryOutcome::UnknownStreamer) => report.unknown_streamers += 1,
                    Ok(EntryOutcome::NoDestination) => report.undeliverable += 1,
                    Ok(EntryOutcome::NotPending) => {}
                    Err(e) => {
                        log_error!(
                            "Could not check {} in guild {}: {:#}",
                            Streamer(&entry.streamer).color(),
                            guild_id,
                            e
                        );
                        report.failed += 1;
                    }
                }
            }

            if let Err(e) = self.registry.consume(guild_id, fired).await {
                log_error!("Could not update alerts for guild {}: {}", guild_id, e);
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistent_state::PersistentState,
        twitch::{Broadcaster, LiveStream},
    };
    use anyhow::anyhow;
    use serenity::all::RoleId;
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    #[derive(Default)]
    struct FakePlatform {
        live: HashSet<String>,
        unknown: HashSet<String>,
        broken: HashSet<String>,
    }

    impl FakePlatform {
        fn live(logins: &[&str]) -> Self {
            Self {
                live: logins.iter().map(|l| l.to_string()).collect(),
                ..Self::default()
            }
        }
    }

    #[serenity::async_trait]
    impl StreamPlatform for FakePlatform {
        async fn broadcaster(&self, login: &str) -> Result<Option<Broadcaster>> {
            if self.broken.contains(login) {
                return Err(anyhow!("connection reset"));
            }
            if self.unknown.contains(login) {
                return Ok(None);
            }
            Ok(Some(Broadcaster {
                id: format!("id-{}", login),
                login: login.to_owned(),
                profile_image_url: format!("https://img.example/{}.png", login),
            }))
        }

        async fn live_stream(&self, broadcaster_id: &str) -> Result<Option<LiveStream>> {
            let login = broadcaster_id.trim_start_matches("id-");
            Ok(self.live.contains(login).then(|| LiveStream {
                kind: "live".to_owned(),
                title: format!("{} streams", login),
            }))
        }
    }

    #[derive(Default)]
    struct FakeSink {
        channels: HashMap<GuildId, Vec<ChannelId>>,
        system_channels: HashMap<GuildId, ChannelId>,
        sent: Mutex<Vec<(ChannelId, StreamAlert)>>,
    }

    impl FakeSink {
        /// A guild whose system channel is `system`.
        fn with_guild(guild_id: GuildId, system: ChannelId) -> Self {
            let mut sink = Self::default();
            sink.channels.insert(guild_id, vec![system]);
            sink.system_channels.insert(guild_id, system);
            sink
        }

        fn sent(&self) -> Vec<(ChannelId, StreamAlert)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[serenity::async_trait]
    impl ChatSink for FakeSink {
        async fn knows_guild(&self, guild_id: GuildId) -> bool {
            self.channels.contains_key(&guild_id)
        }

        async fn destination(
            &self,
            guild_id: GuildId,
            preferred: Option<ChannelId>,
        ) -> Option<ChannelId> {
            let channels = self.channels.get(&guild_id)?;
            match preferred {
                Some(channel_id) => channels.contains(&channel_id).then_some(channel_id),
                None => self.system_channels.get(&guild_id).copied(),
            }
        }

        async fn announce(&self, channel_id: ChannelId, alert: &StreamAlert) -> Result<()> {
            self.sent.lock().unwrap().push((channel_id, alert.clone()));
            Ok(())
        }
    }

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn system() -> ChannelId {
        ChannelId::new(100)
    }

    struct Harness {
        registry: AlertRegistry,
        platform: Arc<FakePlatform>,
        sink: Arc<FakeSink>,
        poller: StatusPoller<FakePlatform, FakeSink>,
        _dir: tempfile::TempDir,
    }

    fn harness(state: PersistentState, platform: FakePlatform, sink: FakeSink) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let registry = AlertRegistry::spawn(state, dir.path().join("data.json"));
        let platform = Arc::new(platform);
        let sink = Arc::new(sink);
        let poller = StatusPoller::new(
            registry.clone(),
            Arc::clone(&platform),
            Arc::clone(&sink),
            Duration::from_secs(60),
        );
        Harness {
            registry,
            platform,
            sink,
            poller,
            _dir: dir,
        }
    }

    fn alice_and_bob() -> PersistentState {
        let mut state = PersistentState::default();
        state.add_alert(guild(), "alice", RoleId::new(111));
        state.add_alert(guild(), "bob", RoleId::new(222));
        state
    }

    async fn alerts(registry: &AlertRegistry) -> Vec<AlertEntry> {
        registry
            .guild(guild())
            .await
            .unwrap()
            .map(|g| g.alerts)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_live_streamer_is_announced_once_and_removed() {
        let h = harness(
            alice_and_bob(),
            FakePlatform::live(&["alice"]),
            FakeSink::with_guild(guild(), system()),
        );

        let report = h.poller.poll_once().await;
        assert_eq!(report.announced, 1);
        assert_eq!(report.offline, 1);

        assert_eq!(
            alerts(&h.registry).await,
            vec![AlertEntry::new("bob", RoleId::new(222))]
        );
        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, system());
        assert_eq!(sent[0].1.role, RoleId::new(111));
        assert_eq!(sent[0].1.phase, LivePhase::NowLive);
        assert_eq!(sent[0].1.profile_image_url, "https://img.example/alice.png");

        // Still live on the next tick, but the alert is gone.
        h.poller.poll_once().await;
        assert_eq!(h.sink.sent().len(), 1);
    }

    fn alice() -> AlertEntry {
        AlertEntry::new("alice", RoleId::new(111))
    }

    async fn announce_alice(h: &Harness) -> EntryOutcome {
        announce_if_live(
            &h.registry,
            h.platform.as_ref(),
            h.sink.as_ref(),
            guild(),
            &alice(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_already_live_alert_is_announced_and_consumed() {
        let h = harness(
            alice_and_bob(),
            FakePlatform::live(&["alice"]),
            FakeSink::with_guild(guild(), system()),
        );

        assert_eq!(announce_alice(&h).await, EntryOutcome::Announced);
        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, system());
        assert_eq!(sent[0].1.phase, LivePhase::AlreadyLive);
        assert_eq!(
            alerts(&h.registry).await,
            vec![AlertEntry::new("bob", RoleId::new(222))]
        );

        // The next cycle has nothing left to announce for alice.
        let report = h.poller.poll_once().await;
        assert_eq!(report.announced, 0);
        assert_eq!(h.sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_announced_by_a_cycle_is_not_announced_again() {
        let h = harness(
            alice_and_bob(),
            FakePlatform::live(&["alice"]),
            FakeSink::with_guild(guild(), system()),
        );

        assert_eq!(h.poller.poll_once().await.announced, 1);
        assert_eq!(announce_alice(&h).await, EntryOutcome::NotPending);
        assert_eq!(h.sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_new_alert_is_kept() {
        let h = harness(
            alice_and_bob(),
            FakePlatform::default(),
            FakeSink::with_guild(guild(), system()),
        );

        assert_eq!(announce_alice(&h).await, EntryOutcome::Offline);
        assert!(h.sink.sent().is_empty());
        assert_eq!(alerts(&h.registry).await.len(), 2);
    }

    #[tokio::test]
    async fn test_offline_streamer_is_retained() {
        let h = harness(
            alice_and_bob(),
            FakePlatform::default(),
            FakeSink::with_guild(guild(), system()),
        );

        let report = h.poller.poll_once().await;
        assert_eq!(report.offline, 2);
        assert!(h.sink.sent().is_empty());
        assert_eq!(alerts(&h.registry).await, alice_and_bob().guilds[&guild()].alerts);
    }

    #[tokio::test]
    async fn test_unknown_and_failing_streamers_do_not_stop_the_cycle() {
        let platform = FakePlatform {
            live: ["bob".to_owned()].into(),
            unknown: ["alice".to_owned()].into(),
            broken: ["carol".to_owned()].into(),
        };
        let mut state = alice_and_bob();
        state.add_alert(guild(), "carol", RoleId::new(333));

        let h = harness(state, platform, FakeSink::with_guild(guild(), system()));
        let report = h.poller.poll_once().await;

        assert_eq!(report.unknown_streamers, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.announced, 1);
        let remaining: Vec<String> = alerts(&h.registry)
            .await
            .into_iter()
            .map(|a| a.streamer)
            .collect();
        assert_eq!(remaining, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_unknown_guild_is_skipped_not_purged() {
        let h = harness(
            alice_and_bob(),
            FakePlatform::live(&["alice", "bob"]),
            FakeSink::default(),
        );

        let report = h.poller.poll_once().await;
        assert_eq!(report.skipped_guilds, 1);
        assert_eq!(alerts(&h.registry).await.len(), 2);
        assert!(h.sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_no_destination_keeps_entry() {
        let mut sink = FakeSink::default();
        sink.channels.insert(guild(), vec![system()]);

        let h = harness(alice_and_bob(), FakePlatform::live(&["alice"]), sink);
        let report = h.poller.poll_once().await;

        assert_eq!(report.undeliverable, 1);
        assert_eq!(alerts(&h.registry).await.len(), 2);
    }

    #[tokio::test]
    async fn test_destination_prefers_entry_then_default_channel() {
        let entry_channel = ChannelId::new(200);
        let default_channel = ChannelId::new(300);
        let mut sink = FakeSink::with_guild(guild(), system());
        sink.channels
            .get_mut(&guild())
            .unwrap()
            .extend([entry_channel, default_channel]);

        let mut state = alice_and_bob();
        state.set_default_channel(guild(), default_channel);
        state.guilds.get_mut(&guild()).unwrap().alerts[0].channel = Some(entry_channel);

        let h = harness(state, FakePlatform::live(&["alice", "bob"]), sink);
        h.poller.poll_once().await;

        let destinations: Vec<ChannelId> = h.sink.sent().iter().map(|(c, _)| *c).collect();
        assert_eq!(destinations, vec![entry_channel, default_channel]);

        // Both fired; the default channel keeps the guild around.
        let guild_cfg = h.registry.guild(guild()).await.unwrap().unwrap();
        assert!(guild_cfg.alerts.is_empty());
        assert_eq!(guild_cfg.default_channel, Some(default_channel));
    }

    #[tokio::test]
    async fn test_default_channel_outside_guild_is_undeliverable() {
        let mut state = alice_and_bob();
        state.set_default_channel(guild(), ChannelId::new(999));

        let h = harness(
            state,
            FakePlatform::live(&["alice"]),
            FakeSink::with_guild(guild(), system()),
        );
        let report = h.poller.poll_once().await;

        assert_eq!(report.undeliverable, 1);
        assert!(h.sink.sent().is_empty());
    }
}

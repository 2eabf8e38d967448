//! The alert registry: mutations over the persisted alert state, and the task that owns it.
//!
//! Commands and the status poller never touch `PersistentState` directly.  They talk to a single
//! task through an `AlertRegistry` handle, which applies one request at a time and saves the
//! whole state to disk after each mutation.

use crate::{
    log_error, log_internal,
    persistent_state::{AlertEntry, GuildConfig, PersistentState},
};
use serenity::all::{ChannelId, GuildId, RoleId};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};

/// Outstanding requests before senders wait.
const REQUEST_QUEUE_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("there are no alerts set for this server")]
    NoAlerts,
    #[error("invalid alert number {position}, expected 1 to {len}")]
    InvalidIndex { position: usize, len: usize },
    #[error("could not persist alerts: {0:#}")]
    Storage(anyhow::Error),
    #[error("alert registry is no longer running")]
    Closed,
}

impl PersistentState {
    /// Appends an alert and returns its 1-based position.  Duplicates are allowed.
    pub fn add_alert(&mut self, guild_id: GuildId, streamer: &str, role: RoleId) -> usize {
        let guild = self.guilds.entry(guild_id).or_default();
        guild.alerts.push(AlertEntry::new(streamer, role));
        guild.alerts.len()
    }

    /// Removes the alert at a 1-based position.  State is untouched on error.
    pub fn remove_alert(
        &mut self,
        guild_id: GuildId,
        position: usize,
    ) -> Result<AlertEntry, RegistryError> {
        let guild = match self.guilds.get_mut(&guild_id) {
            Some(guild) if !guild.alerts.is_empty() => guild,
            _ => return Err(RegistryError::NoAlerts),
        };

        let len = guild.alerts.len();
        if position == 0 || position > len {
            return Err(RegistryError::InvalidIndex { position, len });
        }

        let removed = guild.alerts.remove(position - 1);
        self.drop_if_empty(guild_id);
        Ok(removed)
    }

    pub fn set_default_channel(&mut self, guild_id: GuildId, channel_id: ChannelId) {
        self.guilds.entry(guild_id).or_default().default_channel = Some(channel_id);
    }

    /// Removes one stored entry per fired alert.  Returns how many were removed; fired alerts
    /// that were already removed by someone else are ignored.
    pub fn consume(&mut self, guild_id: GuildId, fired: &[AlertEntry]) -> usize {
        let Some(guild) = self.guilds.get_mut(&guild_id) else {
            return 0;
        };

        let mut removed = 0;
        for entry in fired {
            if let Some(index) = guild.alerts.iter().position(|a| a == entry) {
                guild.alerts.remove(index);
                removed += 1;
            }
        }

        self.drop_if_empty(guild_id);
        removed
    }

    // A guild with nothing left configured disappears from the file.
    fn drop_if_empty(&mut self, guild_id: GuildId) {
        if self.guilds.get(&guild_id).is_some_and(GuildConfig::is_empty) {
            self.guilds.remove(&guild_id);
        }
    }
}

enum Request {
    AddAlert {
        guild_id: GuildId,
        streamer: String,
        role: RoleId,
        reply: oneshot::Sender<Result<AlertEntry, RegistryError>>,
    },
    RemoveAlert {
        guild_id: GuildId,
        position: usize,
        reply: oneshot::Sender<Result<AlertEntry, RegistryError>>,
    },
    SetDefaultChannel {
        guild_id: GuildId,
        channel_id: ChannelId,
        reply: oneshot::Sender<Result<(), RegistryError>>,
    },
    Consume {
        guild_id: GuildId,
        fired: Vec<AlertEntry>,
        reply: oneshot::Sender<Result<usize, RegistryError>>,
    },
    Guild {
        guild_id: GuildId,
        reply: oneshot::Sender<Option<GuildConfig>>,
    },
    Snapshot {
        reply: oneshot::Sender<PersistentState>,
    },
}

/// Handle to the task owning the alert state.  Cheap to clone.
#[derive(Clone)]
pub struct AlertRegistry {
    tx: mpsc::Sender<Request>,
    announcing: Arc<Mutex<()>>,
}

impl AlertRegistry {
    /// Starts the owning task.  `state` is what was loaded from `path`.
    pub fn spawn(state: PersistentState, path: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        tokio::spawn(run(state, path, rx));
        Self {
            tx,
            announcing: Arc::new(Mutex::new(())),
        }
    }

    /// Held by whoever is checking and announcing alerts.  Holders re-read the alerts they
    /// announce after taking it, so an alert is never announced twice.
    pub async fn announcing(&self) -> MutexGuard<'_, ()> {
        self.announcing.lock().await
    }

    pub async fn add_alert(
        &self,
        guild_id: GuildId,
        streamer: &str,
        role: RoleId,
    ) -> Result<AlertEntry, RegistryError> {
        let streamer = streamer.to_owned();
        self.request(|reply| Request::AddAlert {
            guild_id,
            streamer,
            role,
            reply,
        })
        .await?
    }

    pub async fn remove_alert(
        &self,
        guild_id: GuildId,
        position: usize,
    ) -> Result<AlertEntry, RegistryError> {
        self.request(|reply| Request::RemoveAlert {
            guild_id,
            position,
            reply,
        })
        .await?
    }

    pub async fn set_default_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<(), RegistryError> {
        self.request(|reply| Request::SetDefaultChannel {
            guild_id,
            channel_id,
            reply,
        })
        .await?
    }

    /// Drops alerts that have fired and persists the state, even when nothing changed.
    pub async fn consume(
        &self,
        guild_id: GuildId,
        fired: Vec<AlertEntry>,
    ) -> Result<usize, RegistryError> {
        self.request(|reply| Request::Consume {
            guild_id,
            fired,
            reply,
        })
        .await?
    }

    pub async fn guild(&self, guild_id: GuildId) -> Result<Option<GuildConfig>, RegistryError> {
        self.request(|reply| Request::Guild { guild_id, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<PersistentState, RegistryError> {
        self.request(|reply| Request::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RegistryError::Closed)?;
        rx.await.map_err(|_| RegistryError::Closed)
    }
}

async fn run(mut state: PersistentState, path: PathBuf, mut rx: mpsc::Receiver<Request>) {
    while let Some(request) = rx.recv().await {
        // Receivers that went away (e.g. a cancelled command) are not an error.
        match request {
            Request::AddAlert {
                guild_id,
                streamer,
                role,
                reply,
            } => {
                let previous = state.clone();
                state.add_alert(guild_id, &streamer, role);
                let result = commit(&mut state, previous, &path)
                    .await
                    .map(|_| AlertEntry::new(&streamer, role));
                let _ = reply.send(result);
            }
            Request::RemoveAlert {
                guild_id,
                position,
                reply,
            } => {
                let previous = state.clone();
                let result = match state.remove_alert(guild_id, position) {
                    Ok(removed) => commit(&mut state, previous, &path).await.map(|_| removed),
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Request::SetDefaultChannel {
                guild_id,
                channel_id,
                reply,
            } => {
                let previous = state.clone();
                state.set_default_channel(guild_id, channel_id);
                let _ = reply.send(commit(&mut state, previous, &path).await);
            }
            Request::Consume {
                guild_id,
                fired,
                reply,
            } => {
                // Kept in memory even if the save fails: the announcements are already out.
                let removed = state.consume(guild_id, &fired);
                let _ = reply.send(save(&state, &path).await.map(|_| removed));
            }
            Request::Guild { guild_id, reply } => {
                let _ = reply.send(state.guild(guild_id).cloned());
            }
            Request::Snapshot { reply } => {
                let _ = reply.send(state.clone());
            }
        }
    }

    log_internal!("Alert registry stopped");
}

/// Saves a change made on a user's behalf.  A change that cannot be saved is undone, so the user
/// is never told it failed while it stays in effect.
async fn commit(
    state: &mut PersistentState,
    previous: PersistentState,
    path: &std::path::Path,
) -> Result<(), RegistryError> {
    let result = save(state, path).await;
    if result.is_err() {
        *state = previous;
    }
    result
}

async fn save(state: &PersistentState, path: &std::path::Path) -> Result<(), RegistryError> {
    match state.save(path).await {
        Ok(()) => {
            log_internal!(
                "Saved alerts for {} server(s) to {}",
                state.len(),
                path.to_string_lossy()
            );
            Ok(())
        }
        Err(e) => {
            log_error!("{:#}", e);
            Err(RegistryError::Storage(e))
        }
    }
}

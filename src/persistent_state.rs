use anyhow::{anyhow, Result};
use serenity::all::{ChannelId, GuildId, RoleId};
use std::{collections::BTreeMap, io::ErrorKind, path::Path};

/// Alert configuration which persists across sessions, keyed by guild.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PersistentState {
    pub(crate) guilds: BTreeMap<GuildId, GuildConfig>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "GuildConfigRepr", into = "GuildConfigRepr")]
pub struct GuildConfig {
    pub alerts: Vec<AlertEntry>,
    /// Where announcements go when an alert has no channel of its own.
    pub default_channel: Option<ChannelId>,
}

/// A pending one-shot live notification.
#[derive(Clone, Debug, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "AlertEntryRepr", into = "AlertEntryRepr")]
pub struct AlertEntry {
    /// Twitch login name
    pub streamer: String,
    pub role: RoleId,
    pub channel: Option<ChannelId>,
}

impl AlertEntry {
    pub fn new(streamer: &str, role: RoleId) -> Self {
        Self {
            streamer: streamer.to_owned(),
            role,
            channel: None,
        }
    }
}

// Twitch logins are case-insensitive.
impl PartialEq for AlertEntry {
    fn eq(&self, other: &Self) -> bool {
        self.streamer.eq_ignore_ascii_case(&other.streamer)
            && self.role == other.role
            && self.channel == other.channel
    }
}

impl GuildConfig {
    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty() && self.default_channel.is_none()
    }
}

impl PersistentState {
    pub async fn load(path: &Path) -> Result<Self> {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(anyhow!(
                    "Could not read alerts at `{}`: {}",
                    path.to_string_lossy(),
                    e
                ))
            }
        };

        serde_json::from_slice(&data).map_err(|e| {
            anyhow!(
                "Could not parse alerts at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string(self)
            .map_err(|e| anyhow!("Could not serialize alerts: {}", e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                anyhow!(
                    "Could not create directory `{}`: {}",
                    parent.to_string_lossy(),
                    e
                )
            })?;
        }

        // Create a temporary file in the same directory.
        let tmp_path = path.with_extension("json.new");

        tokio::fs::write(&tmp_path, serialized).await.map_err(|e| {
            anyhow!(
                "Could not write alerts to temporary file `{}`: {}",
                tmp_path.to_string_lossy(),
                e
            )
        })?;

        // Atomically rename the temporary file over the target file.
        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            anyhow!(
                "Could not rename temporary file `{}` to `{}`: {}",
                tmp_path.to_string_lossy(),
                path.to_string_lossy(),
                e
            )
        })?;

        Ok(())
    }

    pub fn guild(&self, guild_id: GuildId) -> Option<&GuildConfig> {
        self.guilds.get(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }
}

// On-disk shapes.
//
// A guild without a default channel is stored as a bare list of alerts.  Older files stored a
// channel-only guild as `{"channel": id}`; both forms load into `GuildConfig`.

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct AlertEntryRepr {
    streamer: String,
    role: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<u64>,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum GuildConfigRepr {
    Alerts(Vec<AlertEntryRepr>),
    Record(GuildRecordRepr),
}

// Picks the shape from the first token instead of trying each in turn, so a bad entry is
// reported as itself rather than as "did not match any variant".
impl<'de> serde::Deserialize<'de> for GuildConfigRepr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::{
            value::{MapAccessDeserializer, SeqAccessDeserializer},
            MapAccess, SeqAccess, Visitor,
        };

        struct ShapeVisitor;

        impl<'de> Visitor<'de> for ShapeVisitor {
            type Value = GuildConfigRepr;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a list of alerts or an object with `alerts` and `channel`")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
                <Vec<AlertEntryRepr> as serde::Deserialize>::deserialize(
                    SeqAccessDeserializer::new(seq),
                )
                .map(GuildConfigRepr::Alerts)
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
                <GuildRecordRepr as serde::Deserialize>::deserialize(MapAccessDeserializer::new(
                    map,
                ))
                .map(GuildConfigRepr::Record)
            }
        }

        deserializer.deserialize_any(ShapeVisitor)
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct GuildRecordRepr {
    #[serde(default)]
    alerts: Vec<AlertEntryRepr>,
    #[serde(default)]
    channel: Option<u64>,
}

fn role_id(raw: u64) -> Result<RoleId, String> {
    match raw {
        0 => Err("role id must be non-zero".to_owned()),
        raw => Ok(RoleId::new(raw)),
    }
}

fn channel_id(raw: u64) -> Result<ChannelId, String> {
    match raw {
        0 => Err("channel id must be non-zero".to_owned()),
        raw => Ok(ChannelId::new(raw)),
    }
}

impl TryFrom<AlertEntryRepr> for AlertEntry {
    type Error = String;

    fn try_from(repr: AlertEntryRepr) -> Result<Self, Self::Error> {
        Ok(Self {
            streamer: repr.streamer,
            role: role_id(repr.role)?,
            channel: repr.channel.map(channel_id).transpose()?,
        })
    }
}

impl From<AlertEntry> for AlertEntryRepr {
    fn from(entry: AlertEntry) -> Self {
        Self {
            streamer: entry.streamer,
            role: entry.role.get(),
            channel: entry.channel.map(|c| c.get()),
        }
    }
}

impl TryFrom<GuildConfigRepr> for GuildConfig {
    type Error = String;

    fn try_from(repr: GuildConfigRepr) -> Result<Self, Self::Error> {
        let (alerts, channel) = match repr {
            GuildConfigRepr::Alerts(alerts) => (alerts, None),
            GuildConfigRepr::Record(record) => (record.alerts, record.channel),
        };

        Ok(Self {
            alerts: alerts
                .into_iter()
                .map(AlertEntry::try_from)
                .collect::<Result<_, _>>()?,
            default_channel: channel.map(channel_id).transpose()?,
        })
    }
}

impl From<GuildConfig> for GuildConfigRepr {
    fn from(cfg: GuildConfig) -> Self {
        let alerts = cfg.alerts.into_iter().map(Into::into).collect();
        match cfg.default_channel {
            None => GuildConfigRepr::Alerts(alerts),
            Some(channel) => GuildConfigRepr::Record(GuildRecordRepr {
                alerts,
                channel: Some(channel.get()),
            }),
        }
    }
}

use anyhow::{anyhow, Result};
use std::{path::PathBuf, time::Duration};
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/livealert/config.toml";

/// Bot configuration
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    pub twitch: Twitch,
    #[serde(default)]
    pub poller: Poller,
    #[serde(default)]
    pub conversation: Conversation,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    pub command_prefix: String,
    /// Where guild alert configuration is stored.  Relative paths resolve against the working
    /// directory.
    #[serde(default = "default_alerts_path")]
    pub alerts_path: PathBuf,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct Twitch {
    pub client_id: String,
    pub client_secret: String,
}

/// Any field left out keeps its default.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Poller {
    pub interval_seconds: u64,
    /// Wait after the first gateway Ready before polling, so the guild cache is populated.
    pub startup_delay_seconds: u64,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Conversation {
    pub prompt_timeout_seconds: u64,
}

fn default_alerts_path() -> PathBuf {
    PathBuf::from("data.json")
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            startup_delay_seconds: 5,
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            prompt_timeout_seconds: 120,
        }
    }
}

impl Poller {
    pub fn interval(&self) -> Duration {
        // A zero period would make tokio's interval panic.
        Duration::from_secs(self.interval_seconds.max(1))
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_seconds)
    }
}

impl Conversation {
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs(self.prompt_timeout_seconds.max(1))
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut config = Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;
        config.apply_env_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(Into::into)
    }

    /// Credentials may come from the environment instead of the config file.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("DISCORD_TOKEN") {
            self.general.discord_token = token;
        }
        if let Some(client_id) = var("TWITCH_CLIENT_ID") {
            self.twitch.client_id = client_id;
        }
        if let Some(client_secret) = var("TWITCH_CLIENT_SECRET") {
            self.twitch.client_secret = client_secret;
        }
    }
}

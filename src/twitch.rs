//! Twitch Helix client
//!
//! Only the two lookups the bot needs: login name to broadcaster, and broadcaster to live stream.
//! Requests use an app access token from the client-credentials flow, fetched lazily and
//! refreshed before it expires.

use crate::{config, log_internal};
use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const HELIX_URL: &str = "https://api.twitch.tv/helix";
/// Refresh the token this long before Twitch says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A streaming platform the poller can ask about broadcasters.
#[serenity::async_trait]
pub trait StreamPlatform: Send + Sync {
    /// `None` if no such login exists.
    async fn broadcaster(&self, login: &str) -> Result<Option<Broadcaster>>;
    /// `None` if the broadcaster is not currently live.
    async fn live_stream(&self, broadcaster_id: &str) -> Result<Option<LiveStream>>;
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Broadcaster {
    pub id: String,
    pub login: String,
    pub profile_image_url: String,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct LiveStream {
    /// "live", or empty on error per the Helix docs
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
}

impl LiveStream {
    pub fn is_live(&self) -> bool {
        self.kind == "live"
    }
}

#[derive(serde::Deserialize)]
struct HelixPage<T> {
    data: Vec<T>,
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AppToken {
    access_token: String,
    expires_at: Instant,
}

impl AppToken {
    fn from_response(response: TokenResponse, now: Instant) -> Self {
        Self {
            access_token: response.access_token,
            expires_at: now + Duration::from_secs(response.expires_in),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

pub struct TwitchClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AppToken>>,
}

impl TwitchClient {
    pub fn new(cfg: &config::Twitch) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Could not build HTTP client: {}", e))?;

        Ok(Self {
            http,
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    /// Fetch an app access token now, so bad credentials fail at startup rather than on the
    /// first poll.
    pub async fn authenticate(&self) -> Result<()> {
        self.access_token().await.map(|_| ())
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        let now = Instant::now();
        if let Some(token) = token.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        log_internal!("Requesting Twitch app access token... ");
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow!("Twitch rejected the client credentials: {}", e))?
            .json::<TokenResponse>()
            .await?;
        log_internal!("Requesting Twitch app access token... done");

        let fresh = AppToken::from_response(response, now);
        let access_token = fresh.access_token.clone();
        *token = Some(fresh);
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn helix_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = format!("{}/{}", HELIX_URL, endpoint);

        // One retry with a new token if Twitch revoked the cached one early.
        let mut retried = false;
        loop {
            let token = self.access_token().await?;
            let response = self
                .http
                .get(&url)
                .query(query)
                .header("Client-Id", &self.client_id)
                .bearer_auth(token)
                .send()
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED && !retried {
                self.invalidate_token().await;
                retried = true;
                continue;
            }

            let page = response
                .error_for_status()
                .map_err(|e| anyhow!("Twitch request to `{}` failed: {}", endpoint, e))?
                .json::<HelixPage<T>>()
                .await?;
            return Ok(page.data);
        }
    }
}

#[serenity::async_trait]
impl StreamPlatform for TwitchClient {
    async fn broadcaster(&self, login: &str) -> Result<Option<Broadcaster>> {
        let users = self.helix_get("users", &[("login", login)]).await?;
        Ok(users.into_iter().next())
    }

    async fn live_stream(&self, broadcaster_id: &str) -> Result<Option<LiveStream>> {
        let streams: Vec<LiveStream> = self
            .helix_get("streams", &[("user_id", broadcaster_id)])
            .await?;
        Ok(streams.into_iter().find(LiveStream::is_live))
    }
}

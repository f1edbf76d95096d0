//! HTTP client for the luxerOne resident API

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{LuxerOneError, LuxerOneResult};
use crate::models::{Package, UserInfo};

pub const DEFAULT_BASE_URL: &str = "https://resident-api.luxerone.com/resident_api/v1";

/// Lifetime requested for session tokens
pub const TOKEN_TTL_SECS: i64 = 1800;

const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// The operations the integration needs from the vendor service
///
/// All calls on one instance share a session. `login` may be called again on
/// the same instance to refresh an expired session in place.
#[async_trait]
pub trait PackageApi: Send + Sync {
    /// Authenticate and store the session token
    async fn login(&self, username: &str, password: &SecretString) -> LuxerOneResult<()>;

    /// Fetch the profile of the logged in account
    async fn user_info(&self) -> LuxerOneResult<UserInfo>;

    /// Fetch packages that are waiting to be picked up
    async fn pending_packages(&self) -> LuxerOneResult<Vec<Package>>;
}

struct SessionToken {
    value: SecretString,
    expires_at: DateTime<Utc>,
}

impl SessionToken {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Response wrapper used by every endpoint
#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "as")]
    token_kind: &'a str,
    expires: i64,
}

#[derive(Deserialize)]
struct LoginData {
    token: String,
    /// Seconds until expiry, when the service overrides the requested ttl
    #[serde(default)]
    ttl: Option<i64>,
}

pub struct LuxerOneClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<SessionToken>>,
}

impl LuxerOneClient {
    /// Create a client for the production service, not yet logged in
    pub fn new() -> LuxerOneResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> LuxerOneResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized_get<T: DeserializeOwned>(&self, path: &str) -> LuxerOneResult<T> {
        let token = {
            let guard = self.token.read().await;
            match guard.as_ref() {
                None => return Err(LuxerOneError::NotLoggedIn),
                Some(token) if token.is_expired() => return Err(LuxerOneError::TokenExpired),
                Some(token) => token.value.expose_secret().to_string(),
            }
        };

        let response = self
            .http
            .get(self.url(path))
            .header(AUTHORIZATION, format!("LuxerOneApi {token}"))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "Session token rejected");
            return Err(LuxerOneError::TokenExpired);
        }

        unwrap_envelope(response).await
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(response: Response) -> LuxerOneResult<T> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(LuxerOneError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let envelope: Envelope<T> = response.json().await?;
    let failed = matches!(
        envelope.error,
        Some(ref err) if !err.is_null() && err != &serde_json::Value::Bool(false)
    );
    if failed {
        let message = envelope
            .message
            .or_else(|| envelope.error.map(|e| e.to_string()))
            .unwrap_or_default();
        return Err(LuxerOneError::Api {
            status: status.as_u16(),
            message,
        });
    }

    envelope.data.ok_or_else(|| LuxerOneError::Api {
        status: status.as_u16(),
        message: "response carried no data".to_string(),
    })
}

#[async_trait]
impl PackageApi for LuxerOneClient {
    #[instrument(skip(self, password), fields(username = %username))]
    async fn login(&self, username: &str, password: &SecretString) -> LuxerOneResult<()> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                username,
                password: password.expose_secret(),
                token_kind: "token",
                expires: TOKEN_TTL_SECS,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LuxerOneError::Authentication("invalid credentials".to_string()));
        }

        let data: LoginData = match unwrap_envelope(response).await {
            Ok(data) => data,
            Err(LuxerOneError::Api { message, .. }) if status.is_success() => {
                return Err(LuxerOneError::Authentication(message));
            }
            Err(err) => return Err(err),
        };

        let ttl = data.ttl.unwrap_or(TOKEN_TTL_SECS);
        *self.token.write().await = Some(SessionToken {
            value: SecretString::from(data.token),
            expires_at: Utc::now() + Duration::seconds(ttl),
        });
        debug!(ttl, "Logged in");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn user_info(&self) -> LuxerOneResult<UserInfo> {
        self.authorized_get("/user/info").await
    }

    #[instrument(skip(self))]
    async fn pending_packages(&self) -> LuxerOneResult<Vec<Package>> {
        let packages: Vec<Package> = self.authorized_get("/deliveries/pendings").await?;
        debug!(count = packages.len(), "Fetched pending packages");
        Ok(packages)
    }
}

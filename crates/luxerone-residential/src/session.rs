//! Credentials and client construction

use std::sync::Arc;

use ha_host::ConfigEntry;
use luxerone_api::{LuxerOneClient, LuxerOneResult, PackageApi, DEFAULT_BASE_URL};
use secrecy::SecretString;

use crate::constants::{PASS, USER};
use crate::error::SetupError;

/// Username and password of one luxerOne account
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Read the credential stored in an entry's data
    pub fn from_entry(entry: &ConfigEntry) -> Result<Self, SetupError> {
        let username = entry.data_str(USER).ok_or(SetupError::MissingData(USER))?;
        let password = entry.data_str(PASS).ok_or(SetupError::MissingData(PASS))?;
        Ok(Self::new(username, password))
    }

    /// Log `api` in with this credential
    pub async fn login(&self, api: &dyn PackageApi) -> LuxerOneResult<()> {
        api.login(&self.username, &self.password).await
    }
}

/// Builds fresh, not yet authenticated API sessions
pub trait ClientFactory: Send + Sync {
    fn create(&self) -> LuxerOneResult<Arc<dyn PackageApi>>;
}

/// Factory for HTTP sessions against the luxerOne service
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    base_url: String,
}

impl HttpClientFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self) -> LuxerOneResult<Arc<dyn PackageApi>> {
        Ok(Arc::new(LuxerOneClient::with_base_url(self.base_url.clone())?))
    }
}

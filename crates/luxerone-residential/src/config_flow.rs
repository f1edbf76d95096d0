//! Config flow for the luxerOne integration
//!
//! The user enters their luxerOne username and password. The credentials are
//! checked by logging in once and reading the account profile; the profile
//! provides the entry title and the unique id used to refuse a second entry
//! for the same account.

use std::collections::HashMap;
use std::sync::Arc;

use ha_host::{ConfigEntries, FlowResult, FormField};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use crate::constants::{CONFIG_FLOW_VERSION, DOMAIN, EMAIL, ID, NAME, PASS, TITLE, USER};
use crate::error::ValidationError;
use crate::session::ClientFactory;

/// Account details derived from a successful login
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub title: String,
    pub unique_id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: SecretString,
}

impl AccountInfo {
    /// Entry data as persisted by the host
    pub fn into_entry_data(self) -> HashMap<String, Value> {
        HashMap::from([
            (TITLE.to_string(), json!(self.title)),
            (ID.to_string(), json!(self.unique_id)),
            (NAME.to_string(), json!(self.name)),
            (EMAIL.to_string(), json!(self.email)),
            (USER.to_string(), json!(self.username)),
            (PASS.to_string(), json!(self.password.expose_secret())),
        ])
    }
}

/// Lowercased text before the first `@`, or the whole username
pub fn account_unique_id(username: &str) -> String {
    username
        .split_once('@')
        .map_or(username, |(local, _)| local)
        .to_lowercase()
}

/// Check that the credentials allow us to log in
///
/// Uses a throwaway session; nothing is retained after the call.
#[instrument(skip(factory, password), fields(username = %username))]
pub async fn validate_input(
    factory: &dyn ClientFactory,
    username: &str,
    password: &SecretString,
) -> Result<AccountInfo, ValidationError> {
    let api = factory.create()?;
    api.login(username, password).await?;
    let profile = api.user_info().await?;

    let name = profile.full_name();
    let info = AccountInfo {
        title: format!("luxerOne for {name}"),
        unique_id: account_unique_id(username),
        email: profile.email,
        name,
        username: username.to_string(),
        password: password.clone(),
    };

    debug!(
        "Hub: name: {}, user: {}, email: {}",
        info.name, info.unique_id, info.email
    );
    Ok(info)
}

/// Handles the `user`, `reauth` and `reauth_confirm` steps
pub struct LuxerOneConfigFlow {
    factory: Arc<dyn ClientFactory>,
    entries: Arc<ConfigEntries>,
}

impl LuxerOneConfigFlow {
    pub const VERSION: u32 = CONFIG_FLOW_VERSION;

    pub fn new(factory: Arc<dyn ClientFactory>, entries: Arc<ConfigEntries>) -> Self {
        Self { factory, entries }
    }

    fn user_schema() -> Vec<FormField> {
        vec![
            FormField::required_string(USER),
            FormField::required_string(PASS),
        ]
    }

    fn user_form(errors: HashMap<String, String>) -> FlowResult {
        FlowResult::form(DOMAIN, "user", Self::user_schema(), errors)
    }

    fn base_error(key: &str) -> HashMap<String, String> {
        HashMap::from([("base".to_string(), key.to_string())])
    }

    /// Initial step: show the form, or validate the submitted credentials
    pub async fn step_user(&self, user_input: Option<&Value>) -> FlowResult {
        let Some(input) = user_input else {
            return Self::user_form(HashMap::new());
        };

        let (Some(username), Some(password)) = (
            input.get(USER).and_then(Value::as_str),
            input.get(PASS).and_then(Value::as_str),
        ) else {
            return Self::user_form(Self::base_error("invalid_input"));
        };

        let password = SecretString::from(password.to_string());
        let info = match validate_input(self.factory.as_ref(), username, &password).await {
            Ok(info) => info,
            Err(err) => {
                if let ValidationError::Unknown(reason) = &err {
                    error!("Unexpected exception: {}", reason);
                }
                return Self::user_form(Self::base_error(err.form_key()));
            }
        };

        let unique_id = info.unique_id.to_lowercase();
        if self.entries.get_by_unique_id(DOMAIN, &unique_id).is_some() {
            return FlowResult::abort(DOMAIN, "already_configured");
        }

        let title = info.title.clone();
        let description = format!("luxerOne package tracking for {}", info.name);
        FlowResult::create_entry(
            DOMAIN,
            Self::VERSION,
            title,
            description,
            info.into_entry_data(),
        )
        .with_unique_id(unique_id)
    }

    /// Stored credentials stopped working; the entry data is passed along
    pub async fn step_reauth(&self, entry_data: &HashMap<String, Value>) -> FlowResult {
        let username = entry_data
            .get(USER)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown user");
        debug!("Re-authentication requested for {}", username);
        let data = json!(entry_data);
        self.step_reauth_confirm(Some(&data)).await
    }

    /// Tell the user re-authentication is required, then restart at `user`
    pub async fn step_reauth_confirm(&self, user_input: Option<&Value>) -> FlowResult {
        if user_input.is_none() {
            return FlowResult::form(DOMAIN, "reauth_confirm", Vec::new(), HashMap::new());
        }
        self.step_user(None).await
    }
}

//! Config entries
//!
//! A [`ConfigEntry`] is one configured instance of an integration, e.g. one
//! luxerOne account. [`ConfigEntries`] indexes them by id and by
//! `(domain, unique_id)` so a second entry for the same account is refused.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

use crate::flow::{FlowResult, FlowResultType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntrySource {
    /// Configured via the user flow
    #[default]
    User,
    /// Imported from YAML
    Import,
    /// Re-authentication flow
    Reauth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain
    pub domain: String,

    pub title: String,

    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// Schema version of `data`
    #[serde(default = "default_version")]
    pub version: u32,

    /// Identifier used for duplicate prevention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    #[serde(default)]
    pub source: ConfigEntrySource,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl ConfigEntry {
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            version: 1,
            unique_id: None,
            source: ConfigEntrySource::User,
            created_at: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn with_source(mut self, source: ConfigEntrySource) -> Self {
        self.source = source;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Get a string value from `data`
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },
}

/// In-memory config entry registry
#[derive(Default)]
pub struct ConfigEntries {
    entries: DashMap<String, ConfigEntry>,
    by_unique_id: DashMap<(String, String), String>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, entry: ConfigEntry) -> Result<ConfigEntry, ConfigEntriesError> {
        if let Some(unique_id) = &entry.unique_id {
            let key = (entry.domain.clone(), unique_id.clone());
            match self.by_unique_id.entry(key) {
                Entry::Occupied(_) => {
                    return Err(ConfigEntriesError::AlreadyExists {
                        domain: entry.domain.clone(),
                        unique_id: unique_id.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.entry_id.clone());
                }
            }
        }

        self.entries.insert(entry.entry_id.clone(), entry.clone());
        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Register the entry described by a `create_entry` flow result
    ///
    /// Returns `Ok(None)` for any other result type.
    pub fn add_from_flow(
        &self,
        result: &FlowResult,
    ) -> Result<Option<ConfigEntry>, ConfigEntriesError> {
        if result.result_type != FlowResultType::CreateEntry {
            return Ok(None);
        }

        let mut entry = ConfigEntry::new(
            result.handler.clone(),
            result.title.clone().unwrap_or_default(),
        )
        .with_data(result.data.clone().unwrap_or_default())
        .with_version(result.version.unwrap_or(1));
        if let Some(unique_id) = &result.unique_id {
            entry = entry.with_unique_id(unique_id.clone());
        }

        self.add(entry).map(Some)
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(entry_id.value()))
    }

    /// Replace the data of an existing entry, e.g. after re-authentication
    pub fn update_data(
        &self,
        entry_id: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> Result<ConfigEntry, ConfigEntriesError> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.data = data;
        Ok(entry.clone())
    }

    pub fn remove(&self, entry_id: &str) -> Result<ConfigEntry, ConfigEntriesError> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if let Some(unique_id) = &entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.entries
            .iter()
            .filter(|r| r.domain == domain)
            .map(|r| r.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Response models
//!
//! The service speaks camelCase JSON. Numeric identifiers are sometimes sent
//! as numbers and sometimes as strings, so they are normalized to `String`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Account profile returned by `/user/info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carrier {
    pub carrier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locker {
    #[serde(deserialize_with = "string_or_number")]
    pub locker_number: String,
    #[serde(default)]
    pub locker_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub location_address: String,
}

/// A package waiting in a locker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub carrier: Carrier,
    #[serde(default)]
    pub labels: Vec<String>,
    pub locker: Locker,
    pub location: Location,
    pub access_code: String,
    #[serde(default)]
    pub is_perishable: bool,
    #[serde(default)]
    pub charge: Option<f64>,
    /// Unix seconds on the wire
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub hold_until: Option<DateTime<Utc>>,
    #[serde(rename = "pickedup", default)]
    pub picked_up: bool,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

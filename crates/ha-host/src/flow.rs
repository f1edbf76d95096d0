//! Config flow step results

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
}

impl FormField {
    pub fn required_string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: "string".to_string(),
            required: true,
        }
    }
}

/// Outcome of one config flow step
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    /// Integration domain
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Always present, empty if no schema
    pub data_schema: Vec<FormField>,
    /// Errors from the previous submission, keyed by field or `base`
    pub errors: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Entry data (create_entry only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, serde_json::Value>>,
    /// Unique id the created entry is registered under
    #[serde(skip)]
    pub unique_id: Option<String>,
}

impl FlowResult {
    fn base(handler: &str, result_type: FlowResultType) -> Self {
        Self {
            handler: handler.to_string(),
            result_type,
            step_id: None,
            data_schema: Vec::new(),
            errors: HashMap::new(),
            title: None,
            description: None,
            reason: None,
            version: None,
            data: None,
            unique_id: None,
        }
    }

    pub fn form(
        handler: &str,
        step_id: impl Into<String>,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    ) -> Self {
        Self {
            step_id: Some(step_id.into()),
            data_schema,
            errors,
            ..Self::base(handler, FlowResultType::Form)
        }
    }

    pub fn create_entry(
        handler: &str,
        version: u32,
        title: impl Into<String>,
        description: impl Into<String>,
        data: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            version: Some(version),
            data: Some(data),
            ..Self::base(handler, FlowResultType::CreateEntry)
        }
    }

    pub fn abort(handler: &str, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::base(handler, FlowResultType::Abort)
        }
    }

    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    /// The `base` error of a form, if any
    pub fn base_error(&self) -> Option<&str> {
        self.errors.get("base").map(String::as_str)
    }
}

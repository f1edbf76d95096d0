mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{api_error, FakeApi, FakeFactory};
use ha_host::{ConfigEntries, FlowResultType};
use luxerone_api::LuxerOneError;
use luxerone_residential::constants::{EMAIL, ID, NAME, PASS, TITLE, USER};
use luxerone_residential::{HttpClientFactory, LuxerOneConfigFlow, DOMAIN};
use serde_json::{json, Value};

fn flow(api: FakeApi) -> (LuxerOneConfigFlow, Arc<FakeApi>, Arc<ConfigEntries>) {
    let api = Arc::new(api);
    let entries = Arc::new(ConfigEntries::new());
    let flow = LuxerOneConfigFlow::new(Arc::new(FakeFactory::new(api.clone())), entries.clone());
    (flow, api, entries)
}

fn credentials(username: &str) -> Value {
    json!({ USER: username, PASS: "hunter2" })
}

#[tokio::test]
async fn test_show_user_form() {
    let (flow, api, _) = flow(FakeApi::new());

    let result = flow.step_user(None).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("user"));
    assert!(result.errors.is_empty());
    let fields: Vec<&str> = result.data_schema.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["username", "password"]);
    assert!(result.data_schema.iter().all(|f| f.required));
    assert_eq!(api.logins(), 0);
}

#[tokio::test]
async fn test_missing_field_is_invalid_input() {
    let (flow, api, _) = flow(FakeApi::new());

    let result = flow.step_user(Some(&json!({ USER: "jane" }))).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.base_error(), Some("invalid_input"));
    assert_eq!(api.logins(), 0);
}

#[tokio::test]
async fn test_valid_credentials_create_entry() {
    let (flow, api, entries) = flow(FakeApi::new());

    let result = flow
        .step_user(Some(&credentials("Jane.Doe@Example.com")))
        .await;

    assert_eq!(result.result_type, FlowResultType::CreateEntry);
    assert_eq!(result.title.as_deref(), Some("luxerOne for Jane Doe"));
    assert_eq!(
        result.description.as_deref(),
        Some("luxerOne package tracking for Jane Doe")
    );
    assert_eq!(result.version, Some(LuxerOneConfigFlow::VERSION));
    assert_eq!(result.unique_id.as_deref(), Some("jane.doe"));

    let data = result.data.as_ref().unwrap();
    assert_eq!(data[TITLE], "luxerOne for Jane Doe");
    assert_eq!(data[ID], "jane.doe");
    assert_eq!(data[NAME], "Jane Doe");
    assert_eq!(data[EMAIL], "jane@example.com");
    assert_eq!(data[USER], "Jane.Doe@Example.com");
    assert_eq!(data[PASS], "hunter2");

    assert_eq!(api.logins(), 1);
    assert_eq!(
        api.logged_in_as.lock().unwrap().as_slice(),
        ["Jane.Doe@Example.com".to_string()]
    );

    let entry = entries.add_from_flow(&result).unwrap().unwrap();
    assert_eq!(entry.domain, DOMAIN);
    assert_eq!(entry.unique_id.as_deref(), Some("jane.doe"));
    assert_eq!(entry.data_str(USER), Some("Jane.Doe@Example.com"));
}

#[tokio::test]
async fn test_rejected_login_is_invalid_auth() {
    let api = FakeApi::new();
    api.push_login(Err(LuxerOneError::Authentication(
        "Invalid credentials".to_string(),
    )));
    let (flow, _, entries) = flow(api);

    let result = flow.step_user(Some(&credentials("jane@example.com"))).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("user"));
    assert_eq!(result.base_error(), Some("invalid_auth"));
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_vendor_error_is_invalid_auth() {
    let api = FakeApi::new();
    api.push_login(Err(api_error()));
    let (flow, _, _) = flow(api);

    let result = flow.step_user(Some(&credentials("jane@example.com"))).await;

    assert_eq!(result.base_error(), Some("invalid_auth"));
}

#[tokio::test]
async fn test_unexpected_failure_is_unknown() {
    let (flow, api, _) = flow(FakeApi::new().with_user_error(LuxerOneError::NotLoggedIn));

    let result = flow.step_user(Some(&credentials("jane@example.com"))).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.base_error(), Some("unknown"));
    assert_eq!(api.logins(), 1);
}

#[tokio::test]
async fn test_unreachable_service_is_cannot_connect() {
    let flow = LuxerOneConfigFlow::new(
        Arc::new(HttpClientFactory::new("http://127.0.0.1:9")),
        Arc::new(ConfigEntries::new()),
    );

    let result = flow.step_user(Some(&credentials("jane@example.com"))).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.base_error(), Some("cannot_connect"));
}

#[tokio::test]
async fn test_second_entry_for_same_account_aborts() {
    let (flow, _, entries) = flow(FakeApi::new());

    let first = flow.step_user(Some(&credentials("jane@example.com"))).await;
    entries.add_from_flow(&first).unwrap();

    // the unique id only depends on the lowercased local part
    let second = flow.step_user(Some(&credentials("JANE@other.org"))).await;

    assert_eq!(second.result_type, FlowResultType::Abort);
    assert_eq!(second.reason.as_deref(), Some("already_configured"));
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_different_account_is_accepted() {
    let (flow, _, entries) = flow(FakeApi::new());

    let first = flow.step_user(Some(&credentials("jane@example.com"))).await;
    entries.add_from_flow(&first).unwrap();
    let second = flow.step_user(Some(&credentials("john@example.com"))).await;

    assert_eq!(second.result_type, FlowResultType::CreateEntry);
    assert_eq!(second.unique_id.as_deref(), Some("john"));
}

#[tokio::test]
async fn test_reauth_leads_back_to_user_form() {
    let (flow, api, _) = flow(FakeApi::new());
    let entry_data = HashMap::from([
        (USER.to_string(), json!("jane@example.com")),
        (PASS.to_string(), json!("stale")),
    ]);

    let result = flow.step_reauth(&entry_data).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("user"));
    assert!(result.errors.is_empty());
    // stored credentials are not re-validated
    assert_eq!(api.logins(), 0);
}

#[tokio::test]
async fn test_reauth_without_stored_username() {
    let (flow, api, _) = flow(FakeApi::new());
    let entry_data = HashMap::from([(PASS.to_string(), json!("stale"))]);

    let result = flow.step_reauth(&entry_data).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("user"));
    assert_eq!(api.logins(), 0);
}

#[tokio::test]
async fn test_reauth_confirm_form() {
    let (flow, _, _) = flow(FakeApi::new());

    let result = flow.step_reauth_confirm(None).await;

    assert_eq!(result.result_type, FlowResultType::Form);
    assert_eq!(result.step_id.as_deref(), Some("reauth_confirm"));
    assert!(result.data_schema.is_empty());

    let result = flow.step_reauth_confirm(Some(&json!({}))).await;
    assert_eq!(result.step_id.as_deref(), Some("user"));
}

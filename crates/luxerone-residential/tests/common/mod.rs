//! Shared fakes for the luxerOne integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ha_host::{ConfigEntry, EventBus, StateMachine};
use luxerone_api::{
    Carrier, Locker, Location, LuxerOneError, LuxerOneResult, Package, PackageApi, UserInfo,
};
use luxerone_residential::constants::{EMAIL, ID, NAME, PASS, TITLE, USER};
use luxerone_residential::{ClientFactory, EVENT_DOMAIN};
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::{broadcast, Notify};

/// Scripted stand-in for the vendor service
///
/// Results are consumed in order; an empty login queue succeeds and an empty
/// fetch queue returns no packages.
pub struct FakeApi {
    logins: Mutex<VecDeque<LuxerOneResult<()>>>,
    fetches: Mutex<VecDeque<LuxerOneResult<Vec<Package>>>>,
    user: Mutex<LuxerOneResult<UserInfo>>,
    login_gate: Option<Arc<Notify>>,
    pub login_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub logged_in_as: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            logins: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(VecDeque::new()),
            user: Mutex::new(Ok(UserInfo {
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
                email: "jane@example.com".to_string(),
            })),
            login_gate: None,
            login_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            logged_in_as: Mutex::new(Vec::new()),
        }
    }

    /// Block every login until the gate is notified
    pub fn with_login_gate(mut self, gate: Arc<Notify>) -> Self {
        self.login_gate = Some(gate);
        self
    }

    pub fn with_user_error(self, err: LuxerOneError) -> Self {
        *self.user.lock().unwrap() = Err(err);
        self
    }

    pub fn push_login(&self, result: LuxerOneResult<()>) {
        self.logins.lock().unwrap().push_back(result);
    }

    pub fn push_fetch(&self, result: LuxerOneResult<Vec<Package>>) {
        self.fetches.lock().unwrap().push_back(result);
    }

    pub fn push_codes(&self, codes: &[&str]) {
        self.push_fetch(Ok(packages(codes)));
    }

    pub fn logins(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageApi for FakeApi {
    async fn login(&self, username: &str, _password: &SecretString) -> LuxerOneResult<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.logged_in_as
            .lock()
            .unwrap()
            .push(username.to_string());
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }
        self.logins.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn user_info(&self) -> LuxerOneResult<UserInfo> {
        match &*self.user.lock().unwrap() {
            Ok(user) => Ok(user.clone()),
            Err(LuxerOneError::Authentication(m)) => Err(LuxerOneError::Authentication(m.clone())),
            Err(_) => Err(LuxerOneError::NotLoggedIn),
        }
    }

    async fn pending_packages(&self) -> LuxerOneResult<Vec<Package>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Hands out the same fake session every time
pub struct FakeFactory {
    pub api: Arc<FakeApi>,
    pub created: AtomicUsize,
}

impl FakeFactory {
    pub fn new(api: Arc<FakeApi>) -> Self {
        Self {
            api,
            created: AtomicUsize::new(0),
        }
    }
}

impl ClientFactory for FakeFactory {
    fn create(&self) -> LuxerOneResult<Arc<dyn PackageApi>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.api.clone())
    }
}

pub fn package(id: &str, code: &str) -> Package {
    Package {
        id: id.to_string(),
        carrier: Carrier {
            carrier: "UPS".to_string(),
        },
        labels: Vec::new(),
        locker: Locker {
            locker_number: "12".to_string(),
            locker_type: "standard".to_string(),
        },
        location: Location {
            location_address: "1 Main St".to_string(),
        },
        access_code: code.to_string(),
        is_perishable: false,
        charge: None,
        hold_until: None,
        picked_up: false,
    }
}

/// One package per code, ids `p-<code>`
pub fn packages(codes: &[&str]) -> Vec<Package> {
    codes
        .iter()
        .map(|code| package(&format!("p-{code}"), code))
        .collect()
}

pub fn api_error() -> LuxerOneError {
    LuxerOneError::Api {
        status: 500,
        message: "Internal Server Error".to_string(),
    }
}

/// Entry data as the config flow would have stored it
pub fn account_entry(name: &str, username: &str) -> ConfigEntry {
    let data = HashMap::from([
        (TITLE.to_string(), json!(format!("luxerOne for {name}"))),
        (ID.to_string(), json!(luxerone_residential::account_unique_id(username))),
        (NAME.to_string(), json!(name)),
        (EMAIL.to_string(), json!(username)),
        (USER.to_string(), json!(username)),
        (PASS.to_string(), json!("hunter2")),
    ]);
    ConfigEntry::new(luxerone_residential::DOMAIN, format!("luxerOne for {name}")).with_data(data)
}

/// In-process host with a subscription to the integration's events
pub struct TestHost {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateMachine>,
    pub events: broadcast::Receiver<ha_host::Event>,
}

impl TestHost {
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let events = bus.subscribe(EVENT_DOMAIN);
        Self {
            bus,
            states,
            events,
        }
    }

    /// Drain and return the integration events fired so far
    pub fn take_events(&mut self) -> Vec<ha_host::Event> {
        let mut fired = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            fired.push(event);
        }
        fired
    }
}

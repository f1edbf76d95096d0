//! Entry setup and teardown
//!
//! [`LuxerOneIntegration`] owns every account's session and sensor, keyed by
//! config entry id. Setup logs in through the [`ClientFactory`], creates the
//! sensor and runs its first poll before it is considered loaded. Unload
//! waits for an in-flight poll of that account before removing the entity.
//!
//! Entity ids are claimed when the sensor is created and released on unload,
//! so an account whose first poll failed still owns its id.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use ha_host::{ConfigEntry, EntityId, EventSink, StateSink};
use luxerone_api::PackageApi;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::SetupError;
use crate::sensor::{CodeComparison, PackageSensor, PollOutcome, Snapshot};
use crate::session::{ClientFactory, Credential};

/// A set up account
pub struct Account {
    entity_id: EntityId,
    sensor: Mutex<PackageSensor>,
}

impl Account {
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Run one poll cycle; cycles of the same account never overlap
    pub async fn poll(&self) -> PollOutcome {
        self.sensor.lock().await.update().await
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.sensor.lock().await.snapshot().cloned()
    }
}

enum Slot {
    /// Login in flight
    Connecting,
    Ready(Arc<Account>),
}

pub struct LuxerOneIntegration {
    factory: Arc<dyn ClientFactory>,
    states: Arc<dyn StateSink>,
    events: Arc<dyn EventSink>,
    comparison: CodeComparison,
    accounts: DashMap<String, Slot>,
    /// Entity ids owned by loaded or loading accounts
    entity_ids: DashSet<EntityId>,
}

impl LuxerOneIntegration {
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        states: Arc<dyn StateSink>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            factory,
            states,
            events,
            comparison: CodeComparison::default(),
            accounts: DashMap::new(),
            entity_ids: DashSet::new(),
        }
    }

    pub fn with_comparison(mut self, comparison: CodeComparison) -> Self {
        self.comparison = comparison;
        self
    }

    /// Set up a config entry
    ///
    /// Refused credentials yield [`SetupError::AuthFailed`], which should
    /// send the user through re-authentication. An unreachable service
    /// yields [`SetupError::NotReady`].
    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id))]
    pub async fn setup_entry(&self, entry: &ConfigEntry) -> Result<EntityId, SetupError> {
        let credential = Credential::from_entry(entry)?;

        match self.accounts.entry(entry.entry_id.clone()) {
            Entry::Occupied(_) => {
                return Err(SetupError::AlreadyLoaded(entry.entry_id.clone()));
            }
            Entry::Vacant(slot) => {
                slot.insert(Slot::Connecting);
            }
        }

        let api = match self.connect(&credential).await {
            Ok(api) => api,
            Err(err) => {
                self.discard_connecting(&entry.entry_id);
                warn!("Setup failed for entry {}: {}", entry.entry_id, err);
                return Err(err);
            }
        };

        let sensor = match PackageSensor::new(
            entry,
            api,
            credential,
            self.states.clone(),
            self.events.clone(),
            self.comparison,
            |id| self.entity_ids.insert(id.clone()),
        ) {
            Ok(sensor) => sensor,
            Err(err) => {
                self.discard_connecting(&entry.entry_id);
                return Err(err);
            }
        };

        let account = Arc::new(Account {
            entity_id: sensor.entity_id().clone(),
            sensor: Mutex::new(sensor),
        });

        // Unload may have removed the slot while we were logging in
        match self.accounts.get_mut(&entry.entry_id) {
            Some(mut slot) if matches!(*slot, Slot::Connecting) => {
                *slot = Slot::Ready(account.clone());
            }
            _ => {
                info!("Entry {} was unloaded during setup", entry.entry_id);
                self.entity_ids.remove(&account.entity_id);
                return Err(SetupError::Cancelled(entry.entry_id.clone()));
            }
        }

        // Initial update before the entity is considered added
        if let PollOutcome::Failed { .. } = account.poll().await {
            account.sensor.lock().await.publish_unknown();
        }

        info!(
            "Setup completed for entry: {} ({})",
            entry.title, account.entity_id
        );
        Ok(account.entity_id.clone())
    }

    async fn connect(&self, credential: &Credential) -> Result<Arc<dyn PackageApi>, SetupError> {
        let api = self.factory.create().map_err(SetupError::from_client)?;
        credential
            .login(api.as_ref())
            .await
            .map_err(SetupError::from_client)?;
        Ok(api)
    }

    fn discard_connecting(&self, entry_id: &str) {
        self.accounts
            .remove_if(entry_id, |_, slot| matches!(slot, Slot::Connecting));
    }

    /// Unload an entry, returning whether anything was registered
    ///
    /// No network call is made. The session is dropped once the last
    /// in-flight poll releases it.
    #[instrument(skip(self))]
    pub async fn unload_entry(&self, entry_id: &str) -> bool {
        match self.accounts.remove(entry_id) {
            Some((_, Slot::Ready(account))) => {
                let mut sensor = account.sensor.lock().await;
                sensor.mark_removed();
                self.states.remove_state(sensor.entity_id());
                self.entity_ids.remove(sensor.entity_id());
                info!("Unloaded entry: {} ({})", entry_id, account.entity_id);
                true
            }
            Some((_, Slot::Connecting)) => {
                debug!("Unloaded entry {} while setup was in flight", entry_id);
                true
            }
            None => false,
        }
    }

    pub fn account(&self, entry_id: &str) -> Option<Arc<Account>> {
        self.accounts.get(entry_id).and_then(|slot| match &*slot {
            Slot::Ready(account) => Some(account.clone()),
            Slot::Connecting => None,
        })
    }

    pub fn is_loaded(&self, entry_id: &str) -> bool {
        self.account(entry_id).is_some()
    }

    /// Poll one account; `None` if the entry is not loaded
    pub async fn poll(&self, entry_id: &str) -> Option<PollOutcome> {
        let account = self.account(entry_id)?;
        Some(account.poll().await)
    }

    /// Poll every loaded account concurrently
    pub async fn poll_all(&self) -> Vec<(String, PollOutcome)> {
        let accounts: Vec<(String, Arc<Account>)> = self
            .accounts
            .iter()
            .filter_map(|r| match r.value() {
                Slot::Ready(account) => Some((r.key().clone(), account.clone())),
                Slot::Connecting => None,
            })
            .collect();

        join_all(accounts.into_iter().map(|(entry_id, account)| async move {
            let outcome = account.poll().await;
            (entry_id, outcome)
        }))
        .await
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.accounts.iter().map(|r| r.key().clone()).collect()
    }
}

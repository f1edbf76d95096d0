//! Pending package sensor
//!
//! One [`PackageSensor`] exists per account. Each call to
//! [`PackageSensor::update`] is one poll cycle:
//!
//! 1. fetch pending packages, re-authenticating and retrying once if the
//!    session token expired,
//! 2. build a fresh [`Snapshot`],
//! 3. compare its access codes with the previous cycle and fire
//!    `luxerone_residential_event` when they differ,
//! 4. publish the count as state and the snapshot as attributes.
//!
//! A failed cycle is logged and leaves the previously published snapshot in
//! place. Errors never escape `update`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ha_host::{generate_entity_id, Attributes, ConfigEntry, EntityId, EventSink, StateSink};
use luxerone_api::{LuxerOneResult, Package, PackageApi};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, instrument, warn};

use crate::constants::{
    ATTR_FRIENDLY_NAME, ATTR_ICON, ATTR_PACKAGE_CODES, ATTR_UNIT_OF_MEASUREMENT, DOMAIN,
    EVENT_DOMAIN, EVENT_TYPE_NEW_PACKAGE, ICON, ID, METADATA_ATTRIBUTES, NAME, STATE_UNKNOWN,
    UNIT_OF_MEASUREMENT,
};
use crate::error::SetupError;
use crate::session::Credential;

/// How access codes of consecutive polls are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeComparison {
    /// Same codes in the same order; a reorder counts as a change
    #[default]
    Ordered,
    /// Same codes with the same multiplicity, order ignored
    Unordered,
}

impl CodeComparison {
    pub fn changed(self, old: &[String], new: &[String]) -> bool {
        match self {
            CodeComparison::Ordered => old != new,
            CodeComparison::Unordered => {
                let mut old = old.to_vec();
                let mut new = new.to_vec();
                old.sort_unstable();
                new.sort_unstable();
                old != new
            }
        }
    }
}

/// Per-package attributes as exposed on the entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDatum {
    pub carrier: String,
    pub labels: Vec<String>,
    pub locker: String,
    pub locker_type: String,
    pub location: String,
    pub access_code: String,
    pub perishable: bool,
    pub charge: Option<f64>,
    pub hold_until: Option<DateTime<Utc>>,
    pub picked_up: bool,
}

impl From<&Package> for PackageDatum {
    fn from(package: &Package) -> Self {
        Self {
            carrier: package.carrier.carrier.clone(),
            labels: package.labels.clone(),
            locker: package.locker.locker_number.clone(),
            locker_type: package.locker.locker_type.clone(),
            location: package.location.location_address.clone(),
            access_code: package.access_code.clone(),
            perishable: package.is_perishable,
            charge: package.charge,
            hold_until: package.hold_until,
            picked_up: package.picked_up,
        }
    }
}

/// Pending packages as of one successful poll
///
/// Only constructible from the vendor records, so the access code list always
/// matches the package mapping it was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    count: usize,
    packages: BTreeMap<String, PackageDatum>,
    access_codes: Vec<String>,
}

impl Snapshot {
    pub fn from_packages(packages: &[Package]) -> Self {
        let mut data = BTreeMap::new();
        let mut access_codes = Vec::with_capacity(packages.len());

        for package in packages {
            if package.id == ATTR_PACKAGE_CODES {
                warn!("Package id {} collides with the code list and is hidden", package.id);
            }
            access_codes.push(package.access_code.clone());
            if data
                .insert(package.id.clone(), PackageDatum::from(package))
                .is_some()
            {
                warn!(
                    "Duplicate package id {}, only the last record is kept in the attributes",
                    package.id
                );
            }
        }

        Self {
            count: packages.len(),
            packages: data,
            access_codes,
        }
    }

    /// Number of records returned by the service
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn packages(&self) -> &BTreeMap<String, PackageDatum> {
        &self.packages
    }

    /// Access codes in the order the service returned them
    pub fn access_codes(&self) -> &[String] {
        &self.access_codes
    }

    /// Package attributes keyed by package id, plus `package_codes`
    pub fn attributes(&self) -> Attributes {
        let mut attributes: Attributes = self
            .packages
            .iter()
            .map(|(id, datum)| (id.clone(), json!(datum)))
            .collect();
        attributes.insert(ATTR_PACKAGE_CODES.to_string(), json!(self.access_codes));
        attributes
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Updated {
        count: usize,
        codes_changed: bool,
        /// The session was re-authenticated during this cycle
        reauthenticated: bool,
    },
    /// The cycle was aborted; published state is untouched
    Failed { reason: String },
    /// The sensor was removed before the cycle ran
    Removed,
}

pub struct PackageSensor {
    api: Arc<dyn PackageApi>,
    credential: Credential,
    states: Arc<dyn StateSink>,
    events: Arc<dyn EventSink>,
    entity_id: EntityId,
    unique_id: String,
    name: String,
    comparison: CodeComparison,
    last_access_codes: Vec<String>,
    snapshot: Option<Snapshot>,
    removed: bool,
}

impl PackageSensor {
    /// Create the sensor for `entry`
    ///
    /// The entity id is derived from the account name. Ids with published
    /// state are skipped, and `claim` must return `false` for an id another
    /// sensor already owns.
    pub fn new(
        entry: &ConfigEntry,
        api: Arc<dyn PackageApi>,
        credential: Credential,
        states: Arc<dyn StateSink>,
        events: Arc<dyn EventSink>,
        comparison: CodeComparison,
        claim: impl Fn(&EntityId) -> bool,
    ) -> Result<Self, SetupError> {
        let unique_id = entry
            .data_str(ID)
            .ok_or(SetupError::MissingData(ID))?
            .to_string();
        let name = format!(
            "Packages {}",
            entry.data_str(NAME).ok_or(SetupError::MissingData(NAME))?
        );
        let entity_id = generate_entity_id(DOMAIN, &name, |id| states.contains(id) || !claim(id))?;

        debug!("Created new PackageSensor with id {}", unique_id);

        Ok(Self {
            api,
            credential,
            states,
            events,
            entity_id,
            unique_id,
            name,
            comparison,
            last_access_codes: Vec::new(),
            snapshot: None,
            removed: false,
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last successfully published snapshot
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Pending package count, `None` until the first successful poll
    pub fn native_value(&self) -> Option<usize> {
        self.snapshot.as_ref().map(Snapshot::count)
    }

    /// Stop publishing; later cycles become no-ops
    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Run one poll cycle
    #[instrument(skip(self), fields(entity_id = %self.entity_id))]
    pub async fn update(&mut self) -> PollOutcome {
        if self.removed {
            return PollOutcome::Removed;
        }
        debug!("update requested for {}", self.entity_id);

        let (packages, reauthenticated) = match self.fetch_pending_packages().await {
            Ok(fetched) => fetched,
            Err(err) => {
                error!(
                    "Was unable to login to luxerOne for {} because {}",
                    self.entity_id, err
                );
                return PollOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let snapshot = Snapshot::from_packages(&packages);
        let codes_changed = self
            .comparison
            .changed(&self.last_access_codes, snapshot.access_codes());
        let count = snapshot.count();

        self.publish(&snapshot);
        debug!("{} packages detected for {}", count, self.name);

        if codes_changed {
            self.events.fire(
                EVENT_DOMAIN,
                json!({
                    "entity_id": self.entity_id,
                    "device_id": self.entity_id,
                    "type": EVENT_TYPE_NEW_PACKAGE,
                }),
            );
        }
        self.last_access_codes = snapshot.access_codes().to_vec();
        self.snapshot = Some(snapshot);

        PollOutcome::Updated {
            count,
            codes_changed,
            reauthenticated,
        }
    }

    /// Fetch, retrying exactly once after re-authenticating on token expiry
    async fn fetch_pending_packages(&self) -> LuxerOneResult<(Vec<Package>, bool)> {
        match self.api.pending_packages().await {
            Err(err) if err.is_token_expired() => {
                debug!("Token expired for {}, requesting a new one", self.entity_id);
                self.credential.login(self.api.as_ref()).await?;
                let packages = self.api.pending_packages().await?;
                Ok((packages, true))
            }
            other => other.map(|packages| (packages, false)),
        }
    }

    /// Show the entity as `unknown` until a poll succeeds
    pub(crate) fn publish_unknown(&self) {
        if self.removed || self.snapshot.is_some() {
            return;
        }
        let mut attributes = Attributes::new();
        self.add_metadata(&mut attributes);
        self.states
            .write_state(&self.entity_id, STATE_UNKNOWN.to_string(), attributes);
    }

    fn publish(&self, snapshot: &Snapshot) {
        let mut attributes = snapshot.attributes();
        self.add_metadata(&mut attributes);

        self.states
            .write_state(&self.entity_id, snapshot.count().to_string(), attributes);
    }

    fn add_metadata(&self, attributes: &mut Attributes) {
        for key in METADATA_ATTRIBUTES {
            if attributes.contains_key(key) {
                warn!(
                    "Package id {} on {} collides with an entity attribute and is hidden",
                    key, self.entity_id
                );
            }
        }
        attributes.insert(ATTR_FRIENDLY_NAME.to_string(), json!(self.name));
        attributes.insert(ATTR_ICON.to_string(), json!(ICON));
        attributes.insert(
            ATTR_UNIT_OF_MEASUREMENT.to_string(),
            json!(UNIT_OF_MEASUREMENT),
        );
    }
}

//! luxerOne residential integration
//!
//! Polls the luxerOne parcel locker service for pending deliveries and
//! exposes one sensor per account. The sensor's state is the number of
//! pending packages; its attributes carry the per-package details and a flat
//! `package_codes` list. Whenever the access codes change a
//! `luxerone_residential_event` with type `new_package_detected` is fired.
//!
//! # Key Types
//!
//! - [`LuxerOneConfigFlow`] - validates credentials and creates entries
//! - [`LuxerOneIntegration`] - sets up and unloads entries, drives polling
//! - [`PackageSensor`] - one poll cycle with token-expiry retry and change
//!   detection

pub mod config_flow;
pub mod constants;
pub mod error;
pub mod sensor;
pub mod session;
pub mod setup;

pub use config_flow::{account_unique_id, validate_input, AccountInfo, LuxerOneConfigFlow};
pub use constants::{DOMAIN, EVENT_DOMAIN, EVENT_TYPE_NEW_PACKAGE};
pub use error::{SetupError, ValidationError};
pub use sensor::{CodeComparison, PackageDatum, PackageSensor, PollOutcome, Snapshot};
pub use session::{ClientFactory, Credential, HttpClientFactory};
pub use setup::{Account, LuxerOneIntegration};

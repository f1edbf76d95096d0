//! luxerOne resident API client
//!
//! Integrations depend on the [`PackageApi`] trait; [`LuxerOneClient`] is
//! the HTTP implementation talking to the vendor service.
//!
//! # Example
//!
//! ```ignore
//! use luxerone_api::{LuxerOneClient, PackageApi};
//! use secrecy::SecretString;
//!
//! let client = LuxerOneClient::new()?;
//! client.login("me@example.com", &SecretString::from("pw")).await?;
//! for package in client.pending_packages().await? {
//!     println!("{} at locker {}", package.access_code, package.locker.locker_number);
//! }
//! ```

mod client;
mod error;
mod models;

pub use client::{LuxerOneClient, PackageApi, DEFAULT_BASE_URL, TOKEN_TTL_SECS};
pub use error::{LuxerOneError, LuxerOneResult};
pub use models::{Carrier, Locker, Location, Package, UserInfo};

//! Constants for the luxerOne integration

pub const DOMAIN: &str = "luxerone_residential";

/// Event fired when the set of pending access codes changes
pub const EVENT_DOMAIN: &str = "luxerone_residential_event";
pub const EVENT_TYPE_NEW_PACKAGE: &str = "new_package_detected";

/// Config flow schema version
pub const CONFIG_FLOW_VERSION: u32 = 1;

// Keys of the persisted entry data
pub const TITLE: &str = "title";
pub const USER: &str = "username";
pub const PASS: &str = "password";
pub const EMAIL: &str = "email";
pub const NAME: &str = "name";
pub const ID: &str = "unique_id";

// Sensor presentation
pub const ICON: &str = "mdi:package";
pub const UNIT_OF_MEASUREMENT: &str = "packages";
pub const ATTR_PACKAGE_CODES: &str = "package_codes";

// Entity metadata attributes written alongside the package data
pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";
pub const ATTR_ICON: &str = "icon";
pub const ATTR_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
pub const METADATA_ATTRIBUTES: [&str; 3] = [ATTR_FRIENDLY_NAME, ATTR_ICON, ATTR_UNIT_OF_MEASUREMENT];

/// State shown until the first successful poll
pub const STATE_UNKNOWN: &str = "unknown";

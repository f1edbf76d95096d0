//! Entity ids and entity id generation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity ids
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must be '<domain>.<object_id>'")]
    InvalidFormat,

    #[error("invalid domain '{0}'")]
    InvalidDomain(String),

    #[error("invalid object_id '{0}'")]
    InvalidObjectId(String),

    #[error("name '{0}' does not produce a usable object_id")]
    EmptySlug(String),
}

/// A `domain.object_id` pair, e.g. `luxerone_residential.packages_jane_doe`
///
/// Both parts are lowercase ascii alphanumerics and underscores and may not
/// start or end with an underscore. The domain additionally may not contain
/// `__`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if !is_slug(&domain) || domain.contains("__") {
            return Err(EntityIdError::InvalidDomain(domain));
        }
        if !is_slug(&object_id) {
            return Err(EntityIdError::InvalidObjectId(object_id));
        }

        Ok(Self { domain, object_id })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('_')
        && !s.ends_with('_')
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Turn a display name into an object id
///
/// Non-alphanumeric runs collapse into a single underscore and leading or
/// trailing underscores are trimmed: `"Packages Jane O'Doe"` becomes
/// `packages_jane_o_doe`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }

    slug
}

/// Generate a free entity id for `name` within `domain`
///
/// The first candidate is `domain.slug(name)`; if `taken` reports it in use,
/// `_2`, `_3`, ... suffixes are tried until a free id is found.
pub fn generate_entity_id(
    domain: &str,
    name: &str,
    taken: impl Fn(&EntityId) -> bool,
) -> Result<EntityId, EntityIdError> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(EntityIdError::EmptySlug(name.to_string()));
    }

    let first = EntityId::new(domain, slug.clone())?;
    if !taken(&first) {
        return Ok(first);
    }

    let mut n = 2u32;
    loop {
        let candidate = EntityId::new(domain, format!("{slug}_{n}"))?;
        if !taken(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => Self::new(domain, object_id),
            _ => Err(EntityIdError::InvalidFormat),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

//! Composite resource identifiers
//!
//! A server is addressed by a primary token (the instance) and, when the
//! instance came from a spot/preemptible request, a secondary token naming
//! that request. The wire format is `primary#secondary`.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved separator between primary and secondary tokens
pub const SEPARATOR: char = '#';

/// Server identifier: primary resource id plus optional dependent sub-resource id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ResourceId {
    primary: String,
    secondary: Option<String>,
}

impl ResourceId {
    /// Identifier with only a primary token
    pub fn new(primary: impl Into<String>) -> Result<Self> {
        let primary = primary.into();
        validate_token(&primary)?;
        Ok(Self {
            primary,
            secondary: None,
        })
    }

    /// Identifier with primary and secondary tokens
    pub fn composite(primary: impl Into<String>, secondary: impl Into<String>) -> Result<Self> {
        let primary = primary.into();
        let secondary = secondary.into();
        validate_token(&primary)?;
        validate_token(&secondary)?;
        Ok(Self {
            primary,
            secondary: Some(secondary),
        })
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub fn is_composite(&self) -> bool {
        self.secondary.is_some()
    }
}

fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(CloudError::InvalidIdentifier(
            "identifier token must not be empty".to_string(),
        ));
    }
    if token.contains(SEPARATOR) {
        return Err(CloudError::InvalidIdentifier(format!(
            "token '{}' contains reserved separator '{}'",
            token, SEPARATOR
        )));
    }
    Ok(())
}

/// Join a primary and optional secondary token into the wire format
pub fn encode(primary: &str, secondary: Option<&str>) -> String {
    match secondary {
        Some(s) => format!("{}{}{}", primary, SEPARATOR, s),
        None => primary.to_string(),
    }
}

/// Split the wire format into primary and optional secondary tokens
///
/// Never fails: a string without a separator is a primary-only identifier,
/// and an empty secondary (`"i-1#"`) is treated as absent.
pub fn decode(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(SEPARATOR) {
        Some((primary, secondary)) if !secondary.is_empty() => (primary, Some(secondary)),
        Some((primary, _)) => (primary, None),
        None => (raw, None),
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.primary, self.secondary.as_deref()))
    }
}

impl FromStr for ResourceId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        match decode(raw) {
            (primary, Some(secondary)) => Self::composite(primary, secondary),
            (primary, None) => Self::new(primary),
        }
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

impl From<String> for ResourceId {
    // Used by serde; keeps the raw tokens even if they fail validation.
    fn from(raw: String) -> Self {
        let (primary, secondary) = decode(&raw);
        Self {
            primary: primary.to_string(),
            secondary: secondary.map(str::to_string),
        }
    }
}

//! Resource tags
//!
//! Tags carry ownership attribution, the edition name and the dependency
//! graph of a server. Providers exchange them as a comma-joined string of
//! `key=value` or bare `key` tokens; inside the crate they are kept as an
//! ordered map so values are never re-split ad hoc.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Marker placed on every server this tool creates
pub const OWNERSHIP_TAG: &str = "craftfleet";

/// Tag key holding the server edition
pub const EDITION_TAG: &str = "edition";

/// Set of key-only or key/value labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    tags: BTreeMap<String, Option<String>>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every created server starts with
    pub fn owned(edition: &str) -> Self {
        let mut tags = Self::new();
        tags.tags.insert(OWNERSHIP_TAG.to_string(), None);
        tags.tags
            .insert(EDITION_TAG.to_string(), Some(edition.to_string()));
        tags
    }

    /// Insert a key-only tag
    pub fn insert_flag(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        check_token(&key)?;
        self.tags.insert(key, None);
        Ok(())
    }

    /// Insert a key/value tag, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        check_token(&key)?;
        if value.contains(',') {
            return Err(CloudError::InvalidSpec(format!(
                "tag value '{}' must not contain ','",
                value
            )));
        }
        self.tags.insert(key, Some(value));
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags.get(key).and_then(|v| v.as_deref())
    }

    /// Whether this server was created by craftfleet
    pub fn is_owned(&self) -> bool {
        self.contains(OWNERSHIP_TAG)
    }

    pub fn edition(&self) -> Option<&str> {
        self.get(EDITION_TAG)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Tokens in boundary form (`key` or `key=value`), one per tag
    pub fn tokens(&self) -> Vec<String> {
        self.iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{}={}", k, v),
                None => k.to_string(),
            })
            .collect()
    }

    /// Build from individual boundary tokens, as providers that store a tag list return them
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags = Self::new();
        for token in tokens {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((k, v)) => tags.tags.insert(k.to_string(), Some(v.to_string())),
                None => tags.tags.insert(token.to_string(), None),
            };
        }
        tags
    }
}

fn check_token(key: &str) -> Result<()> {
    if key.is_empty() || key.contains(',') || key.contains('=') {
        return Err(CloudError::InvalidSpec(format!("invalid tag key '{}'", key)));
    }
    Ok(())
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens().join(","))
    }
}

impl FromStr for TagSet {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self::from_tokens(s.split(',')))
    }
}

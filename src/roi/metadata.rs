//! Textual metadata bags carried alongside work units and ROI.
//!
//! A bag is an ordered list of unique `key:value` tags. It is serialized as a
//! single string (`key:value;key:value`) because units may cross process
//! boundaries. Tags are write-once: a later stage never overwrites a tag an
//! earlier stage wrote, it adds its own key instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Tag identifying the [`ResultsEntry`](crate::store::ResultsEntry) a unit belongs to.
pub const SOURCE_KEY: &str = "source";
/// Tag written by the pyramid stage.
pub const PYRAMID_KEY: &str = "pyramid";
/// Tag written by the sliding window stage.
pub const WINDOW_KEY: &str = "window";

const TAG_SEPARATOR: char = ';';
const KEY_SEPARATOR: char = ':';

/// Errors raised while tagging a metadata bag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("metadata key '{key}' is already tagged")]
    DuplicateKey { key: String },

    #[error("metadata key '{key}' is empty or contains a reserved character")]
    InvalidKey { key: String },

    #[error("metadata value '{value}' for key '{key}' contains a reserved character")]
    InvalidValue { key: String, value: String },
}

/// An ordered bag of unique `key:value` tags.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    tags: Vec<(String, String)>,
}

impl Metadata {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    /// Parses the textual form of a bag.
    ///
    /// Fragments without a `key:value` shape and repeated keys are skipped
    /// (and logged) rather than failing the whole bag.
    pub fn parse(text: &str) -> Self {
        let mut bag = Self::new();
        for fragment in text.split(TAG_SEPARATOR) {
            let fragment = fragment.trim();
            if fragment.is_empty() {
                continue;
            }
            let Some((key, value)) = fragment.split_once(KEY_SEPARATOR) else {
                warn!(fragment, "Skipping malformed metadata tag");
                continue;
            };
            if let Err(err) = bag.tag(key, value) {
                warn!(fragment, error = %err, "Skipping metadata tag");
            }
        }
        bag
    }

    /// Adds a new tag. Fails if the key is already present.
    pub fn tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), MetadataError> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() || key.contains([TAG_SEPARATOR, KEY_SEPARATOR]) {
            return Err(MetadataError::InvalidKey { key });
        }
        if value.contains([TAG_SEPARATOR, KEY_SEPARATOR]) {
            return Err(MetadataError::InvalidValue { key, value });
        }
        if self.contains(&key) {
            return Err(MetadataError::DuplicateKey { key });
        }
        self.tags.push((key, value));
        Ok(())
    }

    /// Builder-style variant of [`tag`](Self::tag).
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, MetadataError> {
        self.tag(key, value)?;
        Ok(self)
    }

    /// Returns the value tagged under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if `key` has been tagged.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns the `source` tag, if any.
    pub fn source(&self) -> Option<&str> {
        self.get(SOURCE_KEY).filter(|s| !s.is_empty())
    }

    /// Iterates over tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.tags.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", TAG_SEPARATOR)?;
            }
            write!(f, "{}{}{}", key, KEY_SEPARATOR, value)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Metadata({:?})", self.to_string())
    }
}

impl FromStr for Metadata {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

// Serialized as the flat textual form so the wire shape is `metadata: string`.
impl Serialize for Metadata {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Metadata::parse(&text))
    }
}

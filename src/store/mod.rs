//! Per-source accumulation of detection results.
//!
//! The [`ResultStore`] is owned by the consolidation pool and mutated only
//! from its processing loop, so it carries no synchronization of its own.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::roi::Roi;

/// Derives the stable identity of a source path.
///
/// The identity is the Base64 SHA-256 digest of the path with `=`, `&` and
/// `/` replaced by `_`, so it can be used as a file name. Paths that are not
/// valid UTF-8 fall back to a millisecond timestamp in hex, which is not
/// guaranteed to be unique.
pub fn identity_for(path: &Path) -> String {
    match path.to_str() {
        Some(text) => {
            let digest = Sha256::digest(text.as_bytes());
            STANDARD
                .encode(digest)
                .chars()
                .map(|c| match c {
                    '=' | '&' | '/' => '_',
                    other => other,
                })
                .collect()
        }
        None => {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default();
            let fallback = format!("{millis:x}");
            warn!(path = %path.display(), identity = %fallback, "Cannot hash source path, using timestamp identity");
            fallback
        }
    }
}

/// The ROI collected for one source.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsEntry {
    identity: String,
    source_path: PathBuf,
    rois: Vec<Roi>,
}

impl ResultsEntry {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        Self {
            identity: identity_for(&source_path),
            source_path,
            rois: Vec::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// ROI in arrival order.
    pub fn rois(&self) -> &[Roi] {
        &self.rois
    }

    pub fn push(&mut self, roi: Roi) {
        self.rois.push(roi);
    }
}

/// Map from source identity to its [`ResultsEntry`].
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: BTreeMap<String, ResultsEntry>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the entry for a source entering the pipeline and returns its
    /// identity. Registering the same path again starts a fresh entry.
    pub fn register(&mut self, source_path: impl Into<PathBuf>) -> String {
        let entry = ResultsEntry::new(source_path);
        let identity = entry.identity.clone();
        if let Some(previous) = self.entries.insert(identity.clone(), entry) {
            warn!(
                source = %identity,
                dropped = previous.rois.len(),
                "Source registered twice, discarding earlier results"
            );
        } else {
            debug!(source = %identity, "Registered source");
        }
        identity
    }

    /// Appends `roi` to the entry named by its `source` tag.
    ///
    /// Returns false (and logs) when the tag is missing or names no entry.
    pub fn append(&mut self, roi: Roi) -> bool {
        let Some(key) = roi.metadata.source() else {
            warn!(metadata = %roi.metadata, "Dropping ROI without a source tag");
            return false;
        };
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.push(roi);
                true
            }
            None => {
                warn!(source = %key, "Dropping ROI for unknown source");
                false
            }
        }
    }

    /// Removes and returns the entry for `key`.
    pub fn take(&mut self, key: &str) -> Option<ResultsEntry> {
        self.entries.remove(key)
    }

    /// Puts back an entry that was taken but could not be consumed.
    ///
    /// A source registered again in the meantime keeps its newer entry.
    pub fn restore(&mut self, entry: ResultsEntry) {
        match self.entries.entry(entry.identity.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(_) => {
                warn!(
                    source = %entry.identity,
                    dropped = entry.rois.len(),
                    "Source re-registered before its results were restored"
                );
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResultsEntry> {
        self.entries.get(key)
    }

    /// Identities of all entries, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total number of ROI held across all entries.
    pub fn roi_count(&self) -> usize {
        self.entries.values().map(|e| e.rois.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{Metadata, RegionBox, SOURCE_KEY};

    fn roi_for(source: &str) -> Roi {
        Roi::new(
            RegionBox::new(0, 0, 1, 1),
            Metadata::new().with_tag(SOURCE_KEY, source).unwrap(),
        )
    }

    #[test]
    fn test_identity_is_stable_and_filename_safe() {
        let a = identity_for(Path::new("data/scan-01.txt"));
        let b = identity_for(Path::new("data/scan-01.txt"));
        let c = identity_for(Path::new("data/scan-02.txt"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        // 32 bytes of digest encode to 44 characters
        assert_eq!(a.len(), 44);
        assert!(!a.contains(['=', '&', '/']));
        assert!(a.ends_with('_'));
    }

    #[test]
    fn test_append_to_registered_source() {
        let mut store = ResultStore::new();
        let key = store.register("scan.txt");
        assert!(store.append(roi_for(&key)));
        assert!(store.append(roi_for(&key)));
        assert_eq!(store.get(&key).unwrap().rois().len(), 2);
        assert_eq!(store.get(&key).unwrap().source_path(), Path::new("scan.txt"));
    }

    #[test]
    fn test_append_unknown_source_is_dropped() {
        let mut store = ResultStore::new();
        store.register("scan.txt");
        assert!(!store.append(roi_for("nobody")));
        assert!(!store.append(Roi::new(RegionBox::default(), Metadata::new())));
        assert!(store.keys().iter().all(|k| store.get(k).unwrap().rois().is_empty()));
    }

    #[test]
    fn test_take_is_destructive() {
        let mut store = ResultStore::new();
        let key = store.register("scan.txt");
        store.append(roi_for(&key));
        assert_eq!(store.roi_count(), 1);
        let entry = store.take(&key).unwrap();
        assert_eq!(entry.identity(), key);
        assert_eq!(entry.rois().len(), 1);
        assert!(store.take(&key).is_none());
        assert!(store.is_empty());
        assert_eq!(store.roi_count(), 0);
    }

    #[test]
    fn test_reregister_starts_fresh() {
        let mut store = ResultStore::new();
        let key = store.register("scan.txt");
        store.append(roi_for(&key));
        assert_eq!(store.register("scan.txt"), key);
        assert_eq!(store.len(), 1);
        assert!(store.get(&key).unwrap().rois().is_empty());
    }

    #[test]
    fn test_restore_returns_a_taken_entry() {
        let mut store = ResultStore::new();
        let key = store.register("scan.txt");
        store.append(roi_for(&key));
        let entry = store.take(&key).unwrap();
        store.restore(entry);
        assert_eq!(store.get(&key).unwrap().rois().len(), 1);

        // A newer registration wins over the restored entry
        let stale = store.take(&key).unwrap();
        store.register("scan.txt");
        store.restore(stale);
        assert!(store.get(&key).unwrap().rois().is_empty());
    }
}

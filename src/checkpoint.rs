//! Processed-question checkpoint
//!
//! A flat JSON file of question ids that have already been submitted,
//! loaded at startup and persisted after each successful submission so
//! reruns are idempotent. Writes go through a temp file and an atomic
//! rename so a crash never truncates the checkpoint.
//!
//! Durability is at-least-once: a crash after submission but before the
//! write lands means that question is reprocessed on the next run.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The set of question ids already processed in previous runs
#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    ids: HashSet<u64>,
}

impl Checkpoint {
    /// Load the checkpoint from disk. A missing file is an empty
    /// checkpoint, not an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let ids = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
            let list: Vec<u64> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse checkpoint {}", path.display()))?;
            list.into_iter().collect()
        } else {
            HashSet::new()
        };

        debug!("Loaded checkpoint with {} processed questions", ids.len());
        Ok(Self { path, ids })
    }

    /// Whether a question was already processed
    pub fn contains(&self, question_id: u64) -> bool {
        self.ids.contains(&question_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Processed ids in ascending order, for display
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Record a question as processed and persist immediately.
    ///
    /// The set only grows; marking an already-present id is a no-op
    /// with no disk write.
    pub fn mark_processed(&mut self, question_id: u64) -> Result<()> {
        if !self.ids.insert(question_id) {
            return Ok(());
        }
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let serialized = serde_json::to_string(&self.ids())?;

        // Write to a sibling temp file, then atomically replace the target
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write checkpoint {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace checkpoint {}", self.path.display()))?;

        debug!("Persisted checkpoint with {} questions", self.ids.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_questions.json");

        let checkpoint = Checkpoint::load(&path).unwrap();
        assert!(checkpoint.is_empty());
        assert!(!checkpoint.contains(1));
    }

    #[test]
    fn test_mark_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_questions.json");

        let mut checkpoint = Checkpoint::load(&path).unwrap();
        checkpoint.mark_processed(101).unwrap();
        checkpoint.mark_processed(7).unwrap();

        let reloaded = Checkpoint::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(101));
        assert!(reloaded.contains(7));
        assert_eq!(reloaded.ids(), vec![7, 101]);
    }

    #[test]
    fn test_mark_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_questions.json");

        let mut checkpoint = Checkpoint::load(&path).unwrap();
        checkpoint.mark_processed(5).unwrap();
        checkpoint.mark_processed(5).unwrap();
        assert_eq!(checkpoint.len(), 1);
    }

    #[test]
    fn test_reads_original_flat_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_questions.json");
        fs::write(&path, "[3, 1, 2]").unwrap();

        let checkpoint = Checkpoint::load(&path).unwrap();
        assert_eq!(checkpoint.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_questions.json");

        let mut checkpoint = Checkpoint::load(&path).unwrap();
        checkpoint.mark_processed(9).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}

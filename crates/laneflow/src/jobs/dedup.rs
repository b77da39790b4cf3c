// Gate in front of the video lane: one external video resource is processed
// at most once, and never by two jobs at the same time.

use std::collections::{HashMap, HashSet};

use crate::jobs::error_codes::EnqueueError;
use crate::jobs::model::JobId;

#[derive(Debug, Default)]
pub struct DedupGuard {
    /// In-progress claims, keyed by resource, with the job that holds each.
    processing: HashMap<String, JobId>,
    processed: HashSet<String>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, resource_key: &str) -> Result<(), EnqueueError> {
        if self.processing.contains_key(resource_key) {
            return Err(EnqueueError::DuplicateInProgress {
                resource_key: resource_key.to_string(),
            });
        }
        if self.processed.contains(resource_key) {
            return Err(EnqueueError::AlreadyProcessed {
                resource_key: resource_key.to_string(),
            });
        }
        Ok(())
    }

    /// Check and claim in one step. Callers hold the queue lock across this
    /// and the lane insert, so two racing enqueues cannot both pass.
    pub fn admit(&mut self, resource_key: &str, owner: JobId) -> Result<(), EnqueueError> {
        self.check(resource_key)?;
        self.processing.insert(resource_key.to_string(), owner);
        Ok(())
    }

    /// Records the resource as done. A claim held by another job stays put.
    pub fn mark_processed(&mut self, resource_key: &str, owner: JobId) {
        self.release(resource_key, owner);
        self.processed.insert(resource_key.to_string());
    }

    /// Drops the in-progress claim so the producer may submit the resource
    /// again. No-op unless `owner` holds the claim.
    pub fn release(&mut self, resource_key: &str, owner: JobId) -> bool {
        if self.processing.get(resource_key) != Some(&owner) {
            return false;
        }
        self.processing.remove(resource_key);
        true
    }

    pub fn owner(&self, resource_key: &str) -> Option<JobId> {
        self.processing.get(resource_key).copied()
    }

    pub fn clear(&mut self) {
        self.processing.clear();
        self.processed.clear();
    }

    pub fn clear_resource(&mut self, resource_key: &str) -> bool {
        let was_processing = self.processing.remove(resource_key).is_some();
        let was_processed = self.processed.remove(resource_key);
        was_processing || was_processed
    }

    pub fn is_processing(&self, resource_key: &str) -> bool {
        self.processing.contains_key(resource_key)
    }

    pub fn is_processed(&self, resource_key: &str) -> bool {
        self.processed.contains(resource_key)
    }

    pub fn processing_keys(&self) -> Vec<String> {
        sorted(self.processing.keys())
    }

    pub fn processed_keys(&self) -> Vec<String> {
        sorted(self.processed.iter())
    }
}

fn sorted<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.cloned().collect();
    keys.sort();
    keys
}

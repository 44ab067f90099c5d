//! In-memory job store: the authoritative record for every job in a session.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::job::{Job, JobStatus};
use crate::{Error, Result};

/// Holds a session's jobs in creation order. Pure state, no I/O.
///
/// The orchestrator is the only writer; the streaming side reads snapshots.
/// Every mutation goes through [`JobStore::update`], which rejects backward
/// status transitions.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    /// Jobs in creation order; ids index into this.
    jobs: Vec<Job>,
    index: HashMap<String, usize>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job with a fresh id, `pending` status and zero progress.
    pub fn create(
        &self,
        source_path: impl Into<PathBuf>,
        file_name: impl Into<String>,
        language: impl Into<String>,
    ) -> Job {
        let job = Job::new(
            Uuid::new_v4().to_string(),
            source_path.into(),
            file_name.into(),
            language.into(),
        );
        let mut inner = self.inner.write();
        inner.index.insert(job.id.clone(), inner.jobs.len());
        inner.jobs.push(job.clone());
        job
    }

    /// Snapshot of one job.
    pub fn get(&self, id: &str) -> Result<Job> {
        let inner = self.inner.read();
        inner
            .index
            .get(id)
            .map(|&i| inner.jobs[i].clone())
            .ok_or_else(|| Error::not_found("Job", id))
    }

    /// Apply a mutation atomically with respect to concurrent readers.
    ///
    /// The mutator runs against a copy; the result is committed only if the
    /// status did not move backward. Returns the updated snapshot.
    pub fn update(&self, id: &str, mutator: impl FnOnce(&mut Job)) -> Result<Job> {
        let mut inner = self.inner.write();
        let &slot = inner
            .index
            .get(id)
            .ok_or_else(|| Error::not_found("Job", id))?;

        let mut updated = inner.jobs[slot].clone();
        let previous = updated.status;
        mutator(&mut updated);

        if updated.status != previous && !previous.can_transition_to(updated.status) {
            return Err(Error::InvalidStateTransition {
                from: previous.to_string(),
                to: updated.status.to_string(),
            });
        }
        updated.updated_at = Utc::now();

        inner.jobs[slot] = updated.clone();
        Ok(updated)
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.inner.read().jobs.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

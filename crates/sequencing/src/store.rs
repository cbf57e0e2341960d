//! In-memory job store with per-job atomic state transitions.
//!
//! Every mutation is a single compare-and-set on one job, taken under that
//! job's shard lock; the Pending->Sending transition is the sole idempotence
//! guard for dispatch. A durable store keyed by job id can replace this
//! behind the same surface without touching scheduler or dispatcher logic.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use cadence_core::{CadenceError, CadenceResult};

use crate::types::{Job, JobState, StoreStatus};

#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
    insert_seq: AtomicU64,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job. The uniqueness check and the insert happen under the
    /// same shard lock.
    pub fn insert(&self, mut job: Job) -> CadenceResult<Uuid> {
        let id = job.id;
        match self.jobs.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(CadenceError::DuplicateJob(id)),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                job.seq = self.insert_seq.fetch_add(1, Ordering::Relaxed);
                vacant.insert(job);
                Ok(id)
            }
        }
    }

    /// Returns a clone of the job with the given id, if present.
    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|r| r.clone())
    }

    /// All pending jobs whose fire instant is at or before `now`, in
    /// ascending fire-time order with insertion order as the tie-break.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<Job> {
        let mut due: Vec<Job> = self
            .jobs
            .iter()
            .filter(|r| r.state == JobState::Pending && r.fire_at <= now)
            .map(|r| r.value().clone())
            .collect();
        due.sort_by_key(|job| (job.fire_at, job.seq));
        due
    }

    /// Atomic compare-and-set on a job's state. Returns `false` if the job
    /// is missing or its current state is not `from`.
    pub fn transition(&self, id: &Uuid, from: JobState, to: JobState) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut job) if job.state == from => {
                job.state = to;
                true
            }
            _ => false,
        }
    }

    /// Failure bookkeeping for a job reserved by a dispatch: records the
    /// attempt and moves it back to `Pending` while attempts remain, else to
    /// `Failed`. Returns the resulting state, or `None` if the job is not in
    /// `Sending`.
    pub fn retry_or_fail(&self, id: &Uuid, max_attempts: u32) -> Option<JobState> {
        let mut job = self.jobs.get_mut(id)?;
        if job.state != JobState::Sending {
            return None;
        }
        job.attempts += 1;
        job.state = if job.attempts < max_attempts {
            JobState::Pending
        } else {
            JobState::Failed
        };
        Some(job.state)
    }

    /// Aggregate counts. Jobs reserved by an in-flight dispatch count as
    /// pending.
    pub fn status(&self) -> StoreStatus {
        let mut status = StoreStatus {
            total: 0,
            pending: 0,
            sent: 0,
            failed: 0,
        };
        for entry in self.jobs.iter() {
            status.total += 1;
            match entry.state {
                JobState::Pending | JobState::Sending => status.pending += 1,
                JobState::Sent => status.sent += 1,
                JobState::Failed => status.failed += 1,
            }
        }
        status
    }

    /// Delete all sent jobs; pending and failed jobs are untouched.
    /// Returns how many were removed.
    pub fn purge_sent(&self) -> usize {
        let mut removed = 0;
        self.jobs.retain(|_, job| {
            if job.state == JobState::Sent {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

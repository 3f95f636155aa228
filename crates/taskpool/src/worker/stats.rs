//! Pool counters
//!
//! Monotonic counters updated with relaxed atomics. Snapshots are eventually
//! consistent: fields may be observed mid-update relative to each other.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of a pool's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Tasks accepted into the queue
    pub submitted: u64,
    /// Submissions refused (queue full or pool stopped)
    pub rejected: u64,
    /// Tasks that ran to completion
    pub completed: u64,
    /// Tasks whose body panicked
    pub panicked: u64,
    /// Queued tasks dropped by an immediate shutdown
    pub discarded: u64,
    /// Worker threads started over the pool's lifetime
    pub spawned_workers: u64,
    /// Non-core workers retired after the idle timeout
    pub retired_workers: u64,
}

impl PoolStats {
    /// Tasks accepted but not yet finished or discarded
    pub fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.panicked + self.discarded)
    }
}

/// Live counters shared by the pool and its workers
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
    spawned_workers: AtomicU64,
    retired_workers: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn task_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn tasks_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn worker_spawned(&self) {
        self.spawned_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_retired(&self) {
        self.retired_workers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            spawned_workers: self.spawned_workers.load(Ordering::Relaxed),
            retired_workers: self.retired_workers.load(Ordering::Relaxed),
        }
    }
}

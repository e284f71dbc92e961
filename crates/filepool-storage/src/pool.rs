//! Account pool and rotation cursor.
//!
//! The pool is built once at startup from the eligible credential bundles and
//! its entries are immutable afterwards; the rotation cursor is the only
//! mutable state and is guarded by a mutex so concurrent requests cannot
//! corrupt it. Slight unfairness in rotation order under concurrency is
//! acceptable; an out-of-range cursor is not.

use std::sync::{Arc, Mutex};

use crate::traits::StorageBackend;

/// How the orchestrator walks the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Fixed-order fallback across distinct backend kinds. Sweeps always
    /// start at the first entry; the cursor never moves.
    Ordered,
    /// Rotation across interchangeable same-kind accounts. Sweeps start at
    /// the cursor; a success moves the cursor past the winning account.
    RoundRobin,
}

/// One eligible account: display name plus its adapter.
pub struct AccountEntry {
    pub name: String,
    pub backend: Arc<dyn StorageBackend>,
}

/// Ordered set of eligible accounts plus the rotation cursor.
pub struct AccountPool {
    entries: Vec<AccountEntry>,
    topology: Topology,
    cursor: Mutex<usize>,
}

impl AccountPool {
    pub fn new(entries: Vec<AccountEntry>, topology: Topology) -> Self {
        AccountPool {
            entries,
            topology,
            cursor: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AccountEntry] {
        &self.entries
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Index where the next sweep starts.
    pub fn sweep_start(&self) -> usize {
        match self.topology {
            Topology::Ordered => 0,
            Topology::RoundRobin => *self.lock_cursor(),
        }
    }

    /// Record that the account at `winner` succeeded, moving the rotation
    /// cursor to the slot after it. After a fully failed sweep this is never
    /// called, so the cursor keeps the sweep's starting point. (The
    /// alternative policy, advancing by one so retries do not hammer the same
    /// first account, was considered and not taken.)
    pub fn advance_past(&self, winner: usize) {
        if self.topology == Topology::RoundRobin && !self.entries.is_empty() {
            let mut cursor = self.lock_cursor();
            *cursor = (winner + 1) % self.entries.len();
        }
    }

    /// Name of the account the next sweep will try first.
    pub fn next_in_line(&self) -> Option<&str> {
        self.entries
            .get(self.sweep_start())
            .map(|e| e.name.as_str())
    }

    fn lock_cursor(&self) -> std::sync::MutexGuard<'_, usize> {
        // A poisoned cursor lock only means another thread panicked while
        // holding it; the usize inside is still valid.
        self.cursor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

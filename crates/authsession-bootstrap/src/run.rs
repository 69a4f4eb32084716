//! A single bootstrap attempt.

use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use authsession_core::Credential;
use uuid::Uuid;

/// Bootstrap run identifier.
pub type RunId = Uuid;

/// The lookups a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Identity,
    Permissions,
}

impl Lookup {
    /// Number of lookups launched per run.
    pub const COUNT: usize = 2;
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Permissions => f.write_str("permissions"),
        }
    }
}

/// One attempt to populate identity and permissions for a credential.
///
/// The cancellation flag is set at most once. Once set, results arriving for
/// this run must not touch the session; they only count towards settlement.
#[derive(Debug)]
pub struct BootstrapRun {
    id: RunId,
    credential: Credential,
    cancelled: AtomicBool,
    pending: AtomicUsize,
}

impl BootstrapRun {
    pub(crate) fn new(credential: Credential, lookups: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential,
            cancelled: AtomicBool::new(false),
            pending: AtomicUsize::new(lookups),
        }
    }

    #[must_use]
    pub const fn id(&self) -> RunId {
        self.id
    }

    /// The credential this run was started for.
    #[must_use]
    pub const fn credential(&self) -> &Credential {
        &self.credential
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the run cancelled. Returns `true` only for the call that set the flag.
    pub(crate) fn cancel(&self) -> bool {
        self.cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Record one finished lookup. Returns `true` for the last one.
    pub(crate) fn finish_lookup(&self) -> bool {
        let previous = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .unwrap_or(0);
        previous == 1
    }

    /// Whether every lookup has finished.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }
}

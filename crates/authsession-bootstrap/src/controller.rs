//! Bootstrap controller: turns a stored credential into a populated session.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use authsession_core::{
    Credential, FetchError, IdentityFetcher, PermissionsFetcher, SessionState, StagedChange,
};
use authsession_store::SessionStore;
use futures::FutureExt;
use tokio::{runtime::Handle, sync::watch};

use crate::run::{BootstrapRun, Lookup, RunId};

/// Bootstrap error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("Bootstrap already started")]
    AlreadyStarted,
    #[error("Bootstrap requires a Tokio runtime")]
    NoRuntime,
}

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// Bootstrap has not been invoked yet.
    NotStarted,
    /// Logged out: no credential was stored, a lookup failed, or the user
    /// logged out.
    Idle,
    /// A run is in flight.
    Running,
    /// The run finished with the session still authenticated.
    Settled,
}

impl BootstrapPhase {
    /// Consumers should hold off rendering session-dependent content.
    #[must_use]
    pub const fn is_bootstrapping(self) -> bool {
        matches!(self, Self::NotStarted | Self::Running)
    }
}

/// Drives one bootstrap run and owns the mutation gate for the session.
///
/// `live` doubles as the gate: every "check cancelled, then mutate" step of a
/// run, and every `save`/`logout`, happens while holding it, so a stale run can
/// never interleave with a teardown. It is never held across an `.await`, and
/// session observers only run after it is released.
pub struct BootstrapController {
    state: Arc<SessionState>,
    store: SessionStore,
    identity: Arc<dyn IdentityFetcher>,
    permissions: Arc<dyn PermissionsFetcher>,
    live: Mutex<Option<Arc<BootstrapRun>>>,
    started: AtomicBool,
    phase: watch::Sender<BootstrapPhase>,
}

impl BootstrapController {
    /// Create a new controller.
    #[must_use]
    pub fn new(
        state: Arc<SessionState>,
        store: SessionStore,
        identity: Arc<dyn IdentityFetcher>,
        permissions: Arc<dyn PermissionsFetcher>,
    ) -> Arc<Self> {
        let (phase, _) = watch::channel(BootstrapPhase::NotStarted);
        Arc::new(Self {
            state,
            store,
            identity,
            permissions,
            live: Mutex::new(None),
            started: AtomicBool::new(false),
            phase,
        })
    }

    /// Run the startup bootstrap. Only the first call has any effect.
    ///
    /// Returns the id of the launched run, or `None` when no credential was
    /// stored. Lookups run as Tokio tasks; watch [`Self::phase`] or
    /// [`Self::wait_until_settled`] for completion.
    ///
    /// # Errors
    /// Returns error if called twice or outside a Tokio runtime.
    pub fn bootstrap(self: &Arc<Self>) -> Result<Option<RunId>, BootstrapError> {
        let runtime = Handle::try_current().map_err(|_| BootstrapError::NoRuntime)?;
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("Ignoring repeated bootstrap request");
            return Err(BootstrapError::AlreadyStarted);
        }

        let Some(credential) = self.store.get() else {
            tracing::info!("No stored credential, session stays logged out");
            self.logout();
            self.phase.send_replace(BootstrapPhase::Idle);
            return Ok(None);
        };

        let run = Arc::new(BootstrapRun::new(credential.clone(), Lookup::COUNT));
        let seeded = {
            let mut live = self.lock_live();
            if let Some(prior) = live.replace(Arc::clone(&run)) {
                if prior.cancel() {
                    tracing::debug!(run_id = %prior.id(), "Superseded previous bootstrap run");
                }
            }
            self.phase.send_replace(BootstrapPhase::Running);
            // The store is authoritative for the cold-start credential.
            if self.state.credential().as_ref() == Some(&credential) {
                StagedChange::default()
            } else {
                tracing::debug!("Seeding session state from stored credential");
                self.state.stage_credential(Some(credential))
            }
        };
        self.state.publish(seeded);
        tracing::info!(run_id = %run.id(), "Bootstrapping session");

        let guard = LookupGuard::new(self, &run, Lookup::Identity);
        runtime.spawn(async move {
            let identity = Arc::clone(&guard.controller.identity);
            let token = guard.run.credential().token();
            let result = guarded(guard.lookup, identity.fetch_identity(token)).await;
            guard.apply(result, |state, identity| state.stage_identity(Some(identity)));
        });

        let guard = LookupGuard::new(self, &run, Lookup::Permissions);
        runtime.spawn(async move {
            let permissions = Arc::clone(&guard.controller.permissions);
            let result = guarded(guard.lookup, permissions.fetch_permissions()).await;
            guard.apply(result, |state, permissions| {
                state.stage_permissions(Some(permissions))
            });
        });

        Ok(Some(run.id()))
    }

    /// Replace the credential, superseding any live run.
    ///
    /// Identity and permissions are left as they are; nothing is refetched.
    /// A credential whose token is empty or blank is never stored: saving it
    /// ends the session exactly like [`Self::logout`].
    pub fn save(&self, credential: Credential) {
        if !credential.is_usable() {
            tracing::warn!("Refusing to save a credential with an empty token, logging out");
            self.logout();
            return;
        }

        let staged = {
            let mut live = self.lock_live();
            if let Some(run) = live.take() {
                if run.cancel() {
                    tracing::info!(run_id = %run.id(), "Credential replaced, superseding bootstrap run");
                }
            }
            self.store.set(&credential);
            self.state.stage_credential(Some(credential))
        };
        self.state.publish(staged);
    }

    /// End the session. Safe to call repeatedly.
    ///
    /// A settled controller returns to [`BootstrapPhase::Idle`]; a running one
    /// reaches it once the cancelled lookups finish.
    pub fn logout(&self) {
        let staged = {
            let mut live = self.lock_live();
            let staged = self.end_session(&mut live);
            self.phase.send_if_modified(|phase| {
                if *phase == BootstrapPhase::Settled {
                    *phase = BootstrapPhase::Idle;
                    true
                } else {
                    false
                }
            });
            staged
        };
        self.state.publish(staged);
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> BootstrapPhase {
        *self.phase.borrow()
    }

    /// Receiver observing phase transitions.
    #[must_use]
    pub fn phase_receiver(&self) -> watch::Receiver<BootstrapPhase> {
        self.phase.subscribe()
    }

    /// Resolve once bootstrap is no longer running.
    pub async fn wait_until_settled(&self) -> BootstrapPhase {
        let mut rx = self.phase.subscribe();
        // The sender lives as long as `self`, so this cannot fail while borrowed.
        rx.wait_for(|phase| !phase.is_bootstrapping())
            .await
            .map_or_else(|_| self.phase(), |phase| *phase)
    }

    fn lock_live(&self) -> MutexGuard<'_, Option<Arc<BootstrapRun>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the live run and clear state and store. Caller holds the gate
    /// and publishes the returned change after releasing it.
    fn end_session(&self, live: &mut Option<Arc<BootstrapRun>>) -> StagedChange {
        if let Some(run) = live.take() {
            if run.cancel() {
                tracing::debug!(run_id = %run.id(), "Cancelled live bootstrap run");
            }
        }
        self.store.remove();
        self.state.stage_clear()
    }

    fn apply<T>(
        &self,
        run: &BootstrapRun,
        lookup: Lookup,
        result: Result<Option<T>, FetchError>,
        stage: impl FnOnce(&SessionState, T) -> StagedChange,
    ) {
        let staged = {
            let mut live = self.lock_live();
            if run.is_cancelled() {
                tracing::debug!(run_id = %run.id(), %lookup, "Discarding result of cancelled run");
                return;
            }

            match result {
                Ok(Some(payload)) => {
                    let staged = stage(&self.state, payload);
                    if staged.accepted() {
                        tracing::debug!(run_id = %run.id(), %lookup, "Lookup applied");
                    } else {
                        tracing::debug!(run_id = %run.id(), %lookup, "No credential, lookup dropped");
                    }
                    staged
                }
                Ok(None) => {
                    tracing::debug!(run_id = %run.id(), %lookup, "Lookup returned no payload");
                    return;
                }
                Err(e) => {
                    tracing::warn!(run_id = %run.id(), %lookup, "Lookup failed, logging out: {e}");
                    run.cancel();
                    self.end_session(&mut live)
                }
            }
        };
        self.state.publish(staged);
    }

    fn lookup_finished(&self, run: &Arc<BootstrapRun>) {
        if !run.finish_lookup() {
            return;
        }

        let authenticated = {
            let mut live = self.lock_live();
            if live.as_ref().is_some_and(|current| Arc::ptr_eq(current, run)) {
                live.take();
            }
            let authenticated = self.state.snapshot().is_authenticated();
            self.phase.send_replace(if authenticated {
                BootstrapPhase::Settled
            } else {
                BootstrapPhase::Idle
            });
            authenticated
        };
        tracing::info!(
            run_id = %run.id(),
            cancelled = run.is_cancelled(),
            authenticated,
            "Bootstrap settled"
        );
    }
}

/// Signals "lookup finished" when dropped, however the lookup task ends.
struct LookupGuard {
    controller: Arc<BootstrapController>,
    run: Arc<BootstrapRun>,
    lookup: Lookup,
}

impl LookupGuard {
    fn new(controller: &Arc<BootstrapController>, run: &Arc<BootstrapRun>, lookup: Lookup) -> Self {
        Self {
            controller: Arc::clone(controller),
            run: Arc::clone(run),
            lookup,
        }
    }

    fn apply<T>(
        &self,
        result: Result<Option<T>, FetchError>,
        stage: impl FnOnce(&SessionState, T) -> StagedChange,
    ) {
        self.controller.apply(&self.run, self.lookup, result, stage);
    }
}

impl Drop for LookupGuard {
    fn drop(&mut self) {
        self.controller.lookup_finished(&self.run);
    }
}

/// A panicking collaborator counts as a failed lookup.
async fn guarded<T, F>(lookup: Lookup, fut: F) -> Result<Option<T>, FetchError>
where
    F: Future<Output = Result<Option<T>, FetchError>>,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(FetchError::Network(format!("{lookup} lookup panicked"))))
}

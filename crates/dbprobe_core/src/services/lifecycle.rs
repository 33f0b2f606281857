//! Probe lifecycle state machine shared by every backend.
//!
//! Owns the probe's state and the backend handle (pool or driver) so the two
//! always change together. Locks are never held across `.await`.

use std::future::Future;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::error::{ProbeError, ProbeResult};
use crate::models::{Backend, ProbeState};

/// State plus the backend handle it guards.
pub(crate) struct Lifecycle<R> {
    backend: Backend,
    state: RwLock<ProbeState>,
    resource: Mutex<Option<R>>,
}

impl<R: Clone> Lifecycle<R> {
    pub(crate) fn new(backend: Backend) -> Self {
        Self {
            backend,
            state: RwLock::new(ProbeState::Unconnected),
            resource: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ProbeState {
        *self.state.read()
    }

    /// Move to `Connecting`.
    ///
    /// Returns `Ok(false)` when the probe is already connected, so the caller
    /// can treat a repeated `connect()` as a no-op.
    pub(crate) fn begin_connect(&self) -> ProbeResult<bool> {
        let mut state = self.state.write();
        match *state {
            ProbeState::Unconnected => {
                *state = ProbeState::Connecting;
                Ok(true)
            }
            ProbeState::Ready | ProbeState::Degraded => Ok(false),
            ProbeState::Connecting => Err(ProbeError::invalid_state("connect", *state)),
            ProbeState::Closed => Err(ProbeError::closed("connect")),
        }
    }

    /// Store a freshly verified handle and move to `Ready`.
    ///
    /// Hands the resource back if the probe was closed while connecting; the
    /// caller must tear it down.
    pub(crate) fn install(&self, resource: R) -> Result<(), R> {
        // Held across the state change so close() cannot observe Ready without the handle
        let mut slot = self.resource.lock();
        let mut state = self.state.write();
        if *state != ProbeState::Connecting {
            return Err(resource);
        }
        *state = ProbeState::Ready;
        *slot = Some(resource);
        tracing::debug!(backend = %self.backend, "Probe ready");
        Ok(())
    }

    /// Fall back to `Unconnected` after a failed connect.
    pub(crate) fn abort_connect(&self) {
        let mut state = self.state.write();
        if *state == ProbeState::Connecting {
            *state = ProbeState::Unconnected;
        }
    }

    /// Clone the handle for one operation, enforcing the state rules.
    pub(crate) fn acquire(&self, operation: &str) -> ProbeResult<R> {
        let state = self.state();
        if state == ProbeState::Closed {
            return Err(ProbeError::closed(operation));
        }
        if !state.is_usable() {
            return Err(ProbeError::invalid_state(operation, state));
        }
        // A concurrent close() may have emptied the slot after the state check
        self.resource.lock().clone().ok_or_else(|| ProbeError::closed(operation))
    }

    /// Apply a health check outcome: `Ready <-> Degraded`.
    ///
    /// Returns the new state when it changed.
    pub(crate) fn record_health(&self, reachable: bool) -> Option<ProbeState> {
        let mut state = self.state.write();
        let next = match (*state, reachable) {
            (ProbeState::Ready, false) => ProbeState::Degraded,
            (ProbeState::Degraded, true) => ProbeState::Ready,
            _ => return None,
        };
        tracing::info!(backend = %self.backend, from = %*state, to = %next, "Probe state changed");
        *state = next;
        Some(next)
    }

    /// Move to `Closed` and take the handle.
    ///
    /// The first caller gets `true`; later or concurrent callers get `false`
    /// and no handle.
    pub(crate) fn close(&self) -> (bool, Option<R>) {
        {
            let mut state = self.state.write();
            if *state == ProbeState::Closed {
                return (false, None);
            }
            *state = ProbeState::Closed;
        }
        (true, self.resource.lock().take())
    }
}

/// Run `future`, failing with a timeout error once `after` elapses.
///
/// Dropping the future on expiry releases anything it had acquired.
pub(crate) async fn bounded<T, F>(operation: &str, after: Duration, future: F) -> ProbeResult<T>
where
    F: Future<Output = ProbeResult<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::timeout(operation, after)),
    }
}

//! Single-flight coordination of access-token refreshes.
//!
//! When several requests fail with an expired access token at about the
//! same time, only the first one (the leader) performs the refresh. Every
//! other caller is parked on a oneshot channel and receives the leader's
//! outcome when it settles, in the order the callers arrived.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Why an access token could not be renewed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// Nothing to refresh with.
    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// Backend refused the refresh token.
    #[error("refresh token rejected ({status}): {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { status: u16, detail: Option<String> },

    /// The refresh call produced no usable response.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// New credentials could not be persisted.
    #[error("credential storage failed: {0}")]
    Storage(String),

    /// The refreshing task went away before it finished.
    #[error("refresh abandoned before completion")]
    Abandoned,
}

/// Result of one refresh: the new access token or the failure shared by
/// every waiter.
pub type RefreshOutcome = std::result::Result<String, RefreshFailure>;

#[derive(Debug, Default)]
struct CoordinatorState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
    started: u64,
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Owner of the "refresh in flight" flag and the pending-request queue.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    // No update can leave the flag and queue inconsistent, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    /// Number of callers waiting on the running refresh.
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Number of refreshes started since creation.
    pub fn refreshes_started(&self) -> u64 {
        self.lock().started
    }

    fn join(&self) -> Role {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(position = state.waiters.len(), "Joined in-flight token refresh");
            Role::Follower(rx)
        } else {
            state.in_flight = true;
            state.started += 1;
            Role::Leader
        }
    }

    fn settle(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "Token refresh settled"
        );

        for waiter in waiters {
            // A waiter whose request was dropped simply misses the result
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Get a fresh access token, starting a refresh or joining the one
    /// already running.
    ///
    /// `refresh` is only invoked when this caller becomes the leader. All
    /// callers receive the same outcome.
    pub async fn await_refreshed_token<F, Fut>(&self, refresh: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        match self.join() {
            Role::Follower(rx) => rx.await.unwrap_or(Err(RefreshFailure::Abandoned)),
            Role::Leader => {
                let mut guard = LeaderGuard {
                    coordinator: self,
                    settled: false,
                };
                let outcome = refresh().await;
                guard.settle(&outcome);
                outcome
            }
        }
    }
}

/// Releases the waiters if the leader's future is dropped mid-refresh.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: &RefreshOutcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle(&Err(RefreshFailure::Abandoned));
        }
    }
}

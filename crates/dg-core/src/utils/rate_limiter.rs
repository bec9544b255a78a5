use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use dg_config::Config;
use dg_types::{DocGateError, Result, WindowUnit};

/// Failure of a rate-limited call.
#[derive(Error, Debug)]
pub enum ExecuteError<E> {
    /// The protected action ran and failed. The error is passed through untouched.
    #[error("{0}")]
    Action(E),

    #[error("Cancelled while waiting for admission")]
    Cancelled,
}

impl<E> ExecuteError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn into_action(self) -> Option<E> {
        match self {
            Self::Action(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}

impl From<ExecuteError<DocGateError>> for DocGateError {
    fn from(err: ExecuteError<DocGateError>) -> Self {
        match err {
            ExecuteError::Action(e) => e,
            ExecuteError::Cancelled => DocGateError::Cancelled,
        }
    }
}

/// Sliding-window rate limiter for async operations.
///
/// Admits at most `limit` actions per trailing `window`. Callers over the limit
/// are suspended, not rejected, until the oldest admission leaves the window.
/// An action that returns an error is not counted; one abandoned mid-flight is,
/// since its remote effect may already have happened. Wake order among
/// waiters is whoever re-takes the lock first, not arrival order.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    state: Mutex<WindowState>,
    changed: Notify,
}

struct WindowState {
    /// Completion times of successful actions, oldest first.
    admissions: VecDeque<Instant>,
    /// Admitted callers whose action has not finished yet.
    in_flight: usize,
}

impl WindowState {
    /// Drop every admission at least `window` old. The log is sorted, so this
    /// only ever trims a prefix.
    fn purge(&mut self, now: Instant, window: Duration) {
        while let Some(&front) = self.admissions.front() {
            if now.saturating_duration_since(front) >= window {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    fn occupied(&self) -> usize {
        self.admissions.len() + self.in_flight
    }
}

impl RateLimiter {
    pub fn new(window_unit: WindowUnit, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(DocGateError::Config(
                "rate limit must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            limit,
            window: window_unit.duration(),
            state: Mutex::new(WindowState {
                admissions: VecDeque::new(),
                in_flight: 0,
            }),
            changed: Notify::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.window_unit, config.rate_limit)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of free slots right now.
    pub fn available(&self) -> usize {
        let mut state = self.lock_state();
        state.purge(Instant::now(), self.window);
        self.limit.saturating_sub(state.occupied())
    }

    /// Number of recorded admissions still inside the window.
    pub fn in_window(&self) -> usize {
        let mut state = self.lock_state();
        state.purge(Instant::now(), self.window);
        state.admissions.len()
    }

    /// Run `action` once admitted, blocking until the window has room.
    ///
    /// The action runs outside the limiter's lock. A successful action is
    /// recorded at its completion time; a failed one is not counted and its
    /// error is returned as-is. Dropping this future while the action runs
    /// counts the action at the moment of the drop.
    pub async fn execute<F, Fut, T, E>(&self, action: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let reservation = self.reserve().await;
        Self::run(reservation, action).await
    }

    /// Like [`execute`](Self::execute), but gives up waiting for admission
    /// once `cancel` resolves. An action that has already started is not
    /// interrupted.
    pub async fn execute_cancellable<C, F, Fut, T, E>(
        &self,
        cancel: C,
        action: F,
    ) -> std::result::Result<T, ExecuteError<E>>
    where
        C: Future<Output = ()>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let reservation = tokio::select! {
            biased;
            _ = cancel => {
                warn!(limit = self.limit, "Admission wait cancelled");
                return Err(ExecuteError::Cancelled);
            }
            reservation = self.reserve() => reservation,
        };

        Self::run(reservation, action)
            .await
            .map_err(ExecuteError::Action)
    }

    /// Like [`execute`](Self::execute), but fails with
    /// [`ExecuteError::Cancelled`] if admission takes longer than `timeout`.
    pub async fn execute_with_timeout<F, Fut, T, E>(
        &self,
        timeout: Duration,
        action: F,
    ) -> std::result::Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.execute_cancellable(tokio::time::sleep(timeout), action)
            .await
    }

    async fn run<F, Fut, T, E>(
        mut reservation: Reservation<'_>,
        action: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        reservation.started = true;
        match action().await {
            Ok(value) => {
                reservation.record();
                Ok(value)
            }
            Err(e) => {
                debug!("Rate-limited action failed, slot returned");
                reservation.release();
                Err(e)
            }
        }
    }

    /// Wait until a slot is free and claim it.
    async fn reserve(&self) -> Reservation<'_> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);

            let deadline = {
                let mut state = self.lock_state();
                state.purge(Instant::now(), self.window);

                if state.occupied() < self.limit {
                    state.in_flight += 1;
                    return Reservation {
                        limiter: self,
                        started: false,
                        settled: false,
                    };
                }

                // Register before unlocking so a wake-up between here and the
                // await below is not lost.
                notified.as_mut().enable();
                state.admissions.front().map(|&oldest| oldest + self.window)
            };

            match deadline {
                Some(deadline) => {
                    debug!(
                        limit = self.limit,
                        wait_ms = deadline
                            .saturating_duration_since(Instant::now())
                            .as_millis() as u64,
                        "Rate limit reached, waiting for the window to slide"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = &mut notified => {}
                    }
                }
                // Every slot is held by a running action; only its completion frees one.
                None => {
                    debug!(limit = self.limit, "All slots in flight, waiting");
                    notified.await;
                }
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        // The critical sections never panic, so a poisoned lock still holds
        // consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A claimed slot.
///
/// Settled exactly once: recorded on success, released on failure. When
/// dropped unsettled it is released if the action never started and recorded
/// otherwise, because an abandoned call may still have reached the remote side.
struct Reservation<'a> {
    limiter: &'a RateLimiter,
    started: bool,
    settled: bool,
}

impl Reservation<'_> {
    fn record(mut self) {
        self.settle(true);
    }

    fn release(mut self) {
        self.settle(false);
    }

    fn settle(&mut self, count: bool) {
        if self.settled {
            return;
        }
        self.settled = true;
        {
            let mut state = self.limiter.lock_state();
            state.in_flight -= 1;
            if count {
                state.admissions.push_back(Instant::now());
            }
        }
        self.limiter.changed.notify_waiters();
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled && self.started {
            warn!("Rate-limited action abandoned mid-flight, counting it");
        }
        let count = self.started;
        self.settle(count);
    }
}

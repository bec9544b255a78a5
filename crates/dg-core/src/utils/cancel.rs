use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::info;

/// Cancellation flag shared by callers waiting on a [`RateLimiter`](super::RateLimiter).
///
/// Pass [`cancelled`](Self::cancelled) to
/// [`RateLimiter::execute_cancellable`](super::RateLimiter::execute_cancellable)
/// so waiting callers give up once cancellation is requested.
pub struct CancelSignal {
    cancel_tx: broadcast::Sender<()>,
    is_cancelled: AtomicBool,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            cancel_tx: tx,
            is_cancelled: AtomicBool::new(false),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation. Repeated calls are no-ops.
    pub fn cancel(&self) {
        if !self.is_cancelled.swap(true, Ordering::AcqRel) {
            info!("Cancellation requested, waiting callers will be released");
            let _ = self.cancel_tx.send(());
        }
    }

    /// Resolves once cancellation has been requested (immediately if it
    /// already was).
    pub async fn cancelled(&self) {
        // Subscribe before checking the flag so a concurrent cancel() is seen
        // by one or the other.
        let mut rx = self.cancel_tx.subscribe();
        if self.is_cancelled() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Cancel on SIGINT / SIGTERM (Ctrl+C on non-unix platforms).
    pub async fn wait_for_signal(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;
            tokio::select! {
                _ = sigint.recv() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl+C");
        }
        self.cancel();
        Ok(())
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_initially_not_cancelled() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_sets_flag() {
        let signal = CancelSignal::new();
        signal.cancel();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_after_cancel() {
        let signal = CancelSignal::new();
        signal.cancel();
        signal.cancel(); // should not panic
        tokio::time::timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .expect("already cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wakes_pending_waiters() {
        let signal = Arc::new(CancelSignal::new());

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let signal = Arc::clone(&signal);
                tokio::spawn(async move { signal.cancelled().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        signal.cancel();
        for waiter in waiters {
            waiter.await.unwrap();
        }
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Process-wide cancellation signal shared by the server and its helpers.
#[derive(Debug, Default)]
pub struct ShutdownState {
    is_shutting_down: AtomicBool,
    notify: Notify,
}

impl ShutdownState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns true only for the caller that flipped the state.
    pub fn begin(&self) -> bool {
        if self
            .is_shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent begin() is not missed.
        notified.as_mut().enable();
        if self.is_shutting_down() {
            return;
        }
        notified.await;
    }
}

/// Begins shutdown on the first Ctrl-C.
pub fn trigger_on_ctrl_c(state: Arc<ShutdownState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => tracing::info!("interrupt received, shutting down"),
                    Err(err) => tracing::warn!(error = %err, "failed to listen for interrupt, shutting down"),
                }
                state.begin();
            }
            _ = state.wait() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn begin_flips_state_once() {
        let state = ShutdownState::new();
        assert!(!state.is_shutting_down());
        assert!(state.begin());
        assert!(!state.begin());
        assert!(state.is_shutting_down());
    }

    #[tokio::test]
    async fn wait_returns_immediately_after_begin() {
        let state = ShutdownState::new();
        state.begin();
        tokio::time::timeout(Duration::from_secs(1), state.wait())
            .await
            .expect("wait after begin");
    }

    #[tokio::test]
    async fn waiters_wake_on_begin() {
        let state = ShutdownState::new();
        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        state.begin();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .expect("waiter joined");
    }

    #[tokio::test]
    async fn ctrl_c_watcher_exits_when_shutdown_begins_elsewhere() {
        let state = ShutdownState::new();
        let watcher = trigger_on_ctrl_c(Arc::clone(&state));
        state.begin();
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher exited")
            .expect("watcher joined");
    }
}

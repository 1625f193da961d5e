//! Cooperative shutdown flag set by Ctrl-C.
//!
//! Loops check the flag between steps and during their idle waits, so an
//! interrupt never lands in the middle of a queue-file rewrite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tickerflow_core::Sleeper;
use tracing::{info, warn};

/// Granularity of interruptible waits.
const WAIT_SLICE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Trigger this flag on Ctrl-C. The listener runs on its own thread.
    pub fn install_ctrl_c(&self) -> std::io::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let shutdown = self.clone();
        thread::Builder::new()
            .name("ctrl-c".into())
            .spawn(move || {
                runtime.block_on(async {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => info!("interrupt received, stopping after the current step"),
                        Err(e) => warn!(error = %e, "failed to listen for interrupt"),
                    }
                });
                shutdown.trigger();
            })?;
        Ok(())
    }

    /// Sleep for `total` in one-second slices, returning early on shutdown.
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn wait(&self, total: Duration, sleeper: &dyn Sleeper) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.is_triggered() {
                return false;
            }
            let step = remaining.min(WAIT_SLICE);
            sleeper.sleep(step);
            remaining -= step;
        }
        !self.is_triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickerflow_core::RecordingSleeper;

    #[test]
    fn wait_sleeps_in_slices() {
        let sleeper = RecordingSleeper::new();
        assert!(Shutdown::new().wait(Duration::from_millis(2500), &sleeper));
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_millis(500)
            ]
        );
    }

    #[test]
    fn triggered_wait_returns_immediately() {
        let sleeper = RecordingSleeper::new();
        let shutdown = Shutdown::new();
        shutdown.clone().trigger();
        assert!(!shutdown.wait(Duration::from_secs(10), &sleeper));
        assert!(sleeper.recorded().is_empty());
    }
}

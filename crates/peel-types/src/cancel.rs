//! Request-scoped cancellation.
//!
//! Every request owns one signal; all downstream stages observe it at their
//! suspension points. Cancellation is sticky: once set it never clears.

use crate::errors::{PeelError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CancellationSignal {
    aborted: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationSignal {
    /// A signal with no deadline; cancellable only via `cancel()`.
    pub fn unbounded() -> Self {
        Self {
            aborted: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A signal that also fires once `timeout` elapses.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            aborted: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.aborted.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Error-typed check for use with `?` at stage boundaries. Deadline
    /// expiry surfaces as a timeout, an explicit abort as `Aborted`.
    pub fn check(&self) -> Result<()> {
        if self.aborted.load(Ordering::SeqCst) {
            return Err(PeelError::Aborted);
        }
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return Err(PeelError::timeout("request deadline"));
            }
        }
        Ok(())
    }

    /// Time left until the deadline, if one is set. Used to bound per-stage
    /// waits so a stage never outlives the request.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_cancel_is_sticky() {
        let signal = CancellationSignal::unbounded();
        assert!(signal.check().is_ok());
        signal.cancel();
        assert!(signal.is_cancelled());
        assert!(matches!(signal.check(), Err(PeelError::Aborted)));
        // clones observe the same flag
        let clone = signal.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn deadline_expiry_is_a_timeout() {
        let signal = CancellationSignal::with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(signal.is_cancelled());
        assert!(matches!(signal.check(), Err(PeelError::Timeout { .. })));
    }

    #[test]
    fn remaining_shrinks_toward_zero() {
        let signal = CancellationSignal::with_timeout(Duration::from_secs(60));
        let remaining = signal.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(59));
        assert!(CancellationSignal::unbounded().remaining().is_none());
    }
}

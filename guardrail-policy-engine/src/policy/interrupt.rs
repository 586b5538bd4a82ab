// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::policy::error::EvaluationError;

/// Cooperative stop signal for a running evaluation.
///
/// Evaluation is synchronous, so it cannot be aborted from outside. Backends
/// call [`Interrupt::check`] between rules and iterations instead; the flag is
/// shared between clones, so the party that owns the request can cancel a
/// worker that is still running.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Interrupt {
    /// An interrupt that never fires unless cancelled explicitly.
    pub fn none() -> Self {
        Self::default()
    }

    /// An interrupt that fires once `timeout` has elapsed from now.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns an error once the evaluation should stop.
    pub fn check(&self) -> Result<(), EvaluationError> {
        if self.is_cancelled() {
            return Err(EvaluationError::Interrupted);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(EvaluationError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Guard that cancels this interrupt when dropped.
    ///
    /// Hold it in the request future: if the client disconnects the future is
    /// dropped and the blocking worker sees the cancellation at its next check.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

#[derive(Debug)]
pub struct CancelOnDrop(Interrupt);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_fires() {
        let interrupt = Interrupt::none();
        assert!(interrupt.check().is_ok());
        assert!(interrupt.deadline().is_none());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let interrupt = Interrupt::none();
        let worker = interrupt.clone();
        interrupt.cancel();
        assert_eq!(worker.check(), Err(EvaluationError::Interrupted));
    }

    #[test]
    fn test_expired_deadline() {
        let interrupt = Interrupt::with_deadline(Duration::ZERO);
        assert_eq!(interrupt.check(), Err(EvaluationError::DeadlineExceeded));
    }

    #[test]
    fn test_generous_deadline_passes() {
        let interrupt = Interrupt::with_deadline(Duration::from_secs(60));
        assert!(interrupt.check().is_ok());
    }

    #[test]
    fn test_guard_cancels_on_drop() {
        let interrupt = Interrupt::none();
        {
            let _guard = interrupt.cancel_on_drop();
            assert!(!interrupt.is_cancelled());
        }
        assert!(interrupt.is_cancelled());
    }
}

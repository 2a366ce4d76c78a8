//! Reversible side effects recorded during a sandbox session.

use std::cell::RefCell;

use tracing::warn;

use super::error::SandboxError;

pub type Reversal = Box<dyn FnOnce() -> Result<(), SandboxError>>;

/// Two ordered queues of reversals. `flush` runs the immediate ones first,
/// then the deferred ones, each in insertion order.
#[derive(Default)]
pub struct EffectLedger {
    immediate: RefCell<Vec<Reversal>>,
    deferred: RefCell<Vec<Reversal>>,
}

impl EffectLedger {
    pub fn new() -> Self {
        EffectLedger::default()
    }

    pub fn record<F>(&self, reversal: F, deferred: bool)
    where
        F: FnOnce() -> Result<(), SandboxError> + 'static,
    {
        let queue = if deferred {
            &self.deferred
        } else {
            &self.immediate
        };
        queue.borrow_mut().push(Box::new(reversal));
    }

    pub fn len(&self) -> usize {
        self.immediate.borrow().len() + self.deferred.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs every reversal once and empties the ledger. Failures are logged
    /// and returned; they never stop the remaining reversals.
    pub fn flush(&self) -> Vec<SandboxError> {
        let mut failures = vec![];
        // Reversals may record new effects; those land in the next flush.
        let immediate: Vec<Reversal> = self.immediate.borrow_mut().drain(..).collect();
        let deferred: Vec<Reversal> = self.deferred.borrow_mut().drain(..).collect();
        for reversal in immediate.into_iter().chain(deferred) {
            if let Err(e) = reversal() {
                warn!(error = %e, "effect reversal failed");
                failures.push(e);
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_flush_survives_failures_and_runs_deferred_last() {
        let ledger = EffectLedger::new();
        let log = Rc::new(RefCell::new(vec![]));
        let l = log.clone();
        ledger.record(move || Ok(l.borrow_mut().push("deferred")), true);
        let l = log.clone();
        ledger.record(move || Ok(l.borrow_mut().push("first")), false);
        let l = log.clone();
        ledger.record(
            move || {
                l.borrow_mut().push("second");
                Err(SandboxError::Effect("boom".to_string()))
            },
            false,
        );
        let l = log.clone();
        ledger.record(move || Ok(l.borrow_mut().push("third")), false);
        assert_eq!(ledger.len(), 4);

        let failures = ledger.flush();
        assert_eq!(failures.len(), 1);
        assert_eq!(*log.borrow(), vec!["first", "second", "third", "deferred"]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_flush_consumes_entries_once() {
        let ledger = EffectLedger::new();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        ledger.record(move || Ok(*c.borrow_mut() += 1), false);
        ledger.flush();
        ledger.flush();
        assert_eq!(*count.borrow(), 1);
    }
}

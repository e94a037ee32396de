//! Live-object accounting for host backend resources.

use std::cell::Cell;
use std::rc::Rc;
use tracing::trace;

/// Counts every host "device object" created and released.
///
/// Each context, queue, buffer, program and kernel holds a [`LedgerGuard`];
/// dropping it records the release. A fully torn-down run has `live() == 0`.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    created: Cell<usize>,
    released: Cell<usize>,
}

impl ResourceLedger {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.created.get()
    }

    pub fn released(&self) -> usize {
        self.released.get()
    }

    /// Objects created but not yet released.
    pub fn live(&self) -> usize {
        self.created.get() - self.released.get()
    }

    pub(crate) fn acquire(self: &Rc<Self>, kind: &'static str) -> LedgerGuard {
        self.created.set(self.created.get() + 1);
        trace!(kind, live = self.live(), "host object created");
        LedgerGuard { ledger: Rc::clone(self), kind }
    }
}

/// Release token for one host object.
#[derive(Debug)]
pub(crate) struct LedgerGuard {
    ledger: Rc<ResourceLedger>,
    kind: &'static str,
}

impl Drop for LedgerGuard {
    fn drop(&mut self) {
        let ledger = &self.ledger;
        ledger.released.set(ledger.released.get() + 1);
        trace!(kind = self.kind, live = ledger.live(), "host object released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_drop_releases() {
        let ledger = ResourceLedger::new();
        let g1 = ledger.acquire("buffer");
        let g2 = ledger.acquire("kernel");
        assert_eq!(ledger.live(), 2);
        drop(g1);
        assert_eq!(ledger.live(), 1);
        drop(g2);
        assert_eq!(ledger.live(), 0);
        assert_eq!(ledger.created(), 2);
        assert_eq!(ledger.released(), 2);
    }
}

//! Refresh sequencing
//!
//! Every refresh takes a ticket before it goes to the network. When the
//! response arrives it is applied only if its ticket is still the newest,
//! so a slow response can never overwrite state from a later refresh or a
//! live push.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RefreshSequencer {
    latest: AtomicU64,
}

/// Proof that a refresh started at a given point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

impl RefreshSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a refresh; any ticket handed out earlier becomes stale
    pub fn begin(&self) -> RefreshTicket {
        RefreshTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether no refresh (or push) has started since `ticket` was issued
    pub fn is_current(&self, ticket: RefreshTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Make every outstanding ticket stale (live push, sign-out)
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_newest_ticket_is_current() {
        let seq = RefreshSequencer::new();
        let first = seq.begin();
        assert!(seq.is_current(first));

        let second = seq.begin();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));

        seq.invalidate();
        assert!(!seq.is_current(second));
    }
}

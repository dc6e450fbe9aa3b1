use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by a registry's slots and listeners
#[derive(Debug, Default)]
pub(crate) struct RegistryCounters {
    published: AtomicU64,
    discarded: AtomicU64,
    cleared: AtomicU64,
    engine_ended: AtomicU64,
}

impl RegistryCounters {
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_cleared(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_engine_ended(&self) {
        self.engine_ended.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> RegistryStats {
        RegistryStats {
            published: self.published.load(Ordering::SeqCst),
            discarded: self.discarded.load(Ordering::SeqCst),
            cleared: self.cleared.load(Ordering::SeqCst),
            engine_ended: self.engine_ended.load(Ordering::SeqCst),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Contexts written into the instantiated slot
    pub published: u64,
    /// Candidates that lost a publication race and were dropped
    pub discarded: u64,
    /// Clear calls that actually removed a context
    pub cleared: u64,
    /// Engine-ended events handled by this registry's listeners
    pub engine_ended: u64,
}

impl fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Registry Stats: {} published, {} discarded, {} cleared, {} engine-ended events",
            self.published, self.discarded, self.cleared, self.engine_ended
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = RegistryCounters::default();
        counters.record_published();
        counters.record_published();
        counters.record_discarded();
        counters.record_engine_ended();

        let stats = counters.snapshot();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.cleared, 0);
        assert_eq!(stats.engine_ended, 1);
        assert!(stats.to_string().contains("2 published"));
    }
}

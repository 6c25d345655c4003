use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared progress sink for a harvest.
///
/// Every method may be called concurrently from any worker.
pub trait Accumulator: Send + Sync {
    /// Adds to the number of bytes the run expects to handle.
    fn record_expected(&self, bytes: u64);

    /// Adds bytes actually transferred.
    fn record_bytes(&self, bytes: u64);

    /// Counts bytes that were already present locally and not transferred.
    fn record_present(&self, bytes: u64);

    /// Marks that something new was written during this run.
    fn record_new_work(&self);

    fn read_new_work(&self) -> bool;
}

/// Atomic counters behind [`Accumulator`].
#[derive(Debug, Default)]
pub struct Tally {
    expected: AtomicU64,
    transferred: AtomicU64,
    present: AtomicU64,
    new_work: AtomicBool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallySnapshot {
    pub expected: u64,
    pub transferred: u64,
    pub present: u64,
    pub new_work: bool,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            expected: self.expected.load(Ordering::Relaxed),
            transferred: self.transferred.load(Ordering::Relaxed),
            present: self.present.load(Ordering::Relaxed),
            new_work: self.new_work.load(Ordering::Relaxed),
        }
    }
}

impl Accumulator for Tally {
    fn record_expected(&self, bytes: u64) {
        self.expected.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_bytes(&self, bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_present(&self, bytes: u64) {
        self.present.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_new_work(&self) {
        self.new_work.store(true, Ordering::Relaxed);
    }

    fn read_new_work(&self) -> bool {
        self.new_work.load(Ordering::Relaxed)
    }
}

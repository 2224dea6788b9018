//! Process-monotonic millisecond clock

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Millisecond clock whose reads never decrease
///
/// Wall clocks can step backwards (NTP); ledger timestamps must be
/// non-decreasing within a process, so reads are clamped to the highest
/// value handed out so far.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_ms: AtomicU64,
}

impl MonotonicClock {
    /// Fresh clock
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch milliseconds, clamped to be non-decreasing
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        let wall = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let prev = self.last_ms.fetch_max(wall, Ordering::SeqCst);
        wall.max(prev)
    }
}

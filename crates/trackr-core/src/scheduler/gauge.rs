//! Count of sessions currently in `Fetching`, with the high-water mark.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct FetchingGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl FetchingGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions fetching right now.
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Most sessions ever fetching at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Mark one session as fetching until the guard drops.
    pub fn enter(&self) -> FetchingGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        FetchingGuard { gauge: self }
    }
}

/// Leaves `Fetching` when dropped.
pub struct FetchingGuard<'a> {
    gauge: &'a FetchingGauge,
}

impl Drop for FetchingGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_current_and_peak() {
        let gauge = FetchingGauge::new();
        {
            let _a = gauge.enter();
            let _b = gauge.enter();
            assert_eq!(gauge.current(), 2);
        }
        let _c = gauge.enter();
        assert_eq!(gauge.current(), 1);
        assert_eq!(gauge.peak(), 2);
    }
}

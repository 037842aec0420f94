//! Tracked allocation statistics.
//!
//! Subsystems that share an allocation context account their bytes through an
//! [`AllocStats`], which keeps a running total and a high-water mark. Both
//! counters may be touched concurrently from multiple subsystems, so updates
//! are lock-free.

use std::sync::atomic::{AtomicI64, Ordering};

/// Running total and peak of bytes attributed to one allocation context.
#[derive(Debug, Default)]
pub struct AllocStats {
    total: AtomicI64,
    peak: AtomicI64,
}

/// Point-in-time copy of an [`AllocStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: i64,
    pub peak: i64,
}

impl AllocStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute `bytes` to this context, raising the peak if the new total
    /// exceeds it.
    pub fn add(&self, bytes: usize) {
        let total = self.total.fetch_add(bytes as i64, Ordering::Relaxed) + bytes as i64;

        let mut peak = self.peak.load(Ordering::Relaxed);
        while total > peak {
            match self.peak.compare_exchange_weak(
                peak,
                total,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
    }

    /// Release `bytes` from this context. The peak is unaffected.
    pub fn sub(&self, bytes: usize) {
        self.total.fetch_sub(bytes as i64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            peak: self.peak.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_total_and_peak() {
        let stats = AllocStats::new();
        stats.add(100);
        stats.add(50);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                total: 150,
                peak: 150
            }
        );

        stats.sub(120);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                total: 30,
                peak: 150
            }
        );

        // Peak only moves when the total passes it again.
        stats.add(60);
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                total: 90,
                peak: 150
            }
        );
    }

    #[test]
    fn test_concurrent_peak_is_monotonic() {
        let stats = Arc::new(AllocStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.add(16);
                        stats.sub(16);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total, 0);
        assert!(snapshot.peak >= 16);
    }
}

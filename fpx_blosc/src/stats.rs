use std::sync::atomic::{AtomicU64, Ordering};

/// Stage counters, updated without taking the stage lock.
#[derive(Debug, Default)]
pub struct StageStats {
    frames_processed: AtomicU64,
    codec_failures: AtomicU64,
    zero_size_outputs: AtomicU64,
    type_size_fallbacks: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    acquisitions_committed: AtomicU64,
}

/// Point-in-time copy of [`StageStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    pub codec_failures: u64,
    pub zero_size_outputs: u64,
    pub type_size_fallbacks: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub acquisitions_committed: u64,
}

impl StatsSnapshot {
    /// Uncompressed over compressed bytes; 0.0 before any output.
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_out == 0 {
            0.0
        } else {
            self.bytes_in as f64 / self.bytes_out as f64
        }
    }
}

impl StageStats {
    pub(crate) fn record_frame(&self, bytes_in: usize, bytes_out: usize) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(bytes_in as u64, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes_out as u64, Ordering::Relaxed);
        if bytes_out == 0 {
            self.zero_size_outputs.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_codec_failure(&self) {
        self.codec_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_type_size_fallback(&self) {
        self.type_size_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.acquisitions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            codec_failures: self.codec_failures.load(Ordering::Relaxed),
            zero_size_outputs: self.zero_size_outputs.load(Ordering::Relaxed),
            type_size_fallbacks: self.type_size_fallbacks.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            acquisitions_committed: self.acquisitions_committed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_output_is_counted_separately() {
        let stats = StageStats::default();
        stats.record_frame(1000, 250);
        stats.record_frame(1000, 0);
        let snap = stats.snapshot();
        assert_eq!(snap.frames_processed, 2);
        assert_eq!(snap.zero_size_outputs, 1);
        assert_eq!(snap.bytes_in, 2000);
        assert_eq!(snap.bytes_out, 250);
        assert!((snap.compression_ratio() - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ratio_without_output_is_zero() {
        assert_eq!(StatsSnapshot::default().compression_ratio(), 0.0);
    }
}

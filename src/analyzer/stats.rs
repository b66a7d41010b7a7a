//! クライアント統計
//!
//! クライアントごとに保持するカウンタ。ワーカー間で共有されるのでアトミックに更新する。

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ClientStatistics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    retry_attempts: AtomicU64,
    fallback_used: AtomicU64,
}

/// ある時点の統計値
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retry_attempts: u64,
    pub fallback_used: u64,
    pub success_rate_percent: f64,
}

impl ClientStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallback_used.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);

        // 小数第2位で丸める
        let success_rate_percent = if total == 0 {
            0.0
        } else {
            (successful as f64 / total as f64 * 10000.0).round() / 100.0
        };

        StatisticsSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            fallback_used: self.fallback_used.load(Ordering::Relaxed),
            success_rate_percent,
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.retry_attempts.store(0, Ordering::Relaxed);
        self.fallback_used.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_success_rate_is_zero() {
        let stats = ClientStatistics::new();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.success_rate_percent, 0.0);
    }

    #[test]
    fn test_success_rate_rounding() {
        let stats = ClientStatistics::new();
        for _ in 0..3 {
            stats.record_request();
        }
        stats.record_success();
        stats.record_failure();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.success_rate_percent, 33.33);
        assert_eq!(snapshot.failed_requests, 2);
    }

    #[test]
    fn test_reset() {
        let stats = ClientStatistics::new();
        stats.record_request();
        stats.record_success();
        stats.record_retry();
        stats.record_fallback();
        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.retry_attempts, 0);
        assert_eq!(snapshot.fallback_used, 0);
    }
}

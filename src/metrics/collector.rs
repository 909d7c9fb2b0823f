use crate::utils::time::current_timestamp;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct AuthMetrics {
    pub logins_succeeded: AtomicU64,
    pub logins_failed: AtomicU64,
    pub registrations: AtomicU64,
    pub logouts: AtomicU64,
    pub password_changes: AtomicU64,
    pub start_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthMetricsSnapshot {
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub login_success_rate: f64,
    pub registrations: u64,
    pub logouts: u64,
    pub password_changes: u64,
    pub uptime_seconds: i64,
}

impl AuthMetrics {
    pub fn new() -> Self {
        Self {
            logins_succeeded: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            logouts: AtomicU64::new(0),
            password_changes: AtomicU64::new(0),
            start_time: current_timestamp(),
        }
    }

    pub fn record_login(&self, succeeded: bool) {
        if succeeded {
            self.logins_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.logins_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_logouts(&self) {
        self.logouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_password_changes(&self) {
        self.password_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AuthMetricsSnapshot {
        let logins_succeeded = self.logins_succeeded.load(Ordering::Relaxed);
        let logins_failed = self.logins_failed.load(Ordering::Relaxed);
        let attempts = logins_succeeded + logins_failed;

        let login_success_rate = if attempts > 0 {
            (logins_succeeded as f64 / attempts as f64) * 100.0
        } else {
            0.0
        };

        AuthMetricsSnapshot {
            logins_succeeded,
            logins_failed,
            login_success_rate,
            registrations: self.registrations.load(Ordering::Relaxed),
            logouts: self.logouts.load(Ordering::Relaxed),
            password_changes: self.password_changes.load(Ordering::Relaxed),
            uptime_seconds: current_timestamp() - self.start_time,
        }
    }
}

impl Default for AuthMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics() {
        let metrics = AuthMetrics::new();

        assert_eq!(metrics.logins_succeeded.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.logins_failed.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.registrations.load(Ordering::Relaxed), 0);
        assert!(metrics.start_time > 0);
    }

    #[test]
    fn test_record_login() {
        let metrics = AuthMetrics::new();

        metrics.record_login(true);
        metrics.record_login(false);
        metrics.record_login(false);

        assert_eq!(metrics.logins_succeeded.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.logins_failed.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_snapshot_empty() {
        let snapshot = AuthMetrics::new().snapshot();

        assert_eq!(snapshot.logins_succeeded, 0);
        assert_eq!(snapshot.login_success_rate, 0.0);
        assert_eq!(snapshot.logouts, 0);
        assert!(snapshot.uptime_seconds >= 0);
    }

    #[test]
    fn test_success_rate_calculation() {
        let metrics = AuthMetrics::new();

        // 8 successful out of 10 attempts = 80%
        for _ in 0..8 {
            metrics.record_login(true);
        }
        for _ in 0..2 {
            metrics.record_login(false);
        }
        metrics.increment_registrations();
        metrics.increment_logouts();
        metrics.increment_password_changes();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.login_success_rate, 80.0);
        assert_eq!(snapshot.registrations, 1);
        assert_eq!(snapshot.logouts, 1);
        assert_eq!(snapshot.password_changes, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(AuthMetrics::new().snapshot()).unwrap();
        assert_eq!(json["logins_failed"], 0);
        assert!(json.get("uptime_seconds").is_some());
    }
}

//! Per-client request metrics.
//!
//! Counters are monotone and owned by exactly one [`SourceClient`]; the lock
//! here guards only this field group, never the client's control flow, so a
//! fetch that ultimately fails still leaves its partial counts observable.
//!
//! [`SourceClient`]: super::SourceClient

use chrono::{DateTime, Utc};
use std::sync::RwLock;

#[derive(Debug, Default, Clone)]
struct Counters {
    total_requests: u64,
    successful_requests: u64,
    blocked_requests: u64,
    timed_out_requests: u64,
    retried_requests: u64,
    last_request_at: Option<DateTime<Utc>>,
    last_blocked_at: Option<DateTime<Utc>>,
}

/// Point-in-time copy of a client's counters.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub blocked_requests: u64,
    pub timed_out_requests: u64,
    pub retried_requests: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    pub last_blocked_at: Option<DateTime<Utc>>,
}

/// Request counters for one client, guarded by their own lock.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    // Lock-to-field mapping: this RwLock guards every field of Counters and
    // nothing else.
    inner: RwLock<Counters>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut Counters)) {
        // Poisoning only happens if a panic occurred mid-update; counters
        // stay usable either way.
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut inner);
    }

    /// An attempt is leaving for the wire.
    pub fn record_request(&self) {
        self.update(|c| {
            c.total_requests += 1;
            c.last_request_at = Some(Utc::now());
        });
    }

    pub fn record_success(&self) {
        self.update(|c| c.successful_requests += 1);
    }

    pub fn record_blocked(&self) {
        self.update(|c| {
            c.blocked_requests += 1;
            c.last_blocked_at = Some(Utc::now());
        });
    }

    pub fn record_timeout(&self) {
        self.update(|c| c.timed_out_requests += 1);
    }

    pub fn record_retry(&self) {
        self.update(|c| c.retried_requests += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.inner.read().unwrap_or_else(|e| e.into_inner()).clone();
        MetricsSnapshot {
            total_requests: c.total_requests,
            successful_requests: c.successful_requests,
            blocked_requests: c.blocked_requests,
            timed_out_requests: c.timed_out_requests,
            retried_requests: c.retried_requests,
            last_request_at: c.last_request_at,
            last_blocked_at: c.last_blocked_at,
        }
    }
}

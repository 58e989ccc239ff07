//! Endpoint health tracking and selection.
//!
//! Selection is priority based, not round-robin: the primary (priority 0)
//! is used whenever it is selectable, otherwise the most preferred
//! selectable endpoint in configured list order.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::HealthConfig;
use crate::errors::GatewayError;
use crate::types::{Endpoint, EndpointHealth, EndpointStats};

/// Owns the health entry of every configured endpoint.
///
/// Entries are never removed. All mutations happen under one mutex so
/// concurrent failure and success reports are never lost.
pub struct EndpointManager {
    entries: Mutex<Vec<EndpointHealth>>,
    config: HealthConfig,
}

impl EndpointManager {
    /// Create a manager for `endpoints`. Later duplicates of a URL are ignored.
    pub fn new(endpoints: Vec<Endpoint>, config: HealthConfig) -> Self {
        let mut entries: Vec<EndpointHealth> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if entries.iter().any(|e| e.endpoint.url == endpoint.url) {
                continue;
            }
            entries.push(EndpointHealth::new(endpoint));
        }
        Self {
            entries: Mutex::new(entries),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EndpointHealth>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The endpoint the next call should use, or `None` when every endpoint
    /// is unhealthy or cooling down.
    pub fn next_endpoint(&self) -> Option<Endpoint> {
        self.next_endpoint_at(Instant::now())
    }

    pub fn next_endpoint_at(&self, now: Instant) -> Option<Endpoint> {
        let mut entries = self.lock();
        self.restore_expired(&mut entries, now);

        // Priority 0 is the minimum, so the primary wins whenever selectable.
        entries
            .iter()
            .filter(|e| e.is_selectable_at(now))
            .reduce(|best, candidate| {
                if candidate.endpoint.priority < best.endpoint.priority {
                    candidate
                } else {
                    best
                }
            })
            .map(|e| e.endpoint.clone())
    }

    /// Put endpoints whose cooldown has elapsed back into selection.
    ///
    /// A restored endpoint keeps its failure count, so a single further
    /// failure at the threshold disables it again.
    fn restore_expired(&self, entries: &mut [EndpointHealth], now: Instant) {
        for entry in entries.iter_mut() {
            if let Some(until) = entry.disabled_until {
                if now >= until {
                    entry.disabled_until = None;
                    entry.is_healthy = true;
                    tracing::info!(
                        endpoint = %entry.endpoint.url,
                        failures = entry.failure_count,
                        "Endpoint cooldown elapsed, back in rotation"
                    );
                }
                continue;
            }

            if !entry.is_healthy {
                let recovered = entry
                    .last_failure
                    .map_or(true, |at| now.saturating_duration_since(at) >= self.config.cooldown);
                if recovered {
                    entry.is_healthy = true;
                    tracing::debug!(endpoint = %entry.endpoint.url, "Endpoint back on probation");
                }
            }
        }
    }

    /// Record a failed call against `url`.
    pub fn mark_failure(&self, url: &str, error: &GatewayError) {
        self.mark_failure_at(url, error, Instant::now());
    }

    pub fn mark_failure_at(&self, url: &str, error: &GatewayError, now: Instant) {
        let mut entries = self.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.endpoint.url == url) else {
            tracing::debug!(endpoint = %url, "Failure reported for unknown endpoint");
            return;
        };

        entry.failure_count = entry.failure_count.saturating_add(1);
        entry.last_failure = Some(now);
        entry.is_healthy = false;

        tracing::warn!(
            endpoint = %url,
            failures = entry.failure_count,
            error = %error,
            "Endpoint call failed"
        );

        if entry.failure_count >= self.config.max_failures {
            entry.disabled_until = Some(now + self.config.cooldown);
            tracing::info!(
                endpoint = %url,
                failures = entry.failure_count,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "Endpoint disabled"
            );
        }
    }

    /// Record a successful call against `url`.
    pub fn mark_success(&self, url: &str) {
        self.mark_success_at(url, Instant::now());
    }

    pub fn mark_success_at(&self, url: &str, now: Instant) {
        let mut entries = self.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.endpoint.url == url) {
            entry.last_success = Some(now);
            entry.failure_count = 0;
            entry.is_healthy = true;
            entry.disabled_until = None;
        }
    }

    /// Whether any endpoint is selectable right now.
    pub fn has_healthy_endpoints(&self) -> bool {
        let now = Instant::now();
        let mut entries = self.lock();
        self.restore_expired(&mut entries, now);
        entries.iter().any(|e| e.is_selectable_at(now))
    }

    /// Snapshot of every health entry in configured list order.
    pub fn health_status(&self) -> Vec<EndpointHealth> {
        self.health_status_at(Instant::now())
    }

    pub fn health_status_at(&self, now: Instant) -> Vec<EndpointHealth> {
        let mut entries = self.lock();
        self.restore_expired(&mut entries, now);
        entries.clone()
    }

    pub fn stats(&self) -> EndpointStats {
        self.stats_at(Instant::now())
    }

    pub fn stats_at(&self, now: Instant) -> EndpointStats {
        let mut entries = self.lock();
        self.restore_expired(&mut entries, now);
        let healthy = entries.iter().filter(|e| e.is_healthy).count();
        EndpointStats {
            total: entries.len(),
            healthy,
            unhealthy: entries.len() - healthy,
            disabled: entries.iter().filter(|e| e.is_disabled_at(now)).count(),
        }
    }

    /// Clear failure state of every endpoint.
    pub fn reset_all(&self) {
        let mut entries = self.lock();
        for entry in entries.iter_mut() {
            entry.is_healthy = true;
            entry.failure_count = 0;
            entry.last_failure = None;
            entry.disabled_until = None;
        }
        tracing::info!(endpoints = entries.len(), "Endpoint health reset");
    }

    /// Configured endpoints in configured list order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.lock().iter().map(|e| e.endpoint.clone()).collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().iter().any(|e| e.endpoint.url == url)
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }
}

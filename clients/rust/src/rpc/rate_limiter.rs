//! Token bucket rate limiter for RPC requests.
//!
//! Read and write traffic get independent buckets. Each bucket combines
//! three limits applied at admission time:
//! - a reservoir of `capacity` permits refilled every `refill_interval`
//! - a minimum spacing of `refill_interval / capacity` between admissions,
//!   enforced with a `governor` GCRA quota
//! - a semaphore capping calls in flight
//!
//! Admission is FIFO: waiters queue on a fair mutex and only the head of the
//! queue waits for permits.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, sleep_until, Instant};

use crate::config::{RateLimitBackend, RateLimitConfig};
use crate::errors::{GatewayError, GatewayResult};
use crate::types::{BucketStatus, LimiterStatus, RateLimits};

type DirectLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Limits of one bucket.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Permits per refill interval
    pub capacity: u32,
    pub refill_interval: Duration,
    /// Maximum calls in flight
    pub max_concurrent: usize,
}

impl BucketConfig {
    /// Minimum gap between two admissions.
    pub fn min_spacing(&self) -> Duration {
        if self.capacity == 0 {
            return Duration::ZERO;
        }
        self.refill_interval / self.capacity
    }
}

struct Reservoir {
    available: u32,
    window_start: Instant,
}

/// Fixed-window permit counter kept in Redis so several processes share
/// one budget.
struct SharedWindow {
    connection: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

/// Guard returned when a slot is acquired.
///
/// Holds the concurrency slot and counts as running until dropped.
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
    running: Arc<AtomicUsize>,
}

impl Drop for RateLimitGuard {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One token bucket.
pub struct TokenBucket {
    name: &'static str,
    config: BucketConfig,
    /// `None` when the bucket is unlimited.
    reservoir: Option<Mutex<Reservoir>>,
    admission: Mutex<()>,
    spacing: Option<DirectLimiter>,
    concurrency: Arc<Semaphore>,
    shared: Option<SharedWindow>,
    queued: AtomicUsize,
    running: Arc<AtomicUsize>,
}

impl TokenBucket {
    /// Create an in-process bucket.
    pub fn new(name: &'static str, config: BucketConfig) -> Self {
        let spacing = governor::Quota::with_period(config.min_spacing())
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(governor::RateLimiter::direct);
        let max_concurrent = config.max_concurrent.clamp(1, Semaphore::MAX_PERMITS);

        Self {
            name,
            reservoir: Some(Mutex::new(Reservoir {
                available: config.capacity,
                window_start: Instant::now(),
            })),
            admission: Mutex::new(()),
            spacing,
            concurrency: Arc::new(Semaphore::new(max_concurrent)),
            shared: None,
            queued: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    /// Create a bucket that admits everything immediately.
    pub fn unlimited(name: &'static str) -> Self {
        Self {
            name,
            config: BucketConfig {
                capacity: u32::MAX,
                refill_interval: Duration::from_secs(1),
                max_concurrent: Semaphore::MAX_PERMITS,
            },
            reservoir: None,
            admission: Mutex::new(()),
            spacing: None,
            concurrency: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
            shared: None,
            queued: AtomicUsize::new(0),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_shared(mut self, shared: SharedWindow) -> Self {
        self.shared = Some(shared);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Wait for admission and return a guard holding the concurrency slot.
    pub async fn acquire(&self) -> GatewayResult<RateLimitGuard> {
        let _queued = QueuedGuard::enter(&self.queued);

        // Held until admitted, so later callers queue behind this one.
        let _turn = self.admission.lock().await;

        let permit = self
            .concurrency
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::LimiterClosed)?;

        self.take_permit().await;

        if let Some(spacing) = &self.spacing {
            spacing.until_ready().await;
        }

        self.running.fetch_add(1, Ordering::SeqCst);
        Ok(RateLimitGuard {
            _permit: permit,
            running: self.running.clone(),
        })
    }

    /// Run `op` once admitted. The slot is released when `op` completes,
    /// whether it succeeded or not.
    pub async fn schedule<F, Fut, T>(&self, op: F) -> GatewayResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let _guard = self.acquire().await?;
        op().await
    }

    async fn take_permit(&self) {
        if let Some(shared) = &self.shared {
            match self.take_shared_permit(shared).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(
                        bucket = self.name,
                        error = %e,
                        "Shared rate limit store unavailable, using local reservoir"
                    );
                }
            }
        }
        self.take_local_permit().await;
    }

    async fn take_local_permit(&self) {
        let Some(reservoir) = &self.reservoir else {
            return;
        };
        let mut reservoir = reservoir.lock().await;

        loop {
            let now = Instant::now();
            if now.duration_since(reservoir.window_start) >= self.config.refill_interval {
                reservoir.window_start = now;
                reservoir.available = self.config.capacity;
            }

            if reservoir.available > 0 {
                reservoir.available -= 1;
                return;
            }

            let refill_at = reservoir.window_start + self.config.refill_interval;
            tracing::debug!(
                bucket = self.name,
                delay_ms = refill_at.saturating_duration_since(now).as_millis() as u64,
                "Reservoir empty, waiting for refill"
            );
            sleep_until(refill_at).await;
        }
    }

    async fn take_shared_permit(&self, shared: &SharedWindow) -> Result<(), redis::RedisError> {
        let interval_ms = self.config.refill_interval.as_millis().max(1) as u64;

        loop {
            let now_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            let window = now_ms / interval_ms;
            let key = format!("{}:{}:{}", shared.key_prefix, self.name, window);

            let mut connection = shared.connection.clone();
            let (count,): (u64,) = redis::pipe()
                .atomic()
                .incr(&key, 1u64)
                .pexpire(&key, interval_ms as i64)
                .ignore()
                .query_async(&mut connection)
                .await?;

            if count <= u64::from(self.config.capacity) {
                return Ok(());
            }

            let wait_ms = (window + 1) * interval_ms - now_ms;
            tracing::debug!(
                bucket = self.name,
                delay_ms = wait_ms,
                "Shared window exhausted, waiting for next window"
            );
            sleep(Duration::from_millis(wait_ms)).await;
        }
    }

    pub fn status(&self) -> BucketStatus {
        BucketStatus {
            queued: self.queued.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
        }
    }
}

/// Read and write buckets shared by all rate-limited clients of one
/// initialization epoch.
pub struct RpcRateLimiter {
    read: TokenBucket,
    write: TokenBucket,
}

impl RpcRateLimiter {
    /// Create an in-process limiter from the configured permits.
    pub fn new(limits: RateLimits, config: &RateLimitConfig) -> Self {
        let (read, write) = Self::bucket_configs(limits, config);
        Self {
            read: TokenBucket::new("read", read),
            write: TokenBucket::new("write", write),
        }
    }

    /// Create a limiter on the configured backend.
    ///
    /// When the shared store cannot be reached the limiter is in-process.
    pub async fn connect(limits: RateLimits, config: &RateLimitConfig) -> Self {
        let limiter = Self::new(limits, config);

        let RateLimitBackend::Redis { url, key_prefix } = &config.backend else {
            return limiter;
        };

        match Self::open_shared(url).await {
            Ok(connection) => {
                tracing::info!(key_prefix = %key_prefix, "Using shared rate limit store");
                Self {
                    read: limiter.read.with_shared(SharedWindow {
                        connection: connection.clone(),
                        key_prefix: key_prefix.clone(),
                    }),
                    write: limiter.write.with_shared(SharedWindow {
                        connection,
                        key_prefix: key_prefix.clone(),
                    }),
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Shared rate limit store unreachable, limiting in-process"
                );
                limiter
            }
        }
    }

    async fn open_shared(url: &str) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        let client = redis::Client::open(url)?;
        client.get_multiplexed_async_connection().await
    }

    /// Create a limiter that allows unlimited requests.
    pub fn unlimited() -> Self {
        Self {
            read: TokenBucket::unlimited("read"),
            write: TokenBucket::unlimited("write"),
        }
    }

    fn bucket_configs(limits: RateLimits, config: &RateLimitConfig) -> (BucketConfig, BucketConfig) {
        (
            BucketConfig {
                capacity: limits.read_limit,
                refill_interval: config.refill_interval,
                max_concurrent: config.max_concurrent_reads,
            },
            BucketConfig {
                capacity: limits.write_limit,
                refill_interval: config.refill_interval,
                max_concurrent: config.max_concurrent_writes,
            },
        )
    }

    pub fn read(&self) -> &TokenBucket {
        &self.read
    }

    pub fn write(&self) -> &TokenBucket {
        &self.write
    }

    pub fn status(&self) -> LimiterStatus {
        LimiterStatus {
            read: self.read.status(),
            write: self.write.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(capacity: u32, interval_ms: u64, max_concurrent: usize) -> Arc<TokenBucket> {
        Arc::new(TokenBucket::new(
            "read",
            BucketConfig {
                capacity,
                refill_interval: Duration::from_millis(interval_ms),
                max_concurrent,
            },
        ))
    }

    #[test]
    fn test_min_spacing() {
        let config = BucketConfig {
            capacity: 5,
            refill_interval: Duration::from_secs(1),
            max_concurrent: 1,
        };
        assert_eq!(config.min_spacing(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_extra_op_waits_for_refill() {
        let start = Instant::now();
        let bucket = bucket(3, 300, 10);

        let mut started = Vec::new();
        for _ in 0..4 {
            let at = bucket.schedule(|| async { Ok(Instant::now()) }).await.unwrap();
            started.push(at.duration_since(start));
        }

        assert!(started[2] < Duration::from_millis(300));
        assert!(started[3] >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_admissions_are_spaced() {
        let bucket = bucket(4, 400, 10);

        let first = bucket.schedule(|| async { Ok(Instant::now()) }).await.unwrap();
        let second = bucket.schedule(|| async { Ok(Instant::now()) }).await.unwrap();

        // 400ms / 4 permits; allow for governor's clock granularity.
        assert!(second.duration_since(first) >= Duration::from_millis(95));
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let bucket = bucket(1000, 1000, 2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let bucket = bucket.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    bucket
                        .schedule(|| async {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            sleep(Duration::from_millis(20)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(bucket.status(), BucketStatus::default());
    }

    #[tokio::test]
    async fn test_admission_is_first_come_first_served() {
        // One permit per 40ms, so every waiter after the first queues.
        let bucket = bucket(1, 40, 10);
        let next_ticket = Arc::new(AtomicUsize::new(0));

        let mut waiters = Vec::new();
        for _ in 0..5 {
            let bucket = bucket.clone();
            let next_ticket = next_ticket.clone();
            waiters.push(tokio::spawn(async move {
                bucket
                    .schedule(|| async { Ok(next_ticket.fetch_add(1, Ordering::SeqCst)) })
                    .await
            }));
            // Let this waiter reach the queue before the next one starts.
            sleep(Duration::from_millis(5)).await;
        }

        for (arrival, waiter) in waiters.into_iter().enumerate() {
            assert_eq!(waiter.await.unwrap().unwrap(), arrival);
        }
    }

    #[tokio::test]
    async fn test_slot_released_on_failure() {
        let bucket = bucket(10, 1000, 1);

        let result: GatewayResult<()> = bucket
            .schedule(|| async { Err(GatewayError::ConnectionTimeout) })
            .await;
        assert!(result.is_err());
        assert_eq!(bucket.status().running, 0);

        let ok = bucket.schedule(|| async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);
    }

    #[tokio::test]
    async fn test_unlimited_limiter() {
        let limiter = RpcRateLimiter::unlimited();
        let start = Instant::now();

        for _ in 0..1000 {
            limiter.read().schedule(|| async { Ok(()) }).await.unwrap();
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.status(), LimiterStatus::default());
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_local() {
        let config = RateLimitConfig {
            backend: RateLimitBackend::Redis {
                url: "redis://127.0.0.1:1/".into(),
                key_prefix: "test".into(),
            },
            ..Default::default()
        };

        let limiter = RpcRateLimiter::connect(RateLimits::default(), &config).await;
        let value = limiter.write().schedule(|| async { Ok(1) }).await.unwrap();
        assert_eq!(value, 1);
    }
}

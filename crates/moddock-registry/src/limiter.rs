//! Token-bucket throttling of registry requests.
//!
//! The bucket holds up to `burst` tokens and refills continuously at the
//! configured per-minute rate. Every request takes one token, waiting for the
//! refill when the bucket is empty.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Shared request budget for one external service.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Creates a full bucket allowing `requests_per_minute` sustained and
    /// `burst` back-to-back requests. Zero values are raised to one.
    #[must_use]
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            refill_per_sec: f64::from(requests_per_minute.max(1)) / 60.0,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits until a token is available and takes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec)
            };
            tracing::trace!(wait_ms = wait.as_millis(), "registry budget exhausted, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = elapsed.mul_add(self.refill_per_sec, bucket.tokens).min(self.capacity);
        bucket.last_refill = now;
    }
}

//! Token-bucket rate limiter for batch import.
//!
//! Tokens refill continuously; `acquire` waits only as long as the
//! bucket is empty. Runs on tokio time, so tests pace it with paused
//! time instead of real delays.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Async token bucket. Safe for concurrent use.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Bucket with the given burst capacity and sustained rate.
    pub fn new(capacity: f64, per_minute: f64) -> Self {
        let capacity = capacity.max(1.0);
        Self {
            capacity,
            refill_per_sec: per_minute.max(f64::MIN_POSITIVE) / 60.0,
            state: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Strictly paced bucket: no burst, `per_minute` requests sustained.
    pub fn per_minute(per_minute: f64) -> Self {
        Self::new(1.0, per_minute)
    }

    /// Take one token, waiting for the refill if none is available.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.state.lock().expect("rate limiter poisoned");

                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }

                Duration::from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec)
            };

            tokio::time::sleep(wait).await;
        }
    }
}

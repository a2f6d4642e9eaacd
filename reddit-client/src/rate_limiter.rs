use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Request budget for one OAuth client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    /// Requests that may go out back to back before pacing kicks in.
    pub burst: u32,
}

impl RateLimitConfig {
    /// Reddit allows 100 OAuth requests per minute.
    pub fn reddit_oauth() -> Self {
        Self {
            requests_per_minute: 100,
            burst: 10,
        }
    }

    fn tokens_per_second(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket shared by every request a client makes.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Mutex<Bucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub burst: u32,
    pub requests_per_minute: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(config.burst),
                refilled_at: Instant::now(),
            }),
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let earned = now.duration_since(bucket.refilled_at).as_secs_f64()
            * self.config.tokens_per_second();
        bucket.tokens = (bucket.tokens + earned).min(f64::from(self.config.burst));
        bucket.refilled_at = now;
    }

    /// Takes one token, or says how long until one is available.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }
        let missing = 1.0 - bucket.tokens;
        Err(Duration::from_secs_f64(missing / self.config.tokens_per_second()))
    }

    /// Waits for a token and returns the time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        while let Err(wait) = self.try_acquire().await {
            debug!(?wait, "Reddit request budget exhausted, pacing");
            sleep(wait).await;
        }
        started.elapsed()
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        RateLimitStatus {
            available_tokens: bucket.tokens as u32,
            burst: self.config.burst,
            requests_per_minute: self.config.requests_per_minute,
        }
    }
}

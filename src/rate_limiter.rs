use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub requests_per_min: Option<u64>,
    pub concurrency: Option<u32>,
}

/// Token bucket shared by the clients of one provider
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // tokens available and time of last refill
    rpm_tokens: Mutex<(f64, Instant)>,
    sem: Option<Semaphore>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let now = Instant::now();
        let rpm_capacity = limits.requests_per_min.unwrap_or(0) as f64;
        let sem = limits.concurrency.map(|c| Semaphore::new(c.max(1) as usize));
        Self {
            inner: Arc::new(Inner {
                limits,
                rpm_tokens: Mutex::new((rpm_capacity, now)),
                sem,
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Limits::default())
    }

    /// Waits for a request slot. Keep the returned permit alive for the
    /// duration of the request so the concurrency limit holds.
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        let permit = match &self.inner.sem {
            Some(sem) => sem.acquire().await.ok(),
            None => None,
        };

        if let Some(rpm) = self.inner.limits.requests_per_min {
            if rpm > 0 {
                self.consume_token(rpm as f64, 60.0).await;
            }
        }
        permit
    }

    async fn consume_token(&self, capacity: f64, period_secs: f64) {
        // Refill continuously, wait until one token is available
        loop {
            let mut guard = self.inner.rpm_tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            let refill_rate = capacity / period_secs;
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}

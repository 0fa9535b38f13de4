use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use tokio::sync::Mutex;

/// Token bucket: `capacity` tokens, refilled at `refill_rate` per second.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self::new_at(capacity, refill_rate, Instant::now())
    }

    fn new_at(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
            capacity,
            refill_rate,
        }
    }

    /// Returns `true` if a token was available and consumed.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-IP token buckets, used to throttle room creation.
pub struct IpRateLimiter {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    capacity: f64,
    refill_rate: f64,
}

impl IpRateLimiter {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            refill_rate,
        }
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate))
            .allow()
    }

    /// Forget addresses that have not been seen for `max_age`.
    pub async fn cleanup(&self, max_age: std::time::Duration) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < max_age);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn bucket_allows_burst_then_refuses() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new_at(3.0, 0.0, start);
        assert!(bucket.allow_at(start));
        assert!(bucket.allow_at(start));
        assert!(bucket.allow_at(start));
        assert!(!bucket.allow_at(start));
    }

    #[test]
    fn bucket_refills_with_time() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new_at(2.0, 10.0, start);
        assert!(bucket.allow_at(start));
        assert!(bucket.allow_at(start));
        assert!(!bucket.allow_at(start));
        assert!(bucket.allow_at(start + Duration::from_millis(100)));
    }

    #[test]
    fn bucket_never_exceeds_capacity() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new_at(2.0, 100.0, start);
        let later = start + Duration::from_secs(60);
        assert!(bucket.allow_at(later));
        assert!(bucket.allow_at(later));
        assert!(!bucket.allow_at(later));
    }

    #[tokio::test]
    async fn separate_buckets_per_ip() {
        let limiter = IpRateLimiter::new(1.0, 0.0);
        let ip1: IpAddr = "10.0.0.1".parse().unwrap();
        let ip2: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check_rate_limit(ip1).await);
        assert!(!limiter.check_rate_limit(ip1).await);
        assert!(limiter.check_rate_limit(ip2).await);
    }

    #[tokio::test]
    async fn cleanup_removes_stale_entries() {
        let limiter = IpRateLimiter::new(5.0, 5.0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        limiter.check_rate_limit(ip).await;
        assert_eq!(limiter.buckets.lock().await.len(), 1);
        limiter.cleanup(Duration::ZERO).await;
        assert!(limiter.buckets.lock().await.is_empty());
    }
}

//! Per-remote request budgets for the connection boundary.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// What one remote has left to spend.
#[derive(Debug)]
struct Allowance {
    remaining: f64,
    topped_up: Instant,
}

/// Allows `count` actions per window per remote.
///
/// Spent allowance is earned back continuously over the window rather
/// than in whole-window steps, so a remote that paces itself is never
/// refused.
#[derive(Clone)]
pub struct RateLimiter {
    allowances: Arc<Mutex<HashMap<IpAddr, Allowance>>>,
    count: f64,
    window: Duration,
}

impl RateLimiter {
    /// Limiter allowing `count` actions per `window_secs` per remote.
    pub fn per_window(count: u32, window_secs: u64) -> Self {
        Self {
            allowances: Arc::new(Mutex::new(HashMap::new())),
            count: count as f64,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Spend one action for `ip`, returning whether it was allowed.
    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut allowances = self.allowances.lock().await;
        let now = Instant::now();
        let entry = allowances.entry(ip).or_insert(Allowance {
            remaining: self.count,
            topped_up: now,
        });
        let earned = now.duration_since(entry.topped_up).as_secs_f64()
            / self.window.as_secs_f64()
            * self.count;
        entry.remaining = (entry.remaining + earned).min(self.count);
        entry.topped_up = now;
        if entry.remaining < 1.0 {
            return false;
        }
        entry.remaining -= 1.0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[tokio::test]
    async fn burst_up_to_count_then_refuses() {
        let limiter = RateLimiter::per_window(3, 60);
        for _ in 0..3 {
            assert!(limiter.check(ip(1)).await);
        }
        assert!(!limiter.check(ip(1)).await);
    }

    #[tokio::test]
    async fn remotes_are_independent() {
        let limiter = RateLimiter::per_window(1, 60);
        assert!(limiter.check(ip(1)).await);
        assert!(!limiter.check(ip(1)).await);
        assert!(limiter.check(ip(2)).await);
    }

    #[tokio::test]
    async fn allowance_earns_back_over_the_window() {
        // 2 per second, so 600ms earns more than one action back.
        let limiter = RateLimiter::per_window(2, 1);
        assert!(limiter.check(ip(1)).await);
        assert!(limiter.check(ip(1)).await);
        assert!(!limiter.check(ip(1)).await);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(limiter.check(ip(1)).await);
    }
}

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// How fast the fetch stage may hit the market data provider.
///
/// `min_interval` spaces request starts regardless of `max_concurrency`, so
/// the request rate never exceeds one per interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub min_interval: Duration,
    pub max_concurrency: usize,
}

impl PacingPolicy {
    pub fn sequential(min_interval: Duration) -> Self {
        Self {
            min_interval,
            max_concurrency: 1,
        }
    }

    /// Upper bound on requests per second, `None` when unpaced.
    pub fn max_requests_per_sec(&self) -> Option<f64> {
        if self.min_interval.is_zero() {
            None
        } else {
            Some(1.0 / self.min_interval.as_secs_f64())
        }
    }
}

/// Hands out request start slots at least `min_interval` apart.
pub struct Pacer {
    policy: PacingPolicy,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            next_slot: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> PacingPolicy {
        self.policy
    }

    /// Waits for the next free slot. The first call returns immediately.
    pub async fn acquire(&self) {
        if self.policy.min_interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.policy.min_interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_sequential_slots_are_spaced() {
        let pacer = Pacer::new(PacingPolicy::sequential(Duration::from_millis(500)));
        let start = Instant::now();

        pacer.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_rate() {
        let pacer = Arc::new(Pacer::new(PacingPolicy {
            min_interval: Duration::from_millis(200),
            max_concurrency: 4,
        }));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pacer = pacer.clone();
                tokio::spawn(async move {
                    pacer.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();

        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(200));
        }
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let pacer = Pacer::new(PacingPolicy::sequential(Duration::ZERO));
        let start = Instant::now();
        for _ in 0..10 {
            pacer.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(pacer.policy().max_requests_per_sec(), None);
    }

    #[test]
    fn test_rate_bound() {
        let policy = PacingPolicy::sequential(Duration::from_millis(500));
        assert_eq!(policy.max_requests_per_sec(), Some(2.0));
    }
}

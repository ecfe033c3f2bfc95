use parking_lot::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Spaces out sequential outbound requests.
///
/// Backfill walks the upstream repository one revision at a time, so all
/// this has to enforce is a minimum delay between consecutive requests to
/// stay under the unauthenticated API quota.
pub struct RequestPacer {
    /// Last request timestamp to enforce minimum delay between requests
    last_request: Mutex<Instant>,
    min_delay: Duration,
}

impl RequestPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            // Backdate so the first request goes out immediately.
            last_request: Mutex::new(Instant::now() - Duration::from_secs(60)),
            min_delay,
        }
    }

    /// Sleeps just long enough to keep `min_delay` between consecutive calls.
    pub async fn pace(&self) {
        let wait_time = {
            let last = self.last_request.lock();
            let elapsed = last.elapsed();

            if elapsed < self.min_delay {
                Some(self.min_delay - elapsed)
            } else {
                None
            }
        }; // Lock is dropped here

        // Sleep outside the lock if needed
        if let Some(delay) = wait_time {
            sleep(delay).await;
        }

        *self.last_request.lock() = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant as StdInstant;

    #[tokio::test]
    async fn test_pacer_enforces_delay() {
        let pacer = RequestPacer::new(Duration::from_millis(200));

        let start = StdInstant::now();

        // First request should be immediate
        pacer.pace().await;
        let elapsed1 = start.elapsed();
        assert!(elapsed1.as_millis() < 100, "First request should be immediate");

        // Second request should wait ~200ms
        pacer.pace().await;
        let elapsed2 = start.elapsed();
        assert!(elapsed2.as_millis() >= 180, "Second request should wait for the delay");
    }

    #[tokio::test]
    async fn test_zero_delay_never_sleeps() {
        let pacer = RequestPacer::new(Duration::ZERO);

        let start = StdInstant::now();
        for _ in 0..5 {
            pacer.pace().await;
        }
        assert!(start.elapsed().as_millis() < 100);
    }
}

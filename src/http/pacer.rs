//! Global politeness pacing shared by every worker.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Enforces a minimum interval between consecutive outbound requests.
///
/// The last-request instant is the only mutable state shared across workers.
/// The lock is held while sleeping, so waiters are granted slots one at a time.
#[derive(Debug)]
pub struct RequestPacer {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next request slot and claim it.
    ///
    /// Returns the instant at which the slot was granted.
    pub async fn wait(&self) -> Instant {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let next = previous + self.interval;
            if next > Instant::now() {
                trace!(delay_ms = (next - Instant::now()).as_millis() as u64, "pacing");
                tokio::time::sleep_until(next).await;
            }
        }
        let granted = Instant::now();
        *last = Some(granted);
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_request_is_not_delayed() {
        let pacer = RequestPacer::new(Duration::from_secs(10));
        let start = Instant::now();
        pacer.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_concurrent_workers_respect_interval() {
        let interval = Duration::from_millis(15);
        let pacer = Arc::new(RequestPacer::new(interval));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pacer = Arc::clone(&pacer);
            handles.push(tokio::spawn(async move {
                let mut grants = Vec::new();
                for _ in 0..3 {
                    grants.push(pacer.wait().await);
                }
                grants
            }));
        }

        let mut grants = Vec::new();
        for handle in futures::future::join_all(handles).await {
            grants.extend(handle.unwrap());
        }
        grants.sort();

        assert_eq!(grants.len(), 12);
        for pair in grants.windows(2) {
            assert!(
                pair[1] - pair[0] >= interval,
                "requests only {:?} apart",
                pair[1] - pair[0]
            );
        }
    }
}

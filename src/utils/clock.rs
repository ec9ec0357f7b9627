use async_trait::async_trait;
use std::time::Duration;

/// Time source for polling loops.
///
/// `elapsed` is monotonic and measured from when the clock was created.
#[async_trait]
pub trait Clock: Send + Sync {
    fn elapsed(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio's timer
pub struct SystemClock {
    started: tokio::time::Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that only moves when slept on or advanced by hand.
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<Duration>,
    sleeps: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Duration::ZERO),
            sleeps: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_moves_on_sleep() {
        let clock = ManualClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);

        clock.sleep(Duration::from_secs(2)).await;
        clock.advance(Duration::from_millis(500));

        assert_eq!(clock.elapsed(), Duration::from_millis(2500));
        assert_eq!(clock.sleep_count(), 1);
    }

    #[tokio::test]
    async fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let before = clock.elapsed();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.elapsed() >= before + Duration::from_millis(5));
    }
}

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Idle,
    Polling,
}

struct PollHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Re-runs one fetch-and-render step on a fixed interval until stopped or dropped.
///
/// Ticks are awaited inside the loop, so a slow tick delays the next one instead of
/// overlapping it; intervals missed while a tick is running are skipped.
pub struct PollingRefresher {
    name: String,
    interval: Duration,
    handle: Mutex<Option<PollHandle>>,
}

impl std::fmt::Debug for PollingRefresher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PollingRefresher")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("status", &self.status())
            .finish()
    }
}

impl PollingRefresher {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            handle: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn status(&self) -> PollStatus {
        match self.handle.lock() {
            Ok(guard) if guard.as_ref().is_some_and(|handle| !handle.task.is_finished()) => {
                PollStatus::Polling
            }
            _ => PollStatus::Idle,
        }
    }

    /// Starts polling. Returns `false` and does nothing when already polling.
    pub fn start<F, Fut>(&self, mut tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        let Ok(mut guard) = self.handle.lock() else {
            warn!(poller = %self.name, "poll handle lock poisoned");
            return false;
        };
        if guard
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
        {
            debug!(poller = %self.name, "already polling");
            return false;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let interval = self.interval;
        let name = self.name.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; the caller already fetched once.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Err(error) = tick().await {
                            warn!(poller = %name, error = %error, "poll tick failed");
                        }
                    }
                }
            }
            debug!(poller = %name, "poll loop exited");
        });

        info!(poller = %self.name, interval_ms = interval.as_millis() as u64, "polling started");
        *guard = Some(PollHandle {
            stop_tx: Some(stop_tx),
            task,
        });
        true
    }

    /// Stops polling and waits for an in-flight tick to finish.
    /// Returns `false` when there was nothing to stop.
    pub async fn stop(&self) -> bool {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        let Some(mut handle) = handle else {
            return false;
        };
        if let Some(stop_tx) = handle.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(error) = handle.task.await {
            warn!(poller = %self.name, error = %error, "poll task join failed");
        }
        info!(poller = %self.name, "polling stopped");
        true
    }
}

impl Drop for PollingRefresher {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.handle.lock()
            && let Some(handle) = guard.take()
        {
            handle.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_tick(counter: Arc<AtomicUsize>) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<(), ApiError>> + Send>> + Send + 'static {
        move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let poller = PollingRefresher::new("test", Duration::from_secs(1));

        assert!(poller.start(counting_tick(Arc::clone(&counter))));
        assert_eq!(poller.status(), PollStatus::Polling);
        sleep(Duration::from_millis(3500)).await;
        let ticks = counter.load(Ordering::SeqCst);
        assert!((2..=3).contains(&ticks), "ticks = {ticks}");

        assert!(poller.stop().await);
        assert_eq!(poller.status(), PollStatus::Idle);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_polling_is_noop() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let poller = PollingRefresher::new("test", Duration::from_secs(1));

        assert!(poller.start(counting_tick(Arc::clone(&first))));
        assert!(!poller.start(counting_tick(Arc::clone(&second))));
        sleep(Duration::from_millis(2500)).await;
        assert!(first.load(Ordering::SeqCst) >= 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        poller.stop().await;
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let poller = PollingRefresher::new("idle", Duration::from_secs(1));
        assert!(!poller.stop().await);
        assert!(!poller.stop().await);
        assert_eq!(poller.status(), PollStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_never_overlap() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let poller = PollingRefresher::new("slow", Duration::from_secs(1));

        let (a, b, c) = (
            Arc::clone(&in_flight),
            Arc::clone(&max_in_flight),
            Arc::clone(&completed),
        );
        poller.start(move || {
            let (in_flight, max_in_flight, completed) =
                (Arc::clone(&a), Arc::clone(&b), Arc::clone(&c));
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(2500)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        sleep(Duration::from_secs(10)).await;
        poller.stop().await;
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert!(completed.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_tick_keeps_polling() {
        let counter = Arc::new(AtomicUsize::new(0));
        let poller = PollingRefresher::new("failing", Duration::from_secs(1));
        let tick_counter = Arc::clone(&counter);
        poller.start(move || {
            let counter = Arc::clone(&tick_counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Transport("offline".to_string()))
            }
        });

        sleep(Duration::from_millis(3500)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);
        assert_eq!(poller.status(), PollStatus::Polling);
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let poller = PollingRefresher::new("restart", Duration::from_secs(1));
        assert!(poller.start(counting_tick(Arc::clone(&counter))));
        assert!(poller.stop().await);
        assert!(poller.start(counting_tick(Arc::clone(&counter))));
        sleep(Duration::from_millis(1500)).await;
        assert!(counter.load(Ordering::SeqCst) >= 1);
        assert!(poller.stop().await);
    }
}

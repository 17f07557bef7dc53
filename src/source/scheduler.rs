//! Periodic and best-effort refresh driving for one source.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::{Error, Result};
use crate::source::bus::NotificationBus;

/// Minimum gap between issued update requests, giving an update time to
/// finish and keeping venue-side rate limiters happy.
const MIN_REQUEST_GAP: Duration = Duration::from_secs(2);

/// The fetch operation a scheduler drives.
///
/// Implementations wrap a venue's rate fetch and must push results into
/// the source's store before returning.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch_once(&self) -> Result<()>;
}

/// Drives a source's fetch without exceeding the request-gap floor and
/// without overlapping an in-flight fetch for the same source.
///
/// Failures of a driven fetch are reported through the error channel with
/// the source name attached, re-raised to one-shot callers, and never
/// stop a running periodic timer.
pub struct UpdateScheduler {
    name: &'static str,
    fetcher: Arc<dyn Fetcher>,
    bus: Arc<NotificationBus>,
    last_request: Mutex<Option<Instant>>,
    // Held for the duration of a fetch; best-effort triggers try_lock and
    // bail, one-shot callers queue on it.
    flight: Arc<tokio::sync::Mutex<()>>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateScheduler {
    #[must_use]
    pub fn new(name: &'static str, fetcher: Arc<dyn Fetcher>, bus: Arc<NotificationBus>) -> Self {
        Self {
            name,
            fetcher,
            bus,
            last_request: Mutex::new(None),
            flight: Arc::new(tokio::sync::Mutex::new(())),
            periodic: Mutex::new(None),
        }
    }

    /// Request one best-effort asynchronous fetch.
    ///
    /// A no-op within two seconds of the last issued request; otherwise the
    /// issue time is recorded immediately (not at completion) and a single
    /// fetch task is spawned, so bursts collapse into one outstanding
    /// fetch. A fetch already in flight suppresses the new one entirely.
    pub fn request_update(&self) {
        {
            let mut last = self.last_request.lock();
            if let Some(at) = *last {
                if at.elapsed() < MIN_REQUEST_GAP {
                    return;
                }
            }
            *last = Some(Instant::now());
        }

        let fetcher = Arc::clone(&self.fetcher);
        let flight = Arc::clone(&self.flight);
        let bus = Arc::clone(&self.bus);
        let name = self.name;
        tokio::spawn(async move {
            let Ok(_guard) = flight.try_lock() else {
                debug!(source = name, "fetch already in flight, skipping");
                return;
            };
            if let Err(e) = fetcher.fetch_once().await {
                bus.notify_error(name, &format!("fetch failed: {e}"));
            }
        });
    }

    /// Run one fetch now, waiting for any in-flight fetch to finish first.
    ///
    /// # Errors
    ///
    /// Re-raises the fetch failure after reporting it through the error
    /// channel, so a direct caller observes it.
    pub async fn fetch_now(&self) -> Result<()> {
        let _guard = self.flight.lock().await;
        if let Err(e) = self.fetcher.fetch_once().await {
            self.bus.notify_error(self.name, &format!("fetch failed: {e}"));
            return Err(e);
        }
        Ok(())
    }

    /// Start (or restart) periodic fetches every `min_delay_secs` seconds.
    ///
    /// Zero cancels a running timer. Ticks that would overlap an in-flight
    /// fetch are skipped; fetch failures are reported and the timer keeps
    /// running.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when `min_delay_secs` is negative or not
    /// finite.
    pub fn periodic_update(&self, min_delay_secs: f64) -> Result<()> {
        if !min_delay_secs.is_finite() || min_delay_secs < 0.0 {
            return Err(Error::InvalidArgument(
                "min_delay must be a positive number or zero".into(),
            ));
        }

        let mut slot = self.periodic.lock();
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        if min_delay_secs == 0.0 {
            return Ok(());
        }

        let period = Duration::from_secs_f64(min_delay_secs);
        let fetcher = Arc::clone(&self.fetcher);
        let flight = Arc::clone(&self.flight);
        let bus = Arc::clone(&self.bus);
        let name = self.name;
        *slot = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately; wait a full period
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Ok(_guard) = flight.try_lock() else {
                    debug!(source = name, "fetch already in flight, skipping tick");
                    continue;
                };
                if let Err(e) = fetcher.fetch_once().await {
                    bus.notify_error(name, &format!("fetch failed: {e}"));
                }
            }
        }));
        Ok(())
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.periodic.lock().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("name", &self.name)
            .field("periodic", &self.periodic.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch_once(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(Error::Protocol("venue returned garbage".into()));
            }
            Ok(())
        }
    }

    fn scheduler(fetcher: Arc<CountingFetcher>) -> UpdateScheduler {
        UpdateScheduler::new("test", fetcher, Arc::new(NotificationBus::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_requests_dispatches_at_most_one_fetch() {
        let fetcher = Arc::new(CountingFetcher::new());
        let sched = scheduler(Arc::clone(&fetcher));

        for _ in 0..5 {
            sched.request_update();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_after_the_gap_dispatch_again() {
        let fetcher = Arc::new(CountingFetcher::new());
        let sched = scheduler(Arc::clone(&fetcher));

        sched.request_update();
        tokio::time::sleep(Duration::from_millis(2100)).await;
        sched.request_update();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_fetch_suppresses_new_requests() {
        let fetcher = Arc::new(CountingFetcher::slow(Duration::from_secs(10)));
        let sched = scheduler(Arc::clone(&fetcher));

        sched.request_update();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        // past the request gap, but the first fetch is still running
        sched.request_update();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_update_fires_on_the_given_period() {
        let fetcher = Arc::new(CountingFetcher::new());
        let sched = scheduler(Arc::clone(&fetcher));

        sched.periodic_update(30.0).unwrap();
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_update_zero_cancels() {
        let fetcher = Arc::new(CountingFetcher::new());
        let sched = scheduler(Arc::clone(&fetcher));

        sched.periodic_update(10.0).unwrap();
        tokio::time::sleep(Duration::from_secs(25)).await;
        sched.periodic_update(0.0).unwrap();
        let before = fetcher.calls();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(fetcher.calls(), before);
    }

    #[tokio::test]
    async fn periodic_update_rejects_negative_delay() {
        let sched = scheduler(Arc::new(CountingFetcher::new()));
        assert!(matches!(
            sched.periodic_update(-1.0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            sched.periodic_update(f64::NAN),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_does_not_stop_the_timer() {
        let fetcher = Arc::new(CountingFetcher::failing());
        let bus = Arc::new(NotificationBus::new());
        let errors = Arc::new(AtomicUsize::new(0));
        {
            let errors = Arc::clone(&errors);
            bus.err_subscribe(move |_, _| {
                errors.fetch_add(1, Ordering::SeqCst);
            });
        }
        let sched = UpdateScheduler::new("test", fetcher.clone(), bus);

        sched.periodic_update(10.0).unwrap();
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(fetcher.calls(), 3);
        assert_eq!(errors.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fetch_now_reports_and_reraises() {
        let bus = Arc::new(NotificationBus::new());
        let errors = Arc::new(AtomicUsize::new(0));
        {
            let errors = Arc::clone(&errors);
            bus.err_subscribe(move |_, _| {
                errors.fetch_add(1, Ordering::SeqCst);
            });
        }
        let sched = UpdateScheduler::new("test", Arc::new(CountingFetcher::failing()), bus);

        assert!(sched.fetch_now().await.is_err());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}

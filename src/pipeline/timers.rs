use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior, Sleep};

/// Counts armed timers so teardown can be verified
#[derive(Debug, Clone, Default)]
pub struct PendingTimers {
    count: Arc<AtomicUsize>,
}

impl PendingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub(crate) fn guard(&self) -> TimerGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        TimerGuard {
            count: Arc::clone(&self.count),
        }
    }
}

/// Decrements the pending count when the timer goes away
#[derive(Debug)]
pub(crate) struct TimerGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Armed<T> {
    timer: T,
    _guard: TimerGuard,
}

/// Single countdown armed at scan start
pub(crate) struct Deadline {
    armed: Option<Armed<Pin<Box<Sleep>>>>,
}

impl Deadline {
    pub fn arm(timers: &PendingTimers, after: Duration) -> Self {
        Self {
            armed: Some(Armed {
                timer: Box::pin(sleep(after)),
                _guard: timers.guard(),
            }),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Completes when the countdown fires; never completes once cancelled
    pub async fn expired(&mut self) {
        match self.armed.as_mut() {
            Some(armed) => {
                armed.timer.as_mut().await;
                self.armed = None;
            }
            None => pending().await,
        }
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }
}

/// Fixed-interval sampling ticks. The first tick fires immediately.
pub(crate) struct SampleSchedule {
    armed: Option<Armed<Interval>>,
}

impl SampleSchedule {
    pub fn start(timers: &PendingTimers, period: Duration) -> Self {
        let mut ticks = interval(period);
        // A slow cycle delays the next tick instead of bursting
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            armed: Some(Armed {
                timer: ticks,
                _guard: timers.guard(),
            }),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub async fn tick(&mut self) {
        match self.armed.as_mut() {
            Some(armed) => {
                armed.timer.tick().await;
            }
            None => pending().await,
        }
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }
}

/// One tracked delay, used while waiting for a capturable frame
pub(crate) async fn tracked_sleep(timers: &PendingTimers, duration: Duration) {
    let _guard = timers.guard();
    sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_once_and_releases() {
        let timers = PendingTimers::new();
        let mut deadline = Deadline::arm(&timers, Duration::from_secs(15));
        assert_eq!(timers.count(), 1);

        let start = tokio::time::Instant::now();
        deadline.expired().await;

        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert!(!deadline.is_armed());
        assert_eq!(timers.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_deadline_never_fires() {
        let timers = PendingTimers::new();
        let mut deadline = Deadline::arm(&timers, Duration::from_millis(10));
        deadline.cancel();
        assert_eq!(timers.count(), 0);

        let fired = tokio::time::timeout(Duration::from_secs(1), deadline.expired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_ticks_and_cancels() {
        let timers = PendingTimers::new();
        let mut schedule = SampleSchedule::start(&timers, Duration::from_millis(33));

        let start = tokio::time::Instant::now();
        schedule.tick().await;
        schedule.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(33));

        schedule.cancel();
        assert!(!schedule.is_armed());
        assert_eq!(timers.count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_timers_releases_guards() {
        let timers = PendingTimers::new();
        {
            let _deadline = Deadline::arm(&timers, Duration::from_secs(5));
            let _schedule = SampleSchedule::start(&timers, Duration::from_millis(5));
            assert_eq!(timers.count(), 2);
        }
        assert_eq!(timers.count(), 0);
    }
}

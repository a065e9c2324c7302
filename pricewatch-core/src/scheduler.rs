//! Trigger-driven scheduling for fetch cycles.
//!
//! The scheduler owns nothing but timing: registered callbacks are
//! opaque boxed futures. A fired callback is awaited to completion
//! before the next due-time check, so cycles never overlap, and the
//! driving loop observes the shutdown token every tick, so
//! cancellation latency is bounded by the tick interval rather than by
//! in-flight work.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use futures::future::BoxFuture;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A configuration fault raised at registration time. The scheduler
/// must not start on a malformed trigger.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Fixed-interval triggers need a positive period.
    #[error("fixed-interval trigger requires a positive number of seconds")]
    ZeroInterval,

    /// Daily triggers are specified as `HH:MM`.
    #[error("daily trigger time must be HH:MM, got {value:?}")]
    InvalidDailyTime {
        /// The rejected time string.
        value: String,
    },
}

/// When a registered job becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every `Duration`, measured from the previous due-time check
    /// that fired the job.
    FixedInterval(Duration),
    /// At the given wall-clock time of day (UTC), rolling to the next
    /// day once today's occurrence has passed.
    DailyAt(NaiveTime),
}

impl Trigger {
    /// Parse a `HH:MM` string into a daily trigger.
    pub fn daily(value: &str) -> Result<Self, ScheduleError> {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map(Self::DailyAt)
            .map_err(|_| ScheduleError::InvalidDailyTime {
                value: value.to_string(),
            })
    }

    /// The next due time strictly after `now`.
    fn next_due(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::FixedInterval(interval) => {
                let delta = TimeDelta::from_std(*interval)
                    .unwrap_or(TimeDelta::MAX);
                now + delta
            }
            Self::DailyAt(time) => {
                let today = now.date_naive().and_time(*time).and_utc();
                if today > now {
                    today
                } else {
                    today + TimeDelta::days(1)
                }
            }
        }
    }
}

type JobCallback = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

struct Job {
    trigger: Trigger,
    next_due: DateTime<Utc>,
    callback: JobCallback,
}

/// Fires registered callbacks when their triggers come due. Owned by
/// the process entry point and handed to [`Scheduler::run`]; there is
/// no ambient singleton.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let due: Vec<_> = self
            .jobs
            .iter()
            .map(|job| (job.trigger, job.next_due))
            .collect();
        f.debug_struct("Scheduler").field("jobs", &due).finish()
    }
}

impl Scheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `trigger`, with the first due time
    /// computed from the current wall clock.
    pub fn register<F>(
        &mut self,
        trigger: Trigger,
        callback: F,
    ) -> Result<(), ScheduleError>
    where
        F: FnMut() -> BoxFuture<'static, ()> + Send + 'static,
    {
        self.register_from(trigger, callback, Utc::now())
    }

    /// Register `callback` under `trigger`, computing the first due
    /// time from an explicit epoch. This is the seam the clock-driven
    /// tests use.
    pub fn register_from<F>(
        &mut self,
        trigger: Trigger,
        callback: F,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleError>
    where
        F: FnMut() -> BoxFuture<'static, ()> + Send + 'static,
    {
        if let Trigger::FixedInterval(interval) = trigger
            && interval.is_zero()
        {
            return Err(ScheduleError::ZeroInterval);
        }

        self.jobs.push(Job {
            trigger,
            next_due: trigger.next_due(now),
            callback: Box::new(callback),
        });
        Ok(())
    }

    /// Fire every job due at `now`, awaiting each callback to
    /// completion. The next due time is computed from `now` before the
    /// callback runs, so a slow cycle delays later fires instead of
    /// stacking them.
    pub async fn run_pending(&mut self, now: DateTime<Utc>) {
        for job in &mut self.jobs {
            if now >= job.next_due {
                job.next_due = job.trigger.next_due(now);
                (job.callback)().await;
            }
        }
    }

    /// Drive [`Scheduler::run_pending`] once per `tick` until the
    /// shutdown token is cancelled. Cancellation is observed between
    /// ticks, never mid-callback: an in-flight cycle runs to
    /// completion, and no new one is scheduled afterwards.
    pub async fn run(mut self, tick: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick_secs = tick.as_secs_f64(),
            jobs = self.jobs.len(),
            "scheduler loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scheduler loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_pending(Utc::now()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + TimeDelta::seconds(seconds)
    }

    fn counter_job(
        scheduler: &mut Scheduler,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        scheduler
            .register_from(
                trigger,
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                    .boxed()
                },
                now,
            )
            .unwrap();
        fired
    }

    #[tokio::test]
    async fn interval_trigger_fires_on_schedule() {
        let mut scheduler = Scheduler::new();
        let fired = counter_job(
            &mut scheduler,
            Trigger::FixedInterval(Duration::from_secs(10)),
            t0(),
        );

        scheduler.run_pending(at(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        scheduler.run_pending(at(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.run_pending(at(15)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.run_pending(at(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        scheduler.run_pending(at(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn daily_trigger_rolls_past_todays_occurrence() {
        let mut scheduler = Scheduler::new();
        // Registered at 12:00; 09:30 has already passed today.
        let trigger = Trigger::daily("09:30").unwrap();
        let fired = counter_job(&mut scheduler, trigger, t0());

        // Later the same day: nothing.
        scheduler.run_pending(at(6 * 3600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Tomorrow 09:29: still not due.
        let tomorrow_0929 =
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 29, 0).unwrap();
        scheduler.run_pending(tomorrow_0929).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Tomorrow 09:30: fires, and reschedules for the day after.
        let tomorrow_0930 =
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap();
        scheduler.run_pending(tomorrow_0930).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.run_pending(tomorrow_0930 + TimeDelta::hours(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let day_after =
            Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap();
        scheduler.run_pending(day_after).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_interval_is_a_configuration_fault() {
        let mut scheduler = Scheduler::new();
        let err = scheduler
            .register_from(
                Trigger::FixedInterval(Duration::ZERO),
                || async {}.boxed(),
                t0(),
            )
            .unwrap_err();
        assert!(matches!(err, ScheduleError::ZeroInterval));
    }

    #[test]
    fn malformed_daily_time_is_rejected() {
        assert!(matches!(
            Trigger::daily("25:99"),
            Err(ScheduleError::InvalidDailyTime { .. })
        ));
        assert!(matches!(
            Trigger::daily("nope"),
            Err(ScheduleError::InvalidDailyTime { .. })
        ));
        assert!(Trigger::daily("06:30").is_ok());
    }

    #[tokio::test]
    async fn slow_callback_delays_the_next_fire_instead_of_stacking() {
        let mut scheduler = Scheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let count = fired.clone();
        scheduler
            .register_from(
                Trigger::FixedInterval(Duration::from_secs(10)),
                move || {
                    let count = count.clone();
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                    .boxed()
                },
                t0(),
            )
            .unwrap();

        // The cycle that fired at t=10 finished late; the next check
        // happens at t=25. Due time was recomputed from the firing
        // check (10 + 10 = 20), so t=25 fires once, not twice.
        scheduler.run_pending(at(10)).await;
        scheduler.run_pending(at(25)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        // Next due is 35; 34 is too early.
        scheduler.run_pending(at(34)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_exits_within_one_tick_of_cancellation() {
        let mut scheduler = Scheduler::new();
        // A job that will not come due during the test.
        let _fired = counter_job(
            &mut scheduler,
            Trigger::FixedInterval(Duration::from_secs(3600)),
            Utc::now(),
        );

        let shutdown = CancellationToken::new();
        let handle =
            tokio::spawn(scheduler.run(Duration::from_secs(1), shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler loop should stop within one tick")
            .expect("scheduler task should not panic");
    }
}

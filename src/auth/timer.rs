//! Single periodic refresh timer with idempotent suspend/resume.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use strum::{Display, EnumString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::credentials::RefreshSchedule;

/// Whether the refresh timer is currently firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TimerState {
    Suspended,
    Resumed,
}

/// Owns at most one background task that fires every `schedule.interval`
/// while resumed.
///
/// The first tick fires one full interval after the timer is resumed.
/// Suspending mid-countdown discards the partial countdown.
pub struct RefreshTimer {
    schedule: RefreshSchedule,
    state: watch::Sender<TimerState>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    ticks: Arc<AtomicU64>,
}

impl RefreshTimer {
    pub fn new(schedule: RefreshSchedule) -> Self {
        let (state, _) = watch::channel(TimerState::Suspended);
        Self {
            schedule,
            state,
            task: Mutex::new(None),
            cancel: CancellationToken::new(),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn schedule(&self) -> RefreshSchedule {
        self.schedule
    }

    pub fn state(&self) -> TimerState {
        *self.state.borrow()
    }

    pub fn is_armed(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.is_some())
            .unwrap_or(false)
    }

    /// Number of ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Spawn the timer task with `on_tick` as its handler.
    ///
    /// Returns `false` without touching anything when a task already exists.
    /// Arming leaves the state unchanged; call [`resume`](Self::resume) to
    /// start firing.
    pub fn arm<F, Fut>(&self, on_tick: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(mut task) = self.task.lock() else {
            return false;
        };
        if task.is_some() || self.cancel.is_cancelled() {
            return false;
        }

        let mut rx = self.state.subscribe();
        let cancel = self.cancel.clone();
        let ticks = self.ticks.clone();
        let interval = self.schedule.interval;
        tracing::debug!(
            interval_secs = interval.as_secs(),
            leeway_nanos = self.schedule.leeway.as_nanos() as u64,
            "Arming refresh timer"
        );

        *task = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    resumed = rx.wait_for(|state| *state == TimerState::Resumed) => {
                        if resumed.is_err() {
                            break;
                        }
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if *rx.borrow() == TimerState::Resumed {
                            ticks.fetch_add(1, Ordering::SeqCst);
                            on_tick().await;
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Refresh timer stopped");
        }));
        true
    }

    /// Start firing. Returns `true` if the state changed.
    pub fn resume(&self) -> bool {
        self.transition(TimerState::Resumed)
    }

    /// Stop firing. Returns `true` if the state changed.
    pub fn suspend(&self) -> bool {
        self.transition(TimerState::Suspended)
    }

    /// Flip between suspended and resumed, returning the new state.
    pub fn toggle(&self) -> TimerState {
        let next = match self.state() {
            TimerState::Resumed => TimerState::Suspended,
            TimerState::Suspended => TimerState::Resumed,
        };
        self.transition(next);
        next
    }

    /// Stop the task for good.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.state.send_if_modified(|state| {
            let changed = *state != TimerState::Suspended;
            *state = TimerState::Suspended;
            changed
        });
    }

    fn transition(&self, target: TimerState) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == target {
                false
            } else {
                *state = target;
                true
            }
        });
        if changed {
            tracing::debug!(state = %target, "Refresh timer state changed");
        }
        changed
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for RefreshTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTimer")
            .field("schedule", &self.schedule)
            .field("state", &self.state())
            .field("armed", &self.is_armed())
            .field("ticks", &self.tick_count())
            .finish()
    }
}

//! Client-side focus/rest countdown.
//!
//! [`FocusTimerState`] is the pure state machine; [`FocusTimer`] drives it
//! once per second from a background task until shut down.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{Mutex, mpsc},
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use ts_rs::TS;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    Work,
    Rest,
}

impl FocusMode {
    pub fn other(self) -> Self {
        match self {
            FocusMode::Work => FocusMode::Rest,
            FocusMode::Rest => FocusMode::Work,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusDurations {
    pub work_secs: u32,
    pub rest_secs: u32,
}

impl FocusDurations {
    /// Builds durations from minute settings. Non-positive values become one
    /// minute.
    pub fn from_minutes(work_minutes: i32, rest_minutes: i32) -> Self {
        let to_secs = |minutes: i32| u32::try_from(minutes.max(1)).unwrap_or(1) * 60;
        Self {
            work_secs: to_secs(work_minutes),
            rest_secs: to_secs(rest_minutes),
        }
    }

    pub fn for_mode(&self, mode: FocusMode) -> u32 {
        match mode {
            FocusMode::Work => self.work_secs,
            FocusMode::Rest => self.rest_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    Tick {
        mode: FocusMode,
        remaining_secs: u32,
    },
    /// The countdown for `finished` hit zero; the timer now holds the full
    /// `next` duration and is stopped.
    CycleFinished { finished: FocusMode, next: FocusMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTimerState {
    durations: FocusDurations,
    mode: FocusMode,
    remaining_secs: u32,
    active: bool,
}

impl FocusTimerState {
    pub fn new(durations: FocusDurations) -> Self {
        Self {
            durations,
            mode: FocusMode::Work,
            remaining_secs: durations.work_secs,
            active: false,
        }
    }

    pub fn mode(&self) -> FocusMode {
        self.mode
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) {
        self.active = true;
    }

    /// Stops counting, keeping the remaining time.
    pub fn pause(&mut self) {
        self.active = false;
    }

    /// Stops and restores the full duration of the current mode.
    pub fn reset(&mut self) {
        self.active = false;
        self.remaining_secs = self.durations.for_mode(self.mode);
    }

    /// Jumps to `mode` with its full duration, stopped.
    pub fn switch_to(&mut self, mode: FocusMode) {
        self.mode = mode;
        self.reset();
    }

    /// Applies new settings. A stopped timer picks up the new duration for
    /// its current mode right away; a running one keeps counting.
    pub fn set_durations(&mut self, durations: FocusDurations) {
        self.durations = durations;
        if !self.active {
            self.remaining_secs = durations.for_mode(self.mode);
        }
    }

    /// Advances one second. Inactive timers ignore ticks.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if !self.active {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Some(TimerEvent::Tick {
                mode: self.mode,
                remaining_secs: self.remaining_secs,
            });
        }

        let finished = self.mode;
        let next = finished.other();
        self.switch_to(next);
        Some(TimerEvent::CycleFinished { finished, next })
    }
}

/// A [`FocusTimerState`] ticking in a background task.
pub struct FocusTimer {
    state: Arc<Mutex<FocusTimerState>>,
    cancel: CancellationToken,
}

impl FocusTimer {
    /// Spawns the ticking task. Events are delivered on the returned channel
    /// until [`FocusTimer::shutdown`] is called or the timer is dropped.
    pub fn spawn(durations: FocusDurations) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let state = Arc::new(Mutex::new(FocusTimerState::new(durations)));
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(run_ticker(state.clone(), cancel.clone(), tx));

        (Self { state, cancel }, rx)
    }

    pub async fn start(&self) {
        self.state.lock().await.start();
    }

    pub async fn pause(&self) {
        self.state.lock().await.pause();
    }

    pub async fn reset(&self) {
        self.state.lock().await.reset();
    }

    pub async fn switch_to(&self, mode: FocusMode) {
        self.state.lock().await.switch_to(mode);
    }

    pub async fn set_durations(&self, durations: FocusDurations) {
        self.state.lock().await.set_durations(durations);
    }

    pub async fn snapshot(&self) -> FocusTimerState {
        *self.state.lock().await
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for FocusTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_ticker(
    state: Arc<Mutex<FocusTimerState>>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TimerEvent>,
) {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let event = state.lock().await.tick();
                if let Some(event) = event
                    && events.send(event).is_err()
                {
                    break;
                }
            }
        }
    }
    tracing::trace!("focus timer stopped");
}

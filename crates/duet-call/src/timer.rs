//! The match duration countdown.
//!
//! A pure countdown: it knows nothing about sessions. The controller starts
//! it when audio connects, cancels it on every teardown path, and acts on
//! the single [`TimerTick::Expired`] it yields.

use std::future::pending;
use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Seconds left after this tick.
    Remaining(u32),
    /// The countdown reached zero. Yielded exactly once per run.
    Expired,
}

#[derive(Debug)]
pub struct MatchSessionTimer {
    total: u32,
    remaining: u32,
    interval: Option<Interval>,
}

impl MatchSessionTimer {
    pub fn new(duration: Duration) -> Self {
        let total = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
        Self {
            total,
            remaining: total,
            interval: None,
        }
    }

    /// Begin counting down. Returns `false` if already running.
    pub fn start(&mut self) -> bool {
        if self.interval.is_some() {
            return false;
        }
        let mut interval = interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        true
    }

    /// Stop and rewind to the full duration.
    pub fn cancel(&mut self) {
        self.interval = None;
        self.remaining = self.total;
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Wait for the next tick. Never resolves while the timer is stopped.
    pub async fn tick(&mut self) -> TimerTick {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
                self.advance()
            }
            None => pending().await,
        }
    }

    fn advance(&mut self) -> TimerTick {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.interval = None;
            TimerTick::Expired
        } else {
            TimerTick::Remaining(self.remaining)
        }
    }
}

/// Render seconds as `m:ss`.
pub fn format_remaining(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn is_ending_soon(secs: u32, threshold_secs: u32) -> bool {
    secs <= threshold_secs
}

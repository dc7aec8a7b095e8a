//! Trading session: daily swap budget and time-of-day window
//!
//! The counter belongs to a calendar day in the configured timezone. The first
//! observation on a new local date resets it, whatever state the session was
//! in before.

use std::fmt;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::config::SessionConfig;

/// Local hours during which swaps may start
///
/// `start_hour` is inclusive, `end_hour` exclusive. A window with
/// `start_hour > end_hour` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl TradingWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl fmt::Display for TradingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00-{:02}:00", self.start_hour, self.end_hour)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    OutOfWindow,
    Trading,
    CapReached,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::OutOfWindow => "out of window",
            SessionState::Trading => "trading",
            SessionState::CapReached => "daily cap reached",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct TradingSession {
    daily_count: u32,
    daily_cap: u32,
    timezone: Tz,
    window: TradingWindow,
    last_reset_date: NaiveDate,
}

impl TradingSession {
    pub fn new(daily_cap: u32, timezone: Tz, window: TradingWindow, now: DateTime<Utc>) -> Self {
        Self {
            daily_count: 0,
            daily_cap,
            timezone,
            window,
            last_reset_date: now.with_timezone(&timezone).date_naive(),
        }
    }

    pub fn from_config(config: &SessionConfig, now: DateTime<Utc>) -> anyhow::Result<Self> {
        Ok(Self::new(
            config.daily_cap,
            config.tz()?,
            TradingWindow::new(config.start_hour, config.end_hour),
            now,
        ))
    }

    /// Roll the counter over if `now` falls on a later local date
    ///
    /// A clock stepping backwards never resets the counter.
    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = now.with_timezone(&self.timezone).date_naive();
        if today > self.last_reset_date {
            info!(
                "New trading day {} ({}): resetting count {} -> 0",
                today, self.timezone, self.daily_count
            );
            self.daily_count = 0;
            self.last_reset_date = today;
        }
    }

    /// Current state at `now`
    pub fn observe(&mut self, now: DateTime<Utc>) -> SessionState {
        self.roll_over(now);

        let hour = now.with_timezone(&self.timezone).hour();
        if !self.window.contains(hour) {
            SessionState::OutOfWindow
        } else if self.daily_count >= self.daily_cap {
            SessionState::CapReached
        } else {
            SessionState::Trading
        }
    }

    /// Count one confirmed forward swap
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.roll_over(now);
        self.daily_count = self.daily_count.saturating_add(1);
    }

    pub fn daily_count(&self) -> u32 {
        self.daily_count
    }

    pub fn daily_cap(&self) -> u32 {
        self.daily_cap
    }

    pub fn window(&self) -> TradingWindow {
        self.window
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn last_reset_date(&self) -> NaiveDate {
        self.last_reset_date
    }

    /// Short `count/cap` status
    pub fn status(&self) -> String {
        format!("{}/{}", self.daily_count, self.daily_cap)
    }
}

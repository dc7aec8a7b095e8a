//! Pacing: when, how much, and under which identity to swap

pub mod clock;
pub mod randomization;
pub mod scheduler;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use randomization::Randomizer;
pub use scheduler::{RoundOutcome, RoundStats, ScheduleLoop};
pub use session::{SessionState, TradingSession, TradingWindow};

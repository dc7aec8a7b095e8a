//! Swap Pacer Library
//!
//! Paced token swaps across a pool of wallet identities, each with its own
//! network route, resolved through a chain of swap aggregators.

pub mod cli;
pub mod config;
pub mod error;
pub mod pacing;
pub mod trading;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};

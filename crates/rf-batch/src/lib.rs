//! rf-batch: per-cell chemistry integration for flow-solver coupling.
//!
//! Contains:
//! - cell (cell states, outcomes and per-cell status)
//! - config (batch configuration)
//! - scheduler (data-parallel execution, async submission)

pub mod cell;
pub mod config;
pub mod error;
pub mod scheduler;

pub use cell::{CellOutcome, CellState, CellStatus};
pub use config::{BatchConfig, CellReactor};
pub use error::{BatchError, BatchResult};
pub use scheduler::{BatchReport, BatchScheduler, PendingBatch};

//! File formats the controller exchanges with the MD engine and its users.
//!
//! - [`columns`] reads the fixed-column observable files written by the engine.
//! - [`dump`] post-processes text snapshot trajectories.
//! - [`report`] serializes the final per-kernel YAML report.

pub mod columns;
pub mod dump;
pub mod report;

pub use columns::{ColumnError, ColumnTable};
pub use dump::{DumpError, DumpTrajectory, TrajectoryProcessor};
pub use report::{FreeEnergyReport, ReportAverage, ReportError, ReportInput, ReportResults};

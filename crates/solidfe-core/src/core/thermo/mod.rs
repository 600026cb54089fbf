//! Thermodynamic arithmetic for the switching method.
//!
//! - [`einstein`] provides the analytic reference free energy.
//! - [`work`] integrates the switching records into a reversible work.
//! - [`stats`] holds the small numerical helpers both rely on.

pub mod constants;
pub mod einstein;
pub mod stats;
pub mod work;

use crate::core::io::ColumnError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThermoError {
    #[error("Invalid thermodynamic input: {0}")]
    InvalidInput(String),
    #[error("Failed to read switching records: {0}")]
    Records(#[from] ColumnError),
}

pub use einstein::{EinsteinCrystal, ReferenceFreeEnergy, ReferenceSystem};
pub use work::{HysteresisWork, SwitchingLayout, SwitchingWork, WorkEstimate};

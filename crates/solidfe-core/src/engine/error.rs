use thiserror::Error;

use crate::core::io::{ColumnError, DumpError, ReportError};
use crate::core::lattice::LatticeError;
use crate::core::thermo::ThermoError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "{stage} did not converge after {cycles} window(s): last mean {last_mean:.4}, {criterion}"
    )]
    NonConvergence {
        stage: &'static str,
        cycles: usize,
        last_mean: f64,
        criterion: String,
    },

    #[error(
        "System melted: solid fraction {solid_fraction:.3} is below {tolerance:.3}. Increase the system size or lower the temperature. \
         Solid detection only recognizes BCC/FCC/HCP/SC/DIA structures; set the solid-fraction tolerance to 0 to disable it."
    )]
    Melted { solid_fraction: f64, tolerance: f64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("MD engine error: {0}")]
    Md(String),

    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    #[error("Failed to read observable data: {0}")]
    Data(#[from] ColumnError),

    #[error("Trajectory processing failed: {0}")]
    Trajectory(#[from] DumpError),

    #[error("Lattice preparation failed: {0}")]
    Lattice(#[from] LatticeError),

    #[error("Free energy reduction failed: {0}")]
    Thermo(#[from] ThermoError),

    #[error("Report could not be written: {0}")]
    Report(#[from] ReportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! # Engine Module
//!
//! The stateful layer of the library. It drives an external molecular
//! dynamics engine through the stages of a solid free energy kernel and keeps
//! track of what each stage learns.
//!
//! ## Architecture
//!
//! - **Engine seam** ([`md`], [`lammps`]): the [`md::MdEngine`] trait, the
//!   [`md::EngineSession`] guard that releases an engine on every exit path,
//!   and the LAMMPS process adapter.
//! - **Commands** ([`commands`]): builders for the command strings the
//!   stages issue.
//! - **Coupling** ([`coupling`]): Nose-Hoover and Berendsen
//!   thermostat/barostat couplings behind one trait.
//! - **Convergence** ([`convergence`]): the windowed sampling harness and its
//!   stop rules.
//! - **Melt check** ([`melt`], [`classifier`]): snapshots and the structure
//!   classifier seam.
//! - **Stages** ([`tasks`]): equilibration, pressure and spring constant
//!   convergence, switching and the final reduction.
//! - **Configuration, state and errors** ([`config`], [`state`], [`error`],
//!   [`progress`]).

pub mod classifier;
pub mod commands;
pub mod config;
pub mod context;
pub mod convergence;
pub mod coupling;
pub mod error;
pub mod lammps;
pub mod md;
pub mod melt;
pub mod progress;
pub mod state;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testing;

//! # Core Module
//!
//! Stateless building blocks shared by the engine and the workflows.
//!
//! - **File I/O** ([`io`]): the column files written by the engine, text
//!   trajectory dumps and the YAML free energy report.
//! - **Lattices** ([`lattice`]): the lattice generator seam and the built-in
//!   cubic and hexagonal cells.
//! - **Thermodynamics** ([`thermo`]): physical constants, sample statistics,
//!   the Einstein crystal reference and the switching work integrator.

pub mod io;
pub mod lattice;
pub mod thermo;

//! # solidfe Core Library
//!
//! Free energies of crystalline solids by nonequilibrium thermodynamic
//! integration against an Einstein crystal, computed by driving an external
//! molecular dynamics engine.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same strict three-layer split throughout.
//!
//! - **[`core`]: The Foundation.** Stateless pieces: lattice descriptions,
//!   readers for the observable files the engine writes, the closed-form
//!   reference free energy and the switching work integrator.
//!
//! - **[`engine`]: The Logic Core.** The staged simulation controller. It owns
//!   the engine seam, the thermostat/barostat couplings, the convergence
//!   loops, the melt check and the switching protocol.
//!
//! - **[`workflows`]: The Public API.** Runs one complete calculation kernel,
//!   from the bare lattice to the written report.

pub mod core;
pub mod engine;
pub mod workflows;

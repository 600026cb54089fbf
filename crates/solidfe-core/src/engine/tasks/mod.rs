//! Stages of a solid free energy kernel.
//!
//! Each submodule drives the engine through one stage and records what it
//! learns in the kernel's [`RunState`](crate::engine::state::RunState).
//! [`averaging`] sequences the equilibration stages, [`switching`] runs the
//! two-leg switching protocol and [`reduce`] turns the records into a free
//! energy.

pub mod averaging;
pub mod constrained;
pub mod equilibration;
pub mod pressure;
pub mod reduce;
pub mod spring;
pub mod structure;
pub mod switching;

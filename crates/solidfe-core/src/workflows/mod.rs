//! # Workflows Module
//!
//! Top-level entry points of the library. A workflow assembles the
//! collaborators, runs every stage of a kernel on fresh engines and writes
//! the result.
//!
//! - **Solid Workflow** ([`solid`]) - Free energy of a crystalline solid by
//!   switching between the interacting crystal and an Einstein crystal.

pub mod solid;

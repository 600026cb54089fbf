use crate::core::lattice::LatticeInfo;
use crate::engine::commands;
use crate::engine::config::CalculationSpec;
use crate::engine::error::EngineError;
use crate::engine::md::MdEngine;
use std::path::Path;
use tracing::{info, instrument};

fn preamble(engine: &mut dyn MdEngine, spec: &CalculationSpec) -> Result<(), EngineError> {
    for command in [
        "units metal".to_string(),
        "boundary p p p".to_string(),
        "atom_style atomic".to_string(),
        format!("timestep {}", spec.md.timestep),
    ] {
        engine.execute(&command)?;
    }
    Ok(())
}

fn masses_and_potential(engine: &mut dyn MdEngine, spec: &CalculationSpec) -> Result<(), EngineError> {
    for (species, mass) in spec.masses.iter().enumerate() {
        engine.execute(&format!("mass {} {}", species + 1, mass))?;
    }
    for command in commands::potential(&spec.potential) {
        engine.execute(&command)?;
    }
    Ok(())
}

/// Builds the replicated crystal, sets masses and the potential and defines
/// the box variables sampled during averaging.
#[instrument(skip_all, name = "structure_task")]
pub fn create_lattice(
    engine: &mut dyn MdEngine,
    spec: &CalculationSpec,
    lattice: &LatticeInfo,
) -> Result<(), EngineError> {
    preamble(engine, spec)?;
    let [nx, ny, nz] = spec.repeat;
    for command in [
        format!("lattice {} {}", lattice.lattice, lattice.lattice_constant),
        format!("region box block 0 {} 0 {} 0 {}", nx, ny, nz),
        format!("create_box {} box", spec.n_elements()),
        "create_atoms 1 box".to_string(),
    ] {
        engine.execute(&command)?;
    }
    masses_and_potential(engine, spec)?;
    for command in commands::box_variables() {
        engine.execute(&command)?;
    }
    info!(
        lattice = %lattice.lattice,
        lattice_constant = lattice.lattice_constant,
        repeat = ?spec.repeat,
        "Crystal created."
    );
    Ok(())
}

/// Recreates the system from a single-frame snapshot, keeping atom ids and
/// types.
#[instrument(skip_all, name = "load_snapshot_task")]
pub fn load_snapshot(
    engine: &mut dyn MdEngine,
    spec: &CalculationSpec,
    snapshot: &Path,
) -> Result<(), EngineError> {
    preamble(engine, spec)?;
    for command in [
        "region box block 0 1 0 1 0 1 units box".to_string(),
        format!("create_box {} box", spec.n_elements()),
        format!(
            "read_dump {} 0 x y z vx vy vz box yes add keep",
            snapshot.display()
        ),
    ] {
        engine.execute(&command)?;
    }
    masses_and_potential(engine, spec)
}

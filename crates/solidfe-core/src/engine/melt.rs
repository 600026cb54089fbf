use super::classifier::StructureClassifier;
use super::commands;
use super::error::EngineError;
use super::md::{MdEngine, abort};
use std::path::Path;
use tracing::{error, info, instrument};

pub fn dump_snapshot(engine: &mut dyn MdEngine, path: &Path) -> Result<(), EngineError> {
    for command in commands::dump_snapshot(path) {
        engine.execute(&command)?;
    }
    Ok(())
}

/// Aborts the kernel when too few atoms of `snapshot` are recognized as
/// solid. A tolerance of zero skips the check without consulting the
/// classifier. The ratio is taken against the full atom count.
#[instrument(skip_all, name = "melt_check")]
pub fn check_melted(
    engine: &mut dyn MdEngine,
    classifier: &dyn StructureClassifier,
    snapshot: &Path,
    atom_count: usize,
    tolerance: f64,
) -> Result<(), EngineError> {
    if tolerance == 0.0 {
        info!("Solid fraction check disabled.");
        return Ok(());
    }

    let solid = classifier.solid_count(snapshot)?;
    let solid_fraction = solid as f64 / atom_count as f64;
    if solid_fraction < tolerance {
        error!(
            solid,
            atom_count,
            solid_fraction,
            tolerance,
            "Solid fraction below tolerance, system has melted."
        );
        return Err(abort(
            engine,
            EngineError::Melted {
                solid_fraction,
                tolerance,
            },
        ));
    }

    info!(solid_fraction, "System is still solid.");
    Ok(())
}

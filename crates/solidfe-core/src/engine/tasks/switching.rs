use super::structure;
use crate::core::thermo::work::{backward_file_name, forward_file_name};
use crate::engine::commands;
use crate::engine::context::KernelContext;
use crate::engine::error::EngineError;
use crate::engine::md::{MdEngine, with_fixes};
use crate::engine::state::RunState;
use std::path::PathBuf;
use tracing::{info, instrument};

const INTEGRATOR_FIX: &str = "f1";
const THERMOSTAT_FIX: &str = "f3";
const PRINT_FIX: &str = "f4";

/// Restraint attached before the velocities exist, replaced by the real
/// spring constants once the system is thermalized.
const PLACEHOLDER_SPRING: f64 = 10.0;
const PLACEHOLDER_STEPS: u64 = 100;

/// Steps run under the placeholder restraints right after the velocities
/// are assigned.
pub const STABILIZATION_STEPS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchingFiles {
    pub forward: PathBuf,
    pub backward: PathBuf,
}

fn spring_fix(species: usize) -> String {
    format!("ff{}", species)
}

/// 1-based ids of the species that have atoms.
fn present_species(concentrations: &[f64]) -> Vec<usize> {
    concentrations
        .iter()
        .enumerate()
        .filter(|(_, c)| **c > 0.0)
        .map(|(idx, _)| idx + 1)
        .collect()
}

/// Energy variables sampled by the print fix. Species without atoms carry
/// no restraint and report zero.
fn energy_variables(n_elements: usize, present: &[usize]) -> Vec<String> {
    let mut commands = vec![
        "variable step equal step".to_string(),
        "variable dU1 equal pe/atoms".to_string(),
    ];
    for species in 1..=n_elements {
        let value = if present.contains(&species) {
            format!("f_ff{}/v_count{}", species, species)
        } else {
            "0.0".to_string()
        };
        commands.push(format!("variable dU{} equal {}", species + 1, value));
    }
    if let Some(first) = present.first() {
        commands.push(format!("variable lambda equal f_ff{}[1]", first));
    }
    commands
}

fn leg(
    engine: &mut dyn MdEngine,
    ctx: &KernelContext,
    file: &str,
) -> Result<(), EngineError> {
    let spec = ctx.spec;
    with_fixes(engine, &[PRINT_FIX.to_string()], |e| {
        e.execute(&commands::print_energies(PRINT_FIX, spec.n_elements(), file))?;
        e.run(spec.n_switching_steps)
    })
}

/// Runs one forward and one backward switching leg between the restrained
/// crystal and the interacting one on a fresh engine, recording the energy
/// differences of both legs.
#[instrument(skip_all, name = "switching_task", fields(iteration = iteration))]
pub fn run(
    engine: &mut dyn MdEngine,
    ctx: &KernelContext,
    state: &RunState,
    iteration: usize,
) -> Result<SwitchingFiles, EngineError> {
    let spec = ctx.spec;
    let snapshot = state.snapshot.as_ref().ok_or_else(|| {
        EngineError::Validation("switching needs an equilibrated configuration".to_string())
    })?;
    let ks = state.spring_constants.as_ref().ok_or_else(|| {
        EngineError::Validation("switching needs converged spring constants".to_string())
    })?;
    if ks.len() != spec.n_elements() {
        return Err(EngineError::Validation(format!(
            "{} spring constant(s) for {} element(s)",
            ks.len(),
            spec.n_elements()
        )));
    }
    let present = present_species(ctx.concentrations());
    if present.is_empty() {
        return Err(EngineError::Validation(
            "no species has a positive concentration".to_string(),
        ));
    }

    structure::load_snapshot(engine, spec, snapshot)?;
    engine.execute(&commands::remap_box(state.lx, state.ly, state.lz))?;
    for species in 1..=spec.n_elements() {
        engine.execute(&format!("group g{} type {}", species, species))?;
    }
    for species in &present {
        engine.execute(&format!("variable count{} equal count(g{})", species, species))?;
    }
    engine.run(0)?;

    let mut fixes = vec![THERMOSTAT_FIX.to_string()];
    fixes.extend(present.iter().map(|s| spring_fix(*s)));
    fixes.push(INTEGRATOR_FIX.to_string());

    let forward = forward_file_name(iteration);
    let backward = backward_file_name(iteration);

    with_fixes(engine, &fixes, |e| {
        e.execute(&format!("fix {} all nve", INTEGRATOR_FIX))?;
        for species in &present {
            e.execute(&commands::spring(
                *species,
                PLACEHOLDER_SPRING,
                PLACEHOLDER_STEPS,
                PLACEHOLDER_STEPS,
            ))?;
        }
        e.execute(&format!(
            "fix {} all langevin {} {} {} {} zero yes",
            THERMOSTAT_FIX,
            spec.temperature,
            spec.temperature,
            spec.md.thermostat_damping,
            ctx.next_seed()
        ))?;
        e.execute("compute Tcm all temp/com")?;
        e.execute(&format!("fix_modify {} temp Tcm", THERMOSTAT_FIX))?;
        for command in energy_variables(spec.n_elements(), &present) {
            e.execute(&command)?;
        }
        for command in commands::thermo("step pe c_Tcm", 10000) {
            e.execute(&command)?;
        }

        e.execute(&commands::velocity_create_gaussian(
            spec.temperature,
            ctx.next_seed(),
        ))?;
        e.run(STABILIZATION_STEPS)?;

        for species in &present {
            e.execute(&commands::spring(
                *species,
                ks[species - 1],
                spec.n_switching_steps,
                spec.n_equilibration_steps,
            ))?;
        }

        e.run(spec.n_equilibration_steps)?;
        leg(e, ctx, &forward)?;
        info!(iteration, "Forward switching finished.");

        e.run(spec.n_equilibration_steps)?;
        leg(e, ctx, &backward)?;
        info!(iteration, "Backward switching finished.");
        Ok(())
    })?;

    Ok(SwitchingFiles {
        forward: ctx.path(&forward),
        backward: ctx.path(&backward),
    })
}

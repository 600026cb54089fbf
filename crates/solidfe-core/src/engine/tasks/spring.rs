use crate::core::io::ColumnTable;
use crate::core::thermo::constants::KB_EV;
use crate::core::thermo::stats::{mean, round_to, std_dev};
use crate::engine::commands::{self, MSD_FILE};
use crate::engine::config::SpringConstantOverride;
use crate::engine::context::KernelContext;
use crate::engine::convergence::{self, ConvergenceSample, StdPlateau, Window};
use crate::engine::error::EngineError;
use crate::engine::md::{MdEngine, with_fixes};
use crate::engine::state::RunState;
use std::path::Path;
use tracing::{error, info, instrument};

const THERMOSTAT_FIX: &str = "3";
const MSD_FIX: &str = "4";

fn spring_series(table: &ColumnTable, column: usize, temperature: f64) -> Result<Vec<f64>, EngineError> {
    Ok(table
        .column(column)?
        .iter()
        .map(|msd| 3.0 * KB_EV * temperature / msd)
        .collect())
}

/// Spring constant statistics of the whole system over the window tail.
pub fn sample_msd(
    path: &Path,
    window: &Window,
    temperature: f64,
) -> Result<ConvergenceSample<()>, EngineError> {
    let table = ColumnTable::read(path)?;
    let ks = spring_series(&window.tail(&table), 1, temperature)?;
    Ok(ConvergenceSample {
        mean: mean(&ks),
        std: std_dev(&ks),
        side: (),
    })
}

/// Per-species spring constants in eV/Å², rounded to 1e-2. Species with no
/// atoms take the whole-system value.
pub fn per_species(
    path: &Path,
    window: &Window,
    temperature: f64,
    concentrations: &[f64],
) -> Result<Vec<f64>, EngineError> {
    let tail = window.tail(&ColumnTable::read(path)?);
    let whole = round_to(mean(&spring_series(&tail, 1, temperature)?), 2);
    concentrations
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            if *c > 0.0 {
                Ok(round_to(mean(&spring_series(&tail, idx + 2, temperature)?), 2))
            } else {
                Ok(whole)
            }
        })
        .collect()
}

/// Replaces computed values by the user-supplied ones where those are set.
pub fn merge_overrides(
    computed: Vec<f64>,
    overrides: Option<&[SpringConstantOverride]>,
) -> Result<Vec<f64>, EngineError> {
    let Some(overrides) = overrides else {
        return Ok(computed);
    };
    check_length(overrides.len(), computed.len())?;
    Ok(computed
        .into_iter()
        .zip(overrides)
        .map(|(k, user)| user.unwrap_or(k))
        .collect())
}

fn check_length(given: usize, n_elements: usize) -> Result<(), EngineError> {
    if given != n_elements {
        error!(given, n_elements, "Spring constant count does not match element count.");
        return Err(EngineError::Validation(format!(
            "{} spring constant(s) given for {} element(s)",
            given, n_elements
        )));
    }
    Ok(())
}

pub fn validate_spring_constants(ks: &[f64]) -> Result<(), EngineError> {
    for (idx, k) in ks.iter().enumerate() {
        if !k.is_finite() || *k <= 0.0 {
            error!(species = idx + 1, spring_constant = k, "Invalid spring constant.");
            return Err(EngineError::Validation(format!(
                "spring constant of species {} must be positive and finite, got {}",
                idx + 1,
                k
            )));
        }
    }
    Ok(())
}

/// Derives per-species spring constants from the mean-squared displacement
/// under a thermostat, sampling until the spread of the whole-system value
/// settles. A complete user-supplied set skips sampling after one window.
#[instrument(skip_all, name = "spring_constant_task")]
pub fn run(
    engine: &mut dyn MdEngine,
    ctx: &KernelContext,
    state: &mut RunState,
) -> Result<(), EngineError> {
    let spec = ctx.spec;
    let window = Window::from_settings(&spec.md);
    let path = ctx.path(MSD_FILE);
    let fixes = vec![THERMOSTAT_FIX.to_string(), MSD_FIX.to_string()];

    let ks = with_fixes(engine, &fixes, |e| {
        e.execute(&commands::nvt(
            THERMOSTAT_FIX,
            spec.temperature,
            spec.md.thermostat_damping,
        ))?;
        for command in commands::mean_squared_displacement(MSD_FIX, &spec.md, spec.n_elements()) {
            e.execute(&command)?;
        }

        if let Some(ks) = spec.complete_spring_constants() {
            check_length(ks.len(), spec.n_elements())?;
            e.run(spec.md.n_small_steps)?;
            info!(spring_constants = ?ks, "Using user-supplied spring constants.");
            return Ok(ks);
        }

        let mut rule = StdPlateau::new(spec.tolerance.spring_constant);
        let converged = convergence::converge(
            e,
            "spring constant convergence",
            &window,
            spec.md.n_cycles,
            ctx.reporter,
            |_| sample_msd(&path, &window, spec.temperature),
            &mut rule,
        )?;
        let computed = per_species(&path, &window, spec.temperature, ctx.concentrations())?;
        let ks = merge_overrides(computed, spec.spring_constants.as_deref())?;
        validate_spring_constants(&ks)?;
        info!(
            cycles = converged.cycles,
            spring_constants = ?ks,
            "Spring constants converged."
        );
        Ok(ks)
    })?;

    state.spring_constants = Some(ks);
    Ok(())
}

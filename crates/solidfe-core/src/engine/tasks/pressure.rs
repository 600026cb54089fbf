use crate::core::io::ColumnTable;
use crate::core::thermo::stats::{mean, round_to, std_dev};
use crate::engine::commands::{self, AVERAGE_FILE};
use crate::engine::context::KernelContext;
use crate::engine::convergence::{self, ConvergenceSample, FixedTarget, Window};
use crate::engine::coupling::{self, CouplingRamp};
use crate::engine::error::EngineError;
use crate::engine::md::{MdEngine, with_fixes};
use crate::engine::state::RunState;
use std::path::Path;
use tracing::{info, instrument};

const AVERAGE_FIX: &str = "2";

/// Box geometry averaged over the tail of the latest window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxAverage {
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pub volume_per_atom: f64,
}

/// Reads the averaging file. Pressure statistics cover every row written so
/// far; box edges (rounded to 1e-3 Å) and volume per atom cover the window
/// tail only.
pub fn sample_box(
    path: &Path,
    window: &Window,
    atom_count: usize,
) -> Result<ConvergenceSample<BoxAverage>, EngineError> {
    let table = ColumnTable::read(path)?;
    let pressure = table.column(4)?;

    let tail = window.tail(&table);
    let (lx, ly, lz) = (tail.column(1)?, tail.column(2)?, tail.column(3)?);
    let volumes: Vec<f64> = lx
        .iter()
        .zip(&ly)
        .zip(&lz)
        .map(|((x, y), z)| x * y * z / atom_count as f64)
        .collect();

    Ok(ConvergenceSample {
        mean: mean(&pressure),
        std: std_dev(&pressure),
        side: BoxAverage {
            lx: round_to(mean(&lx), 3),
            ly: round_to(mean(&ly), 3),
            lz: round_to(mean(&lz), 3),
            volume_per_atom: mean(&volumes),
        },
    })
}

pub(crate) fn record_box(state: &mut RunState, average: &BoxAverage) {
    state.apply_box(average.lx, average.ly, average.lz, average.volume_per_atom);
}

pub(crate) fn start_averaging(engine: &mut dyn MdEngine, ctx: &KernelContext) -> Result<(), EngineError> {
    engine.execute(&commands::average_box(AVERAGE_FIX, &ctx.spec.md))
}

pub(crate) fn average_fix() -> Vec<String> {
    vec![AVERAGE_FIX.to_string()]
}

/// Keeps the equilibration coupling attached and samples windows until the
/// mean pressure is within tolerance of the target, then records the
/// averaged box.
#[instrument(skip_all, name = "pressure_convergence_task")]
pub fn run(
    engine: &mut dyn MdEngine,
    ctx: &KernelContext,
    state: &mut RunState,
) -> Result<(), EngineError> {
    let spec = ctx.spec;
    let window = Window::from_settings(&spec.md);
    let path = ctx.path(AVERAGE_FILE);
    let atom_count = state.atom_count;
    let mut rule = FixedTarget {
        target: state.pressure,
        tolerance: spec.tolerance.pressure,
    };

    let coupling = coupling::for_family(spec.md.coupling, ctx.coupling_targets(state.pressure));
    let converged = coupling::with_coupling(coupling.as_ref(), engine, &CouplingRamp::FULL, |e| {
        with_fixes(e, &average_fix(), |e| {
            start_averaging(e, ctx)?;
            convergence::converge(
                e,
                "pressure convergence",
                &window,
                spec.md.n_cycles,
                ctx.reporter,
                |_| sample_box(&path, &window, atom_count),
                &mut rule,
            )
        })
    })?;

    record_box(state, &converged.sample.side);
    info!(
        cycles = converged.cycles,
        pressure = converged.sample.mean,
        volume_per_atom = state.volume_per_atom,
        lx = state.lx,
        ly = state.ly,
        lz = state.lz,
        "Pressure converged."
    );
    Ok(())
}

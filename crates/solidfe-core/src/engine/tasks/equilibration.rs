use crate::engine::commands;
use crate::engine::context::KernelContext;
use crate::engine::coupling::{self, CouplingRamp};
use crate::engine::error::EngineError;
use crate::engine::md::MdEngine;
use tracing::{info, instrument};

/// Interval of the thermodynamic output during every equilibration stage.
pub(crate) const THERMO_EVERY: u64 = 10;

/// Temperature factors of the finite-pressure sub-cycles. The pressure is
/// held at its full target throughout.
pub const FINITE_PRESSURE_RAMP: [(f64, f64); 3] = [(0.25, 0.5), (0.5, 1.0), (1.0, 1.0)];

pub(crate) fn start_thermo(engine: &mut dyn MdEngine, style: &str) -> Result<(), EngineError> {
    for command in commands::thermo(style, THERMO_EVERY) {
        engine.execute(&command)?;
    }
    Ok(())
}

/// A single coupled window at full temperature and zero pressure.
#[instrument(skip_all, name = "zero_pressure_equilibration_task")]
pub fn run_zero_pressure(engine: &mut dyn MdEngine, ctx: &KernelContext) -> Result<(), EngineError> {
    let spec = ctx.spec;
    engine.execute(&commands::velocity_create(
        spec.temperature,
        ctx.next_seed(),
    ))?;

    let coupling = coupling::for_family(spec.md.coupling, ctx.coupling_targets(spec.pressure));
    coupling::with_coupling(coupling.as_ref(), engine, &CouplingRamp::FULL, |e| {
        start_thermo(e, "step pe press vol etotal temp lx ly lz")?;
        e.run(spec.md.n_small_steps)
    })?;

    info!("Zero pressure equilibration finished.");
    Ok(())
}

/// Heats from a quarter of the target temperature over three coupled
/// windows, each at the full target pressure.
#[instrument(skip_all, name = "finite_pressure_equilibration_task")]
pub fn run_finite_pressure(
    engine: &mut dyn MdEngine,
    ctx: &KernelContext,
) -> Result<(), EngineError> {
    let spec = ctx.spec;
    let (first_factor, _) = FINITE_PRESSURE_RAMP[0];
    engine.execute(&commands::velocity_create(
        first_factor * spec.temperature,
        ctx.next_seed(),
    ))?;

    let coupling = coupling::for_family(spec.md.coupling, ctx.coupling_targets(spec.pressure));
    for (idx, (start, end)) in FINITE_PRESSURE_RAMP.iter().enumerate() {
        let ramp = CouplingRamp::temperature(*start, *end);
        coupling::with_coupling(coupling.as_ref(), engine, &ramp, |e| {
            if idx == 0 {
                start_thermo(e, "step pe press vol etotal temp")?;
            }
            e.run(spec.md.n_small_steps)
        })?;
        info!(cycle = idx + 1, start, end, "Temperature ramp cycle finished.");
    }
    Ok(())
}

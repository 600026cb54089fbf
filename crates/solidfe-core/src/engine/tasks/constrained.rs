use super::equilibration::start_thermo;
use super::pressure::{average_fix, record_box, sample_box, start_averaging};
use crate::engine::commands::{self, AVERAGE_FILE};
use crate::engine::context::KernelContext;
use crate::engine::convergence::{self, ConsecutiveMean, Window};
use crate::engine::error::EngineError;
use crate::engine::md::{MdEngine, with_fixes};
use crate::engine::state::RunState;
use tracing::{info, instrument};

const THERMOSTAT_FIX: &str = "1";

/// Holds the lattice fixed under a thermostat and measures the pressure it
/// produces. Sampling stops once two consecutive running means agree; the
/// measured mean then replaces the target pressure for the rest of the
/// kernel.
#[instrument(skip_all, name = "constrained_pressure_task")]
pub fn run(
    engine: &mut dyn MdEngine,
    ctx: &KernelContext,
    state: &mut RunState,
) -> Result<(), EngineError> {
    let spec = ctx.spec;
    let window = Window::from_settings(&spec.md);
    let path = ctx.path(AVERAGE_FILE);
    let atom_count = state.atom_count;
    let mut rule = ConsecutiveMean::new(spec.tolerance.pressure);

    let mut fixes = vec![THERMOSTAT_FIX.to_string()];
    fixes.extend(average_fix());

    let converged = with_fixes(engine, &fixes, |e| {
        e.execute(&commands::nvt(
            THERMOSTAT_FIX,
            spec.temperature,
            spec.md.thermostat_damping,
        ))?;
        e.execute(&commands::velocity_create(spec.temperature, ctx.next_seed()))?;
        start_thermo(e, "step pe press vol etotal temp lx ly lz")?;
        start_averaging(e, ctx)?;
        convergence::converge(
            e,
            "constrained pressure convergence",
            &window,
            spec.md.n_cycles,
            ctx.reporter,
            |_| sample_box(&path, &window, atom_count),
            &mut rule,
        )
    })?;

    state.pressure = converged.sample.mean;
    record_box(state, &converged.sample.side);
    info!(
        cycles = converged.cycles,
        pressure = state.pressure,
        volume_per_atom = state.volume_per_atom,
        "Pressure of the fixed lattice measured."
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::tests::builder;
    use crate::engine::tasks::equilibration::THERMO_EVERY;
    use crate::engine::testing::{Fixture, Script};

    #[test]
    fn measured_pressure_replaces_the_target() {
        let fixture = Fixture::new(builder().fix_lattice(true).build().unwrap());
        let script = Script {
            pressures: vec![100.0],
            ..Script::default()
        };
        let (mut engine, log) = fixture.engine(script);
        let mut state = RunState::new(fixture.atom_count(), 0.0);

        run(&mut engine, &fixture.context(), &mut state).unwrap();

        assert!((state.pressure - 100.0).abs() < 1e-9);
        assert_eq!(state.lx, 18.0);
        let log = log.lock().unwrap();
        assert_eq!(log.runs, vec![1000, 1000]);
        assert!(log.active_fixes.is_empty());
        assert!(log.commands[0].starts_with("fix 1 all nvt temp 500 500 0.1"));
        assert!(log.commands.contains(&format!("thermo {}", THERMO_EVERY)));
    }

    #[test]
    fn fixes_are_released_when_the_mean_keeps_drifting() {
        let fixture = Fixture::new(builder().fix_lattice(true).build().unwrap());
        let script = Script {
            pressures: vec![0.0, 100.0, 1000.0, 10000.0, 100000.0],
            ..Script::default()
        };
        let (mut engine, log) = fixture.engine(script);
        let mut state = RunState::new(fixture.atom_count(), 0.0);

        let result = run(&mut engine, &fixture.context(), &mut state);

        assert!(matches!(result, Err(EngineError::NonConvergence { cycles: 5, .. })));
        assert_eq!(state.pressure, 0.0);
        let log = log.lock().unwrap();
        assert!(log.active_fixes.is_empty());
        assert_eq!(log.detached, 2);
    }
}

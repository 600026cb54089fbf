use crate::core::thermo::constants::{BAR_PER_GPA, GPA_PER_EV_A3};
use crate::core::thermo::{ReferenceFreeEnergy, ReferenceSystem, SwitchingLayout, SwitchingWork};
use crate::engine::context::KernelContext;
use crate::engine::error::EngineError;
use crate::engine::state::{FreeEnergyTerms, RunState};
use tracing::{info, instrument};

/// Pressure-volume term per atom in eV, with `pressure` in bar and `volume`
/// in Å³. Exactly zero at zero pressure.
pub fn pv_correction(pressure: f64, volume: f64, atom_count: usize) -> f64 {
    if pressure == 0.0 {
        return 0.0;
    }
    let pressure = pressure / (BAR_PER_GPA * GPA_PER_EV_A3);
    pressure * volume / atom_count as f64
}

/// Combines the reference free energy, the switching work and the
/// pressure-volume term into the free energy per atom, and stores every
/// term on `state`.
#[instrument(skip_all, name = "reduce_task")]
pub fn run(
    ctx: &KernelContext,
    state: &mut RunState,
    reference: &dyn ReferenceFreeEnergy,
    work: &dyn SwitchingWork,
) -> Result<FreeEnergyTerms, EngineError> {
    let spec = ctx.spec;
    let spring_constants = state.spring_constants.as_deref().ok_or_else(|| {
        EngineError::Validation("free energy needs converged spring constants".to_string())
    })?;

    let reference_value = reference.free_energy(&ReferenceSystem {
        temperature: spec.temperature,
        atom_count: state.atom_count,
        masses: &spec.masses,
        volume: state.volume,
        spring_constants,
        concentrations: ctx.concentrations(),
    })?;
    let estimate = work.work(&SwitchingLayout {
        folder: ctx.workdir,
        concentrations: ctx.concentrations(),
        n_iterations: spec.n_iterations,
    })?;
    let pv = pv_correction(state.pressure, state.volume, state.atom_count);

    let terms = FreeEnergyTerms {
        reference: reference_value,
        work: estimate.work,
        dissipation: estimate.dissipation,
        error: estimate.error,
        pv,
        free_energy: reference_value + estimate.work + pv,
    };
    info!(
        free_energy = terms.free_energy,
        error = terms.error,
        reference = terms.reference,
        work = terms.work,
        pv = terms.pv,
        "Free energy reduced."
    );
    state.terms = terms;
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thermo::{ThermoError, WorkEstimate};
    use crate::engine::config::tests::builder;
    use crate::engine::testing::Fixture;

    struct FixedReference(f64);

    impl ReferenceFreeEnergy for FixedReference {
        fn free_energy(&self, _system: &ReferenceSystem) -> Result<f64, ThermoError> {
            Ok(self.0)
        }
    }

    struct FixedWork(WorkEstimate);

    impl SwitchingWork for FixedWork {
        fn work(&self, _layout: &SwitchingLayout) -> Result<WorkEstimate, ThermoError> {
            Ok(self.0)
        }
    }

    fn converged_state(fixture: &Fixture, pressure: f64) -> RunState {
        let mut state = RunState::new(fixture.atom_count(), pressure);
        state.apply_box(18.0, 18.0, 18.0, 18.0f64.powi(3) / 500.0);
        state.spring_constants = Some(vec![1.5]);
        state
    }

    #[test]
    fn free_energy_is_the_exact_sum_of_its_terms() {
        let fixture = Fixture::new(builder().pressure(10000.0).build().unwrap());
        let mut state = converged_state(&fixture, 10000.0);
        let work = FixedWork(WorkEstimate {
            work: -0.75,
            dissipation: 0.01,
            error: 0.002,
        });

        let terms = run(&fixture.context(), &mut state, &FixedReference(-3.25), &work).unwrap();

        let pv = pv_correction(10000.0, state.volume, 500);
        assert_eq!(terms.free_energy, -3.25 + -0.75 + pv);
        assert_eq!(terms.error, 0.002);
        assert_eq!(terms.dissipation, 0.01);
        assert_eq!(state.terms, terms);
    }

    #[test]
    fn zero_pressure_gives_exactly_zero_pv() {
        assert_eq!(pv_correction(0.0, 1000.0, 10), 0.0);
    }

    #[test]
    fn pv_converts_bar_times_cubic_angstrom_to_ev() {
        let pv = pv_correction(1.0e4, 11.664 * 500.0, 500);
        assert!((pv - 11.664 / 160.21766208).abs() < 1e-12);
    }

    #[test]
    fn reduction_without_spring_constants_is_rejected() {
        let fixture = Fixture::new(builder().build().unwrap());
        let mut state = RunState::new(fixture.atom_count(), 0.0);
        let work = FixedWork(WorkEstimate {
            work: 0.0,
            dissipation: 0.0,
            error: 0.0,
        });

        let result = run(&fixture.context(), &mut state, &FixedReference(0.0), &work);

        assert!(matches!(result, Err(EngineError::Validation(_))));
    }
}

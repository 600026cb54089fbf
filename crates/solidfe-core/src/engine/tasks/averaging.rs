use super::{constrained, equilibration, pressure, spring, structure};
use crate::engine::config::CalculationSpec;
use crate::engine::context::KernelContext;
use crate::engine::error::EngineError;
use crate::engine::md::{EngineSession, MdEngine};
use crate::engine::melt;
use crate::engine::state::RunState;
use tracing::{error, info, instrument};

pub const STAGE1_SNAPSHOT: &str = "traj.equilibration_stage1.dat";
pub const STAGE2_SNAPSHOT: &str = "traj.equilibration_stage2.dat";
/// Configuration handed to the switching stage.
pub const EQUILIBRATED_CONFIGURATION: &str = "conf.equilibration.dump";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AveragingStage {
    Init,
    RegimeSelect,
    ZeroPressureEq,
    FinitePressureEq,
    ConstrainedLatticeEq,
    PressureConverged,
    PostEqMeltCheck,
    SpringConverged,
    PostSpringMeltCheck,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    ZeroPressure,
    FinitePressure,
    ConstrainedLattice,
}

impl Regime {
    fn stage(self) -> AveragingStage {
        match self {
            Regime::ZeroPressure => AveragingStage::ZeroPressureEq,
            Regime::FinitePressure => AveragingStage::FinitePressureEq,
            Regime::ConstrainedLattice => AveragingStage::ConstrainedLatticeEq,
        }
    }
}

/// A fixed lattice wins over the pressure; otherwise an exactly zero target
/// pressure needs no temperature ramp.
pub fn select_regime(spec: &CalculationSpec) -> Regime {
    if spec.fix_lattice {
        Regime::ConstrainedLattice
    } else if spec.pressure == 0.0 {
        Regime::ZeroPressure
    } else {
        Regime::FinitePressure
    }
}

/// Drives a freshly launched engine from the bare crystal to an
/// equilibrated configuration with converged box and spring constants.
#[derive(Debug, Default)]
pub struct Averaging {
    stages: Vec<AveragingStage>,
}

impl Averaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages entered so far, in order.
    pub fn stages(&self) -> &[AveragingStage] {
        &self.stages
    }

    fn enter(&mut self, stage: AveragingStage) {
        info!(stage = ?stage, "Entering averaging stage.");
        self.stages.push(stage);
    }

    /// Runs every stage on the session's engine. On success the engine is
    /// closed and the last snapshot becomes the equilibrated configuration
    /// recorded on `state`. On failure the session is dropped, which closes
    /// the engine.
    #[instrument(skip_all, name = "averaging_task")]
    pub fn run(
        &mut self,
        mut session: EngineSession,
        ctx: &KernelContext,
        state: &mut RunState,
    ) -> Result<(), EngineError> {
        if let Err(e) = self.equilibrate(session.engine(), ctx, state) {
            error!(error = %e, after = ?self.stages.last(), "Averaging aborted.");
            self.enter(AveragingStage::Aborted);
            return Err(e);
        }

        session.close()?;
        let output = ctx.path(EQUILIBRATED_CONFIGURATION);
        ctx.trajectory.finalize(&ctx.path(STAGE2_SNAPSHOT), &output)?;
        state.snapshot = Some(output);
        self.enter(AveragingStage::Done);
        Ok(())
    }

    fn equilibrate(
        &mut self,
        engine: &mut dyn MdEngine,
        ctx: &KernelContext,
        state: &mut RunState,
    ) -> Result<(), EngineError> {
        let spec = ctx.spec;
        self.enter(AveragingStage::Init);
        structure::create_lattice(engine, spec, ctx.lattice)?;

        self.enter(AveragingStage::RegimeSelect);
        let regime = select_regime(spec);
        self.enter(regime.stage());
        match regime {
            Regime::ZeroPressure => {
                equilibration::run_zero_pressure(engine, ctx)?;
                pressure::run(engine, ctx, state)?;
            }
            Regime::FinitePressure => {
                equilibration::run_finite_pressure(engine, ctx)?;
                pressure::run(engine, ctx, state)?;
            }
            Regime::ConstrainedLattice => constrained::run(engine, ctx, state)?,
        }
        self.enter(AveragingStage::PressureConverged);

        // A fixed lattice goes straight on to the spring constants.
        if regime != Regime::ConstrainedLattice {
            self.enter(AveragingStage::PostEqMeltCheck);
            self.melt_check(engine, ctx, state, STAGE1_SNAPSHOT)?;
        }

        spring::run(engine, ctx, state)?;
        self.enter(AveragingStage::SpringConverged);

        self.enter(AveragingStage::PostSpringMeltCheck);
        self.melt_check(engine, ctx, state, STAGE2_SNAPSHOT)
    }

    fn melt_check(
        &self,
        engine: &mut dyn MdEngine,
        ctx: &KernelContext,
        state: &RunState,
        snapshot: &str,
    ) -> Result<(), EngineError> {
        let path = ctx.path(snapshot);
        melt::dump_snapshot(engine, &path)?;
        melt::check_melted(
            engine,
            ctx.classifier,
            &path,
            state.atom_count,
            ctx.spec.tolerance.solid_fraction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::ColumnTable;
    use crate::engine::config::tests::builder;
    use crate::engine::testing::{EngineLog, Fixture, Script};
    use AveragingStage::*;

    type Outcome = (Averaging, Result<(), EngineError>, RunState, EngineLog);

    fn run_with(fixture: &Fixture, script: Script) -> Outcome {
        let (engine, log) = fixture.engine(script);
        let session = EngineSession::new(Box::new(engine));
        let mut state = RunState::new(fixture.atom_count(), fixture.spec.pressure);
        let mut averaging = Averaging::new();
        let result = averaging.run(session, &fixture.context(), &mut state);
        let log = log.lock().unwrap().clone();
        (averaging, result, state, log)
    }

    #[test]
    fn regime_prefers_fixed_lattice_over_pressure() {
        let spec = builder().fix_lattice(true).build().unwrap();
        assert_eq!(select_regime(&spec), Regime::ConstrainedLattice);
        let spec = builder().pressure(0.0).build().unwrap();
        assert_eq!(select_regime(&spec), Regime::ZeroPressure);
        let spec = builder().pressure(1.0).build().unwrap();
        assert_eq!(select_regime(&spec), Regime::FinitePressure);
    }

    #[test]
    fn zero_pressure_path_visits_every_stage_and_hands_off_a_snapshot() {
        let fixture = Fixture::new(builder().build().unwrap());

        let (averaging, result, state, log) = run_with(&fixture, Script::default());

        result.unwrap();
        assert_eq!(
            averaging.stages(),
            &[
                Init,
                RegimeSelect,
                ZeroPressureEq,
                PressureConverged,
                PostEqMeltCheck,
                SpringConverged,
                PostSpringMeltCheck,
                Done
            ]
        );
        assert_eq!(log.closed, 1);
        assert_eq!(fixture.classifier.calls(), 2);
        let snapshot = state.snapshot.unwrap();
        assert!(snapshot.ends_with(EQUILIBRATED_CONFIGURATION));
        let content = std::fs::read_to_string(&snapshot).unwrap();
        assert!(content.starts_with("ITEM: TIMESTEP\n0\n"));
        assert!(!fixture.dir.path().join(STAGE2_SNAPSHOT).exists());
        assert!(state.spring_constants.is_some());
    }

    #[test]
    fn user_spring_constants_need_one_confirmatory_window() {
        let spec = builder()
            .elements(vec!["Cu".into(), "Ni".into()])
            .masses(vec![63.546, 58.693])
            .spring_constants(vec![Some(2.0), Some(3.0)])
            .build()
            .unwrap();
        let fixture = Fixture::new(spec);

        let (averaging, result, state, log) = run_with(&fixture, Script::default());

        result.unwrap();
        assert_eq!(
            averaging.stages(),
            &[
                Init,
                RegimeSelect,
                ZeroPressureEq,
                PressureConverged,
                PostEqMeltCheck,
                SpringConverged,
                PostSpringMeltCheck,
                Done
            ]
        );
        // Equilibration, one pressure window, a snapshot, the single
        // spring window and the final snapshot.
        assert_eq!(log.runs, vec![1000, 1000, 0, 1000, 0]);
        assert_eq!(fixture.classifier.calls(), 2);
        assert_eq!(state.spring_constants, Some(vec![2.0, 3.0]));
        assert!(log.active_fixes.is_empty());
    }

    #[test]
    fn constrained_path_skips_the_first_melt_check() {
        let fixture = Fixture::new(builder().fix_lattice(true).build().unwrap());

        let (averaging, result, state, _log) = run_with(&fixture, Script::default());

        result.unwrap();
        assert!(averaging.stages().contains(&ConstrainedLatticeEq));
        assert!(!averaging.stages().contains(&PostEqMeltCheck));
        assert_eq!(fixture.classifier.calls(), 1);
        assert_eq!(state.pressure, 0.0);
    }

    #[test]
    fn finite_pressure_path_ramps_before_converging() {
        let fixture = Fixture::new(builder().pressure(10000.0).build().unwrap());
        let script = Script {
            pressures: vec![10000.0],
            ..Script::default()
        };

        let (averaging, result, _state, log) = run_with(&fixture, script);

        result.unwrap();
        assert_eq!(averaging.stages()[2], FinitePressureEq);
        assert_eq!(&log.runs[..4], &[1000, 1000, 1000, 1000]);
        let avg = ColumnTable::read(&fixture.dir.path().join("avg.dat")).unwrap();
        assert_eq!(avg.len(), 10);
    }

    #[test]
    fn melted_system_aborts_and_closes_the_engine() {
        let fixture = Fixture::with_solid_count(builder().build().unwrap(), 10);

        let (averaging, result, state, log) = run_with(&fixture, Script::default());

        assert!(matches!(result, Err(EngineError::Melted { .. })));
        assert_eq!(averaging.stages().last(), Some(&Aborted));
        assert!(!averaging.stages().contains(&SpringConverged));
        assert!(log.closed >= 1);
        assert!(state.snapshot.is_none());
        assert!(!fixture.dir.path().join(EQUILIBRATED_CONFIGURATION).exists());
    }

    #[test]
    fn non_convergence_aborts_and_the_session_closes_the_engine() {
        let fixture = Fixture::new(builder().build().unwrap());
        let script = Script {
            pressures: vec![5000.0],
            ..Script::default()
        };

        let (averaging, result, _state, log) = run_with(&fixture, script);

        assert!(matches!(result, Err(EngineError::NonConvergence { .. })));
        assert_eq!(averaging.stages().last(), Some(&Aborted));
        assert_eq!(log.closed, 1);
        assert!(log.active_fixes.is_empty());
    }
}

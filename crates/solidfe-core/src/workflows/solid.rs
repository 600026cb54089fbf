use crate::core::io::report::join_values;
use crate::core::io::{FreeEnergyReport, ReportAverage, ReportInput, ReportResults, TrajectoryProcessor};
use crate::core::lattice::{LatticeGenerator, LatticeInfo, LatticeRequest};
use crate::core::thermo::{ReferenceFreeEnergy, SwitchingWork};
use crate::engine::classifier::StructureClassifier;
use crate::engine::config::CalculationSpec;
use crate::engine::context::KernelContext;
use crate::engine::error::EngineError;
use crate::engine::md::{EngineFactory, EngineSession};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{FreeEnergyTerms, RunState};
use crate::engine::tasks::averaging::{Averaging, AveragingStage};
use crate::engine::tasks::{reduce, switching};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

pub const REPORT_FILE: &str = "report.yaml";

/// The external pieces a kernel is assembled from.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub engine: &'a dyn EngineFactory,
    pub lattice: &'a dyn LatticeGenerator,
    pub classifier: &'a dyn StructureClassifier,
    pub trajectory: &'a dyn TrajectoryProcessor,
    pub reference: &'a dyn ReferenceFreeEnergy,
    pub work: &'a dyn SwitchingWork,
}

#[derive(Debug, Clone)]
pub struct SolidResult {
    pub report: FreeEnergyReport,
    pub report_path: PathBuf,
    pub terms: FreeEnergyTerms,
    pub stages: Vec<AveragingStage>,
}

/// Computes the free energy of one solid at the temperature and pressure of
/// `spec`, working in `workdir`. The report is written only when every stage
/// succeeds; intermediate files stay in `workdir` for inspection.
#[instrument(skip_all, name = "solid_workflow")]
pub fn run(
    spec: &CalculationSpec,
    workdir: &Path,
    collaborators: &Collaborators,
    reporter: &ProgressReporter,
) -> Result<SolidResult, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    fs::create_dir_all(workdir)?;
    let lattice = collaborators.lattice.prepare(&LatticeRequest {
        lattice: &spec.lattice,
        lattice_constant: spec.lattice_constant,
        n_elements: spec.n_elements(),
    })?;
    let atom_count = lattice.atom_count(spec.repeat);
    let ctx = KernelContext::new(
        spec,
        &lattice,
        workdir,
        collaborators.classifier,
        collaborators.trajectory,
        reporter,
    );
    let mut state = RunState::new(atom_count, spec.pressure);
    info!(
        lattice = %lattice.lattice,
        atom_count,
        temperature = spec.temperature,
        pressure = spec.pressure,
        "Kernel prepared."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Equilibration and averaging ===
    reporter.report(Progress::PhaseStart {
        name: "Averaging",
    });
    let session = EngineSession::launch(collaborators.engine, workdir)?;
    let mut averaging = Averaging::new();
    averaging.run(session, &ctx, &mut state)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Switching, one fresh engine per iteration ===
    reporter.report(Progress::PhaseStart {
        name: "Switching",
    });
    reporter.report(Progress::TaskStart {
        total_steps: spec.n_iterations as u64,
    });
    for iteration in 1..=spec.n_iterations {
        let mut session = EngineSession::launch(collaborators.engine, workdir)?;
        switching::run(session.engine(), &ctx, &state, iteration)?;
        session.close()?;
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Reduction and report ===
    reporter.report(Progress::PhaseStart {
        name: "Reduction",
    });
    let terms = reduce::run(&ctx, &mut state, collaborators.reference, collaborators.work)?;
    let report = build_report(spec, &lattice, &state);
    let report_path = workdir.join(REPORT_FILE);
    report.write_to_path(&report_path)?;
    info!(path = %report_path.display(), "Report written.");
    reporter.report(Progress::PhaseFinish);

    Ok(SolidResult {
        report,
        report_path,
        terms,
        stages: averaging.stages().to_vec(),
    })
}

fn build_report(spec: &CalculationSpec, lattice: &LatticeInfo, state: &RunState) -> FreeEnergyReport {
    FreeEnergyReport {
        input: ReportInput {
            temperature: spec.temperature as i64,
            pressure: spec.pressure,
            lattice: lattice.lattice.clone(),
            element: spec.elements.join(" "),
            concentration: join_values(&lattice.concentrations),
        },
        average: ReportAverage {
            vol_atom: state.volume_per_atom,
            spring_constant: state.spring_constants.as_deref().map(join_values),
            density: None,
        },
        results: ReportResults {
            free_energy: state.terms.free_energy,
            error: state.terms.error,
            reference_system: state.terms.reference,
            work: state.terms.work,
            pv: state.terms.pv,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::DumpTrajectory;
    use crate::core::lattice::BuiltinLattice;
    use crate::core::thermo::{EinsteinCrystal, HysteresisWork};
    use crate::engine::config::CalculationSpecBuilder;
    use crate::engine::config::tests::builder;
    use crate::engine::testing::{FixedClassifier, Script, ScriptedFactory};
    use std::sync::Mutex;

    const TOLERANCE: f64 = 1e-9;

    fn run_kernel(
        spec_builder: CalculationSpecBuilder,
        script: Script,
        solid: usize,
    ) -> (Result<SolidResult, EngineError>, ScriptedFactory, tempfile::TempDir) {
        let spec = spec_builder.build().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let factory = ScriptedFactory::new(script);
        let classifier = FixedClassifier::new(solid);
        let collaborators = Collaborators {
            engine: &factory,
            lattice: &BuiltinLattice,
            classifier: &classifier,
            trajectory: &DumpTrajectory,
            reference: &EinsteinCrystal::default(),
            work: &HysteresisWork,
        };
        let result = run(&spec, dir.path(), &collaborators, &ProgressReporter::new());
        (result, factory, dir)
    }

    #[test]
    fn zero_pressure_kernel_writes_a_consistent_report() {
        let (result, factory, dir) = run_kernel(builder().n_iterations(2), Script::default(), 500);

        let result = result.unwrap();
        let report = FreeEnergyReport::read_from_path(&dir.path().join(REPORT_FILE)).unwrap();
        assert_eq!(report, result.report);
        assert_eq!(report.input.temperature, 500);
        assert_eq!(report.input.element, "Cu");
        assert!((report.results.work + 3.5).abs() < TOLERANCE);
        assert_eq!(report.results.pv, 0.0);
        assert!(
            (report.results.free_energy - (report.results.reference_system + report.results.work))
                .abs()
                < TOLERANCE
        );
        assert!(report.average.spring_constant.is_some());
        assert_eq!(result.stages.last(), Some(&AveragingStage::Done));

        let log = factory.log.lock().unwrap();
        assert_eq!(log.launches, 3);
        assert_eq!(log.closed, 3);
        assert!(log.active_fixes.is_empty());
        assert!(dir.path().join("forward_2.dat").exists());
    }

    #[test]
    fn fixed_lattice_kernel_uses_the_measured_pressure_for_pv() {
        let script = Script {
            pressures: vec![2500.0],
            ..Script::default()
        };
        let (result, _factory, _dir) = run_kernel(builder().fix_lattice(true), script, 500);

        let result = result.unwrap();
        assert_eq!(result.report.input.pressure, 0.0);
        let expected = reduce::pv_correction(2500.0, 18.0f64.powi(3), 500);
        assert!((result.terms.pv - expected).abs() < TOLERANCE);
        assert!(result.terms.pv > 0.0);
    }

    #[test]
    fn melted_kernel_writes_no_report_and_launches_no_switching() {
        let (result, factory, dir) = run_kernel(builder(), Script::default(), 0);

        assert!(matches!(result, Err(EngineError::Melted { .. })));
        assert!(!dir.path().join(REPORT_FILE).exists());
        let log = factory.log.lock().unwrap();
        assert_eq!(log.launches, 1);
        assert!(log.closed >= 1);
    }

    #[test]
    fn disabled_melt_check_accepts_an_unrecognized_structure() {
        let tolerance = crate::engine::config::Tolerances {
            pressure: 0.5,
            spring_constant: 0.01,
            solid_fraction: 0.0,
        };
        let (result, _factory, dir) = run_kernel(builder().tolerance(tolerance), Script::default(), 0);

        assert!(result.is_ok());
        assert!(dir.path().join(REPORT_FILE).exists());
    }

    #[test]
    fn phases_are_reported_in_order() {
        let spec = builder().build().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let factory = ScriptedFactory::new(Script::default());
        let classifier = FixedClassifier::new(500);
        let collaborators = Collaborators {
            engine: &factory,
            lattice: &BuiltinLattice,
            classifier: &classifier,
            trajectory: &DumpTrajectory,
            reference: &EinsteinCrystal::default(),
            work: &HysteresisWork,
        };
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));

        run(&spec, dir.path(), &collaborators, &reporter).unwrap();

        drop(reporter);
        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Preparation", "Averaging", "Switching", "Reduction"]
        );
    }
}

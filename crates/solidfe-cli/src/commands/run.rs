use crate::cli::RunArgs;
use crate::config::{KernelConfig, build_config};
use crate::error::{CliError, Result};
use crate::logging;
use crate::utils::progress::CliProgressHandler;
use indicatif::MultiProgress;
use rayon::prelude::*;
use solidfe::{
    core::{io::DumpTrajectory, lattice::BuiltinLattice, thermo::EinsteinCrystal, thermo::HysteresisWork},
    engine::{
        classifier::{CommandClassifier, StructureClassifier},
        error::EngineError,
        lammps::LammpsLauncher,
        progress::ProgressReporter,
    },
    workflows::solid::{self, Collaborators, SolidResult},
};
use std::path::Path;
use tracing::{error, info, info_span, warn};

/// Stands in when melt detection is off. Never consulted because a zero
/// solid-fraction tolerance skips the check.
struct DisabledClassifier;

impl StructureClassifier for DisabledClassifier {
    fn solid_count(&self, _snapshot: &Path) -> std::result::Result<usize, EngineError> {
        Err(EngineError::Collaborator {
            collaborator: "structure classifier",
            message: "melt detection is disabled".to_string(),
        })
    }
}

/// Resolves 1-based `-k` selections, keeping their first-seen order.
fn select_kernels<'a>(
    kernels: &'a [KernelConfig],
    selection: &[usize],
) -> Result<Vec<&'a KernelConfig>> {
    if selection.is_empty() {
        return Ok(kernels.iter().collect());
    }
    let mut selected: Vec<&KernelConfig> = Vec::with_capacity(selection.len());
    for index in selection {
        let kernel = kernels
            .iter()
            .find(|k| k.index == *index)
            .ok_or_else(|| {
                CliError::Argument(format!(
                    "Calculation {} does not exist; the file lists {}.",
                    index,
                    kernels.len()
                ))
            })?;
        if !selected.iter().any(|k| k.index == kernel.index) {
            selected.push(kernel);
        }
    }
    Ok(selected)
}

/// Runs one kernel on the calling thread. Everything the kernel logs is
/// also appended to the `solidfe.log` in its scratch folder.
fn run_kernel(
    kernel: &KernelConfig,
    workdir: &Path,
    collaborators: &Collaborators,
    multi: &MultiProgress,
) -> Result<SolidResult> {
    let name = kernel.scratch_name();
    let scratch = kernel.scratch_dir(workdir);
    let _span = info_span!("kernel", name = %name).entered();
    let _log = logging::kernel_log(&scratch)?;
    let progress = CliProgressHandler::new(multi, &name);
    let reporter = ProgressReporter::with_callback(progress.get_callback());

    let result = solid::run(&kernel.spec, &scratch, collaborators, &reporter);
    match &result {
        Ok(outcome) => {
            info!(free_energy = outcome.terms.free_energy, "Calculation finished.");
            progress.finish(format!("✓ F = {:.5} eV/atom", outcome.terms.free_energy));
        }
        Err(e) => {
            error!(error = %e, "Calculation failed.");
            progress.finish(format!("✗ {}", e));
        }
    }
    Ok(result?)
}

pub async fn run(args: RunArgs) -> Result<()> {
    info!("Building calculations from {:?}", &args.config.config);
    let config = build_config(&args.config)?;
    let selected = select_kernels(&config.kernels, &args.kernels)?;

    let launcher = LammpsLauncher::new(config.lammps_command.clone())?;
    let classifier: Box<dyn StructureClassifier> = match &config.classifier_command {
        Some(command) => Box::new(CommandClassifier::new(command.clone())?),
        None => Box::new(DisabledClassifier),
    };
    let reference = EinsteinCrystal::default();
    let collaborators = Collaborators {
        engine: &launcher,
        lattice: &BuiltinLattice,
        classifier: classifier.as_ref(),
        trajectory: &DumpTrajectory,
        reference: &reference,
        work: &HysteresisWork,
    };

    std::fs::create_dir_all(&args.workdir)?;
    println!(
        "Running {} calculation(s) with '{}' in {}",
        selected.len(),
        launcher.program(),
        args.workdir.display()
    );

    let multi = MultiProgress::new();
    let outcomes: Vec<_> = tokio::task::block_in_place(|| {
        selected
            .par_iter()
            .map(|kernel| {
                let result = run_kernel(kernel, &args.workdir, &collaborators, &multi);
                (*kernel, result)
            })
            .collect()
    });

    let mut failed = 0;
    for (kernel, outcome) in &outcomes {
        match outcome {
            Ok(result) => println!(
                "✓ {}: F = {:.5} ± {:.5} eV/atom (report: {})",
                kernel.scratch_name(),
                result.terms.free_energy,
                result.terms.error,
                result.report_path.display()
            ),
            Err(e) => {
                failed += 1;
                warn!(kernel = kernel.index, error = %e, "Calculation failed.");
                eprintln!("✗ {}: {}", kernel.scratch_name(), e);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::KernelsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}

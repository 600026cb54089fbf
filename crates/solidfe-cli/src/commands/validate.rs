use crate::cli::ValidateArgs;
use crate::config::{AppConfig, KernelConfig, build_config};
use crate::error::Result;
use solidfe::core::lattice::{BuiltinLattice, LatticeGenerator, LatticeRequest};
use solidfe::engine::error::EngineError;
use solidfe::engine::tasks::averaging::{Regime, select_regime};
use tracing::info;

fn regime_label(regime: Regime) -> &'static str {
    match regime {
        Regime::ZeroPressure => "zero pressure",
        Regime::FinitePressure => "finite pressure",
        Regime::ConstrainedLattice => "fixed lattice",
    }
}

/// One line per calculation. Fails on the first lattice the generator
/// cannot build.
fn describe(kernel: &KernelConfig) -> Result<String> {
    let spec = &kernel.spec;
    let lattice = BuiltinLattice
        .prepare(&LatticeRequest {
            lattice: &spec.lattice,
            lattice_constant: spec.lattice_constant,
            n_elements: spec.n_elements(),
        })
        .map_err(EngineError::from)?;
    let spring_constants = match spec.complete_spring_constants() {
        Some(ks) => format!("{:?}", ks),
        None => "auto".to_string(),
    };
    Ok(format!(
        "[{}] {}: T = {} K, P = {} bar, {} x{:?} ({} atoms), {}, {} iteration(s), k = {}",
        kernel.index,
        kernel.scratch_name(),
        spec.temperature,
        spec.pressure,
        lattice.lattice,
        spec.repeat,
        lattice.atom_count(spec.repeat),
        regime_label(select_regime(spec)),
        spec.n_iterations,
        spring_constants
    ))
}

fn summarize(config: &AppConfig) -> Result<Vec<String>> {
    let mut lines = vec![format!("Engine: {}", config.lammps_command.join(" "))];
    lines.push(match &config.classifier_command {
        Some(command) => format!("Melt check: {}", command.join(" ")),
        None => "Melt check: disabled".to_string(),
    });
    for kernel in &config.kernels {
        lines.push(describe(kernel)?);
    }
    Ok(lines)
}

pub async fn run(args: ValidateArgs) -> Result<()> {
    info!("Validating configuration {:?}", &args.config.config);
    let config = build_config(&args.config)?;
    for line in summarize(&config)? {
        println!("{}", line);
    }
    println!("{} calculation(s) are valid.", config.kernels.len());
    Ok(())
}

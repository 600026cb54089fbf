use super::defaults::DefaultsConfig;
use super::file::{FileCalculation, FileConfig, FileEngineConfig, FileMdConfig, FileToleranceConfig};
use super::models::{AppConfig, KernelConfig};
use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};
use crate::utils::parser::{self, ParseError};
use solidfe::engine::config::{
    CalculationSpecBuilder, CouplingFamily, MdSettings, Potential, PressureControl, Tolerances,
};
use std::path::Path;
use tracing::{debug, info};

fn argument(e: ParseError) -> CliError {
    CliError::Argument(e.to_string())
}

/// Merges CLI flags, `--set` overrides, the config file and the defaults,
/// in that order of precedence, into one spec per calculation.
pub fn build_config(args: &ConfigArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();
    let file_config = FileConfig::from_file(&args.config)?;
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    if file_config.calculations.is_empty() {
        return Err(CliError::Config(
            "At least one [[calculations]] entry is required.".to_string(),
        ));
    }

    let engine_file = file_config.engine.take().unwrap_or_default();
    let lammps_command = parser::parse_command(
        args.lammps
            .as_deref()
            .or(engine_file.command.as_deref())
            .unwrap_or(defaults.lammps_command),
        "engine",
    )
    .map_err(argument)?;
    let config_dir = args.config.parent().unwrap_or(Path::new("."));
    let potential = merge_potential(&engine_file, config_dir)?;

    let md = merge_md(file_config.md.take().unwrap_or_default(), &defaults)?;
    let mut tolerance = merge_tolerance(file_config.tolerance.take().unwrap_or_default(), &defaults);

    let classifier_command = file_config
        .classifier
        .take()
        .and_then(|c| c.command)
        .map(|c| parser::parse_command(&c, "classifier"))
        .transpose()
        .map_err(argument)?;
    let classifier_command = if args.no_melt_check {
        info!("Melt check disabled from the command line.");
        tolerance.solid_fraction = 0.0;
        None
    } else if tolerance.solid_fraction == 0.0 {
        None
    } else {
        Some(classifier_command.ok_or_else(|| {
            CliError::Config(format!(
                "A solid-fraction tolerance of {} needs `classifier.command`. Set the tolerance to 0 or pass --no-melt-check to skip the melt check.",
                tolerance.solid_fraction
            ))
        })?)
    };

    let kernels = file_config
        .calculations
        .iter()
        .enumerate()
        .map(|(idx, calculation)| {
            build_kernel(
                idx + 1,
                calculation,
                &file_config,
                &potential,
                &md,
                tolerance,
                &defaults,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(kernels = kernels.len(), "Configuration built.");

    Ok(AppConfig {
        kernels,
        lammps_command,
        classifier_command,
    })
}

fn build_kernel(
    index: usize,
    calculation: &FileCalculation,
    file_config: &FileConfig,
    potential: &Potential,
    md: &MdSettings,
    tolerance: Tolerances,
    defaults: &DefaultsConfig,
) -> Result<KernelConfig> {
    let in_calculation = |e: &dyn std::fmt::Display| {
        CliError::Config(format!("Calculation {}: {}", index, e))
    };

    let mut builder = CalculationSpecBuilder::new()
        .pressure(calculation.pressure.unwrap_or(defaults.pressure))
        .repeat(calculation.repeat.unwrap_or(defaults.repeat))
        .elements(file_config.element.clone())
        .masses(file_config.mass.clone())
        .potential(potential.clone())
        .md(md.clone())
        .n_equilibration_steps(
            calculation
                .n_equilibration_steps
                .unwrap_or(defaults.n_equilibration_steps),
        )
        .n_switching_steps(
            calculation
                .n_switching_steps
                .unwrap_or(defaults.n_switching_steps),
        )
        .n_iterations(calculation.n_iterations.unwrap_or(defaults.n_iterations))
        .tolerance(tolerance)
        .fix_lattice(calculation.fix_lattice.unwrap_or(false))
        .pressure_control(parse_pressure_control(calculation.pressure_control.as_deref())?);

    if let Some(temperature) = calculation.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(lattice) = &calculation.lattice {
        builder = builder.lattice(lattice.clone());
    }
    if let Some(constant) = calculation.lattice_constant {
        builder = builder.lattice_constant(constant);
    }
    if let Some(seed) = calculation.seed {
        builder = builder.seed(seed);
    }
    if let Some(ks) = &calculation.spring_constants {
        if let Some(ks) = ks.resolve().map_err(|e| in_calculation(&e))? {
            builder = builder.spring_constants(ks);
        }
    }

    let spec = builder.build().map_err(|e| in_calculation(&e))?;
    Ok(KernelConfig { index, spec })
}

fn merge_potential(engine: &FileEngineConfig, config_dir: &Path) -> Result<Potential> {
    match (&engine.pair_style, &engine.pair_coeff, &engine.potential_file) {
        (Some(style), Some(coeff), None) => Ok(Potential::PairStyle {
            style: style.clone(),
            coeff: coeff.clone(),
        }),
        (None, None, Some(path)) => {
            // The engine runs inside the scratch folder.
            let path = if path.is_relative() {
                std::path::absolute(config_dir.join(path))?
            } else {
                path.clone()
            };
            Ok(Potential::IncludeFile(path))
        }
        _ => Err(CliError::Config(
            "The potential needs either `engine.pair-style` with `engine.pair-coeff`, or `engine.potential-file` alone.".to_string(),
        )),
    }
}

fn merge_md(file: FileMdConfig, defaults: &DefaultsConfig) -> Result<MdSettings> {
    Ok(MdSettings {
        timestep: file.timestep.unwrap_or(defaults.timestep),
        n_small_steps: file.n_small_steps.unwrap_or(defaults.n_small_steps),
        n_every_steps: file.n_every_steps.unwrap_or(defaults.n_every_steps),
        n_repeat_steps: file.n_repeat_steps.unwrap_or(defaults.n_repeat_steps),
        n_cycles: file.n_cycles.unwrap_or(defaults.n_cycles),
        thermostat_damping: file
            .thermostat_damping
            .unwrap_or(defaults.thermostat_damping),
        equilibration_thermostat_damping: file
            .equilibration_thermostat_damping
            .unwrap_or(defaults.equilibration_thermostat_damping),
        equilibration_barostat_damping: file
            .equilibration_barostat_damping
            .unwrap_or(defaults.equilibration_barostat_damping),
        coupling: parse_coupling(file.coupling.as_deref())?,
    })
}

fn merge_tolerance(file: FileToleranceConfig, defaults: &DefaultsConfig) -> Tolerances {
    Tolerances {
        pressure: file.pressure.unwrap_or(defaults.pressure_tolerance),
        spring_constant: file
            .spring_constant
            .unwrap_or(defaults.spring_constant_tolerance),
        solid_fraction: file.solid_fraction.unwrap_or(defaults.solid_fraction),
    }
}

fn parse_coupling(value: Option<&str>) -> Result<CouplingFamily> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("nose-hoover") => Ok(CouplingFamily::NoseHoover),
        Some("berendsen") => Ok(CouplingFamily::Berendsen),
        Some(other) => Err(CliError::Config(format!(
            "Unknown coupling '{}'. Expected 'nose-hoover' or 'berendsen'.",
            other
        ))),
    }
}

fn parse_pressure_control(value: Option<&str>) -> Result<PressureControl> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("iso") => Ok(PressureControl::Isotropic),
        Some("aniso") => Ok(PressureControl::Anisotropic),
        Some(other) => Err(CliError::Config(format!(
            "Unknown pressure control '{}'. Expected 'iso' or 'aniso'.",
            other
        ))),
    }
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for pair in set_values {
        let (key, value) = parser::parse_key_value(pair).map_err(argument)?;
        let float = |expected| parser::parse_value::<f64>(key, value, expected).map_err(argument);
        let integer = || parser::parse_value::<u64>(key, value, "an integer").map_err(argument);
        let count = || parser::parse_value::<usize>(key, value, "an integer").map_err(argument);

        debug!(key, value, "Applying configuration override.");
        match key {
            "md.timestep" => config.md.get_or_insert_with(Default::default).timestep = Some(float("a number")?),
            "md.n-small-steps" => config.md.get_or_insert_with(Default::default).n_small_steps = Some(integer()?),
            "md.n-every-steps" => config.md.get_or_insert_with(Default::default).n_every_steps = Some(integer()?),
            "md.n-repeat-steps" => config.md.get_or_insert_with(Default::default).n_repeat_steps = Some(integer()?),
            "md.n-cycles" => config.md.get_or_insert_with(Default::default).n_cycles = Some(count()?),
            "md.thermostat-damping" => {
                config.md.get_or_insert_with(Default::default).thermostat_damping = Some(float("a number")?)
            }
            "md.equilibration-thermostat-damping" => {
                config
                    .md
                    .get_or_insert_with(Default::default)
                    .equilibration_thermostat_damping = Some(float("a number")?)
            }
            "md.equilibration-barostat-damping" => {
                config
                    .md
                    .get_or_insert_with(Default::default)
                    .equilibration_barostat_damping = Some(float("a number")?)
            }
            "md.coupling" => config.md.get_or_insert_with(Default::default).coupling = Some(value.to_string()),
            "tolerance.pressure" => {
                config.tolerance.get_or_insert_with(Default::default).pressure = Some(float("a number")?)
            }
            "tolerance.spring-constant" => {
                config.tolerance.get_or_insert_with(Default::default).spring_constant = Some(float("a number")?)
            }
            "tolerance.solid-fraction" => {
                config.tolerance.get_or_insert_with(Default::default).solid_fraction =
                    Some(float("a fraction between 0 and 1")?)
            }
            "engine.command" => config.engine.get_or_insert_with(Default::default).command = Some(value.to_string()),
            "engine.pair-style" => {
                config.engine.get_or_insert_with(Default::default).pair_style = Some(value.to_string())
            }
            "engine.pair-coeff" => {
                config.engine.get_or_insert_with(Default::default).pair_coeff = Some(value.to_string())
            }
            "classifier.command" => {
                config.classifier.get_or_insert_with(Default::default).command = Some(value.to_string())
            }
            // Applied to every calculation of the batch.
            "calculations.n-equilibration-steps" => {
                let steps = integer()?;
                config.calculations.iter_mut().for_each(|c| c.n_equilibration_steps = Some(steps));
            }
            "calculations.n-switching-steps" => {
                let steps = integer()?;
                config.calculations.iter_mut().for_each(|c| c.n_switching_steps = Some(steps));
            }
            "calculations.n-iterations" => {
                let n = count()?;
                config.calculations.iter_mut().for_each(|c| c.n_iterations = Some(n));
            }
            "calculations.seed" => {
                let seed = integer()?;
                config.calculations.iter_mut().for_each(|c| c.seed = Some(seed));
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

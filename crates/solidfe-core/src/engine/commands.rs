//! Builders for the engine commands issued by the stages.

use super::config::{MdSettings, Potential, PressureControl};
use std::path::Path;

pub const AVERAGE_FILE: &str = "avg.dat";
pub const MSD_FILE: &str = "msd.dat";

pub fn velocity_create(temperature: f64, seed: u64) -> String {
    format!("velocity all create {} {}", temperature, seed)
}

/// Gaussian velocities with zero net linear and angular momentum.
pub fn velocity_create_gaussian(temperature: f64, seed: u64) -> String {
    format!(
        "velocity all create {} {} mom yes rot yes dist gaussian",
        temperature, seed
    )
}

pub fn unfix(id: &str) -> String {
    format!("unfix {}", id)
}

pub fn nvt(id: &str, temperature: f64, damping: f64) -> String {
    format!(
        "fix {} all nvt temp {} {} {}",
        id, temperature, temperature, damping
    )
}

pub fn npt(
    id: &str,
    temperature: (f64, f64),
    pressure: (f64, f64),
    control: PressureControl,
    thermostat_damping: f64,
    barostat_damping: f64,
) -> String {
    format!(
        "fix {} all npt temp {} {} {} {} {} {} {}",
        id,
        temperature.0,
        temperature.1,
        thermostat_damping,
        control.keyword(),
        pressure.0,
        pressure.1,
        barostat_damping
    )
}

pub fn potential(potential: &Potential) -> Vec<String> {
    match potential {
        Potential::PairStyle { style, coeff } => vec![
            format!("pair_style {}", style),
            format!("pair_coeff {}", coeff),
        ],
        Potential::IncludeFile(path) => vec![format!("include {}", path.display())],
    }
}

/// Equal-style variables sampled by the averaging fix.
pub fn box_variables() -> Vec<String> {
    [
        ("mvol", "vol"),
        ("mlx", "lx"),
        ("mly", "ly"),
        ("mlz", "lz"),
        ("mpress", "press"),
    ]
    .iter()
    .map(|(name, value)| format!("variable {} equal {}", name, value))
    .collect()
}

fn ave_time(id: &str, md: &MdSettings, values: &[String], file: &str) -> String {
    format!(
        "fix {} all ave/time {} {} {} {} file {}",
        id,
        md.n_every_steps,
        md.n_repeat_steps,
        md.n_every_steps * md.n_repeat_steps,
        values.join(" "),
        file
    )
}

/// Averages box edges and pressure into [`AVERAGE_FILE`].
pub fn average_box(id: &str, md: &MdSettings) -> String {
    let values: Vec<String> = ["v_mlx", "v_mly", "v_mlz", "v_mpress"]
        .iter()
        .map(|v| v.to_string())
        .collect();
    ave_time(id, md, &values, AVERAGE_FILE)
}

/// Mean-squared displacement computes: one over all atoms, then one per
/// species group, averaged into [`MSD_FILE`] in that column order.
pub fn mean_squared_displacement(id: &str, md: &MdSettings, n_elements: usize) -> Vec<String> {
    let mut commands = vec![
        "compute msd0 all msd com yes".to_string(),
        "variable msd0 equal c_msd0[4]".to_string(),
    ];
    let mut values = vec!["v_msd0".to_string()];
    for species in 1..=n_elements {
        commands.push(format!("group g{} type {}", species, species));
        commands.push(format!(
            "compute msd{} g{} msd com yes",
            species, species
        ));
        commands.push(format!(
            "variable msd{} equal c_msd{}[4]",
            species, species
        ));
        values.push(format!("v_msd{}", species));
    }
    commands.push(ave_time(id, md, &values, MSD_FILE));
    commands
}

pub fn thermo(style: &str, every: u64) -> Vec<String> {
    vec![
        format!("thermo_style custom {}", style),
        format!("thermo {}", every),
    ]
}

/// Writes one custom snapshot of every atom to `file`.
pub fn dump_snapshot(file: &Path) -> Vec<String> {
    vec![
        format!(
            "dump 2 all custom 1 {} id type mass x y z vx vy vz",
            file.display()
        ),
        "run 0".to_string(),
        "undump 2".to_string(),
    ]
}

pub fn remap_box(lx: f64, ly: f64, lz: f64) -> String {
    format!(
        "change_box all x final 0.0 {} y final 0.0 {} z final 0.0 {} remap units box",
        lx, ly, lz
    )
}

pub fn spring(species: usize, spring_constant: f64, switching_steps: u64, eq_steps: u64) -> String {
    format!(
        "fix ff{} g{} ti/spring {} {} {} function 2",
        species, species, spring_constant, switching_steps, eq_steps
    )
}

/// A per-step print of the energy variables into `file`.
pub fn print_energies(id: &str, n_elements: usize, file: &str) -> String {
    let mut fields = vec!["${dU1}".to_string()];
    fields.extend((1..=n_elements).map(|species| format!("${{dU{}}}", species + 1)));
    fields.push("${lambda}".to_string());
    format!(
        "fix {} all print 1 \"{}\" screen no file {}",
        id,
        fields.join(" "),
        file
    )
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// Which thermostat/barostat pair drives the equilibration stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CouplingFamily {
    /// A single combined `npt` fix.
    #[default]
    NoseHoover,
    /// Plain `nve` integration with separate rescaling thermostat and barostat.
    Berendsen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressureControl {
    #[default]
    Isotropic,
    Anisotropic,
}

impl PressureControl {
    pub fn keyword(&self) -> &'static str {
        match self {
            PressureControl::Isotropic => "iso",
            PressureControl::Anisotropic => "aniso",
        }
    }
}

/// How the interatomic potential is given to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Potential {
    PairStyle { style: String, coeff: String },
    IncludeFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdSettings {
    /// Integration timestep in ps.
    pub timestep: f64,
    /// Length of one sampling window.
    pub n_small_steps: u64,
    pub n_every_steps: u64,
    pub n_repeat_steps: u64,
    /// Upper bound on sampling windows per convergence loop.
    pub n_cycles: usize,
    /// Damping used by the constant-volume thermostats.
    pub thermostat_damping: f64,
    pub equilibration_thermostat_damping: f64,
    pub equilibration_barostat_damping: f64,
    pub coupling: CouplingFamily,
}

impl MdSettings {
    /// Number of rows one window appends to an averaging file.
    pub fn rows_per_window(&self) -> usize {
        (self.n_small_steps / (self.n_every_steps * self.n_repeat_steps)) as usize
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.timestep > 0.0) {
            return Err(invalid("md.timestep", "must be positive"));
        }
        if self.n_every_steps == 0 || self.n_repeat_steps == 0 {
            return Err(invalid(
                "md.n_every_steps",
                "n_every_steps and n_repeat_steps must be positive",
            ));
        }
        if self.n_small_steps < self.n_every_steps * self.n_repeat_steps {
            return Err(invalid(
                "md.n_small_steps",
                format!(
                    "a window of {} steps is shorter than one averaging period of {} steps",
                    self.n_small_steps,
                    self.n_every_steps * self.n_repeat_steps
                ),
            ));
        }
        if self.n_cycles == 0 {
            return Err(invalid("md.n_cycles", "at least one cycle is required"));
        }
        for (name, value) in [
            ("md.thermostat_damping", self.thermostat_damping),
            (
                "md.equilibration_thermostat_damping",
                self.equilibration_thermostat_damping,
            ),
            (
                "md.equilibration_barostat_damping",
                self.equilibration_barostat_damping,
            ),
        ] {
            if !(value > 0.0) {
                return Err(invalid(name, "must be positive"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    /// Pressure window tolerance in bar.
    pub pressure: f64,
    pub spring_constant: f64,
    /// Minimum solid fraction; `0.0` disables melt detection.
    pub solid_fraction: f64,
}

impl Tolerances {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pressure > 0.0) {
            return Err(invalid("tolerance.pressure", "must be positive"));
        }
        if !(self.spring_constant > 0.0) {
            return Err(invalid("tolerance.spring_constant", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.solid_fraction) {
            return Err(invalid(
                "tolerance.solid_fraction",
                "must lie between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// A user-supplied spring constant; `None` asks for the computed value.
pub type SpringConstantOverride = Option<f64>;

/// Everything one free energy kernel needs. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationSpec {
    /// Temperature in K.
    pub temperature: f64,
    /// Pressure in bar.
    pub pressure: f64,
    pub lattice: String,
    /// Lattice constant in Å.
    pub lattice_constant: f64,
    pub repeat: [usize; 3],
    pub elements: Vec<String>,
    /// Per-species masses in g/mol.
    pub masses: Vec<f64>,
    pub potential: Potential,
    pub md: MdSettings,
    pub n_equilibration_steps: u64,
    pub n_switching_steps: u64,
    pub n_iterations: usize,
    pub tolerance: Tolerances,
    pub spring_constants: Option<Vec<SpringConstantOverride>>,
    pub fix_lattice: bool,
    pub pressure_control: PressureControl,
    /// Seed for velocity and thermostat seeds; drawn from entropy if absent.
    pub seed: Option<u64>,
}

impl CalculationSpec {
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    /// The user-supplied spring constants, when every entry is set.
    pub fn complete_spring_constants(&self) -> Option<Vec<f64>> {
        self.spring_constants
            .as_ref()
            .and_then(|ks| ks.iter().copied().collect::<Option<Vec<f64>>>())
    }
}

#[derive(Default)]
pub struct CalculationSpecBuilder {
    temperature: Option<f64>,
    pressure: Option<f64>,
    lattice: Option<String>,
    lattice_constant: Option<f64>,
    repeat: Option<[usize; 3]>,
    elements: Option<Vec<String>>,
    masses: Option<Vec<f64>>,
    potential: Option<Potential>,
    md: Option<MdSettings>,
    n_equilibration_steps: Option<u64>,
    n_switching_steps: Option<u64>,
    n_iterations: Option<usize>,
    tolerance: Option<Tolerances>,
    spring_constants: Option<Vec<SpringConstantOverride>>,
    fix_lattice: bool,
    pressure_control: PressureControl,
    seed: Option<u64>,
}

impl CalculationSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
    pub fn pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }
    pub fn lattice(mut self, lattice: impl Into<String>) -> Self {
        self.lattice = Some(lattice.into());
        self
    }
    pub fn lattice_constant(mut self, constant: f64) -> Self {
        self.lattice_constant = Some(constant);
        self
    }
    pub fn repeat(mut self, repeat: [usize; 3]) -> Self {
        self.repeat = Some(repeat);
        self
    }
    pub fn elements(mut self, elements: Vec<String>) -> Self {
        self.elements = Some(elements);
        self
    }
    pub fn masses(mut self, masses: Vec<f64>) -> Self {
        self.masses = Some(masses);
        self
    }
    pub fn potential(mut self, potential: Potential) -> Self {
        self.potential = Some(potential);
        self
    }
    pub fn md(mut self, md: MdSettings) -> Self {
        self.md = Some(md);
        self
    }
    pub fn n_equilibration_steps(mut self, steps: u64) -> Self {
        self.n_equilibration_steps = Some(steps);
        self
    }
    pub fn n_switching_steps(mut self, steps: u64) -> Self {
        self.n_switching_steps = Some(steps);
        self
    }
    pub fn n_iterations(mut self, n: usize) -> Self {
        self.n_iterations = Some(n);
        self
    }
    pub fn tolerance(mut self, tolerance: Tolerances) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn spring_constants(mut self, spring_constants: Vec<SpringConstantOverride>) -> Self {
        self.spring_constants = Some(spring_constants);
        self
    }
    pub fn fix_lattice(mut self, fix_lattice: bool) -> Self {
        self.fix_lattice = fix_lattice;
        self
    }
    pub fn pressure_control(mut self, control: PressureControl) -> Self {
        self.pressure_control = control;
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<CalculationSpec, ConfigError> {
        let spec = CalculationSpec {
            temperature: self
                .temperature
                .ok_or(ConfigError::MissingParameter("temperature"))?,
            pressure: self
                .pressure
                .ok_or(ConfigError::MissingParameter("pressure"))?,
            lattice: self
                .lattice
                .ok_or(ConfigError::MissingParameter("lattice"))?,
            lattice_constant: self
                .lattice_constant
                .ok_or(ConfigError::MissingParameter("lattice_constant"))?,
            repeat: self.repeat.ok_or(ConfigError::MissingParameter("repeat"))?,
            elements: self
                .elements
                .ok_or(ConfigError::MissingParameter("element"))?,
            masses: self.masses.ok_or(ConfigError::MissingParameter("mass"))?,
            potential: self
                .potential
                .ok_or(ConfigError::MissingParameter("potential"))?,
            md: self.md.ok_or(ConfigError::MissingParameter("md"))?,
            n_equilibration_steps: self
                .n_equilibration_steps
                .ok_or(ConfigError::MissingParameter("n_equilibration_steps"))?,
            n_switching_steps: self
                .n_switching_steps
                .ok_or(ConfigError::MissingParameter("n_switching_steps"))?,
            n_iterations: self
                .n_iterations
                .ok_or(ConfigError::MissingParameter("n_iterations"))?,
            tolerance: self
                .tolerance
                .ok_or(ConfigError::MissingParameter("tolerance"))?,
            spring_constants: self.spring_constants,
            fix_lattice: self.fix_lattice,
            pressure_control: self.pressure_control,
            seed: self.seed,
        };
        validate(&spec)?;
        Ok(spec)
    }
}

fn validate(spec: &CalculationSpec) -> Result<(), ConfigError> {
    if !(spec.temperature > 0.0) {
        return Err(invalid("temperature", "must be positive"));
    }
    if !spec.pressure.is_finite() {
        return Err(invalid("pressure", "must be finite"));
    }
    if spec.lattice.trim().is_empty() {
        return Err(invalid("lattice", "must not be empty"));
    }
    if !(spec.lattice_constant > 0.0) {
        return Err(invalid("lattice_constant", "must be positive"));
    }
    if spec.repeat.contains(&0) {
        return Err(invalid("repeat", "every direction needs at least one cell"));
    }
    if spec.elements.is_empty() {
        return Err(invalid("element", "at least one element is required"));
    }
    if spec.masses.len() != spec.elements.len() {
        return Err(invalid(
            "mass",
            format!(
                "{} mass(es) given for {} element(s)",
                spec.masses.len(),
                spec.elements.len()
            ),
        ));
    }
    if spec.masses.iter().any(|m| !(*m > 0.0)) {
        return Err(invalid("mass", "masses must be positive"));
    }
    if let Potential::PairStyle { style, .. } = &spec.potential {
        if style.trim().is_empty() {
            return Err(invalid("pair_style", "must not be empty"));
        }
    }
    spec.md.validate()?;
    spec.tolerance.validate()?;
    if spec.n_equilibration_steps == 0 || spec.n_switching_steps == 0 {
        return Err(invalid(
            "n_switching_steps",
            "equilibration and switching step counts must be positive",
        ));
    }
    if spec.n_iterations == 0 {
        return Err(invalid("n_iterations", "at least one iteration is required"));
    }
    if let Some(ks) = &spec.spring_constants {
        if ks.len() != spec.elements.len() {
            return Err(invalid(
                "spring_constants",
                format!(
                    "{} spring constant(s) given for {} element(s)",
                    ks.len(),
                    spec.elements.len()
                ),
            ));
        }
    }
    Ok(())
}

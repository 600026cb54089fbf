//! Physical constants in the engine's `metal` unit system and SI.

/// Boltzmann constant in eV/K.
pub const KB_EV: f64 = 8.617333262e-5;
/// Boltzmann constant in J/K.
pub const KB_J: f64 = 1.380649e-23;
/// Reduced Planck constant in J s.
pub const HBAR_J: f64 = 1.054571817e-34;
/// Joules per electronvolt.
pub const EV_TO_J: f64 = 1.602176634e-19;
/// Avogadro constant in 1/mol.
pub const AVOGADRO: f64 = 6.02214076e23;
/// Square metres per square ångström.
pub const A2_TO_M2: f64 = 1e-20;
/// Bar per gigapascal.
pub const BAR_PER_GPA: f64 = 10000.0;
/// Gigapascal per eV/Å³.
pub const GPA_PER_EV_A3: f64 = 160.21766208;

use super::ThermoError;
use super::constants::{A2_TO_M2, AVOGADRO, EV_TO_J, HBAR_J, KB_EV, KB_J};
use std::f64::consts::PI;

/// Inputs of the closed-form reference free energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceSystem<'a> {
    /// Temperature in K.
    pub temperature: f64,
    pub atom_count: usize,
    /// Per-species masses in g/mol.
    pub masses: &'a [f64],
    /// Total cell volume in Å³.
    pub volume: f64,
    /// Per-species spring constants in eV/Å².
    pub spring_constants: &'a [f64],
    pub concentrations: &'a [f64],
}

pub trait ReferenceFreeEnergy: Sync {
    /// Free energy per atom of the reference system, in eV.
    fn free_energy(&self, system: &ReferenceSystem) -> Result<f64, ThermoError>;
}

/// Independent harmonic oscillators pinned to lattice sites, with the
/// centre-of-mass constraint correction for a finite cell.
#[derive(Debug, Clone, Copy)]
pub struct EinsteinCrystal {
    pub center_of_mass_correction: bool,
}

impl Default for EinsteinCrystal {
    fn default() -> Self {
        Self {
            center_of_mass_correction: true,
        }
    }
}

impl EinsteinCrystal {
    fn check(system: &ReferenceSystem) -> Result<(), ThermoError> {
        let n = system.concentrations.len();
        if system.masses.len() != n || system.spring_constants.len() != n {
            return Err(ThermoError::InvalidInput(format!(
                "expected {} masses and spring constants, got {} and {}",
                n,
                system.masses.len(),
                system.spring_constants.len()
            )));
        }
        if system.temperature <= 0.0 || system.volume <= 0.0 || system.atom_count == 0 {
            return Err(ThermoError::InvalidInput(format!(
                "temperature ({}), volume ({}) and atom count ({}) must be positive",
                system.temperature, system.volume, system.atom_count
            )));
        }
        Ok(())
    }
}

impl ReferenceFreeEnergy for EinsteinCrystal {
    fn free_energy(&self, system: &ReferenceSystem) -> Result<f64, ThermoError> {
        Self::check(system)?;

        let t = system.temperature;
        let natoms = system.atom_count as f64;
        let mut harmonic = 0.0;
        let mut center_of_mass = 0.0;

        for ((&mass, &k), &c) in system
            .masses
            .iter()
            .zip(system.spring_constants)
            .zip(system.concentrations)
        {
            if c <= 0.0 {
                continue;
            }
            if mass <= 0.0 || k <= 0.0 {
                return Err(ThermoError::InvalidInput(format!(
                    "mass ({}) and spring constant ({}) of a present species must be positive",
                    mass, k
                )));
            }
            let mass_kg = mass / AVOGADRO * 1e-3;
            let k_si = k * EV_TO_J / A2_TO_M2;
            let omega = (k_si / mass_kg).sqrt();
            harmonic += c * ((HBAR_J * omega) / (KB_J * t)).ln();

            if self.center_of_mass_correction {
                let n_species = natoms * c;
                let spread = 2.0 * PI * KB_EV * t / (n_species * k);
                center_of_mass += ((n_species / system.volume) * spread.powf(1.5)).ln();
            }
        }

        let harmonic = 3.0 * KB_EV * t * harmonic;
        let center_of_mass = (KB_EV * t / natoms) * center_of_mass;
        Ok(harmonic - center_of_mass)
    }
}

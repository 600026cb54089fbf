use super::classifier::StructureClassifier;
use super::config::CalculationSpec;
use super::coupling::CouplingTargets;
use super::progress::ProgressReporter;
use crate::core::io::TrajectoryProcessor;
use crate::core::lattice::LatticeInfo;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::path::{Path, PathBuf};

/// Read-only inputs shared by the stages of one kernel, plus its seed
/// source.
pub struct KernelContext<'a> {
    pub spec: &'a CalculationSpec,
    pub lattice: &'a LatticeInfo,
    pub workdir: &'a Path,
    pub classifier: &'a dyn StructureClassifier,
    pub trajectory: &'a dyn TrajectoryProcessor,
    pub reporter: &'a ProgressReporter<'a>,
    rng: RefCell<StdRng>,
}

impl<'a> KernelContext<'a> {
    pub fn new(
        spec: &'a CalculationSpec,
        lattice: &'a LatticeInfo,
        workdir: &'a Path,
        classifier: &'a dyn StructureClassifier,
        trajectory: &'a dyn TrajectoryProcessor,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        let rng = match spec.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            spec,
            lattice,
            workdir,
            classifier,
            trajectory,
            reporter,
            rng: RefCell::new(rng),
        }
    }

    /// A fresh seed for velocity creation or a stochastic thermostat.
    pub fn next_seed(&self) -> u64 {
        self.rng.borrow_mut().gen_range(1..10000)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.workdir.join(name)
    }

    /// Equilibration targets at `pressure`, with the configured damping.
    pub fn coupling_targets(&self, pressure: f64) -> CouplingTargets {
        CouplingTargets {
            temperature: self.spec.temperature,
            pressure,
            control: self.spec.pressure_control,
            thermostat_damping: self.spec.md.equilibration_thermostat_damping,
            barostat_damping: self.spec.md.equilibration_barostat_damping,
        }
    }

    /// Concentration of each species; absent species have zero.
    pub fn concentrations(&self) -> &[f64] {
        &self.lattice.concentrations
    }
}

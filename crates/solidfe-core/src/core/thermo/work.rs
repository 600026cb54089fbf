use super::ThermoError;
use super::stats::{mean, std_dev, trapezoid};
use crate::core::io::ColumnTable;
use std::path::{Path, PathBuf};

/// Describes the switching records of one kernel.
///
/// Each record row holds the potential energy per atom, then one restraint
/// energy per atom for every species, then λ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchingLayout<'a> {
    pub folder: &'a Path,
    pub concentrations: &'a [f64],
    pub n_iterations: usize,
}

impl SwitchingLayout<'_> {
    pub fn forward_file(&self, iteration: usize) -> PathBuf {
        self.folder.join(forward_file_name(iteration))
    }

    pub fn backward_file(&self, iteration: usize) -> PathBuf {
        self.folder.join(backward_file_name(iteration))
    }
}

pub fn forward_file_name(iteration: usize) -> String {
    format!("forward_{}.dat", iteration)
}

pub fn backward_file_name(iteration: usize) -> String {
    format!("backward_{}.dat", iteration)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkEstimate {
    /// Reversible work, averaged over iterations.
    pub work: f64,
    /// Dissipated energy, averaged over iterations.
    pub dissipation: f64,
    /// Spread of the reversible work over iterations.
    pub error: f64,
}

pub trait SwitchingWork: Sync {
    fn work(&self, layout: &SwitchingLayout) -> Result<WorkEstimate, ThermoError>;
}

/// Reversible work from the hysteresis between forward and backward legs,
/// evaluated over the full λ path for a solid reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct HysteresisWork;

impl HysteresisWork {
    fn leg_work(path: &Path, concentrations: &[f64]) -> Result<f64, ThermoError> {
        let table = ColumnTable::read(path)?;
        let n = concentrations.len();
        let potential = table.column(0)?;
        let lambda = table.column(n + 1)?;

        let mut restraint = vec![0.0; table.len()];
        for (species, &c) in concentrations.iter().enumerate() {
            if c <= 0.0 {
                continue;
            }
            for (acc, value) in restraint.iter_mut().zip(table.column(species + 1)?) {
                *acc += c * value;
            }
        }

        let du: Vec<f64> = potential
            .iter()
            .zip(&restraint)
            .map(|(u, r)| u - r)
            .collect();
        Ok(trapezoid(&du, &lambda))
    }
}

impl SwitchingWork for HysteresisWork {
    fn work(&self, layout: &SwitchingLayout) -> Result<WorkEstimate, ThermoError> {
        if layout.n_iterations == 0 {
            return Err(ThermoError::InvalidInput(
                "at least one switching iteration is required".to_string(),
            ));
        }

        let mut works = Vec::with_capacity(layout.n_iterations);
        let mut dissipations = Vec::with_capacity(layout.n_iterations);
        for iteration in 1..=layout.n_iterations {
            let forward = Self::leg_work(&layout.forward_file(iteration), layout.concentrations)?;
            let backward = Self::leg_work(&layout.backward_file(iteration), layout.concentrations)?;
            works.push(0.5 * (forward - backward));
            dissipations.push(0.5 * (forward + backward));
        }

        Ok(WorkEstimate {
            work: mean(&works),
            dissipation: mean(&dissipations),
            error: std_dev(&works),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TOLERANCE: f64 = 1e-12;

    fn write_leg(path: &Path, potential: f64, restraints: &[f64], forward: bool) {
        let mut content = String::from("# dU1 dU2 lambda\n");
        for step in 0..=10 {
            let frac = step as f64 / 10.0;
            let lambda = if forward { frac } else { 1.0 - frac };
            let columns: Vec<String> = restraints.iter().map(|r| r.to_string()).collect();
            content.push_str(&format!("{} {} {}\n", potential, columns.join(" "), lambda));
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn constant_energy_difference_gives_exact_work_and_no_dissipation() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SwitchingLayout {
            folder: dir.path(),
            concentrations: &[1.0],
            n_iterations: 1,
        };
        write_leg(&layout.forward_file(1), -3.0, &[0.5], true);
        write_leg(&layout.backward_file(1), -3.0, &[0.5], false);

        let estimate = HysteresisWork.work(&layout).unwrap();

        assert!((estimate.work + 3.5).abs() < TOLERANCE);
        assert!(estimate.dissipation.abs() < TOLERANCE);
        assert!(estimate.error.abs() < TOLERANCE);
    }

    #[test]
    fn restraint_energies_are_weighted_by_concentration() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SwitchingLayout {
            folder: dir.path(),
            concentrations: &[0.75, 0.25],
            n_iterations: 1,
        };
        write_leg(&layout.forward_file(1), -3.0, &[0.4, 0.8], true);
        write_leg(&layout.backward_file(1), -3.0, &[0.4, 0.8], false);

        let estimate = HysteresisWork.work(&layout).unwrap();

        assert!((estimate.work - (-3.0 - 0.5)).abs() < TOLERANCE);
    }

    #[test]
    fn iterations_are_averaged_and_spread_reported() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SwitchingLayout {
            folder: dir.path(),
            concentrations: &[1.0],
            n_iterations: 2,
        };
        write_leg(&layout.forward_file(1), -3.0, &[0.0], true);
        write_leg(&layout.backward_file(1), -3.0, &[0.0], false);
        write_leg(&layout.forward_file(2), -4.0, &[0.0], true);
        write_leg(&layout.backward_file(2), -4.0, &[0.0], false);

        let estimate = HysteresisWork.work(&layout).unwrap();

        assert!((estimate.work + 3.5).abs() < TOLERANCE);
        assert!((estimate.error - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn missing_record_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let layout = SwitchingLayout {
            folder: dir.path(),
            concentrations: &[1.0],
            n_iterations: 1,
        };
        assert!(matches!(
            HysteresisWork.work(&layout),
            Err(ThermoError::Records(_))
        ));
    }

    #[test]
    fn record_file_names_follow_iteration_index() {
        assert_eq!(forward_file_name(3), "forward_3.dat");
        assert_eq!(backward_file_name(3), "backward_3.dat");
    }
}

use solidfe::engine::config::CalculationSpec;
use std::path::{Path, PathBuf};

/// One calculation of the batch, numbered from 1 in file order.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub index: usize,
    pub spec: CalculationSpec,
}

impl KernelConfig {
    /// `ts-<lattice>-<T>-<P>-<index>`, unique within a batch.
    pub fn scratch_name(&self) -> String {
        format!(
            "ts-{}-{}-{}-{}",
            self.spec.lattice.to_lowercase(),
            self.spec.temperature,
            self.spec.pressure,
            self.index
        )
    }

    pub fn scratch_dir(&self, workdir: &Path) -> PathBuf {
        workdir.join(self.scratch_name())
    }
}

pub struct AppConfig {
    pub kernels: Vec<KernelConfig>,
    pub lammps_command: Vec<String>,
    /// `None` when melt detection is disabled.
    pub classifier_command: Option<Vec<String>>,
}

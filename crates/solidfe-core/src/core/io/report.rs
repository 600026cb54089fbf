use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on report '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInput {
    pub temperature: i64,
    pub pressure: f64,
    pub lattice: String,
    pub element: String,
    pub concentration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAverage {
    #[serde(rename = "vol/atom")]
    pub vol_atom: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spring_constant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResults {
    pub free_energy: f64,
    pub error: f64,
    pub reference_system: f64,
    pub work: f64,
    pub pv: f64,
}

/// Final summary of one kernel, persisted as `report.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeEnergyReport {
    pub input: ReportInput,
    pub average: ReportAverage,
    pub results: ReportResults,
}

impl FreeEnergyReport {
    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), ReportError> {
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), ReportError> {
        let file = File::create(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush().map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_from_path(path: &Path) -> Result<Self, ReportError> {
        let file = File::open(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_reader(BufReader::new(file))?)
    }
}

/// Space-joined representation used for list-valued report entries.
pub fn join_values<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const AUTO: &str = "auto";

/// One spring constant entry: a number in eV/Å² or `"auto"`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileSpringConstant {
    Value(f64),
    Keyword(String),
}

/// Either `"auto"` for every element or one entry per element.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileSpringConstants {
    Keyword(String),
    List(Vec<FileSpringConstant>),
}

fn auto_keyword(word: &str) -> Result<()> {
    if word.eq_ignore_ascii_case(AUTO) {
        Ok(())
    } else {
        Err(CliError::Config(format!(
            "Invalid spring constant '{}'. Expected a number or \"auto\".",
            word
        )))
    }
}

impl FileSpringConstants {
    /// `None` when every constant is to be computed.
    pub fn resolve(&self) -> Result<Option<Vec<Option<f64>>>> {
        match self {
            FileSpringConstants::Keyword(word) => auto_keyword(word).map(|_| None),
            FileSpringConstants::List(entries) => entries
                .iter()
                .map(|entry| match entry {
                    FileSpringConstant::Value(k) => Ok(Some(*k)),
                    FileSpringConstant::Keyword(word) => auto_keyword(word).map(|_| None),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMdConfig {
    pub timestep: Option<f64>,
    pub n_small_steps: Option<u64>,
    pub n_every_steps: Option<u64>,
    pub n_repeat_steps: Option<u64>,
    pub n_cycles: Option<usize>,
    pub thermostat_damping: Option<f64>,
    pub equilibration_thermostat_damping: Option<f64>,
    pub equilibration_barostat_damping: Option<f64>,
    pub coupling: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileToleranceConfig {
    pub pressure: Option<f64>,
    pub spring_constant: Option<f64>,
    pub solid_fraction: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEngineConfig {
    pub command: Option<String>,
    pub pair_style: Option<String>,
    pub pair_coeff: Option<String>,
    /// Input file with the potential commands, used instead of
    /// `pair-style`/`pair-coeff`.
    pub potential_file: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileClassifierConfig {
    pub command: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCalculation {
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub lattice: Option<String>,
    pub lattice_constant: Option<f64>,
    pub repeat: Option<[usize; 3]>,
    pub n_equilibration_steps: Option<u64>,
    pub n_switching_steps: Option<u64>,
    pub n_iterations: Option<usize>,
    pub spring_constants: Option<FileSpringConstants>,
    pub fix_lattice: Option<bool>,
    pub pressure_control: Option<String>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default)]
    pub element: Vec<String>,
    #[serde(default)]
    pub mass: Vec<f64>,
    pub md: Option<FileMdConfig>,
    pub tolerance: Option<FileToleranceConfig>,
    pub engine: Option<FileEngineConfig>,
    pub classifier: Option<FileClassifierConfig>,
    #[serde(default)]
    pub calculations: Vec<FileCalculation>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

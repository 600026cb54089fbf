use super::error::EngineError;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Recognizes crystalline environments in a particle snapshot.
pub trait StructureClassifier: Sync {
    /// Number of atoms in `snapshot` whose environment matches a known
    /// crystal structure.
    fn solid_count(&self, snapshot: &Path) -> Result<usize, EngineError>;
}

/// Runs an external program with the snapshot path appended to its
/// arguments. The last non-empty line of its standard output must hold the
/// solid-atom count.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandClassifier {
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(command: Vec<String>) -> Result<Self, EngineError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| EngineError::Collaborator {
                collaborator: "structure classifier",
                message: "empty classifier command".to_string(),
            })?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn failure(message: String) -> EngineError {
        EngineError::Collaborator {
            collaborator: "structure classifier",
            message,
        }
    }
}

pub fn parse_solid_count(output: &str) -> Option<usize> {
    let last = output.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    if let Ok(count) = last.parse::<usize>() {
        return Some(count);
    }
    last.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as usize)
}

impl StructureClassifier for CommandClassifier {
    fn solid_count(&self, snapshot: &Path) -> Result<usize, EngineError> {
        debug!(program = %self.program, snapshot = %snapshot.display(), "Classifying snapshot.");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(snapshot)
            .output()
            .map_err(|e| Self::failure(format!("failed to run '{}': {}", self.program, e)))?;

        if !output.status.success() {
            return Err(Self::failure(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_solid_count(&stdout).ok_or_else(|| {
            Self::failure(format!(
                "could not read a solid-atom count from the output of '{}'",
                self.program
            ))
        })
    }
}

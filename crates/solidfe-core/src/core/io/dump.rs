use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TIMESTEP_HEADER: &str = "ITEM: TIMESTEP";

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("I/O error on '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Trajectory '{path}' contains no frames", path = path.display())]
    NoFrames { path: PathBuf },
    #[error("Malformed frame in '{path}': {reason}", path = path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Post-processing of the snapshot trajectories written during equilibration.
pub trait TrajectoryProcessor: Sync {
    /// Writes the last frame of `trajectory` to `output` with its timestep
    /// reset to zero, then deletes the trajectory and any fragments created
    /// along the way.
    fn finalize(&self, trajectory: &Path, output: &Path) -> Result<(), DumpError>;
}

/// Handles text dumps made of `ITEM: TIMESTEP` delimited frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpTrajectory;

impl DumpTrajectory {
    /// Writes every frame of `trajectory` to its own fragment file
    /// (`<name>.0`, `<name>.1`, ...) next to it and returns the fragment paths.
    pub fn split(&self, trajectory: &Path) -> Result<Vec<PathBuf>, DumpError> {
        let content = read(trajectory)?;
        let frames = split_frames(&content, trajectory)?;
        let name = trajectory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "trajectory".to_string());

        let mut fragments = Vec::with_capacity(frames.len());
        for (idx, frame) in frames.iter().enumerate() {
            let fragment = trajectory.with_file_name(format!("{}.{}", name, idx));
            write(&fragment, frame)?;
            fragments.push(fragment);
        }
        Ok(fragments)
    }

    pub fn reset_timestep(
        &self,
        fragment: &Path,
        output: &Path,
        timestep: u64,
    ) -> Result<(), DumpError> {
        let content = read(fragment)?;
        let rewritten = rewrite_timestep(&content, timestep, fragment)?;
        write(output, &rewritten)
    }
}

impl TrajectoryProcessor for DumpTrajectory {
    fn finalize(&self, trajectory: &Path, output: &Path) -> Result<(), DumpError> {
        let fragments = self.split(trajectory)?;
        let last = fragments.last().ok_or_else(|| DumpError::NoFrames {
            path: trajectory.to_path_buf(),
        })?;
        self.reset_timestep(last, output, 0)?;

        remove(trajectory)?;
        for fragment in &fragments {
            remove(fragment)?;
        }
        Ok(())
    }
}

fn split_frames(content: &str, path: &Path) -> Result<Vec<String>, DumpError> {
    let mut frames: Vec<String> = Vec::new();
    for line in content.lines() {
        if line.trim() == TIMESTEP_HEADER {
            frames.push(String::new());
        }
        match frames.last_mut() {
            Some(frame) => {
                frame.push_str(line);
                frame.push('\n');
            }
            None if line.trim().is_empty() => {}
            None => {
                return Err(DumpError::Malformed {
                    path: path.to_path_buf(),
                    reason: format!("content before the first '{}' header", TIMESTEP_HEADER),
                });
            }
        }
    }
    if frames.is_empty() {
        return Err(DumpError::NoFrames {
            path: path.to_path_buf(),
        });
    }
    Ok(frames)
}

fn rewrite_timestep(frame: &str, timestep: u64, path: &Path) -> Result<String, DumpError> {
    let mut lines: Vec<String> = frame.lines().map(str::to_string).collect();
    let header = lines
        .iter()
        .position(|l| l.trim() == TIMESTEP_HEADER)
        .ok_or_else(|| DumpError::NoFrames {
            path: path.to_path_buf(),
        })?;
    let value = lines
        .get_mut(header + 1)
        .ok_or_else(|| DumpError::Malformed {
            path: path.to_path_buf(),
            reason: "timestep header without a value".to_string(),
        })?;
    *value = timestep.to_string();

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn read(path: &Path) -> Result<String, DumpError> {
    fs::read_to_string(path).map_err(|source| DumpError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, content: &str) -> Result<(), DumpError> {
    fs::write(path, content).map_err(|source| DumpError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove(path: &Path) -> Result<(), DumpError> {
    fs::remove_file(path).map_err(|source| DumpError::Io {
        path: path.to_path_buf(),
        source,
    })
}

use super::error::EngineError;
use super::md::{EngineFactory, MdEngine};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, trace, warn};

const SYNC_MARKER: &str = "SOLIDFE_SYNC";

/// Launches LAMMPS executables, one process per engine session.
#[derive(Debug, Clone, PartialEq)]
pub struct LammpsLauncher {
    program: String,
    args: Vec<String>,
}

impl LammpsLauncher {
    /// `command` is the program followed by its arguments, for example
    /// `["mpirun", "-np", "4", "lmp"]`.
    pub fn new(command: Vec<String>) -> Result<Self, EngineError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| EngineError::Md("empty LAMMPS command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl EngineFactory for LammpsLauncher {
    fn launch(&self, workdir: &Path) -> Result<Box<dyn MdEngine>, EngineError> {
        Ok(Box::new(LammpsProcess::spawn(
            &self.program,
            &self.args,
            workdir,
        )?))
    }
}

/// A running LAMMPS process fed through its standard input. After each
/// command a marker is printed and awaited on standard output, which makes
/// every command blocking.
pub struct LammpsProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    workdir: PathBuf,
    sync_count: u64,
    closed: bool,
}

impl LammpsProcess {
    pub fn spawn(program: &str, args: &[String], workdir: &Path) -> Result<Self, EngineError> {
        debug!(program, workdir = %workdir.display(), "Starting LAMMPS.");
        let mut child = Command::new(program)
            .args(args)
            .args(["-log", "log.lammps", "-echo", "none", "-nonbuf"])
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Md(format!("failed to start '{}': {}", program, e)))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Md("LAMMPS standard output unavailable".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            workdir: workdir.to_path_buf(),
            sync_count: 0,
            closed: false,
        })
    }

    fn wait_for_marker(&mut self, command: &str) -> Result<(), EngineError> {
        let marker = format!("{} {}", SYNC_MARKER, self.sync_count);
        let mut errors = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.stdout.read_line(&mut line)?;
            if read == 0 {
                self.closed = true;
                let detail = if errors.is_empty() {
                    "no error message".to_string()
                } else {
                    errors.join("; ")
                };
                return Err(EngineError::Md(format!(
                    "LAMMPS exited while executing '{}': {}",
                    command, detail
                )));
            }
            let text = line.trim();
            if text == marker {
                break;
            } else if text.starts_with("ERROR") {
                errors.push(text.to_string());
            } else if text.starts_with("WARNING") {
                warn!(message = text, "LAMMPS warning.");
            } else {
                trace!(output = text);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Md(errors.join("; ")))
        }
    }
}

impl MdEngine for LammpsProcess {
    fn execute(&mut self, command: &str) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Md(format!(
                "cannot execute '{}': engine is closed",
                command
            )));
        }
        debug!(command);
        self.sync_count += 1;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EngineError::Md("LAMMPS standard input closed".to_string()))?;
        writeln!(stdin, "{}", command)?;
        writeln!(stdin, "print \"{} {}\"", SYNC_MARKER, self.sync_count)?;
        stdin.flush()?;
        self.wait_for_marker(command)
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if self.closed && self.stdin.is_none() {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut stdin) = self.stdin.take() {
            // The process may already be gone; waiting below reports that.
            let _ = writeln!(stdin, "quit");
        }
        let status = self.child.wait()?;
        if !status.success() {
            warn!(%status, "LAMMPS exited with a failure status.");
        }
        Ok(())
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl Drop for LammpsProcess {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

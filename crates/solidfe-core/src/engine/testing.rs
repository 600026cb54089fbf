//! A scripted stand-in for the MD engine. It records every command, tracks
//! which fixes are attached and writes the observable files a real engine
//! would write, filled with scripted values.

use super::classifier::StructureClassifier;
use super::commands::AVERAGE_FILE;
use super::config::CalculationSpec;
use super::context::KernelContext;
use super::error::EngineError;
use super::md::{EngineFactory, MdEngine};
use super::progress::ProgressReporter;
use crate::core::io::DumpTrajectory;
use crate::core::lattice::{BuiltinLattice, LatticeGenerator, LatticeInfo, LatticeRequest};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Values the engine reports, one entry per sampling window. The last entry
/// repeats once a list runs out.
#[derive(Debug, Clone)]
pub struct Script {
    pub pressures: Vec<f64>,
    pub msd: Vec<f64>,
    pub box_length: f64,
    /// Potential energy per atom written to the switching records.
    pub potential_energy: f64,
    /// A command containing this text fails.
    pub fail_on: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            pressures: vec![0.0],
            msd: vec![0.05],
            box_length: 18.0,
            potential_energy: -3.5,
            fail_on: None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct EngineLog {
    pub commands: Vec<String>,
    pub runs: Vec<u64>,
    pub attached: usize,
    pub detached: usize,
    pub active_fixes: BTreeSet<String>,
    pub closed: usize,
    pub launches: usize,
}

impl EngineLog {
    pub fn count(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }
}

struct Average {
    id: String,
    path: PathBuf,
    period: u64,
    columns: usize,
    box_average: bool,
    windows: usize,
}

struct Printer {
    id: String,
    path: PathBuf,
    columns: usize,
    forward: bool,
}

pub struct ScriptedEngine {
    workdir: PathBuf,
    script: Script,
    log: Arc<Mutex<EngineLog>>,
    step: u64,
    averages: Vec<Average>,
    printer: Option<Printer>,
    dump: Option<PathBuf>,
    closed: bool,
}

impl ScriptedEngine {
    pub fn new(workdir: &Path, script: Script) -> (Self, Arc<Mutex<EngineLog>>) {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        (Self::with_log(workdir, script, log.clone()), log)
    }

    pub fn with_log(workdir: &Path, script: Script, log: Arc<Mutex<EngineLog>>) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            script,
            log,
            step: 0,
            averages: Vec::new(),
            printer: None,
            dump: None,
            closed: false,
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.workdir.join(name)
    }

    fn value_for(values: &[f64], window: usize) -> f64 {
        values
            .get(window)
            .or(values.last())
            .copied()
            .unwrap_or(0.0)
    }

    fn attach(&mut self, tokens: &[&str], command: &str) -> Result<(), EngineError> {
        let id = tokens[1].to_string();
        let style = tokens.get(3).copied().unwrap_or_default();
        match style {
            "ave/time" => {
                let period: u64 = tokens[6].parse().map_err(|_| bad(command))?;
                let file_at = tokens.iter().position(|t| *t == "file").ok_or_else(|| bad(command))?;
                let columns = tokens[7..file_at].len();
                let name = tokens.get(file_at + 1).ok_or_else(|| bad(command))?;
                let path = self.resolve(name);
                fs::write(&path, format!("# Time-averaged data for fix {}\n", id))?;
                self.averages.retain(|a| a.id != id);
                self.averages.push(Average {
                    id: id.clone(),
                    path,
                    period,
                    columns,
                    box_average: *name == AVERAGE_FILE,
                    windows: 0,
                });
            }
            "print" => {
                let file_at = tokens.iter().position(|t| *t == "file").ok_or_else(|| bad(command))?;
                let name = tokens.get(file_at + 1).ok_or_else(|| bad(command))?;
                let columns = command.matches("${").count();
                let path = self.resolve(name);
                fs::write(&path, format!("# Fix print output for fix {}\n", id))?;
                self.printer = Some(Printer {
                    id: id.clone(),
                    path,
                    columns,
                    forward: name.starts_with("forward"),
                });
            }
            _ => {}
        }
        let mut log = self.log.lock().unwrap();
        if log.active_fixes.insert(id) {
            log.attached += 1;
        }
        Ok(())
    }

    fn detach(&mut self, id: &str) -> Result<(), EngineError> {
        let mut log = self.log.lock().unwrap();
        if !log.active_fixes.remove(id) {
            return Err(EngineError::Md(format!("Could not find fix ID {} to delete", id)));
        }
        log.detached += 1;
        drop(log);
        self.averages.retain(|a| a.id != id);
        if self.printer.as_ref().is_some_and(|p| p.id == id) {
            self.printer = None;
        }
        Ok(())
    }

    fn advance(&mut self, steps: u64) -> Result<(), EngineError> {
        self.log.lock().unwrap().runs.push(steps);
        if steps == 0 {
            if let Some(path) = &self.dump {
                let frame = format!(
                    "ITEM: TIMESTEP\n{}\nITEM: NUMBER OF ATOMS\n1\nITEM: BOX BOUNDS pp pp pp\n0 {l}\n0 {l}\n0 {l}\nITEM: ATOMS id type mass x y z vx vy vz\n1 1 63.546 0 0 0 0 0 0\n",
                    self.step,
                    l = self.script.box_length
                );
                append(path, &frame)?;
            }
            return Ok(());
        }

        for average in &mut self.averages {
            let rows = steps / average.period;
            let mut content = String::new();
            for row in 1..=rows {
                let step = self.step + row * average.period;
                let value = if average.box_average {
                    let l = self.script.box_length;
                    let p = Self::value_for(&self.script.pressures, average.windows);
                    format!("{} {} {} {} {}\n", step, l, l, l, p)
                } else {
                    let msd = Self::value_for(&self.script.msd, average.windows);
                    let columns: Vec<String> =
                        (0..average.columns).map(|_| msd.to_string()).collect();
                    format!("{} {}\n", step, columns.join(" "))
                };
                content.push_str(&value);
            }
            append(&average.path, &content)?;
            average.windows += 1;
        }

        if let Some(printer) = &self.printer {
            let mut content = String::new();
            for row in 0..steps {
                let frac = row as f64 / (steps - 1).max(1) as f64;
                let lambda = if printer.forward { frac } else { 1.0 - frac };
                let mut fields = vec![self.script.potential_energy.to_string()];
                fields.extend((0..printer.columns.saturating_sub(2)).map(|_| "0".to_string()));
                fields.push(lambda.to_string());
                content.push_str(&fields.join(" "));
                content.push('\n');
            }
            append(&printer.path, &content)?;
        }

        self.step += steps;
        Ok(())
    }
}

fn bad(command: &str) -> EngineError {
    EngineError::Md(format!("unparsable command '{}'", command))
}

fn append(path: &Path, content: &str) -> Result<(), EngineError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

impl MdEngine for ScriptedEngine {
    fn execute(&mut self, command: &str) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::Md(format!("'{}' sent to a closed engine", command)));
        }
        self.log.lock().unwrap().commands.push(command.to_string());
        if let Some(fail) = &self.script.fail_on {
            if command.contains(fail.as_str()) {
                return Err(EngineError::Md(format!("scripted failure on '{}'", command)));
            }
        }

        let tokens: Vec<&str> = command.split_whitespace().collect();
        match tokens.as_slice() {
            ["fix", _, _, ..] => self.attach(&tokens, command)?,
            ["unfix", id] => self.detach(id)?,
            ["run", steps, ..] => {
                let steps = steps.parse().map_err(|_| bad(command))?;
                self.advance(steps)?;
            }
            ["dump", _, _, _, _, file, ..] => {
                let path = self.resolve(file);
                self.dump = Some(path);
            }
            ["undump", _] => self.dump = None,
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), EngineError> {
        self.closed = true;
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }
}

/// Launches scripted engines that all report into one shared log.
pub struct ScriptedFactory {
    pub script: Script,
    pub log: Arc<Mutex<EngineLog>>,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: Arc::new(Mutex::new(EngineLog::default())),
        }
    }
}

impl EngineFactory for ScriptedFactory {
    fn launch(&self, workdir: &Path) -> Result<Box<dyn MdEngine>, EngineError> {
        self.log.lock().unwrap().launches += 1;
        Ok(Box::new(ScriptedEngine::with_log(
            workdir,
            self.script.clone(),
            self.log.clone(),
        )))
    }
}

/// Reports a fixed number of solid atoms and counts how often it was asked.
pub struct FixedClassifier {
    solid: usize,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(solid: usize) -> Self {
        Self {
            solid,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StructureClassifier for FixedClassifier {
    fn solid_count(&self, _snapshot: &Path) -> Result<usize, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.solid)
    }
}

pub fn lattice_for(spec: &CalculationSpec) -> LatticeInfo {
    BuiltinLattice
        .prepare(&LatticeRequest {
            lattice: &spec.lattice,
            lattice_constant: spec.lattice_constant,
            n_elements: spec.n_elements(),
        })
        .unwrap()
}

/// Owns everything a [`KernelContext`] borrows. The classifier reports a
/// fully solid system unless told otherwise.
pub struct Fixture {
    pub spec: CalculationSpec,
    pub lattice: LatticeInfo,
    pub classifier: FixedClassifier,
    pub reporter: ProgressReporter<'static>,
    pub dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new(spec: CalculationSpec) -> Self {
        let lattice = lattice_for(&spec);
        let solid = lattice.atom_count(spec.repeat);
        Self::with_solid_count(spec, solid)
    }

    pub fn with_solid_count(spec: CalculationSpec, solid: usize) -> Self {
        Self {
            lattice: lattice_for(&spec),
            spec,
            classifier: FixedClassifier::new(solid),
            reporter: ProgressReporter::new(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn context(&self) -> KernelContext<'_> {
        KernelContext::new(
            &self.spec,
            &self.lattice,
            self.dir.path(),
            &self.classifier,
            &DumpTrajectory,
            &self.reporter,
        )
    }

    pub fn engine(&self, script: Script) -> (ScriptedEngine, Arc<Mutex<EngineLog>>) {
        ScriptedEngine::new(self.dir.path(), script)
    }

    pub fn atom_count(&self) -> usize {
        self.lattice.atom_count(self.spec.repeat)
    }
}

use super::error::EngineError;
use std::path::Path;
use tracing::{debug, warn};

/// An external molecular dynamics engine speaking a LAMMPS-style command
/// language. Every call blocks until the engine has finished the command.
pub trait MdEngine {
    fn execute(&mut self, command: &str) -> Result<(), EngineError>;

    fn run(&mut self, steps: u64) -> Result<(), EngineError> {
        self.execute(&format!("run {}", steps))
    }

    /// Releases the engine. Calling it more than once is harmless.
    fn close(&mut self) -> Result<(), EngineError>;

    /// Directory the engine reads and writes its files in.
    fn workdir(&self) -> &Path;
}

pub trait EngineFactory: Sync {
    fn launch(&self, workdir: &Path) -> Result<Box<dyn MdEngine>, EngineError>;
}

/// Owns a launched engine and closes it when dropped, so every exit path of
/// a stage releases the engine.
pub struct EngineSession {
    engine: Box<dyn MdEngine>,
    closed: bool,
}

impl EngineSession {
    pub fn new(engine: Box<dyn MdEngine>) -> Self {
        Self {
            engine,
            closed: false,
        }
    }

    pub fn launch(factory: &dyn EngineFactory, workdir: &Path) -> Result<Self, EngineError> {
        Ok(Self::new(factory.launch(workdir)?))
    }

    pub fn engine(&mut self) -> &mut dyn MdEngine {
        self.engine.as_mut()
    }

    pub fn close(mut self) -> Result<(), EngineError> {
        self.closed = true;
        self.engine.close()
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if !self.closed {
            debug!("Closing engine session on early exit.");
            if let Err(e) = self.engine.close() {
                warn!(error = %e, "Failed to close engine.");
            }
        }
    }
}

/// Runs `body`, then removes the listed fixes whatever the outcome. An error
/// from `body` wins over an error from the cleanup.
pub fn with_fixes<T>(
    engine: &mut dyn MdEngine,
    fix_ids: &[String],
    body: impl FnOnce(&mut dyn MdEngine) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let outcome = body(engine);
    let mut cleanup = Ok(());
    for id in fix_ids {
        if let Err(e) = engine.execute(&format!("unfix {}", id)) {
            if outcome.is_err() {
                debug!(fix = %id, error = %e, "Ignoring cleanup failure after stage error.");
            } else if cleanup.is_ok() {
                cleanup = Err(e);
            }
        }
    }
    let value = outcome?;
    cleanup.map(|_| value)
}

/// Closes the engine ahead of a fatal error and hands the error back.
pub fn abort(engine: &mut dyn MdEngine, err: EngineError) -> EngineError {
    if let Err(close_err) = engine.close() {
        warn!(error = %close_err, "Failed to close engine while aborting.");
    }
    err
}

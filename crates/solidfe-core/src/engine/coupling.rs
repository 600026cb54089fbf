use super::commands;
use super::config::{CouplingFamily, PressureControl};
use super::error::EngineError;
use super::md::MdEngine;
use tracing::debug;

/// Scale factors applied to the target temperature and pressure over one
/// coupled run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingRamp {
    pub temp_start: f64,
    pub temp_end: f64,
    pub press_start: f64,
    pub press_end: f64,
}

impl CouplingRamp {
    pub const FULL: CouplingRamp = CouplingRamp {
        temp_start: 1.0,
        temp_end: 1.0,
        press_start: 1.0,
        press_end: 1.0,
    };

    /// Ramps the temperature while holding the full pressure.
    pub fn temperature(start: f64, end: f64) -> Self {
        Self {
            temp_start: start,
            temp_end: end,
            ..Self::FULL
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouplingTargets {
    pub temperature: f64,
    pub pressure: f64,
    pub control: PressureControl,
    pub thermostat_damping: f64,
    pub barostat_damping: f64,
}

impl CouplingTargets {
    fn temperatures(&self, ramp: &CouplingRamp) -> (f64, f64) {
        (
            ramp.temp_start * self.temperature,
            ramp.temp_end * self.temperature,
        )
    }

    fn pressures(&self, ramp: &CouplingRamp) -> (f64, f64) {
        (
            ramp.press_start * self.pressure,
            ramp.press_end * self.pressure,
        )
    }
}

/// A thermostat and barostat pair that can be attached to and detached from
/// a running engine.
pub trait Coupling {
    fn attach(&self, engine: &mut dyn MdEngine, ramp: &CouplingRamp) -> Result<(), EngineError>;
    fn detach(&self, engine: &mut dyn MdEngine) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoseHooverCoupling {
    pub targets: CouplingTargets,
}

impl Coupling for NoseHooverCoupling {
    fn attach(&self, engine: &mut dyn MdEngine, ramp: &CouplingRamp) -> Result<(), EngineError> {
        let t = &self.targets;
        engine.execute(&commands::npt(
            "1",
            t.temperatures(ramp),
            t.pressures(ramp),
            t.control,
            t.thermostat_damping,
            t.barostat_damping,
        ))
    }

    fn detach(&self, engine: &mut dyn MdEngine) -> Result<(), EngineError> {
        engine.execute(&commands::unfix("1"))
    }
}

const BERENDSEN_FIXES: [&str; 3] = ["1a", "1b", "1c"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BerendsenCoupling {
    pub targets: CouplingTargets,
}

impl Coupling for BerendsenCoupling {
    /// Attaches the three fixes in order. When one is rejected, the fixes
    /// already attached are released before the error is returned.
    fn attach(&self, engine: &mut dyn MdEngine, ramp: &CouplingRamp) -> Result<(), EngineError> {
        let t = &self.targets;
        let (t0, t1) = t.temperatures(ramp);
        let (p0, p1) = t.pressures(ramp);
        let fixes = [
            ("1a", "fix 1a all nve".to_string()),
            (
                "1b",
                format!(
                    "fix 1b all temp/berendsen {} {} {}",
                    t0, t1, t.thermostat_damping
                ),
            ),
            (
                "1c",
                format!(
                    "fix 1c all press/berendsen {} {} {} {}",
                    t.control.keyword(),
                    p0,
                    p1,
                    t.barostat_damping
                ),
            ),
        ];

        for (attached, (_, command)) in fixes.iter().enumerate() {
            if let Err(e) = engine.execute(command) {
                for (id, _) in fixes[..attached].iter().rev() {
                    if let Err(cleanup) = engine.execute(&commands::unfix(id)) {
                        debug!(fix = *id, error = %cleanup, "Release of partial coupling failed.");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn detach(&self, engine: &mut dyn MdEngine) -> Result<(), EngineError> {
        for id in BERENDSEN_FIXES {
            engine.execute(&commands::unfix(id))?;
        }
        Ok(())
    }
}

pub fn for_family(family: CouplingFamily, targets: CouplingTargets) -> Box<dyn Coupling> {
    match family {
        CouplingFamily::NoseHoover => Box::new(NoseHooverCoupling { targets }),
        CouplingFamily::Berendsen => Box::new(BerendsenCoupling { targets }),
    }
}

/// Attaches `coupling`, runs `body` and detaches again on every exit path.
/// When both the body and the detach fail, the body's error is returned.
pub fn with_coupling<T>(
    coupling: &dyn Coupling,
    engine: &mut dyn MdEngine,
    ramp: &CouplingRamp,
    body: impl FnOnce(&mut dyn MdEngine) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    coupling.attach(engine, ramp)?;
    let outcome = body(engine);
    let detached = coupling.detach(engine);
    match (outcome, detached) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(detach_err)) => {
            debug!(error = %detach_err, "Detach failed after stage error.");
            Err(e)
        }
    }
}

/// One coupled run of `steps` steps.
pub fn cycle(
    coupling: &dyn Coupling,
    engine: &mut dyn MdEngine,
    ramp: &CouplingRamp,
    steps: u64,
) -> Result<(), EngineError> {
    with_coupling(coupling, engine, ramp, |e| e.run(steps))
}

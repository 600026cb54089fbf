use super::config::MdSettings;
use super::error::EngineError;
use super::md::MdEngine;
use super::progress::{Progress, ProgressReporter};
use crate::core::io::ColumnTable;
use tracing::{error, info};

/// One sampling window: the steps run per cycle and the rows the averaging
/// fix appends for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub steps: u64,
    pub rows: usize,
}

impl Window {
    pub fn from_settings(md: &MdSettings) -> Self {
        Self {
            steps: md.n_small_steps,
            rows: md.rows_per_window(),
        }
    }

    /// Rows of the latest window minus its first, transient, row.
    pub fn tail_rows(&self) -> usize {
        self.rows.saturating_sub(1)
    }

    pub fn tail(&self, table: &ColumnTable) -> ColumnTable {
        table.tail(self.tail_rows())
    }
}

/// Statistics of the monitored observable after one window, with whatever
/// side data the stage wants to keep from the same read.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceSample<S> {
    pub mean: f64,
    pub std: f64,
    pub side: S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Stop,
    Continue,
}

pub trait StopRule {
    /// Judges a window. Feeding the window that returned `Stop` again must
    /// return `Stop` again.
    fn evaluate(&mut self, mean: f64, std: f64) -> Decision;

    /// Human-readable stop condition, used in non-convergence errors.
    fn criterion(&self) -> String;
}

/// Stops once the mean is within `tolerance` of a known target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedTarget {
    pub target: f64,
    pub tolerance: f64,
}

impl StopRule for FixedTarget {
    fn evaluate(&mut self, mean: f64, _std: f64) -> Decision {
        if (mean - self.target).abs() < self.tolerance {
            Decision::Stop
        } else {
            Decision::Continue
        }
    }

    fn criterion(&self) -> String {
        format!("target {} ± {}", self.target, self.tolerance)
    }
}

/// Stops once the spread changes by less than `tolerance` between windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdPlateau {
    pub tolerance: f64,
    last_std: f64,
}

impl StdPlateau {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            last_std: 0.0,
        }
    }
}

impl StopRule for StdPlateau {
    fn evaluate(&mut self, _mean: f64, std: f64) -> Decision {
        if (std - self.last_std).abs() < self.tolerance {
            Decision::Stop
        } else {
            self.last_std = std;
            Decision::Continue
        }
    }

    fn criterion(&self) -> String {
        format!(
            "std change below {} (last std {})",
            self.tolerance, self.last_std
        )
    }
}

/// Stops once two consecutive window means agree within `tolerance`. The
/// first window never stops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsecutiveMean {
    pub tolerance: f64,
    last_mean: Option<f64>,
}

impl ConsecutiveMean {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            last_mean: None,
        }
    }
}

impl StopRule for ConsecutiveMean {
    fn evaluate(&mut self, mean: f64, _std: f64) -> Decision {
        match self.last_mean {
            Some(last) if (mean - last).abs() < self.tolerance => Decision::Stop,
            _ => {
                self.last_mean = Some(mean);
                Decision::Continue
            }
        }
    }

    fn criterion(&self) -> String {
        format!("consecutive means within {}", self.tolerance)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Converged<S> {
    pub sample: ConvergenceSample<S>,
    pub cycles: usize,
}

/// Runs windows until `rule` stops or `max_cycles` windows have run. Each
/// window advances the engine by `window.steps` and then calls `read` for a
/// fresh sample.
pub fn converge<S, R, F>(
    engine: &mut dyn MdEngine,
    stage: &'static str,
    window: &Window,
    max_cycles: usize,
    reporter: &ProgressReporter,
    mut read: F,
    rule: &mut R,
) -> Result<Converged<S>, EngineError>
where
    R: StopRule,
    F: FnMut(&dyn MdEngine) -> Result<ConvergenceSample<S>, EngineError>,
{
    reporter.report(Progress::Message(stage.to_string()));
    reporter.report(Progress::TaskStart {
        total_steps: max_cycles as u64,
    });
    let mut last_mean = f64::NAN;

    for cycle in 1..=max_cycles {
        engine.run(window.steps)?;
        let sample = read(&*engine)?;
        reporter.report(Progress::TaskIncrement);
        info!(
            stage,
            cycle,
            mean = sample.mean,
            std = sample.std,
            "Window finished."
        );

        if rule.evaluate(sample.mean, sample.std) == Decision::Stop {
            reporter.report(Progress::TaskFinish);
            return Ok(Converged {
                sample,
                cycles: cycle,
            });
        }
        last_mean = sample.mean;
    }

    reporter.report(Progress::TaskFinish);
    let criterion = rule.criterion();
    error!(
        stage,
        cycles = max_cycles,
        last_mean,
        criterion = %criterion,
        "Convergence loop exhausted its window budget."
    );
    Err(EngineError::NonConvergence {
        stage,
        cycles: max_cycles,
        last_mean,
        criterion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Script, ScriptedEngine};

    fn constant_sample(
        mean: f64,
    ) -> impl FnMut(&dyn MdEngine) -> Result<ConvergenceSample<()>, EngineError> {
        move |_| {
            Ok(ConvergenceSample {
                mean,
                std: 0.0,
                side: (),
            })
        }
    }

    #[test]
    fn fixed_target_stops_inside_tolerance() {
        let mut rule = FixedTarget {
            target: 0.0,
            tolerance: 0.5,
        };
        assert_eq!(rule.evaluate(0.49, 3.0), Decision::Stop);
        assert_eq!(rule.evaluate(-0.6, 3.0), Decision::Continue);
    }

    #[test]
    fn std_plateau_compares_against_previous_window() {
        let mut rule = StdPlateau::new(0.1);
        assert_eq!(rule.evaluate(0.0, 1.0), Decision::Continue);
        assert_eq!(rule.evaluate(0.0, 1.5), Decision::Continue);
        assert_eq!(rule.evaluate(0.0, 1.55), Decision::Stop);
    }

    #[test]
    fn std_plateau_starts_from_zero() {
        let mut rule = StdPlateau::new(0.1);
        assert_eq!(rule.evaluate(5.0, 0.05), Decision::Stop);
    }

    #[test]
    fn consecutive_mean_never_stops_on_the_first_window() {
        let mut rule = ConsecutiveMean::new(1e9);
        assert_eq!(rule.evaluate(3.0, 0.0), Decision::Continue);
        assert_eq!(rule.evaluate(3.0, 0.0), Decision::Stop);
    }

    #[test]
    fn stop_rules_are_idempotent_on_the_stopping_window() {
        let mut fixed = FixedTarget {
            target: 1.0,
            tolerance: 0.5,
        };
        let mut plateau = StdPlateau::new(0.1);
        let mut consecutive = ConsecutiveMean::new(0.1);

        assert_eq!(plateau.evaluate(0.0, 2.0), Decision::Continue);
        assert_eq!(consecutive.evaluate(7.0, 0.0), Decision::Continue);

        let windows: [(&mut dyn StopRule, f64, f64); 3] = [
            (&mut fixed, 1.2, 0.0),
            (&mut plateau, 0.0, 2.05),
            (&mut consecutive, 7.05, 0.0),
        ];
        for (rule, mean, std) in windows {
            assert_eq!(rule.evaluate(mean, std), Decision::Stop);
            assert_eq!(rule.evaluate(mean, std), Decision::Stop);
            assert_eq!(rule.evaluate(mean, std), Decision::Stop);
        }
    }

    #[test]
    fn converge_returns_sample_and_cycle_count() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, log) = ScriptedEngine::new(dir.path(), Script::default());
        let window = Window {
            steps: 1000,
            rows: 10,
        };
        let mut rule = ConsecutiveMean::new(0.5);

        let converged = converge(
            &mut engine,
            "test",
            &window,
            5,
            &ProgressReporter::new(),
            constant_sample(2.0),
            &mut rule,
        )
        .unwrap();

        assert_eq!(converged.cycles, 2);
        assert_eq!(converged.sample.mean, 2.0);
        assert_eq!(log.lock().unwrap().runs, vec![1000, 1000]);
    }

    #[test]
    fn converge_fails_after_exactly_max_cycles_windows() {
        let dir = tempfile::tempdir().unwrap();
        let (mut engine, log) = ScriptedEngine::new(dir.path(), Script::default());
        let window = Window {
            steps: 100,
            rows: 1,
        };
        let mut rule = FixedTarget {
            target: 0.0,
            tolerance: 0.5,
        };

        let result = converge(
            &mut engine,
            "pressure convergence",
            &window,
            5,
            &ProgressReporter::new(),
            constant_sample(1000.0),
            &mut rule,
        );

        match result {
            Err(EngineError::NonConvergence {
                cycles, last_mean, ..
            }) => {
                assert_eq!(cycles, 5);
                assert_eq!(last_mean, 1000.0);
            }
            other => panic!("expected non-convergence, got {:?}", other.map(|c| c.cycles)),
        }
        assert_eq!(log.lock().unwrap().runs.len(), 5);
    }

    #[test]
    fn window_tail_drops_the_first_row() {
        let window = Window { steps: 1000, rows: 4 };
        let table = ColumnTable::parse("1\n2\n3\n4\n5\n6\n7\n8\n").unwrap();
        assert_eq!(window.tail(&table).column(0).unwrap(), vec![6.0, 7.0, 8.0]);
    }

    #[test]
    fn single_row_window_uses_the_whole_file() {
        let window = Window { steps: 100, rows: 1 };
        let table = ColumnTable::parse("1\n2\n").unwrap();
        assert_eq!(window.tail(&table).len(), 2);
    }
}

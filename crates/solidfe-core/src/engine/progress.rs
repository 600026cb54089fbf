/// Events emitted while a kernel runs.
///
/// A kernel reports four phases (preparation, averaging, switching and
/// reduction). Inside a phase, each convergence loop and the switching
/// iterations are reported as a task of known length.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// `total_steps` is the upper bound on windows or iterations.
    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// Names the stage about to sample.
    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards events to an optional callback; silent without one.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::PhaseStart { name: "Averaging" });
        reporter.report(Progress::TaskIncrement);
    }

    #[test]
    fn callback_receives_events_in_order() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));

        reporter.report(Progress::TaskStart { total_steps: 2 });
        reporter.report(Progress::Message("pressure convergence".to_string()));
        reporter.report(Progress::TaskFinish);
        drop(reporter);

        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                Progress::TaskStart { total_steps: 2 },
                Progress::Message("pressure convergence".to_string()),
                Progress::TaskFinish,
            ]
        );
    }
}

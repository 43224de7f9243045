use crate::config::{ExplorerSettings, Strategy};
use crate::error::HarnessError;
use crate::executor::{Executor, PathReport};
use crate::oracle::RunOutcome;
use crate::scheduler::{DepthFirstScheduler, PathScheduler, RandomScheduler};
use serde::Serialize;
use tracing::{debug, info};

/// Counters for one exploration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExplorationStats {
    pub paths: u64,
    pub successes: u64,
    pub discards: u64,
    /// Paths the subject itself failed on.
    pub faults: u64,
    /// Paths stopped by a harness limit, such as pool exhaustion.
    pub limits: u64,
    /// The scheduler ran out of paths before the budget did.
    pub exhausted: bool,
    /// Exit status of the most recent path.
    pub last_exit_code: i32,
}

impl ExplorationStats {
    fn count(&mut self, outcome: &RunOutcome) {
        self.paths += 1;
        self.last_exit_code = outcome.exit_code();
        match outcome {
            RunOutcome::Success => self.successes += 1,
            RunOutcome::Discarded => self.discards += 1,
            RunOutcome::Fatal(HarnessError::Subject { .. }) => self.faults += 1,
            RunOutcome::Fatal(_) => self.limits += 1,
        }
    }
}

/// Drives an [`Executor`] over the plans of a [`PathScheduler`] until the
/// schedule is exhausted or `max_paths` paths have run.
pub struct Explorer {
    scheduler: Box<dyn PathScheduler>,
    max_paths: u64,
}

impl Explorer {
    pub fn new(scheduler: Box<dyn PathScheduler>, max_paths: u64) -> Self {
        Self {
            scheduler,
            max_paths,
        }
    }

    /// Depth-first for `exhaustive`, seeded sampling for `random`.
    pub fn from_settings(settings: &ExplorerSettings) -> Self {
        let scheduler: Box<dyn PathScheduler> = match settings.strategy {
            Strategy::Exhaustive => Box::new(DepthFirstScheduler::new()),
            Strategy::Random => Box::new(RandomScheduler::new(settings.seed)),
        };
        Self::new(scheduler, settings.max_paths)
    }

    /// Runs paths, handing every finished one to `visit`.
    ///
    /// A path failing in a way that would fail every other path too (bad
    /// arguments, an unusable allow-list, harness misuse) stops the
    /// exploration with that error.
    pub fn run<X, V>(
        &mut self,
        executor: &mut X,
        mut visit: V,
    ) -> Result<ExplorationStats, HarnessError>
    where
        X: Executor,
        V: FnMut(&PathReport),
    {
        let mut stats = ExplorationStats::default();
        while stats.paths < self.max_paths {
            let Some(plan) = self.scheduler.next_plan() else {
                stats.exhausted = true;
                break;
            };
            let PathReport { outcome, record } = executor.execute(&plan);
            self.scheduler.report_path(&record);
            let report = match outcome {
                RunOutcome::Fatal(err) if err.aborts_exploration() => {
                    debug!("Stopping exploration after {} paths: {}", stats.paths, err);
                    return Err(err);
                }
                outcome => PathReport { outcome, record },
            };
            stats.count(&report.outcome);
            visit(&report);
        }
        info!(
            "Explored {} paths: {} succeeded, {} discarded, {} subject faults, {} harness limits{}",
            stats.paths,
            stats.successes,
            stats.discards,
            stats.faults,
            stats.limits,
            if stats.exhausted { " (all paths covered)" } else { "" }
        );
        Ok(stats)
    }
}

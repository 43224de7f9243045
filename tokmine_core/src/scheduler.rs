use crate::engine::{Fill, PathPlan, PathRecord};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};

/// A `PathScheduler` decides which path the explorer runs next.
///
/// Every plan handed out by [`PathScheduler::next_plan`] is followed by one
/// call to [`PathScheduler::report_path`] with what that path recorded, so
/// schedulers can derive the next plan from the decisions just taken.
pub trait PathScheduler {
    /// The next path to run, or `None` once the schedule is exhausted.
    fn next_plan(&mut self) -> Option<PathPlan>;

    /// Called with the record of the path from the latest plan.
    fn report_path(&mut self, record: &PathRecord);
}

/// Enumerates every path exactly once, depth first.
///
/// The decisions of a finished path are treated as an odometer: trailing
/// decisions already at their last alternative are dropped and the last
/// remaining one is advanced. When nothing is left to advance, every
/// combination has been visited.
#[derive(Debug)]
pub struct DepthFirstScheduler {
    pending: Option<Vec<usize>>,
}

impl DepthFirstScheduler {
    pub fn new() -> Self {
        Self {
            pending: Some(Vec::new()),
        }
    }
}

impl Default for DepthFirstScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PathScheduler for DepthFirstScheduler {
    fn next_plan(&mut self) -> Option<PathPlan> {
        self.pending.take().map(PathPlan::replay)
    }

    fn report_path(&mut self, record: &PathRecord) {
        let mut decisions = record.decisions.clone();
        while decisions
            .last()
            .is_some_and(|last| last.chosen + 1 >= last.arity)
        {
            decisions.pop();
        }
        let Some(last) = decisions.last_mut() else {
            self.pending = None;
            return;
        };
        last.chosen += 1;
        self.pending = Some(decisions.iter().map(|d| d.chosen).collect());
    }
}

/// Samples paths with a seeded ChaCha8 stream. Never exhausts; the explorer's
/// path budget bounds it.
#[derive(Debug)]
pub struct RandomScheduler {
    rng: ChaCha8Rng,
}

impl RandomScheduler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl PathScheduler for RandomScheduler {
    fn next_plan(&mut self) -> Option<PathPlan> {
        Some(PathPlan {
            prefix: Vec::new(),
            fill: Fill::Random(self.rng.next_u64()),
        })
    }

    /// Random sampling does not adapt to what a path recorded.
    fn report_path(&mut self, _record: &PathRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Decision;

    fn record(decisions: &[(usize, usize)]) -> PathRecord {
        PathRecord {
            decisions: decisions
                .iter()
                .map(|&(chosen, arity)| Decision { chosen, arity })
                .collect(),
            ..PathRecord::default()
        }
    }

    #[test]
    fn depth_first_starts_with_the_empty_prefix() {
        let mut scheduler = DepthFirstScheduler::new();
        assert_eq!(scheduler.next_plan(), Some(PathPlan::replay(Vec::new())));
        assert_eq!(
            scheduler.next_plan(),
            None,
            "No second plan before the first path is reported"
        );
    }

    #[test]
    fn depth_first_advances_like_an_odometer() {
        let mut scheduler = DepthFirstScheduler::new();
        scheduler.next_plan();
        scheduler.report_path(&record(&[(0, 2), (1, 2)]));
        assert_eq!(scheduler.next_plan(), Some(PathPlan::replay(vec![1])));
        scheduler.report_path(&record(&[(1, 2), (0, 3)]));
        assert_eq!(scheduler.next_plan(), Some(PathPlan::replay(vec![1, 1])));
    }

    #[test]
    fn depth_first_finishes_after_last_alternative() {
        let mut scheduler = DepthFirstScheduler::new();
        scheduler.next_plan();
        scheduler.report_path(&record(&[(1, 2), (2, 3)]));
        assert_eq!(scheduler.next_plan(), None);
    }

    #[test]
    fn depth_first_visits_every_combination_once() {
        // Two independent binary decisions followed by a ternary one.
        let arities = [2usize, 2, 3];
        let mut scheduler = DepthFirstScheduler::new();
        let mut seen = std::collections::HashSet::new();
        while let Some(plan) = scheduler.next_plan() {
            let mut path: Vec<usize> = plan.prefix.clone();
            path.resize(arities.len(), 0);
            assert!(seen.insert(path.clone()), "Path {path:?} visited twice");
            let taken: Vec<(usize, usize)> = path.into_iter().zip(arities).collect();
            scheduler.report_path(&record(&taken));
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn path_without_decisions_ends_the_schedule() {
        let mut scheduler = DepthFirstScheduler::new();
        scheduler.next_plan();
        scheduler.report_path(&PathRecord::default());
        assert!(scheduler.next_plan().is_none());
    }

    #[test]
    fn random_scheduler_is_reproducible_per_seed() {
        let mut first = RandomScheduler::new(7);
        let mut second = RandomScheduler::new(7);
        let mut other = RandomScheduler::new(8);
        let a: Vec<_> = (0..5).map(|_| first.next_plan().unwrap()).collect();
        let b: Vec<_> = (0..5).map(|_| second.next_plan().unwrap()).collect();
        let c: Vec<_> = (0..5).map(|_| other.next_plan().unwrap()).collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|plan| plan.prefix.is_empty()));
    }
}

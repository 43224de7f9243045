use crate::context::HarnessContext;
use crate::engine::{DomainEngine, PathPlan, PathRecord};
use crate::error::{HarnessError, PANIC_EXIT_CODE};
use crate::oracle::RunOutcome;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::debug;

/// Outcome of one explored path together with what the engine observed.
#[derive(Debug)]
pub struct PathReport {
    pub outcome: RunOutcome,
    pub record: PathRecord,
}

/// An `Executor` runs the harness along one path.
///
/// It never fails itself: whatever the run did, including a panic, ends up
/// in the returned [`PathReport`].
pub trait Executor {
    /// Runs the path selected by `plan` in a fresh run context.
    fn execute(&mut self, plan: &PathPlan) -> PathReport;
}

/// Runs a harness closure against a fresh [`HarnessContext`] for every path.
///
/// A panic inside the closure is caught and becomes a subject fault with
/// exit status [`PANIC_EXIT_CODE`].
pub struct InProcessExecutor<F>
where
    F: Fn(&mut HarnessContext<DomainEngine>) -> Result<(), HarnessError>,
{
    harness_fn: F,
}

impl<F> InProcessExecutor<F>
where
    F: Fn(&mut HarnessContext<DomainEngine>) -> Result<(), HarnessError>,
{
    pub fn new(harness_fn: F) -> Self {
        Self { harness_fn }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic type".to_string()
    }
}

impl<F> Executor for InProcessExecutor<F>
where
    F: Fn(&mut HarnessContext<DomainEngine>) -> Result<(), HarnessError>,
{
    fn execute(&mut self, plan: &PathPlan) -> PathReport {
        let mut ctx = HarnessContext::new(DomainEngine::new(plan));
        let result = catch_unwind(AssertUnwindSafe(|| (self.harness_fn)(&mut ctx)));

        let mut outcome = match result {
            Ok(run) => RunOutcome::from_result(run),
            Err(payload) => RunOutcome::Fatal(HarnessError::Subject {
                code: PANIC_EXIT_CODE,
                message: panic_message(payload.as_ref()),
            }),
        };
        ctx.terminate();

        let record = ctx.into_engine().into_record();
        // A harness that discarded through the engine directly still ends
        // its path as a discard.
        if record.discarded && outcome.is_success() {
            outcome = RunOutcome::Discarded;
        }
        debug!(
            "Path with {} decisions ended with exit status {}",
            record.decisions.len(),
            outcome.exit_code()
        );
        PathReport { outcome, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charclass::RestrictionProfile;
    use crate::cursor::ByteStream;
    use crate::engine::Engine;

    #[test]
    fn successful_harness_reports_decisions() {
        let mut executor = InProcessExecutor::new(|ctx: &mut HarnessContext<DomainEngine>| {
            let buffer = ctx.token_input(3, RestrictionProfile::Digits)?;
            ctx.bind(buffer)?;
            let mut stream = ctx.stream()?;
            stream.read_byte()?;
            stream.read_byte()?;
            ctx.report(true)
        });
        let report = executor.execute(&PathPlan::default());
        assert!(report.outcome.is_success());
        assert_eq!(report.outcome.exit_code(), 0);
        // NUL, '0' or one of six whitespace bytes at both leading positions.
        assert_eq!(report.record.decisions.len(), 2);
        assert!(report.record.decisions.iter().all(|d| d.arity == 8));
    }

    #[test]
    fn panicking_harness_becomes_subject_fault() {
        let mut executor = InProcessExecutor::new(|_ctx: &mut HarnessContext<DomainEngine>| {
            panic!("grammar blew up");
        });
        let report = executor.execute(&PathPlan::default());
        match report.outcome {
            RunOutcome::Fatal(HarnessError::Subject { code, message }) => {
                assert_eq!(code, PANIC_EXIT_CODE);
                assert_eq!(message, "grammar blew up");
            }
            other => panic!("Expected subject fault, got {other:?}"),
        }
    }

    #[test]
    fn negative_report_is_a_discard() {
        let mut executor = InProcessExecutor::new(|ctx: &mut HarnessContext<DomainEngine>| {
            let buffer = ctx.printable_input(2)?;
            ctx.bind(buffer)?;
            ctx.report(false)
        });
        let report = executor.execute(&PathPlan::default());
        assert!(matches!(report.outcome, RunOutcome::Discarded));
        assert!(report.record.discarded);
        assert_eq!(report.outcome.exit_code(), 1);
    }

    #[test]
    fn direct_engine_discard_overrides_success() {
        let mut executor = InProcessExecutor::new(|ctx: &mut HarnessContext<DomainEngine>| {
            ctx.engine_mut().discard_path();
            Ok(())
        });
        let report = executor.execute(&PathPlan::default());
        assert!(matches!(report.outcome, RunOutcome::Discarded));
    }

    #[test]
    fn divergent_prefix_is_fatal_engine_error() {
        let mut executor = InProcessExecutor::new(|ctx: &mut HarnessContext<DomainEngine>| {
            let buffer = ctx.token_input(2, RestrictionProfile::Digits)?;
            ctx.bind(buffer)?;
            ctx.stream()?.read_byte()?;
            Ok(())
        });
        let report = executor.execute(&PathPlan::replay(vec![50]));
        assert!(matches!(
            report.outcome,
            RunOutcome::Fatal(HarnessError::Engine(_))
        ));
        assert_eq!(report.outcome.exit_code(), 6);
    }
}

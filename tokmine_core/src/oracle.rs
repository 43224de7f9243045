use crate::engine::Engine;
use crate::error::{HarnessError, PANIC_EXIT_CODE};
use crate::executor::PathReport;
use serde::Serialize;

/// Severity for a subject that panicked.
const PANIC_SEVERITY: u8 = 10;
/// Severity for a subject that stopped with its own fatal status.
const SUBJECT_EXIT_SEVERITY: u8 = 5;

/// The subject's verdict on the input of the current path.
///
/// A rejected input is not a bug: the engine is told to drop the path and
/// the caller unwinds with [`HarnessError::Discarded`].
pub fn report<E: Engine>(engine: &mut E, success: bool) -> Result<(), HarnessError> {
    if success {
        Ok(())
    } else {
        engine.discard_path();
        Err(HarnessError::Discarded)
    }
}

/// How one run ended. Produced once per run.
#[derive(Debug)]
pub enum RunOutcome {
    Success,
    Discarded,
    Fatal(HarnessError),
}

impl RunOutcome {
    /// Classifies a finished run. Discards and infeasible paths both prune.
    pub fn from_result(result: Result<(), HarnessError>) -> Self {
        match result {
            Ok(()) => RunOutcome::Success,
            Err(err) if err.is_pruned_path() => RunOutcome::Discarded,
            Err(err) => RunOutcome::Fatal(err),
        }
    }

    /// The process status this outcome maps to: 0, 1, or the error's own.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::Discarded => 1,
            RunOutcome::Fatal(err) => err.exit_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

/// A genuine defect found on one path.
#[derive(Debug, Clone, Serialize)]
pub struct BugReport {
    /// Decisions that replay the failing path.
    pub decisions: Vec<usize>,
    pub description: String,
    /// MD5 of the decision vector, for deduplication.
    pub input_hash: String,
    pub exit_code: i32,
    pub severity: u8,
    /// Paths that failed with the same cause. One when the oracle reports it.
    pub occurrences: u64,
}

impl BugReport {
    /// Two reports share a cause when the subject failed the same way.
    pub fn cause(&self) -> (i32, &str) {
        (self.exit_code, &self.description)
    }
}

/// An `Oracle` looks at a finished path and decides whether it is a defect.
pub trait Oracle {
    fn examine(&self, report: &PathReport) -> Option<BugReport>;
}

/// Reports subject faults only.
///
/// Successes, oracle discards, infeasible paths and harness-limit
/// conditions such as pool exhaustion are never defects.
#[derive(Debug, Default)]
pub struct DefectOracle;

impl DefectOracle {
    /// Creates a new `DefectOracle`.
    pub fn new() -> Self {
        DefectOracle
    }
}

/// MD5 over the decisions as little-endian `u64`s, in hex.
pub fn decision_hash(decisions: &[usize]) -> String {
    let bytes: Vec<u8> = decisions
        .iter()
        .flat_map(|chosen| (*chosen as u64).to_le_bytes())
        .collect();
    format!("{:x}", md5::compute(bytes))
}

impl Oracle for DefectOracle {
    fn examine(&self, report: &PathReport) -> Option<BugReport> {
        match &report.outcome {
            RunOutcome::Fatal(HarnessError::Subject { code, message }) => {
                let decisions = report.record.choices();
                Some(BugReport {
                    input_hash: decision_hash(&decisions),
                    decisions,
                    description: message.clone(),
                    exit_code: *code,
                    severity: if *code == PANIC_EXIT_CODE {
                        PANIC_SEVERITY
                    } else {
                        SUBJECT_EXIT_SEVERITY
                    },
                    occurrences: 1,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Decision, DomainEngine, EngineError, PathPlan, PathRecord};
    use crate::pool::PoolError;

    fn path(outcome: RunOutcome) -> PathReport {
        PathReport {
            outcome,
            record: PathRecord {
                decisions: vec![
                    Decision {
                        chosen: 3,
                        arity: 4,
                    },
                    Decision {
                        chosen: 0,
                        arity: 2,
                    },
                ],
                recorded: Vec::new(),
                discarded: false,
            },
        }
    }

    #[test]
    fn report_true_falls_through() {
        let mut engine = DomainEngine::new(&PathPlan::default());
        assert!(report(&mut engine, true).is_ok());
        assert!(!engine.is_discarded());
    }

    #[test]
    fn report_false_discards_silently() {
        let mut engine = DomainEngine::new(&PathPlan::default());
        let err = report(&mut engine, false).unwrap_err();
        assert!(matches!(err, HarnessError::Discarded));
        assert!(engine.is_discarded());
        assert!(matches!(
            RunOutcome::from_result(Err(err)),
            RunOutcome::Discarded
        ));
    }

    #[test]
    fn defect_oracle_reports_subject_panic() {
        let oracle = DefectOracle::new();
        let report = path(RunOutcome::Fatal(HarnessError::Subject {
            code: PANIC_EXIT_CODE,
            message: "attempt to divide by zero".to_string(),
        }));
        let bug = oracle
            .examine(&report)
            .expect("Oracle should report a subject panic");
        assert_eq!(bug.decisions, vec![3, 0]);
        assert_eq!(bug.description, "attempt to divide by zero");
        assert_eq!(bug.input_hash, decision_hash(&[3, 0]));
        assert_eq!(bug.severity, PANIC_SEVERITY);
        assert_eq!(bug.exit_code, PANIC_EXIT_CODE);
        assert_eq!(bug.occurrences, 1);
        assert_eq!(bug.cause(), (PANIC_EXIT_CODE, "attempt to divide by zero"));
    }

    #[test]
    fn defect_oracle_ignores_success_and_discard() {
        let oracle = DefectOracle::new();
        assert!(oracle.examine(&path(RunOutcome::Success)).is_none());
        assert!(oracle.examine(&path(RunOutcome::Discarded)).is_none());
    }

    #[test]
    fn defect_oracle_ignores_harness_limits() {
        let oracle = DefectOracle::new();
        let exhausted = path(RunOutcome::Fatal(HarnessError::Pool(PoolError::Exhausted {
            index: 100,
            capacity: 100,
        })));
        assert!(oracle.examine(&exhausted).is_none());
        assert!(matches!(
            RunOutcome::from_result(Err(HarnessError::Engine(EngineError::Infeasible {
                label: "tok_0".to_string()
            }))),
            RunOutcome::Discarded
        ));
    }

    #[test]
    fn bug_report_serializes_with_replayable_decisions() {
        let report = path(RunOutcome::Fatal(HarnessError::Subject {
            code: 7,
            message: "division by zero".to_string(),
        }));
        let bug = DefectOracle::new().examine(&report).unwrap();
        let json = serde_json::to_value(&bug).unwrap();
        assert_eq!(json["decisions"], serde_json::json!([3, 0]));
        assert_eq!(json["exit_code"], 7);
        assert_eq!(json["severity"], SUBJECT_EXIT_SEVERITY);
    }

    #[test]
    fn distinct_paths_hash_differently() {
        assert_ne!(decision_hash(&[1, 2]), decision_hash(&[2, 1]));
        assert_eq!(decision_hash(&[]), format!("{:x}", md5::compute(b"")));
    }
}

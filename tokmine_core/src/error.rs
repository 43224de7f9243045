use crate::allowlist::AllowListError;
use crate::charclass::ProfileError;
use crate::context::Phase;
use crate::cursor::CursorError;
use crate::engine::EngineError;
use crate::pool::PoolError;
use thiserror::Error;

/// Exit status of a subject that panicked, matching Rust's own panic status.
pub const PANIC_EXIT_CODE: i32 = 101;

/// Every way a harness run can stop early.
///
/// Each variant maps to a distinct process exit status through
/// [`HarnessError::exit_code`]. `Discarded` is not a fault: it is how an
/// oracle-rejected path unwinds back to the executor.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Argument error: {0}")]
    Argument(String),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    AllowList(#[from] AllowListError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Cannot {action} while the harness is {phase}")]
    Phase { action: &'static str, phase: Phase },

    #[error("Path discarded by the oracle")]
    Discarded,

    #[error("Subject fault (exit {code}): {message}")]
    Subject { code: i32, message: String },
}

impl HarnessError {
    pub fn exit_code(&self) -> i32 {
        match self {
            HarnessError::Argument(_) | HarnessError::Discarded => 1,
            HarnessError::Profile(_) => 2,
            HarnessError::AllowList(_) => 3,
            HarnessError::Pool(PoolError::Exhausted { .. }) => 4,
            HarnessError::Cursor(_) => 5,
            HarnessError::Engine(EngineError::Infeasible { .. }) => 1,
            HarnessError::Pool(_) | HarnessError::Engine(_) | HarnessError::Phase { .. } => 6,
            HarnessError::Subject { code, .. } => *code,
        }
    }

    /// Paths that end this way are pruned silently, never reported as defects.
    pub fn is_pruned_path(&self) -> bool {
        matches!(
            self,
            HarnessError::Discarded | HarnessError::Engine(EngineError::Infeasible { .. })
        )
    }

    /// Misconfiguration that would fail every path the same way.
    pub fn aborts_exploration(&self) -> bool {
        match self {
            HarnessError::Argument(_)
            | HarnessError::Profile(_)
            | HarnessError::AllowList(_)
            | HarnessError::Phase { .. } => true,
            HarnessError::Engine(err) => !matches!(err, EngineError::Infeasible { .. }),
            HarnessError::Pool(PoolError::NoIdentifiers) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_fatal_kind() {
        assert_eq!(HarnessError::Argument("arity".into()).exit_code(), 1);
        assert_eq!(HarnessError::Discarded.exit_code(), 1);
        assert_eq!(
            HarnessError::Profile(ProfileError::Unknown("vowels".into())).exit_code(),
            2
        );
        assert_eq!(
            HarnessError::Pool(PoolError::Exhausted {
                index: 100,
                capacity: 100
            })
            .exit_code(),
            4
        );
        assert_eq!(HarnessError::Cursor(CursorError::Underflow).exit_code(), 5);
        assert_eq!(
            HarnessError::Subject {
                code: 42,
                message: "boom".into()
            }
            .exit_code(),
            42
        );
    }

    #[test]
    fn discards_and_infeasible_paths_are_pruned() {
        assert!(HarnessError::Discarded.is_pruned_path());
        assert!(
            HarnessError::Engine(EngineError::Infeasible {
                label: "input_str".into()
            })
            .is_pruned_path()
        );
        assert!(
            !HarnessError::Subject {
                code: PANIC_EXIT_CODE,
                message: "index out of bounds".into()
            }
            .is_pruned_path()
        );
    }

    #[test]
    fn only_setup_failures_abort_exploration() {
        assert!(HarnessError::Argument("length must be at least 1".into()).aborts_exploration());
        assert!(HarnessError::Pool(PoolError::NoIdentifiers).aborts_exploration());
        assert!(
            !HarnessError::Pool(PoolError::Exhausted {
                index: 100,
                capacity: 100
            })
            .aborts_exploration()
        );
        assert!(!HarnessError::Discarded.aborts_exploration());
    }
}

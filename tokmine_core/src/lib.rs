pub mod allowlist;
pub mod charclass;
pub mod config;
pub mod context;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod executor;
pub mod explorer;
pub mod feedback;
pub mod miner;
pub mod oracle;
pub mod pool;
pub mod provider;
pub mod replay;
pub mod scheduler;

pub use allowlist::{AllowList, AllowListError, Insertion};
pub use charclass::{RestrictionProfile, SymbolicByteBuffer, TERMINATOR};
pub use config::{HarnessConfig, Strategy};
pub use context::{HarnessContext, Phase, PoolSetup};
pub use cursor::{ByteStream, CursorError, CursorStream, SliceStream};
pub use engine::{DomainEngine, Engine, EngineError, PathPlan, PathRecord};
pub use error::HarnessError;
pub use executor::{Executor, InProcessExecutor, PathReport};
pub use explorer::{ExplorationStats, Explorer};
pub use feedback::{Feedback, NewTokenFeedback};
pub use miner::{MiningReport, TokenMiner, TokenSamples};
pub use oracle::{BugReport, DefectOracle, Oracle, RunOutcome};
pub use pool::{POOL_CAPACITY, PoolError, TokenPool};
pub use provider::{LexedTokens, PLACEHOLDER_PAYLOAD, PooledTokens, ProxyToken, TokenSource};
pub use replay::{CampaignReport, ReplayDriver};
pub use scheduler::{DepthFirstScheduler, PathScheduler, RandomScheduler};

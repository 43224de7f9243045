//! Grammar exploration: drive a subject's parser from mined token kinds, or
//! from its real lexer over printable input, and collect defects.

use crate::allowlist::AllowList;
use crate::config::ExplorerSettings;
use crate::context::{HarnessContext, PoolSetup};
use crate::cursor::ByteStream;
use crate::engine::DomainEngine;
use crate::error::HarnessError;
use crate::executor::{InProcessExecutor, PathReport};
use crate::explorer::{ExplorationStats, Explorer};
use crate::oracle::{BugReport, DefectOracle, Oracle};
use crate::provider::{LexedTokens, PooledTokens, ProxyToken, TokenSource};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub mode: &'static str,
    pub stats: ExplorationStats,
    /// One report per distinct cause, holding the first path that hit it.
    pub defects: Vec<BugReport>,
}

impl CampaignReport {
    pub fn last_exit_code(&self) -> i32 {
        self.stats.last_exit_code
    }

    /// Faulting paths across all causes.
    pub fn faulting_paths(&self) -> u64 {
        self.defects.iter().map(|bug| bug.occurrences).sum()
    }
}

/// Collects defects from finished paths, one per exit status and
/// description. Later paths with a known cause only bump its count.
struct DefectLog {
    oracle: DefectOracle,
    by_cause: HashMap<(i32, String), usize>,
    defects: Vec<BugReport>,
}

impl DefectLog {
    fn new() -> Self {
        Self {
            oracle: DefectOracle::new(),
            by_cause: HashMap::new(),
            defects: Vec::new(),
        }
    }

    fn observe(&mut self, report: &PathReport) {
        let Some(bug) = self.oracle.examine(report) else {
            return;
        };
        let cause = (bug.exit_code, bug.description.clone());
        if let Some(&index) = self.by_cause.get(&cause) {
            self.defects[index].occurrences += 1;
            return;
        }
        warn!(
            "Defect on path {:?}: {} (exit {})",
            bug.decisions, bug.description, bug.exit_code
        );
        self.by_cause.insert(cause, self.defects.len());
        self.defects.push(bug);
    }
}

pub struct ReplayDriver {
    allow_list_path: PathBuf,
    settings: ExplorerSettings,
}

impl ReplayDriver {
    pub fn new(allow_list_path: impl Into<PathBuf>, settings: ExplorerSettings) -> Self {
        Self {
            allow_list_path: allow_list_path.into(),
            settings,
        }
    }

    pub fn allow_list_path(&self) -> &Path {
        &self.allow_list_path
    }

    /// Explores `parse` over tokens drawn from the replay pool.
    ///
    /// The allow-list must exist and hold at least one identifier.
    pub fn run_pooled<T, P>(&self, parse: P) -> Result<CampaignReport, HarnessError>
    where
        T: ProxyToken,
        P: Fn(&mut dyn TokenSource<T>) -> Result<bool, HarnessError>,
    {
        let allow_list = AllowList::load(&self.allow_list_path)?;
        info!(
            "Replaying {} token identifiers from {}",
            allow_list.len(),
            self.allow_list_path.display()
        );
        let mut executor = InProcessExecutor::new(|ctx: &mut HarnessContext<DomainEngine>| {
            ctx.setup_tokens(PoolSetup::Replay(&allow_list))?;
            ctx.bind_tokens()?;
            let accepted = parse(&mut PooledTokens::new(ctx))?;
            ctx.report(accepted)
        });
        self.explore("replay", &mut executor)
    }

    /// Explores `parse` over `lexer` running on `length` printable bytes.
    pub fn run_lexed<T, L, P>(
        &self,
        length: usize,
        lexer: L,
        parse: P,
    ) -> Result<CampaignReport, HarnessError>
    where
        L: Fn(&mut dyn ByteStream) -> Result<T, HarnessError>,
        P: Fn(&mut dyn TokenSource<T>) -> Result<bool, HarnessError>,
    {
        let mut executor = InProcessExecutor::new(|ctx: &mut HarnessContext<DomainEngine>| {
            let buffer = ctx.printable_input(length)?;
            ctx.bind(buffer)?;
            let accepted = {
                let mut tokens = LexedTokens::new(ctx.stream()?, &lexer);
                parse(&mut tokens)?
            };
            ctx.report(accepted)
        });
        self.explore("byte-cursor", &mut executor)
    }

    fn explore<F>(
        &self,
        mode: &'static str,
        executor: &mut InProcessExecutor<F>,
    ) -> Result<CampaignReport, HarnessError>
    where
        F: Fn(&mut HarnessContext<DomainEngine>) -> Result<(), HarnessError>,
    {
        let mut log = DefectLog::new();
        let mut explorer = Explorer::from_settings(&self.settings);
        let stats = explorer.run(executor, |report| log.observe(report))?;
        info!(
            "{} exploration found {} distinct defects",
            mode,
            log.defects.len()
        );
        Ok(CampaignReport {
            mode,
            stats,
            defects: log.defects,
        })
    }
}

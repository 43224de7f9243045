//! Token mining: explore a subject's tokenizer over character-class inputs
//! and grow the allow-list with every token kind it produces.

use crate::allowlist::AllowList;
use crate::charclass::{RestrictionProfile, SymbolicByteBuffer, TERMINATOR, is_leading_whitespace};
use crate::config::ExplorerSettings;
use crate::context::HarnessContext;
use crate::cursor::ByteStream;
use crate::engine::DomainEngine;
use crate::error::HarnessError;
use crate::executor::InProcessExecutor;
use crate::explorer::{ExplorationStats, Explorer};
use crate::feedback::{Feedback, NewTokenFeedback};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Distinct lexemes kept per token identifier. The alphabet is never capped.
pub const MAX_SAMPLES_PER_TOKEN: usize = 16;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
    pub profile: String,
    pub stats: ExplorationStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MiningReport {
    pub profiles: Vec<ProfileReport>,
    /// Identifiers added by this run, in discovery order.
    pub new_ids: Vec<u32>,
    /// Identifiers seen but not kept because the list was full.
    pub dropped_ids: Vec<u32>,
    pub allow_list_len: usize,
    pub allow_list_path: PathBuf,
    /// Whether the allow-list file was rewritten.
    pub persisted: bool,
    /// What the tokenizer consumed for each identifier seen by this run.
    pub tokens: BTreeMap<u32, TokenSamples>,
}

/// Lexemes observed for one token identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenSamples {
    /// Distinct lexemes in discovery order, leading whitespace stripped.
    /// The end-of-input token has the empty lexeme.
    pub samples: Vec<String>,
    /// Every character that appeared in any lexeme of this identifier.
    pub alphabet: BTreeSet<char>,
}

impl TokenSamples {
    fn observe(&mut self, lexeme: &[u8]) {
        self.alphabet.extend(lexeme.iter().map(|byte| char::from(*byte)));
        let text: String = lexeme.iter().map(|byte| char::from(*byte)).collect();
        if self.samples.len() < MAX_SAMPLES_PER_TOKEN && !self.samples.contains(&text) {
            self.samples.push(text);
        }
    }

    pub fn alphabet_string(&self) -> String {
        self.alphabet.iter().collect()
    }
}

/// The bytes a tokenizer consumed from `buffer`, up to the cursor.
///
/// Pushed-back lookahead is already behind the cursor, the terminator ends
/// the lexeme, and leading whitespace is skipped input rather than token.
fn consumed_lexeme(
    engine: &DomainEngine,
    buffer: &SymbolicByteBuffer,
    end: usize,
) -> Result<Vec<u8>, HarnessError> {
    let mut lexeme = Vec::with_capacity(end);
    for offset in 0..end.min(buffer.len()) {
        let domain = engine.feasible_bytes(buffer.object(), offset)?;
        match domain.nth(0) {
            Some(byte) if domain.len() == 1 && byte != TERMINATOR => lexeme.push(byte),
            _ => break,
        }
    }
    let start = lexeme
        .iter()
        .position(|byte| !is_leading_whitespace(*byte))
        .unwrap_or(lexeme.len());
    lexeme.drain(..start);
    Ok(lexeme)
}

impl MiningReport {
    /// Exit status of the last explored path.
    pub fn last_exit_code(&self) -> i32 {
        self.profiles
            .last()
            .map_or(0, |profile| profile.stats.last_exit_code)
    }
}

pub struct TokenMiner {
    allow_list_path: PathBuf,
    settings: ExplorerSettings,
}

impl TokenMiner {
    pub fn new(allow_list_path: impl Into<PathBuf>, settings: ExplorerSettings) -> Self {
        Self {
            allow_list_path: allow_list_path.into(),
            settings,
        }
    }

    pub fn allow_list_path(&self) -> &Path {
        &self.allow_list_path
    }

    /// Mines `tokenize` once per profile over `length`-byte inputs.
    ///
    /// `tokenize` is the subject's token-acquisition call: it reads one token
    /// from the stream and returns its kind. The allow-list on disk is only
    /// rewritten when a new kind turned up.
    pub fn mine<T>(
        &self,
        length: usize,
        profiles: &[RestrictionProfile],
        tokenize: T,
    ) -> Result<MiningReport, HarnessError>
    where
        T: Fn(&mut dyn ByteStream) -> Result<u32, HarnessError>,
    {
        let mut allow_list = AllowList::open_or_empty(&self.allow_list_path)?;
        let mut feedback = NewTokenFeedback::new();
        feedback.init(&allow_list);
        info!(
            "Mining {} with {} known identifiers, {} profile(s), input length {}",
            self.allow_list_path.display(),
            allow_list.len(),
            profiles.len(),
            length
        );

        let tokens: RefCell<BTreeMap<u32, TokenSamples>> = RefCell::new(BTreeMap::new());
        let mut reports = Vec::with_capacity(profiles.len());
        for &profile in profiles {
            let mut executor =
                InProcessExecutor::new(|ctx: &mut HarnessContext<DomainEngine>| {
                    let buffer = ctx.token_input(length, profile)?;
                    ctx.bind(buffer)?;
                    let kind = tokenize(&mut ctx.stream()?)?;
                    let lexeme = consumed_lexeme(ctx.engine(), &buffer, ctx.cursor_position())?;
                    tokens.borrow_mut().entry(kind).or_default().observe(&lexeme);
                    ctx.record_token(kind)?;
                    ctx.report(true)
                });
            let mut explorer = Explorer::from_settings(&self.settings);
            let stats = explorer.run(&mut executor, |report| {
                for &value in &report.record.recorded {
                    if feedback.is_interesting(value) {
                        feedback.report_interesting(value, &mut allow_list);
                    }
                }
            })?;
            info!(
                "Profile {}: {} paths, {} identifiers known",
                profile,
                stats.paths,
                allow_list.len()
            );
            reports.push(ProfileReport {
                profile: profile.to_string(),
                stats,
            });
        }

        let persisted = !feedback.added().is_empty();
        if persisted {
            allow_list.save(&self.allow_list_path)?;
            info!(
                "Added {} identifiers, {} now in {}",
                feedback.added().len(),
                allow_list.len(),
                self.allow_list_path.display()
            );
        } else {
            info!("No new identifiers, {} left untouched", self.allow_list_path.display());
        }

        Ok(MiningReport {
            profiles: reports,
            new_ids: feedback.added().to_vec(),
            dropped_ids: feedback.dropped().iter().copied().collect(),
            allow_list_len: allow_list.len(),
            allow_list_path: self.allow_list_path.clone(),
            persisted,
            tokens: tokens.into_inner(),
        })
    }
}

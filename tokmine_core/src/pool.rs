//! Fixed-capacity pool of symbolic token-identifier slots.
//!
//! In discovery mode the slots are unconstrained and every consumed value is
//! handed to the engine for recording. In replay mode each slot is limited to
//! the identifiers of an [`AllowList`], so a subject driven from the pool only
//! ever sees token sequences its real tokenizer could have produced.

use crate::allowlist::AllowList;
use crate::engine::{Constraint, Engine, ObjectId, WORD_SIZE};
use crate::error::HarnessError;
use thiserror::Error;
use tracing::debug;

/// Number of token slots allocated per run.
pub const POOL_CAPACITY: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Token pool exhausted: slot {index} requested, capacity is {capacity}")]
    Exhausted { index: usize, capacity: usize },

    #[error("Token slot {index} requested after slot {last} was already consumed")]
    Reused { index: usize, last: usize },

    #[error("Replay needs at least one token identifier to constrain the pool")]
    NoIdentifiers,
}

/// Whether slots are free (mining) or limited to an allow-list (replay).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    Discovery,
    Replay,
}

/// The [`POOL_CAPACITY`] word slots of one run, labelled `tok_0` onwards.
#[derive(Debug)]
pub struct TokenPool {
    slots: Vec<ObjectId>,
    mode: PoolMode,
    last_consumed: Option<usize>,
}

impl TokenPool {
    fn allocate<E: Engine>(engine: &mut E, mode: PoolMode) -> Self {
        let slots = (0..POOL_CAPACITY)
            .map(|index| engine.make_symbolic(WORD_SIZE, &format!("tok_{index}")))
            .collect();
        Self {
            slots,
            mode,
            last_consumed: None,
        }
    }

    /// Allocates unconstrained slots. Every value read from them is
    /// recorded with the engine as a mined token identifier.
    pub fn discovery<E: Engine>(engine: &mut E) -> Self {
        Self::allocate(engine, PoolMode::Discovery)
    }

    /// Allocates the slots and limits every one of them to `allow_list`.
    pub fn replay<E: Engine>(engine: &mut E, allow_list: &AllowList) -> Result<Self, HarnessError> {
        if allow_list.is_empty() {
            return Err(PoolError::NoIdentifiers.into());
        }
        let pool = Self::allocate(engine, PoolMode::Replay);
        for slot in &pool.slots {
            engine.assume(Constraint::WordIn {
                object: *slot,
                values: allow_list.ids().clone(),
            })?;
        }
        debug!(
            "Constrained {} token slots to {} identifiers",
            POOL_CAPACITY,
            allow_list.len()
        );
        Ok(pool)
    }

    /// Fetches the slot chosen by the engine's slot counter.
    pub fn consume<E: Engine>(&mut self, engine: &mut E) -> Result<u32, HarnessError> {
        let index = engine.next_slot_index();
        self.take(engine, index)
    }

    /// Fetches an explicit slot, for subjects that resume at a known offset.
    ///
    /// Slots still have to be taken in increasing order, so a run should not
    /// mix this with [`TokenPool::consume`] unless offsets stay ahead of the
    /// engine's counter.
    pub fn fetch_at<E: Engine>(&mut self, engine: &mut E, index: usize) -> Result<u32, HarnessError> {
        self.take(engine, index)
    }

    fn take<E: Engine>(&mut self, engine: &mut E, index: usize) -> Result<u32, HarnessError> {
        let Some(slot) = self.slots.get(index).copied() else {
            return Err(PoolError::Exhausted {
                index,
                capacity: POOL_CAPACITY,
            }
            .into());
        };
        if let Some(last) = self.last_consumed {
            if index <= last {
                return Err(PoolError::Reused { index, last }.into());
            }
        }
        let value = engine.read_word(slot)?;
        self.last_consumed = Some(index);
        if self.mode == PoolMode::Discovery {
            engine.record_value(value);
        }
        Ok(value)
    }

    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    /// The symbolic object behind slot `index`, if the pool has one.
    pub fn slot(&self, index: usize) -> Option<ObjectId> {
        self.slots.get(index).copied()
    }

    /// Number of slots consumed so far, counting skipped ones.
    pub fn consumed(&self) -> usize {
        self.last_consumed.map_or(0, |last| last + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DomainEngine, PathPlan};

    fn allow_list(ids: &[u32]) -> AllowList {
        ids.iter().copied().collect()
    }

    #[test]
    fn replay_slots_are_subsets_of_the_allow_list() {
        let list = allow_list(&[2, 5, 11]);
        let mut engine = DomainEngine::new(&PathPlan::default());
        let pool = TokenPool::replay(&mut engine, &list).unwrap();
        for index in 0..POOL_CAPACITY {
            let slot = pool.slot(index).unwrap();
            let feasible = engine.feasible_words(slot).unwrap().unwrap();
            assert!(feasible.len() <= list.len());
            assert!(feasible.is_subset(list.ids()));
        }
    }

    #[test]
    fn replay_with_empty_list_is_rejected() {
        let mut engine = DomainEngine::new(&PathPlan::default());
        let err = TokenPool::replay(&mut engine, &AllowList::new()).unwrap_err();
        assert!(matches!(err, HarnessError::Pool(PoolError::NoIdentifiers)));
    }

    #[test]
    fn consumption_follows_the_engine_counter() {
        let list = allow_list(&[10, 20, 30]);
        let mut engine = DomainEngine::new(&PathPlan::replay(vec![2, 0, 1]));
        let mut pool = TokenPool::replay(&mut engine, &list).unwrap();
        assert_eq!(pool.consume(&mut engine).unwrap(), 30);
        assert_eq!(pool.consume(&mut engine).unwrap(), 10);
        assert_eq!(pool.consume(&mut engine).unwrap(), 20);
        assert_eq!(pool.consumed(), 3);
        assert!(engine.recorded().is_empty(), "replay does not record values");
    }

    #[test]
    fn consuming_past_capacity_is_an_explicit_error() {
        let list = allow_list(&[1]);
        let mut engine = DomainEngine::new(&PathPlan::default());
        let mut pool = TokenPool::replay(&mut engine, &list).unwrap();
        for _ in 0..POOL_CAPACITY {
            assert_eq!(pool.consume(&mut engine).unwrap(), 1);
        }
        let err = pool.consume(&mut engine).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Pool(PoolError::Exhausted {
                index: 100,
                capacity: POOL_CAPACITY
            })
        ));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn indexed_fetch_resumes_but_never_repeats() {
        let list = allow_list(&[4, 8]);
        let mut engine = DomainEngine::new(&PathPlan::default());
        let mut pool = TokenPool::replay(&mut engine, &list).unwrap();
        assert_eq!(pool.fetch_at(&mut engine, 40).unwrap(), 4);
        assert_eq!(pool.consumed(), 41);
        let err = pool.fetch_at(&mut engine, 40).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Pool(PoolError::Reused { index: 40, last: 40 })
        ));
        let err = pool.consume(&mut engine).unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Pool(PoolError::Reused { index: 0, last: 40 })
        ));
    }

    #[test]
    fn discovery_records_consumed_values() {
        let mut engine = DomainEngine::new(&PathPlan::default());
        let mut pool = TokenPool::discovery(&mut engine);
        assert_eq!(pool.mode(), PoolMode::Discovery);
        assert_eq!(pool.consume(&mut engine).unwrap(), 0);
        assert_eq!(engine.recorded(), &[0]);
        assert!(engine.feasible_words(pool.slot(0).unwrap()).unwrap().is_none());
    }
}

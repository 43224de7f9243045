use crate::allowlist::AllowList;
use crate::charclass::{
    RestrictionProfile, SymbolicByteBuffer, constrain_printable_input, constrain_token_input,
};
use crate::cursor::CursorStream;
use crate::engine::Engine;
use crate::error::HarnessError;
use crate::oracle;
use crate::pool::TokenPool;
use std::fmt;

/// Where a run is in its life: INIT, then one binding, then any number of
/// token fetches, then a single termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Bound,
    Consuming,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "initializing",
            Phase::Bound => "bound",
            Phase::Consuming => "consuming tokens",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// How the token pool is set up before binding.
#[derive(Debug, Clone, Copy)]
pub enum PoolSetup<'a> {
    Discovery,
    Replay(&'a AllowList),
}

/// State owned by one harness run: the engine, the optional token pool, and
/// the single stream binding.
#[derive(Debug)]
pub struct HarnessContext<E: Engine> {
    engine: E,
    phase: Phase,
    pool: Option<TokenPool>,
    buffer: Option<SymbolicByteBuffer>,
    cursor: usize,
}

impl<E: Engine> HarnessContext<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            phase: Phase::Init,
            pool: None,
            buffer: None,
            cursor: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    pub fn pool(&self) -> Option<&TokenPool> {
        self.pool.as_ref()
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor
    }

    fn require_phase(&self, action: &'static str, allowed: &[Phase]) -> Result<(), HarnessError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(HarnessError::Phase {
                action,
                phase: self.phase,
            })
        }
    }

    /// Character-class mode input: `length` bytes restricted to `profile`.
    pub fn token_input(
        &mut self,
        length: usize,
        profile: RestrictionProfile,
    ) -> Result<SymbolicByteBuffer, HarnessError> {
        self.require_phase("create input", &[Phase::Init])?;
        constrain_token_input(&mut self.engine, length, profile)
    }

    /// Plain byte-cursor mode input: `length` printable bytes.
    pub fn printable_input(&mut self, length: usize) -> Result<SymbolicByteBuffer, HarnessError> {
        self.require_phase("create input", &[Phase::Init])?;
        constrain_printable_input(&mut self.engine, length)
    }

    pub fn setup_tokens(&mut self, setup: PoolSetup<'_>) -> Result<(), HarnessError> {
        self.require_phase("set up the token pool", &[Phase::Init])?;
        if self.pool.is_some() {
            return Err(HarnessError::Phase {
                action: "set up a second token pool",
                phase: self.phase,
            });
        }
        let pool = match setup {
            PoolSetup::Discovery => TokenPool::discovery(&mut self.engine),
            PoolSetup::Replay(allow_list) => TokenPool::replay(&mut self.engine, allow_list)?,
        };
        self.pool = Some(pool);
        Ok(())
    }

    /// Attaches the cursor shim to `buffer`. Only one binding per run.
    pub fn bind(&mut self, buffer: SymbolicByteBuffer) -> Result<(), HarnessError> {
        self.require_phase("bind a stream", &[Phase::Init])?;
        self.buffer = Some(buffer);
        self.cursor = 0;
        self.phase = Phase::Bound;
        Ok(())
    }

    /// Binds the run to the token pool instead of a byte buffer.
    pub fn bind_tokens(&mut self) -> Result<(), HarnessError> {
        self.require_phase("bind the token pool", &[Phase::Init])?;
        if self.pool.is_none() {
            return Err(HarnessError::Phase {
                action: "bind a token pool that was never set up",
                phase: self.phase,
            });
        }
        self.phase = Phase::Bound;
        Ok(())
    }

    pub fn stream(&mut self) -> Result<CursorStream<'_, E>, HarnessError> {
        self.require_phase("read the stream", &[Phase::Bound, Phase::Consuming])?;
        let Some(buffer) = self.buffer else {
            return Err(HarnessError::Phase {
                action: "read a stream that was never bound",
                phase: self.phase,
            });
        };
        Ok(CursorStream::new(&mut self.engine, buffer, &mut self.cursor))
    }

    fn pool_for_fetch(&mut self) -> Result<(&mut TokenPool, &mut E), HarnessError> {
        self.require_phase("fetch a token", &[Phase::Bound, Phase::Consuming])?;
        match self.pool.as_mut() {
            Some(pool) => {
                self.phase = Phase::Consuming;
                Ok((pool, &mut self.engine))
            }
            None => Err(HarnessError::Phase {
                action: "fetch a token without a pool",
                phase: self.phase,
            }),
        }
    }

    /// The next token identifier in slot order.
    pub fn next_token_id(&mut self) -> Result<u32, HarnessError> {
        let (pool, engine) = self.pool_for_fetch()?;
        pool.consume(engine)
    }

    /// The token identifier in slot `index`.
    pub fn token_id_at(&mut self, index: usize) -> Result<u32, HarnessError> {
        let (pool, engine) = self.pool_for_fetch()?;
        pool.fetch_at(engine, index)
    }

    /// Hands a concrete token identifier to the engine, as a mined value.
    pub fn record_token(&mut self, value: u32) -> Result<(), HarnessError> {
        self.require_phase("record a token", &[Phase::Bound, Phase::Consuming])?;
        self.engine.record_value(value);
        Ok(())
    }

    /// Reports the subject's verdict; `false` discards the path.
    pub fn report(&mut self, success: bool) -> Result<(), HarnessError> {
        self.require_phase("report an outcome", &[Phase::Bound, Phase::Consuming])?;
        let verdict = oracle::report(&mut self.engine, success);
        self.phase = Phase::Terminated;
        verdict
    }

    pub fn terminate(&mut self) {
        self.phase = Phase::Terminated;
    }
}

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Size in bytes of a word object (a token slot).
pub const WORD_SIZE: usize = 4;

/// Errors raised by the exploration engine while installing constraints or
/// concretizing symbolic memory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Object {0:?} does not exist on this path")]
    UnknownObject(ObjectId),
    #[error("Offset {offset} is out of bounds for object '{label}' of size {size}")]
    OutOfBounds {
        label: String,
        offset: usize,
        size: usize,
    },
    /// A constraint left some byte or word of the object without a feasible value.
    #[error("Constraint on object '{label}' is unsatisfiable")]
    Infeasible { label: String },
    #[error("Word access needs a 4-byte object, '{label}' has {size} bytes")]
    NotAWord { label: String, size: usize },
    /// A replayed prefix does not fit the path it is replayed on.
    #[error("Decision {depth} replays choice {chosen} but only {arity} values are feasible")]
    Divergent {
        depth: usize,
        chosen: usize,
        arity: usize,
    },
}

/// Handle to one symbolic object in the engine's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// A set of byte values, one bit per value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteSet([u64; 4]);

impl ByteSet {
    /// The set with no members; an empty domain is an infeasible byte.
    pub const fn empty() -> Self {
        ByteSet([0; 4])
    }

    /// All 256 byte values, the domain of a fresh symbolic byte.
    pub const fn full() -> Self {
        ByteSet([u64::MAX; 4])
    }

    /// The domain of a byte fixed to `value`.
    pub fn single(value: u8) -> Self {
        let mut set = Self::empty();
        set.insert(value);
        set
    }

    /// Every byte value `predicate` accepts.
    pub fn from_predicate(predicate: impl Fn(u8) -> bool) -> Self {
        let mut set = Self::empty();
        for value in u8::MIN..=u8::MAX {
            if predicate(value) {
                set.insert(value);
            }
        }
        set
    }

    pub fn insert(&mut self, value: u8) {
        self.0[(value >> 6) as usize] |= 1u64 << (value & 63);
    }

    pub fn contains(&self, value: u8) -> bool {
        self.0[(value >> 6) as usize] & (1u64 << (value & 63)) != 0
    }

    /// Values in either set.
    pub fn union(self, other: ByteSet) -> ByteSet {
        let mut words = self.0;
        for (word, rhs) in words.iter_mut().zip(other.0) {
            *word |= rhs;
        }
        ByteSet(words)
    }

    /// Values in both sets. This is how a constraint narrows a domain.
    pub fn intersect(self, other: ByteSet) -> ByteSet {
        let mut words = self.0;
        for (word, rhs) in words.iter_mut().zip(other.0) {
            *word &= rhs;
        }
        ByteSet(words)
    }

    /// Number of feasible values, which is the arity of a read.
    pub fn len(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    /// The `n`-th member in ascending order.
    pub fn nth(&self, n: usize) -> Option<u8> {
        self.iter().nth(n)
    }

    /// Members in ascending order. Decision indices count in this order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (u8::MIN..=u8::MAX).filter(move |value| self.contains(*value))
    }
}

impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A path constraint over one symbolic object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The byte at `offset` must be a member of `allowed`.
    ByteIn {
        object: ObjectId,
        offset: usize,
        allowed: ByteSet,
    },
    /// The little-endian word must equal one of `values`.
    WordIn {
        object: ObjectId,
        values: BTreeSet<u32>,
    },
}

/// The capability surface of a path-exploring execution engine.
///
/// The harness never looks at how an engine searches or solves. It creates
/// symbolic objects, narrows them with path constraints, asks for the next
/// token-slot index, ends paths silently, and hands concrete values back for
/// the engine to record. Reads go through the engine because symbolic memory
/// belongs to it.
pub trait Engine {
    /// Allocates `size` unconstrained bytes. `label` names the object in
    /// errors and engine output.
    fn make_symbolic(&mut self, size: usize, label: &str) -> ObjectId;

    /// Adds a path constraint. Fails with [`EngineError::Infeasible`] when
    /// it leaves some byte or word of the object without a value.
    fn assume(&mut self, constraint: Constraint) -> Result<(), EngineError>;

    /// Monotonic per-path counter used to pick the next token slot.
    fn next_slot_index(&mut self) -> usize;

    /// Ends the current path without recording it as a defect.
    fn discard_path(&mut self);

    /// Hands a concrete value to the engine; mining collects these per path.
    fn record_value(&mut self, value: u32);

    /// Concretizes one byte, choosing among its feasible values.
    fn read_byte(&mut self, object: ObjectId, offset: usize) -> Result<u8, EngineError>;

    /// Concretizes a 4-byte object as a little-endian word. Repeated reads
    /// of the same object return the same value.
    fn read_word(&mut self, object: ObjectId) -> Result<u32, EngineError>;
}

/// One concretization that had more than one feasible value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub chosen: usize,
    pub arity: usize,
}

/// How a path picks values once its replayed prefix runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fill {
    /// Always the smallest feasible value.
    #[default]
    First,
    /// Uniformly among feasible values, from a seeded ChaCha8 stream.
    Random(u64),
}

/// Which path to run: the decisions to replay and how to continue after them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathPlan {
    pub prefix: Vec<usize>,
    pub fill: Fill,
}

impl PathPlan {
    pub fn replay(prefix: Vec<usize>) -> Self {
        Self {
            prefix,
            fill: Fill::First,
        }
    }
}

/// Everything the engine observed on one finished path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRecord {
    pub decisions: Vec<Decision>,
    pub recorded: Vec<u32>,
    pub discarded: bool,
}

impl PathRecord {
    /// The chosen values, enough to replay this exact path.
    pub fn choices(&self) -> Vec<usize> {
        self.decisions.iter().map(|d| d.chosen).collect()
    }
}

#[derive(Debug, Clone)]
struct SymbolicObject {
    label: String,
    bytes: Vec<ByteSet>,
    word: Option<BTreeSet<u32>>,
    concrete_word: Option<u32>,
}

impl SymbolicObject {
    fn word_fits_bytes(&self, value: u32) -> bool {
        value
            .to_le_bytes()
            .iter()
            .zip(&self.bytes)
            .all(|(byte, domain)| domain.contains(*byte))
    }

    fn infeasible(&self) -> EngineError {
        EngineError::Infeasible {
            label: self.label.clone(),
        }
    }
}

/// In-process engine over per-byte value domains.
///
/// Constraints intersect domains. Values are fixed lazily on first read;
/// every read with more than one feasible value becomes a [`Decision`], and
/// replaying the same decision prefix reproduces the same path.
#[derive(Debug)]
pub struct DomainEngine {
    objects: Vec<SymbolicObject>,
    prefix: Vec<usize>,
    rng: Option<ChaCha8Rng>,
    decisions: Vec<Decision>,
    recorded: Vec<u32>,
    slot_counter: usize,
    discarded: bool,
}

impl DomainEngine {
    pub fn new(plan: &PathPlan) -> Self {
        let rng = match plan.fill {
            Fill::First => None,
            Fill::Random(seed) => Some(ChaCha8Rng::seed_from_u64(seed)),
        };
        Self {
            objects: Vec::new(),
            prefix: plan.prefix.clone(),
            rng,
            decisions: Vec::new(),
            recorded: Vec::new(),
            slot_counter: 0,
            discarded: false,
        }
    }

    fn object(&self, id: ObjectId) -> Result<&SymbolicObject, EngineError> {
        self.objects.get(id.0).ok_or(EngineError::UnknownObject(id))
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut SymbolicObject, EngineError> {
        self.objects
            .get_mut(id.0)
            .ok_or(EngineError::UnknownObject(id))
    }

    fn choose(&mut self, arity: usize) -> Result<usize, EngineError> {
        let depth = self.decisions.len();
        let chosen = match (self.prefix.get(depth), self.rng.as_mut()) {
            (Some(replayed), _) => *replayed,
            (None, Some(rng)) => rng.random_range(0..arity),
            (None, None) => 0,
        };
        if chosen >= arity {
            return Err(EngineError::Divergent {
                depth,
                chosen,
                arity,
            });
        }
        self.decisions.push(Decision { chosen, arity });
        Ok(chosen)
    }

    /// The values byte `offset` of `object` may still take on this path.
    pub fn feasible_bytes(&self, object: ObjectId, offset: usize) -> Result<ByteSet, EngineError> {
        let obj = self.object(object)?;
        obj.bytes
            .get(offset)
            .copied()
            .ok_or_else(|| EngineError::OutOfBounds {
                label: obj.label.clone(),
                offset,
                size: obj.bytes.len(),
            })
    }

    pub fn is_feasible(&self, object: ObjectId, offset: usize, value: u8) -> bool {
        self.feasible_bytes(object, offset)
            .map(|domain| domain.contains(value))
            .unwrap_or(false)
    }

    /// The explicit word domain of `object`, if one has been installed.
    pub fn feasible_words(&self, object: ObjectId) -> Result<Option<&BTreeSet<u32>>, EngineError> {
        Ok(self.object(object)?.word.as_ref())
    }

    pub fn label(&self, object: ObjectId) -> Option<&str> {
        self.objects.get(object.0).map(|obj| obj.label.as_str())
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    pub fn recorded(&self) -> &[u32] {
        &self.recorded
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn into_record(self) -> PathRecord {
        PathRecord {
            decisions: self.decisions,
            recorded: self.recorded,
            discarded: self.discarded,
        }
    }
}

impl Engine for DomainEngine {
    fn make_symbolic(&mut self, size: usize, label: &str) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(SymbolicObject {
            label: label.to_string(),
            bytes: vec![ByteSet::full(); size],
            word: None,
            concrete_word: None,
        });
        id
    }

    fn assume(&mut self, constraint: Constraint) -> Result<(), EngineError> {
        match constraint {
            Constraint::ByteIn {
                object,
                offset,
                allowed,
            } => {
                let obj = self.object_mut(object)?;
                let size = obj.bytes.len();
                if offset >= size {
                    return Err(EngineError::OutOfBounds {
                        label: obj.label.clone(),
                        offset,
                        size,
                    });
                }
                let narrowed = obj.bytes[offset].intersect(allowed);
                obj.bytes[offset] = narrowed;
                if narrowed.is_empty() {
                    return Err(obj.infeasible());
                }
                if let Some(mut words) = obj.word.take() {
                    words.retain(|value| obj.word_fits_bytes(*value));
                    if words.is_empty() {
                        return Err(obj.infeasible());
                    }
                    obj.word = Some(words);
                }
                Ok(())
            }
            Constraint::WordIn { object, values } => {
                let obj = self.object_mut(object)?;
                if obj.bytes.len() != WORD_SIZE {
                    return Err(EngineError::NotAWord {
                        label: obj.label.clone(),
                        size: obj.bytes.len(),
                    });
                }
                let mut narrowed: BTreeSet<u32> = match obj.word.take() {
                    Some(current) => current.intersection(&values).copied().collect(),
                    None => values,
                };
                narrowed.retain(|value| obj.word_fits_bytes(*value));
                if narrowed.is_empty() {
                    return Err(obj.infeasible());
                }
                obj.word = Some(narrowed);
                Ok(())
            }
        }
    }

    fn next_slot_index(&mut self) -> usize {
        let index = self.slot_counter;
        self.slot_counter += 1;
        index
    }

    fn discard_path(&mut self) {
        self.discarded = true;
    }

    fn record_value(&mut self, value: u32) {
        self.recorded.push(value);
    }

    fn read_byte(&mut self, object: ObjectId, offset: usize) -> Result<u8, EngineError> {
        let domain = self.feasible_bytes(object, offset)?;
        let value = match domain.len() {
            0 => return Err(self.object(object)?.infeasible()),
            1 => domain.nth(0),
            arity => {
                let chosen = self.choose(arity)?;
                domain.nth(chosen)
            }
        };
        let value = value.ok_or_else(|| EngineError::Infeasible {
            label: self.label(object).unwrap_or_default().to_string(),
        })?;
        self.assume(Constraint::ByteIn {
            object,
            offset,
            allowed: ByteSet::single(value),
        })?;
        Ok(value)
    }

    fn read_word(&mut self, object: ObjectId) -> Result<u32, EngineError> {
        let obj = self.object(object)?;
        if obj.bytes.len() != WORD_SIZE {
            return Err(EngineError::NotAWord {
                label: obj.label.clone(),
                size: obj.bytes.len(),
            });
        }
        if let Some(value) = obj.concrete_word {
            return Ok(value);
        }
        let word_domain = obj.word.clone();
        let value = match word_domain {
            Some(words) => {
                let candidates: Vec<u32> = words.into_iter().collect();
                let chosen = match candidates.len() {
                    0 => return Err(self.object(object)?.infeasible()),
                    1 => 0,
                    arity => self.choose(arity)?,
                };
                let value = candidates[chosen];
                for (offset, byte) in value.to_le_bytes().into_iter().enumerate() {
                    self.assume(Constraint::ByteIn {
                        object,
                        offset,
                        allowed: ByteSet::single(byte),
                    })?;
                }
                value
            }
            None => {
                let mut bytes = [0u8; WORD_SIZE];
                for (offset, byte) in bytes.iter_mut().enumerate() {
                    *byte = self.read_byte(object, offset)?;
                }
                u32::from_le_bytes(bytes)
            }
        };
        self.object_mut(object)?.concrete_word = Some(value);
        Ok(value)
    }
}

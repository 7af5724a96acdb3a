use std::collections::HashMap;

use parking_lot::Mutex;

use crate::tuple::Tuple;

/// Governs whether a key collision during [`Engine::replace`] is an error, required, or
/// either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// `old` must be absent from the index; a collision is an error.
    DupInsert,
    /// `old` must already be present; its absence is an error.
    DupReplace,
    /// Either case is accepted.
    DupReplaceOrInsert,
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("key already exists in space {0}")]
    DuplicateKey(u64),
    #[error("key does not exist in space {0}")]
    KeyNotFound(u64),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// The capability interface the transaction coordinator consumes. The storage engine
/// backing a space (tuple indexing, MVCC, secondary indexes) is otherwise a black box —
/// SPEC_FULL.md §4.4 / §9 "opaque engine polymorphism".
pub trait Engine: Send + Sync {
    /// Atomically swaps `old` out for `new` under `mode`, returning the tuple that was
    /// actually displaced (which, under `DupReplace`/`DupInsert` semantics, may differ from
    /// `old`).
    fn replace(
        &self,
        space_id: u64,
        old: Option<Tuple>,
        new: Option<Tuple>,
        mode: ReplaceMode,
    ) -> EngineResult<Option<Tuple>>;

    /// Called exactly once per committed transaction that touched `space_id`.
    fn txn_finish(&self, space_id: u64);
}

/// A minimal in-memory reference engine, used by the coordinator's own tests and available
/// to callers who need an `Engine` without a real storage layer behind it.
///
/// Each space is modeled as an unordered multiset of live tuples. `replace` removes `old`
/// from that set if present (failing per `mode` if it's required but absent), then inserts
/// `new` if present.
#[derive(Default)]
pub struct MemoryEngine {
    spaces: Mutex<HashMap<u64, Vec<Tuple>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a space's current contents, for test assertions.
    pub fn contents(&self, space_id: u64) -> Vec<Tuple> {
        self.spaces
            .lock()
            .get(&space_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Engine for MemoryEngine {
    fn replace(
        &self,
        space_id: u64,
        old: Option<Tuple>,
        new: Option<Tuple>,
        mode: ReplaceMode,
    ) -> EngineResult<Option<Tuple>> {
        let mut spaces = self.spaces.lock();
        let entries = spaces.entry(space_id).or_default();

        let displaced = match &old {
            Some(old_tuple) => match entries.iter().position(|t| t == old_tuple) {
                Some(pos) => Some(entries.remove(pos)),
                None if mode == ReplaceMode::DupReplace => {
                    return Err(EngineError::KeyNotFound(space_id))
                }
                None => None,
            },
            None if mode == ReplaceMode::DupReplace => {
                return Err(EngineError::KeyNotFound(space_id))
            }
            None => None,
        };

        if let Some(new_tuple) = new {
            if mode == ReplaceMode::DupInsert && entries.contains(&new_tuple) {
                return Err(EngineError::DuplicateKey(space_id));
            }
            entries.push(new_tuple);
        }

        Ok(displaced)
    }

    fn txn_finish(&self, _space_id: u64) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_then_delete_round_trips() {
        let engine = MemoryEngine::new();
        let t = Tuple::from_bytes(b"hello".to_vec());

        let displaced = engine
            .replace(1, None, Some(t.clone()), ReplaceMode::DupInsert)
            .unwrap();
        assert_eq!(displaced, None);
        assert_eq!(engine.contents(1), vec![t.clone()]);

        let displaced = engine
            .replace(1, Some(t.clone()), None, ReplaceMode::DupReplace)
            .unwrap();
        assert_eq!(displaced, Some(t));
        assert!(engine.contents(1).is_empty());
    }

    #[test]
    fn dup_replace_on_missing_key_fails() {
        let engine = MemoryEngine::new();
        let t = Tuple::from_bytes(b"missing".to_vec());
        let err = engine
            .replace(1, Some(t), None, ReplaceMode::DupReplace)
            .unwrap_err();
        assert!(matches!(err, EngineError::KeyNotFound(1)));
    }

    #[test]
    fn dup_insert_on_existing_key_fails() {
        let engine = MemoryEngine::new();
        let t = Tuple::from_bytes(b"exists".to_vec());
        engine
            .replace(1, None, Some(t.clone()), ReplaceMode::DupInsert)
            .unwrap();

        let err = engine
            .replace(1, None, Some(t), ReplaceMode::DupInsert)
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateKey(1)));
    }

    #[test]
    fn dup_replace_or_insert_accepts_either_case() {
        let engine = MemoryEngine::new();
        let t = Tuple::from_bytes(b"either".to_vec());

        engine
            .replace(1, None, Some(t.clone()), ReplaceMode::DupReplaceOrInsert)
            .unwrap();
        let displaced = engine
            .replace(1, Some(t.clone()), None, ReplaceMode::DupReplaceOrInsert)
            .unwrap();
        assert_eq!(displaced, Some(t));
        engine
            .replace(1, None, None, ReplaceMode::DupReplaceOrInsert)
            .unwrap();
    }
}

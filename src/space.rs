use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::Engine;
use crate::txn::Txn;

/// Fires once per [`crate::txn::replace`] call against its owning space, after the engine
/// swap has already taken effect but before the transaction commits.
///
/// Triggers observe the transaction; they must not mutate `old_tuple`/`new_tuple` or call
/// back into `txn::replace`/`txn::commit` — doing so is a programming defect, not a
/// recoverable error (SPEC_FULL.md §7).
pub type ReplaceTrigger = Arc<dyn Fn(&Txn) + Send + Sync>;

/// An opaque handle the coordinator treats as: an engine to dispatch `replace` to, an
/// ordered list of replace-triggers, and two flags (`temporary`, `run_triggers`).
pub struct Space {
    pub id: u64,
    pub engine: Arc<dyn Engine>,
    /// Temporary spaces are never logged: `txn::commit` skips the WAL append entirely for
    /// them, even if the transaction otherwise changed a tuple.
    pub temporary: bool,
    /// Gates whether `on_replace` triggers fire at all; independent of whether the list is
    /// empty.
    pub run_triggers: bool,
    on_replace: Mutex<Vec<ReplaceTrigger>>,
}

impl Space {
    pub fn new(id: u64, engine: Arc<dyn Engine>) -> Self {
        Self {
            id,
            engine,
            temporary: false,
            run_triggers: true,
            on_replace: Mutex::new(Vec::new()),
        }
    }

    pub fn temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    pub fn add_replace_trigger(&self, trigger: ReplaceTrigger) {
        self.on_replace.lock().push(trigger);
    }

    pub(crate) fn fire_replace_triggers(&self, txn: &Txn) {
        for trigger in self.on_replace.lock().iter() {
            trigger(txn);
        }
    }
}

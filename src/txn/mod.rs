//! The single-writer transaction coordinator.
//!
//! There is at most one active [`Txn`] per task, held in a `tokio::task_local!` slot rather
//! than threaded explicitly through every call — mirroring how the public API reads (`begin`,
//! `replace`, `commit`) rather than how a handle-passing design would. See SPEC_FULL.md §4.3
//! / §9.

mod arena;

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Instant;

use crate::config::TxnConfig;
use crate::engine::ReplaceMode;
use crate::request::Request;
use crate::space::Space;
use crate::tuple::Tuple;
use crate::xlog::{Appender, Row};

use arena::Scratch;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("a transaction is already active on this task")]
    TxnAlreadyActive,
    #[error("no transaction is active on this task")]
    NoActiveTxn,
    #[error("replace requires at least one of old_tuple/new_tuple")]
    EmptyReplace,
    #[error("engine replace failed: {0}")]
    EngineReplace(#[from] crate::engine::EngineError),
    #[error("wal append failed: {0}")]
    WalIo(#[from] crate::xlog::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Where a committed transaction's resulting tuple is delivered.
pub trait ResultSink {
    fn add_tuple(&mut self, tuple: Option<Tuple>);
}

/// A `ResultSink` that just remembers the last tuple it was given, for callers and tests
/// that don't need anything fancier.
#[derive(Default)]
pub struct LastTupleSink(Option<Tuple>);

impl LastTupleSink {
    pub fn into_inner(self) -> Option<Tuple> {
        self.0
    }
}

impl ResultSink for LastTupleSink {
    fn add_tuple(&mut self, tuple: Option<Tuple>) {
        self.0 = tuple;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Committed,
    RolledBack,
}

pub type Trigger = Arc<dyn Fn(&Txn) + Send + Sync>;

/// The transaction object itself. Never constructed directly by callers: use [`begin`] to
/// install one in the current task and the free functions in this module to drive it.
pub struct Txn {
    state: TxnState,
    old_tuple: Option<Tuple>,
    new_tuple: Option<Tuple>,
    space: Option<Arc<Space>>,
    row: Option<Row>,
    on_commit: Vec<Trigger>,
    on_rollback: Vec<Trigger>,
    scratch: Scratch,
    config: TxnConfig,
}

impl Txn {
    fn new(config: TxnConfig) -> Self {
        Self {
            state: TxnState::Active,
            old_tuple: None,
            new_tuple: None,
            space: None,
            row: None,
            on_commit: Vec::new(),
            on_rollback: Vec::new(),
            scratch: Scratch::default(),
            config,
        }
    }

    pub fn old_tuple(&self) -> Option<&Tuple> {
        self.old_tuple.as_ref()
    }

    pub fn new_tuple(&self) -> Option<&Tuple> {
        self.new_tuple.as_ref()
    }

    pub fn row(&self) -> Option<&Row> {
        self.row.as_ref()
    }

    fn state(&self) -> TxnState {
        self.state
    }

    fn apply_replace(
        &mut self,
        space: Arc<Space>,
        old_tuple: Option<Tuple>,
        new_tuple: Option<Tuple>,
        mode: ReplaceMode,
    ) -> Result<()> {
        let new_for_engine = new_tuple.clone();
        let displaced = space
            .engine
            .replace(space.id, old_tuple, new_for_engine, mode)?;

        self.old_tuple = displaced;
        self.new_tuple = new_tuple;
        self.space = Some(space.clone());

        if space.run_triggers {
            space.fire_replace_triggers(self);
        }

        Ok(())
    }

    fn apply_add_redo(&mut self, request: &dyn Request, log_mode: crate::config::LogMode) -> Result<()> {
        if let Some(header) = request.header() {
            self.row = Some(header);
            return Ok(());
        }

        if !log_mode.is_active() {
            return Ok(());
        }

        self.scratch.reset();
        request.encode(self.scratch.segments_mut());
        let body = self.scratch.take();
        self.row = Some(Row::new(request.op_type(), 0, body));
        Ok(())
    }

    fn do_commit(&mut self, appender: Option<&Appender<std::fs::File>>, sink: &mut dyn ResultSink) -> Result<()> {
        debug_assert_eq!(self.state(), TxnState::Active);
        let tuple_changed = self.old_tuple.is_some() || self.new_tuple.is_some();
        let is_temporary = self.space.as_ref().map(|s| s.temporary).unwrap_or(false);

        if tuple_changed && !is_temporary {
            debug_assert!(
                !self.config.log_mode.is_active() || self.row.is_some(),
                "log mode active but no redo row was synthesized before commit"
            );

            if self.config.log_mode.is_active() {
                if let Some(row) = self.row.take() {
                    let appender = appender
                        .expect("log mode active but no appender was supplied to commit()");
                    let op_type = row.op_type;
                    let started = Instant::now();
                    appender.append(row, self.config.log_mode)?;
                    let elapsed = started.elapsed();
                    if elapsed > self.config.too_long_threshold {
                        tracing::warn!(op_type, ?elapsed, "wal append exceeded too_long_threshold");
                    }
                }
            }
        }

        fire_triggers("on_commit", &self.on_commit, self);

        let visible = self.new_tuple.clone().or_else(|| self.old_tuple.clone());
        sink.add_tuple(visible);

        self.finish();
        self.state = TxnState::Committed;
        Ok(())
    }

    fn do_rollback(&mut self) -> Result<()> {
        if self.old_tuple.is_some() || self.new_tuple.is_some() {
            if let Some(space) = self.space.clone() {
                let old_installed = self.new_tuple.take();
                let original = self.old_tuple.take();
                // Reinstate the pre-transaction state: swap the currently-installed tuple
                // back out for whatever was there before.
                space
                    .engine
                    .replace(space.id, old_installed, original, ReplaceMode::DupInsert)?;
            }
        }

        fire_triggers("on_rollback", &self.on_rollback, self);

        self.finish();
        self.state = TxnState::RolledBack;
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(space) = &self.space {
            space.engine.txn_finish(space.id);
        }
        self.old_tuple = None;
        self.new_tuple = None;
        self.scratch.reset();
    }
}

/// Runs `triggers` in order, catching panics. Per SPEC_FULL.md §7, a trigger raising is a
/// fatal programming defect, not a recoverable error: we log and abort the process rather
/// than let the panic unwind into caller code that expects `commit`/`rollback` to be
/// infallible past this point.
fn fire_triggers(which: &'static str, triggers: &[Trigger], txn: &Txn) {
    for trigger in triggers {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| trigger(txn)));
        if let Err(panic) = outcome {
            let msg = panic
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic payload>");
            tracing::error!(which, msg, "trigger panicked; this is a fatal programming defect");
            std::process::abort();
        }
    }
}

tokio::task_local! {
    static CURRENT_TXN: RefCell<Option<Txn>>;
}

/// Establishes the per-task transaction slot for the duration of `fut`. Every task that
/// will call [`begin`]/[`replace`]/[`commit`] must be spawned (or run) inside this scope —
/// it's the task-local equivalent of a connection pool checking out a thread.
pub async fn run_as_task<F>(fut: F) -> F::Output
where
    F: std::future::Future,
{
    CURRENT_TXN.scope(RefCell::new(None), fut).await
}

/// Whether the current task already has an active transaction.
pub fn in_txn() -> bool {
    CURRENT_TXN
        .try_with(|slot| slot.borrow().is_some())
        .unwrap_or(false)
}

/// Starts a new transaction on the current task. Fails if one is already active.
pub fn begin(config: TxnConfig) -> Result<()> {
    CURRENT_TXN.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(Error::TxnAlreadyActive);
        }
        *slot = Some(Txn::new(config));
        Ok(())
    })
}

fn with_active<R>(f: impl FnOnce(&mut Txn) -> Result<R>) -> Result<R> {
    CURRENT_TXN.with(|slot| {
        let mut slot = slot.borrow_mut();
        let txn = slot.as_mut().ok_or(Error::NoActiveTxn)?;
        f(txn)
    })
}

/// Reads the current transaction without mutating it, e.g. for test assertions.
pub fn with_current<R>(f: impl FnOnce(&Txn) -> R) -> Result<R> {
    CURRENT_TXN.with(|slot| {
        let slot = slot.borrow();
        let txn = slot.as_ref().ok_or(Error::NoActiveTxn)?;
        Ok(f(txn))
    })
}

/// Swaps `old_tuple` out for `new_tuple` in `space` under `mode`, recording the change on
/// the current transaction. At least one of `old_tuple`/`new_tuple` must be given.
pub fn replace(
    space: Arc<Space>,
    old_tuple: Option<Tuple>,
    new_tuple: Option<Tuple>,
    mode: ReplaceMode,
) -> Result<()> {
    if old_tuple.is_none() && new_tuple.is_none() {
        return Err(Error::EmptyReplace);
    }
    with_active(|txn| txn.apply_replace(space, old_tuple, new_tuple, mode))
}

/// Synthesizes (or accepts, if `request.header()` is set) the redo row that will be
/// appended to the log when the current transaction commits.
pub fn add_redo(request: &dyn Request, log_mode: crate::config::LogMode) -> Result<()> {
    with_active(|txn| txn.apply_add_redo(request, log_mode))
}

/// Registers a trigger to fire once, right before the current transaction's visible result
/// is delivered, if it commits.
pub fn on_commit(trigger: Trigger) -> Result<()> {
    with_active(|txn| {
        txn.on_commit.push(trigger);
        Ok(())
    })
}

/// Registers a trigger to fire once, after engine state is restored, if the current
/// transaction rolls back.
pub fn on_rollback(trigger: Trigger) -> Result<()> {
    with_active(|txn| {
        txn.on_rollback.push(trigger);
        Ok(())
    })
}

/// Commits the current transaction: appends its redo row (unless its space is temporary or
/// nothing changed), fires `on_commit` triggers, and delivers the result to `sink`.
///
/// On `Err`, the transaction is left installed and active — the caller must call
/// [`rollback`] to clear it; engine state from any `replace` calls already took effect and
/// is not automatically undone.
pub fn commit(appender: Option<&Appender<std::fs::File>>, sink: &mut dyn ResultSink) -> Result<()> {
    with_active(|txn| txn.do_commit(appender, sink))?;
    CURRENT_TXN.with(|slot| {
        slot.borrow_mut().take();
    });
    Ok(())
}

/// Rolls back the current transaction, if any, reinstating prior engine state and clearing
/// the task-local slot. A no-op (not an error) if no transaction is active.
pub fn rollback() -> Result<()> {
    let txn = CURRENT_TXN.with(|slot| slot.borrow_mut().take());
    if let Some(mut txn) = txn {
        txn.do_rollback()?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::MemoryEngine;

    fn cfg() -> TxnConfig {
        TxnConfig {
            log_mode: crate::config::LogMode::None,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_then_commit_is_visible() {
        run_as_task(async {
            let engine = Arc::new(MemoryEngine::new());
            let space = Arc::new(Space::new(1, engine.clone()));
            let tuple = Tuple::from_bytes(b"row".to_vec());

            begin(cfg()).unwrap();
            replace(space.clone(), None, Some(tuple.clone()), ReplaceMode::DupInsert).unwrap();

            let mut sink = LastTupleSink::default();
            commit(None, &mut sink).unwrap();

            assert_eq!(sink.into_inner(), Some(tuple.clone()));
            assert_eq!(engine.contents(1), vec![tuple]);
            assert!(!in_txn());
        })
        .await;
    }

    #[tokio::test]
    async fn rollback_restores_prior_state() {
        run_as_task(async {
            let engine = Arc::new(MemoryEngine::new());
            let space = Arc::new(Space::new(1, engine.clone()));
            let original = Tuple::from_bytes(b"original".to_vec());
            let replacement = Tuple::from_bytes(b"replacement".to_vec());

            engine
                .replace(1, None, Some(original.clone()), ReplaceMode::DupInsert)
                .unwrap();

            begin(cfg()).unwrap();
            replace(
                space.clone(),
                Some(original.clone()),
                Some(replacement.clone()),
                ReplaceMode::DupReplace,
            )
            .unwrap();
            assert_eq!(engine.contents(1), vec![replacement]);

            rollback().unwrap();

            assert_eq!(engine.contents(1), vec![original]);
            assert!(!in_txn());
        })
        .await;
    }

    #[tokio::test]
    async fn second_begin_on_same_task_fails() {
        run_as_task(async {
            begin(cfg()).unwrap();
            let err = begin(cfg()).unwrap_err();
            assert!(matches!(err, Error::TxnAlreadyActive));
            rollback().unwrap();
        })
        .await;
    }

    #[tokio::test]
    async fn temporary_space_skips_redo_row() {
        run_as_task(async {
            let engine = Arc::new(MemoryEngine::new());
            let space = Arc::new(Space::new(1, engine).temporary(true));
            let tuple = Tuple::from_bytes(b"scratch".to_vec());

            begin(TxnConfig {
                log_mode: crate::config::LogMode::Write,
                ..Default::default()
            })
            .unwrap();
            replace(space, None, Some(tuple), ReplaceMode::DupInsert).unwrap();

            let mut sink = LastTupleSink::default();
            // No appender supplied; a temporary space must never reach the `expect()` in
            // do_commit, so this must not panic.
            commit(None, &mut sink).unwrap();
        })
        .await;
    }
}

use std::time::Duration;

/// Process-wide mode selecting whether appends happen and how they are flushed.
///
/// `None` short-circuits logging in [`crate::txn::Txn::commit`]; `Write` relies on the OS
/// page cache; `Fsync` calls `sync_all` after every append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    None,
    #[default]
    Write,
    Fsync,
}

impl LogMode {
    pub fn is_active(self) -> bool {
        !matches!(self, LogMode::None)
    }
}

/// Coordinator-wide knobs, threaded explicitly into [`crate::txn::Txn`] rather than read from
/// module-global state — the teacher threads equivalent small config structs
/// (`WalRegistry::new(path)`, `LibsqlWalManager`) into its components the same way.
#[derive(Debug, Clone)]
pub struct TxnConfig {
    pub log_mode: LogMode,
    /// Observational only: crossing this threshold logs a warning, it never aborts or
    /// retries the commit.
    pub too_long_threshold: Duration,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            log_mode: LogMode::default(),
            too_long_threshold: Duration::from_millis(500),
        }
    }
}

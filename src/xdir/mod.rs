//! Enumerates and names files in a directory that belong to one kind (snapshots or logs),
//! distinguished by extension.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::xlog::{Appender, Cursor, FileKind};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error scanning directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("no file with signature {0} in directory")]
    NotFound(i64),
    #[error(transparent)]
    Xlog(#[from] crate::xlog::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A directory holding either `.snap` or `.xlog` files, each named by a signed 64-bit
/// "signature" (conventionally the first LSN the file contains).
pub struct Xdir {
    path: PathBuf,
    kind: FileKind,
    index: ArcSwap<Vec<i64>>,
}

impl Xdir {
    pub fn new(path: impl Into<PathBuf>, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            kind,
            index: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Returns the ordered list of signatures found by the last [`Xdir::scan`].
    pub fn signatures(&self) -> Arc<Vec<i64>> {
        self.index.load_full()
    }

    /// Scans the directory, replacing the stored signature index atomically. Unparseable
    /// entries are skipped with a warning rather than failing the whole scan.
    ///
    /// Walks with `walkdir` rather than `std::fs::read_dir`, matching the teacher's own
    /// `WalRegistry::open` directory scan in `registry.rs`.
    pub fn scan(&self) -> Result<()> {
        if !self.path.exists() {
            self.index.store(Arc::new(Vec::new()));
            return Ok(());
        }

        let mut signatures = Vec::new();

        for entry in walkdir::WalkDir::new(&self.path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io_err) => Error::Io(io_err),
                None => Error::Io(std::io::Error::other("walkdir error")),
            })?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => {
                    tracing::warn!(?name, "skipping non-utf8 directory entry");
                    continue;
                }
            };

            match parse_signature(name, self.kind) {
                Some(sig) => signatures.push(sig),
                None => {
                    tracing::warn!(file = name, "skipping unrecognized directory entry");
                }
            }
        }

        signatures.sort_unstable();
        self.index.store(Arc::new(signatures));
        Ok(())
    }

    /// `<dirname>/<signature><extension>`. The reverse, [`parse_signature`], must recover
    /// exactly `signature` from the file name this produces.
    pub fn format_filename(&self, signature: i64) -> PathBuf {
        self.path.join(format!("{signature:020}{}", self.kind.extension()))
    }

    /// Opens the file named by `signature` for reading, validating its header.
    pub fn open_for_read(&self, signature: i64) -> Result<Cursor<std::fs::File>> {
        let path = self.format_filename(signature);
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::NotFound(signature)
                } else {
                    Error::Io(e)
                }
            })?;
        Ok(Cursor::open(file, self.kind)?)
    }

    /// Creates a brand-new file named by `signature`, which must not already exist, and
    /// returns an [`Appender`] for it.
    pub fn create_for_write(&self, signature: i64) -> Result<Appender<std::fs::File>> {
        let path = self.format_filename(signature);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(Appender::create(file, path, self.kind, signature)?)
    }
}

/// `<signature padded to 20 digits>.<ext>`, where `signature` may carry a leading `-`.
/// Exact inverse of [`Xdir::format_filename`]'s padding convention.
fn parse_signature(name: &str, kind: FileKind) -> Option<i64> {
    if name.matches('.').count() != 1 {
        return None;
    }
    let stem = name.strip_suffix(kind.extension())?;
    if stem.is_empty() {
        return None;
    }
    let sig = stem.parse::<i64>().ok()?;
    // Spec: signatures must lie in the *open* interval (i64::MIN, i64::MAX).
    if sig == i64::MIN || sig == i64::MAX {
        return None;
    }
    Some(sig)
}

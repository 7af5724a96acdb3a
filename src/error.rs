pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced across the whole crate.
///
/// Each submodule defines its own narrower error enum; this type aggregates them at the
/// boundary callers actually see, the way the teacher crate's `crate::error::Error`
/// aggregates lower-layer errors with `#[from]`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Xlog(#[from] crate::xlog::Error),
    #[error(transparent)]
    Xdir(#[from] crate::xdir::Error),
    #[error(transparent)]
    Txn(#[from] crate::txn::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod request;
pub mod space;
pub mod tuple;
pub mod txn;
pub mod xdir;
pub mod xlog;

pub use config::{LogMode, TxnConfig};
pub use engine::{Engine, EngineError, MemoryEngine, ReplaceMode};
pub use error::{Error, Result};
pub use space::Space;
pub use tuple::Tuple;
pub use xdir::Xdir;
pub use xlog::{Appender, Cursor, FileKind, Row};

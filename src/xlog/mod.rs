//! On-disk layout of snapshot and write-ahead-log files (the "v11" format), plus the
//! framed record reader ([`Cursor`]) and writer ([`Appender`]).

mod appender;
mod cursor;
mod record;

pub use appender::Appender;
pub use cursor::{Cursor, CursorOutcome};
pub use record::{Row, ROW_HEADER_LEN};

use std::io::{BufRead, BufReader, Read};

/// Begins every record, byte-aligned, searched for independently of record boundaries.
pub const ROW_MARKER: u32 = 0xBA0BABED;
/// Terminates a sealed file.
pub const EOF_MARKER: u32 = 0x10ADAB1E;

pub const FORMAT_VERSION: &str = "0.11";

/// Distinguishes a snapshot directory from a log directory; also the first line of the file
/// header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Snap,
    Xlog,
}

impl FileKind {
    pub fn header_line(self) -> &'static str {
        match self {
            FileKind::Snap => "SNAP",
            FileKind::Xlog => "XLOG",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Snap => ".snap",
            FileKind::Xlog => ".xlog",
        }
    }

    fn parse(line: &str) -> Option<Self> {
        match line {
            "SNAP" => Some(FileKind::Snap),
            "XLOG" => Some(FileKind::Xlog),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Free-form key/value lines carried after the filetype/version lines.
pub type HeaderMeta = Vec<(String, String)>;

/// The three-line text header common to snapshot and log files.
#[derive(Debug, Clone)]
pub struct FileHeader {
    pub kind: FileKind,
    pub meta: HeaderMeta,
}

impl FileHeader {
    pub fn new(kind: FileKind) -> Self {
        Self {
            kind,
            meta: Vec::new(),
        }
    }

    /// Serialized byte length of this header once written.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(self.kind.header_line().as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(FORMAT_VERSION.as_bytes());
        buf.push(b'\n');
        for (k, v) in &self.meta {
            buf.extend_from_slice(k.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(v.as_bytes());
            buf.push(b'\n');
        }
        buf.push(b'\n');
        buf
    }

    /// Reads and validates the header from `r`, rejecting a mismatched filetype or version.
    /// Returns the header and the number of bytes consumed.
    pub fn decode<R: Read>(mut r: R, expected: FileKind) -> Result<(Self, u64)> {
        let mut reader = BufReader::new(&mut r);
        let mut consumed = 0u64;

        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Err(Error::InvalidHeader("empty file".into()));
        }
        consumed += n as u64;
        let kind = FileKind::parse(line.trim_end_matches(['\n', '\r']))
            .ok_or_else(|| Error::InvalidHeader(format!("unknown filetype line: {line:?}")))?;
        if kind != expected {
            return Err(Error::InvalidHeader(format!(
                "expected {:?} file, found {:?}",
                expected, kind
            )));
        }

        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Err(Error::InvalidHeader("truncated header".into()));
        }
        consumed += n as u64;
        if line.trim_end_matches(['\n', '\r']) != FORMAT_VERSION {
            return Err(Error::InvalidHeader(format!(
                "unsupported version: {line:?}"
            )));
        }

        let mut meta = Vec::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Err(Error::InvalidHeader("truncated header".into()));
            }
            consumed += n as u64;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                break;
            }
            match trimmed.split_once(": ") {
                Some((k, v)) => meta.push((k.to_string(), v.to_string())),
                None => meta.push((trimmed.to_string(), String::new())),
            }
        }

        Ok((Self { kind, meta }, consumed))
    }
}

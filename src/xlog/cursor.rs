use std::sync::Arc;

use zerocopy::FromBytes;

use crate::io::FileExt;

use super::record::RecordHeader;
use super::{Error, FileHeader, FileKind, Result, Row, EOF_MARKER, ROW_HEADER_LEN, ROW_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Eof,
    Truncated,
}

/// What [`Cursor::next`] produced.
#[derive(Debug)]
pub enum CursorOutcome {
    Row(Row),
    NoMoreRows,
}

/// Streaming, resynchronizing reader over one log/snapshot file.
///
/// State machine: `Ready -> Advancing -> {GoodRow, Resync, EofSeen, Truncated}`, per
/// SPEC_FULL.md §4.1. `good_offset` always points just past the last successfully decoded
/// record (or past the header, before the first `next()` call).
pub struct Cursor<F = std::fs::File> {
    file: Arc<F>,
    good_offset: u64,
    row_count: u64,
    eof_read: bool,
    last_skipped_bytes: u64,
    state: State,
}

impl<F: FileExt> Cursor<F> {
    /// Opens a cursor over `file`, validating the three-line header matches `expected`.
    pub fn open(file: F, expected: FileKind) -> Result<Self> {
        let probe_len = file.len()?.min(4096) as usize;
        let mut header_bytes = vec![0u8; probe_len];
        let n = file.read_at_partial(&mut header_bytes, 0)?;
        header_bytes.truncate(n);
        let (_, header_len) = FileHeader::decode(&header_bytes[..], expected)?;

        Ok(Self {
            file: Arc::new(file),
            good_offset: header_len,
            row_count: 0,
            eof_read: false,
            last_skipped_bytes: 0,
            state: State::Ready,
        })
    }

    pub fn good_offset(&self) -> u64 {
        self.good_offset
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn eof_read(&self) -> bool {
        self.eof_read
    }

    pub fn last_skipped_bytes(&self) -> u64 {
        self.last_skipped_bytes
    }

    pub fn is_truncated(&self) -> bool {
        self.state == State::Truncated
    }

    /// Decodes and returns the next record, or `NoMoreRows` if the file has no more
    /// complete records right now (which may change later if the writer is still
    /// appending).
    pub fn next(&mut self) -> Result<CursorOutcome> {
        loop {
            let mut marker_buf = [0u8; 4];
            let n = self.file.read_at_partial(&mut marker_buf, self.good_offset)?;
            if n < 4 {
                self.state = State::Eof;
                return Ok(CursorOutcome::NoMoreRows);
            }
            let marker = u32::from_le_bytes(marker_buf);

            if marker == EOF_MARKER {
                self.eof_read = true;
                self.good_offset += 4;
                self.state = State::Eof;
                return Ok(CursorOutcome::NoMoreRows);
            }

            if marker != ROW_MARKER {
                match self.resync()? {
                    Some(found) => {
                        tracing::warn!(
                            skipped_bytes = self.last_skipped_bytes,
                            offset = self.good_offset,
                            "resynchronized after unexpected bytes"
                        );
                        self.good_offset = found;
                        continue;
                    }
                    None => {
                        tracing::warn!(offset = self.good_offset, "eof marker corrupt");
                        self.state = State::Truncated;
                        return Ok(CursorOutcome::NoMoreRows);
                    }
                }
            }

            match self.try_decode_at(self.good_offset) {
                Ok(Some((row, end))) => {
                    self.good_offset = end;
                    self.row_count += 1;
                    self.state = State::Ready;
                    return Ok(CursorOutcome::Row(row));
                }
                Ok(None) => {
                    // Header or body not fully on disk yet: the writer is still appending.
                    return Ok(CursorOutcome::NoMoreRows);
                }
                Err(Error::CorruptRecord(msg)) => {
                    tracing::warn!(
                        offset = self.good_offset,
                        error = %msg,
                        "corrupt record, resynchronizing"
                    );
                    match self.resync()? {
                        Some(found) => {
                            self.good_offset = found;
                            continue;
                        }
                        None => {
                            self.state = State::Truncated;
                            return Ok(CursorOutcome::NoMoreRows);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_decode_at(&self, offset: u64) -> Result<Option<(Row, u64)>> {
        let mut header_buf = [0u8; ROW_HEADER_LEN];
        let n = self
            .file
            .read_at_partial(&mut header_buf, offset + 4)?;
        if n < ROW_HEADER_LEN {
            return Ok(None);
        }
        let header = RecordHeader::read_from(&header_buf[..])
            .expect("buffer is exactly ROW_HEADER_LEN bytes");

        let body_len = header.len() as usize;
        let mut body = vec![0u8; body_len];
        let body_offset = offset + 4 + ROW_HEADER_LEN as u64;
        let n = self.file.read_at_partial(&mut body, body_offset)?;
        if n < body_len {
            return Ok(None);
        }

        let row = Row::decode(&header, body)?;
        Ok(Some((row, body_offset + body_len as u64)))
    }

    /// Slides a 4-byte window forward, one byte at a time, from `good_offset + 1` looking
    /// for the next `ROW_MARKER`. Returns `None` if the scan reaches end-of-file first.
    fn resync(&mut self) -> Result<Option<u64>> {
        let start = self.good_offset + 1;
        let file_len = self.file.len()?;
        if start >= file_len {
            return Ok(None);
        }

        let mut buf = vec![0u8; (file_len - start) as usize];
        let n = self.file.read_at_partial(&mut buf, start)?;
        buf.truncate(n);

        let needle = ROW_MARKER.to_le_bytes();
        match buf.windows(needle.len()).position(|w| w == needle) {
            Some(pos) => {
                let found_offset = start + pos as u64;
                self.last_skipped_bytes = found_offset - self.good_offset;
                Ok(Some(found_offset))
            }
            None => Ok(None),
        }
    }
}

impl<F> Drop for Cursor<F> {
    fn drop(&mut self) {
        // Seeking back to good_offset is implicit here: we never hold a shared file cursor —
        // every read is a pread at an explicit offset — so there is nothing to rewind. A
        // subsequent Cursor opened on the same file picks up from its own good_offset
        // (typically seeded from where this one left off by the caller).
    }
}

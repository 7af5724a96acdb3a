use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use super::{Error, Result};

/// On-disk record header, covering disk offsets `[4, 32)` (i.e. everything after the
/// `ROW_MARKER` and up to and including `data_crc32c`).
///
/// `header_crc32c` is computed over the bytes of this struct *after* itself — offsets
/// `[8, 32)` of the full record, or equivalently `self.as_bytes()[4..]` of this struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct RecordHeader {
    header_crc32c: U32,
    /// Two's-complement bit pattern of the signed LSN.
    lsn: U64,
    /// IEEE-754 bit pattern of the timestamp.
    tm: U64,
    len: U32,
    data_crc32c: U32,
}

pub const ROW_HEADER_LEN: usize = std::mem::size_of::<RecordHeader>();

/// Bytes of the decoded redo-record body that encode `type`/`cookie` ahead of the caller's
/// payload segments (see SPEC_FULL.md §4.1 / §9: this keeps the on-disk `len`/CRC framing
/// exactly as specified while `Row` still exposes `type` and `cookie` as typed fields).
const PREFIX_LEN: usize = 2 + 8;

impl RecordHeader {
    fn crc_region(&self) -> &[u8] {
        &self.as_bytes()[4..]
    }

    fn check(&self, body: &[u8]) -> Result<()> {
        let computed_header_crc = crc32c::crc32c(self.crc_region());
        if computed_header_crc != self.header_crc32c.get() {
            return Err(Error::CorruptRecord(format!(
                "header crc mismatch: stored {}, computed {}",
                self.header_crc32c.get(),
                computed_header_crc
            )));
        }

        let computed_data_crc = crc32c::crc32c(body);
        if computed_data_crc != self.data_crc32c.get() {
            return Err(Error::CorruptRecord(format!(
                "data crc mismatch: stored {}, computed {}",
                self.data_crc32c.get(),
                computed_data_crc
            )));
        }

        Ok(())
    }

    pub fn len(&self) -> u32 {
        self.len.get()
    }
}

/// A decoded log entry. See SPEC_FULL.md §3.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub lsn: i64,
    pub tm: f64,
    pub op_type: u16,
    pub cookie: u64,
    pub body: Vec<bytes::Bytes>,
}

impl Row {
    pub fn new(op_type: u16, cookie: u64, body: Vec<bytes::Bytes>) -> Self {
        Self {
            lsn: 0,
            tm: 0.0,
            op_type,
            cookie,
            body,
        }
    }

    fn body_len(&self) -> usize {
        PREFIX_LEN + self.body.iter().map(|b| b.len()).sum::<usize>()
    }

    /// Encodes `ROW_MARKER` + header + body into `out`, returning the number of bytes
    /// appended. `lsn`/`tm` in `self` are used verbatim — the caller (the [`super::Appender`])
    /// is responsible for stamping the assigned LSN and timestamp before calling this.
    pub(super) fn encode(&self, out: &mut Vec<u8>) {
        let body_len = self.body_len();

        let mut body = Vec::with_capacity(body_len);
        body.extend_from_slice(&self.op_type.to_le_bytes());
        body.extend_from_slice(&self.cookie.to_le_bytes());
        for seg in &self.body {
            body.extend_from_slice(seg);
        }
        debug_assert_eq!(body.len(), body_len);

        let data_crc32c = crc32c::crc32c(&body);

        let mut header = RecordHeader {
            header_crc32c: 0.into(),
            lsn: (self.lsn as u64).into(),
            tm: self.tm.to_bits().into(),
            len: (body_len as u32).into(),
            data_crc32c: data_crc32c.into(),
        };
        let header_crc32c = crc32c::crc32c(header.crc_region());
        header.header_crc32c = header_crc32c.into();

        out.extend_from_slice(&super::ROW_MARKER.to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(&body);
    }

    /// Decodes the body written by [`Row::encode`] back into type/cookie/segments.
    pub(super) fn decode(header: &RecordHeader, body: Vec<u8>) -> Result<Self> {
        header.check(&body)?;

        if body.len() < PREFIX_LEN {
            return Err(Error::CorruptRecord(format!(
                "body too short to hold type/cookie prefix: {} bytes",
                body.len()
            )));
        }

        let op_type = u16::from_le_bytes(body[0..2].try_into().unwrap());
        let cookie = u64::from_le_bytes(body[2..10].try_into().unwrap());
        let payload = bytes::Bytes::from(body[PREFIX_LEN..].to_vec());

        Ok(Row {
            lsn: header.lsn.get() as i64,
            tm: f64::from_bits(header.tm.get()),
            op_type,
            cookie,
            body: vec![payload],
        })
    }
}

pub(super) type DecodedHeader = RecordHeader;

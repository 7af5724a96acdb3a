use std::fs::File;
use std::io::{self, ErrorKind, IoSlice};

/// Positioned, unbuffered file access.
///
/// Grounded in the teacher crate's `fs::file::FileExt` / `io::file::FileExt`: a thin
/// `pread`/`pwrite` wrapper so callers never have to juggle a shared file cursor.
pub trait FileExt: Send + Sync + 'static {
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
        let mut written = 0;
        while written != buf.len() {
            written += self.write_at(&buf[written..], offset + written as u64)?;
        }
        Ok(())
    }

    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;

    fn write_at_vectored(&self, bufs: &[IoSlice<'_>], offset: u64) -> io::Result<usize>;

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let mut read = 0;
        while read != buf.len() {
            let n = self.read_at(&mut buf[read..], offset + read as u64)?;
            if n == 0 {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "unexpected end-of-file",
                ));
            }
            read += n;
        }
        Ok(())
    }

    /// Like `read_at`, but treats a short/zero read as "nothing more to read" rather than an
    /// error. Used by the cursor, which must be able to distinguish "not enough bytes yet"
    /// from a hard I/O failure.
    fn read_at_partial(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.read_at(buf, offset)
    }

    fn sync_all(&self) -> io::Result<()>;

    fn len(&self) -> io::Result<u64>;
}

impl FileExt for File {
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        Ok(nix::sys::uio::pwrite(self, buf, offset as i64)?)
    }

    fn write_at_vectored(&self, bufs: &[IoSlice<'_>], offset: u64) -> io::Result<usize> {
        Ok(nix::sys::uio::pwritev(self, bufs, offset as i64)?)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(nix::sys::uio::pread(self, buf, offset as i64)?)
    }

    fn sync_all(&self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

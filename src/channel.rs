//! Random-access byte channels.
//!
//! These wrap a seekable sink or source and keep track of the absolute offset themselves, so that
//! callers can ask "where am I" without a syscall and redundant seeks are skipped.

use std::io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write};

use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::format::round_up;

const ZEROES: [u8; 16] = [0; 16];

/// Resolves a `SeekFrom` against a view whose cursor is at `position` and whose end is at `end`.
///
/// Positions are relative to the start of the view.  As with `std::io::Cursor`, seeking past the
/// end is allowed but seeking before the start is an error.
pub(crate) fn resolve_seek(position: u64, end: u64, pos: SeekFrom) -> Result<u64> {
    let (base, delta) = match pos {
        SeekFrom::Start(n) => return Ok(n),
        SeekFrom::Current(delta) => (position, delta),
        SeekFrom::End(delta) => (end, delta),
    };
    base.checked_add_signed(delta).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidInput,
            "invalid seek to a negative or overflowing position",
        )
    })
}

#[derive(Debug)]
pub(crate) struct OutputChannel<W> {
    inner: W,
    offset: u64,
}

impl<W: Write + Seek> OutputChannel<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        let offset = inner.stream_position()?;
        Ok(OutputChannel { inner, offset })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset != self.offset {
            self.offset = self.inner.seek(SeekFrom::Start(offset))?;
        }
        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let n = self.inner.write(data)?;
        self.offset += n as u64;
        Ok(n)
    }

    /// Like `Write::write_all()`, but keeps the offset accurate even if a write fails part way.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            match self.write(data) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => data = &data[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn write_struct(&mut self, st: &(impl IntoBytes + Immutable)) -> Result<()> {
        self.write_all(st.as_bytes())
    }

    /// Writes zeroes until the offset is a multiple of `alignment`.
    pub fn pad(&mut self, alignment: u64) -> Result<()> {
        let target = round_up(self.offset, alignment)
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "offset overflow"))?;
        while self.offset < target {
            let n = (target - self.offset).min(ZEROES.len() as u64) as usize;
            self.write_all(&ZEROES[..n])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[derive(Debug)]
pub(crate) struct InputChannel<R> {
    inner: R,
    offset: u64,
    length: u64,
}

impl<R: Read + Seek> InputChannel<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let length = inner.seek(SeekFrom::End(0))?;
        let offset = inner.seek(SeekFrom::Start(0))?;
        Ok(InputChannel {
            inner,
            offset,
            length,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The length of the source, as measured when the channel was created.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset != self.offset {
            self.offset = self.inner.seek(SeekFrom::Start(offset))?;
        }
        Ok(())
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.offset += n as u64;
        Ok(n)
    }

    pub fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read(buf) {
                Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
                Ok(n) => buf = &mut buf[n..],
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn read_struct<T: FromBytes + IntoBytes>(&mut self) -> Result<T> {
        let mut value = T::new_zeroed();
        self.read_exact(value.as_mut_bytes())?;
        Ok(value)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

use std::io::{self, Read};

use crate::{Hasher, Result};

const BUFFER_SIZE: usize = 64 * 1024;

/// Passes bytes through unchanged while feeding them to a hasher.
pub struct VerifiedReader<R, H> {
    inner: R,
    hasher: H,
    consumed: u64,
}

impl<R, H: Hasher> VerifiedReader<R, H> {
    pub fn new(inner: R, hasher: H) -> Self {
        Self {
            inner,
            hasher,
            consumed: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.consumed
    }

    /// Lowercase hex digest of everything read so far.
    pub fn hex_digest(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.consumed += n as u64;
        Ok(n)
    }
}

/// Drain `reader` through `hasher`, returning the lowercase hex digest and
/// the number of bytes consumed. Memory use is bounded by one buffer.
pub fn hash_reader<R: Read, H: Hasher>(reader: R, hasher: H) -> Result<(String, u64)> {
    let mut verified = VerifiedReader::new(reader, hasher);
    io::copy(
        &mut io::BufReader::with_capacity(BUFFER_SIZE, &mut verified),
        &mut io::sink(),
    )?;
    let bytes = verified.bytes_read();
    Ok((verified.hex_digest(), bytes))
}

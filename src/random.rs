//! Masking key generation.

use std::io;

/// Source of masking keys.
///
/// Keys must be unpredictable to intermediaries (RFC 6455 Section 10.3), so
/// production implementations should be backed by a CSPRNG.
pub trait MaskSource: Send + Sync {
    /// Fill `buf` with random bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if no randomness could be obtained.
    fn fill(&self, buf: &mut [u8]) -> io::Result<()>;

    /// Produce one 4-byte masking key.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`fill`](Self::fill).
    fn next_key(&self) -> io::Result<[u8; 4]> {
        let mut key = [0u8; 4];
        self.fill(&mut key)?;
        Ok(key)
    }
}

/// Operating system CSPRNG via `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsMaskSource;

impl MaskSource for OsMaskSource {
    fn fill(&self, buf: &mut [u8]) -> io::Result<()> {
        getrandom::getrandom(buf).map_err(io::Error::from)
    }
}

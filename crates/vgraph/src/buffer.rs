//! Append-only output buffer with geometric growth.

use std::fmt::{self, Write as _};

use crate::error::EncodeError;

pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct OutBuf {
    bytes: Vec<u8>,
    limit: Option<usize>,
}

impl OutBuf {
    pub fn new() -> Result<Self, EncodeError> {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, EncodeError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(capacity)
            .map_err(|_| EncodeError::OutOfMemory {
                requested: capacity,
            })?;
        Ok(Self { bytes, limit: None })
    }

    /// Caps the total number of bytes this buffer will accept.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let needed = self
            .bytes
            .len()
            .checked_add(bytes.len())
            .ok_or(EncodeError::OutOfMemory {
                requested: usize::MAX,
            })?;
        if let Some(limit) = self.limit {
            if needed > limit {
                return Err(EncodeError::OutputLimit { limit });
            }
        }
        if needed > self.bytes.capacity() {
            self.grow_to(needed)?;
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Formats `args` into an exactly-sized scratch string, then appends it.
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), EncodeError> {
        let mut sizer = Sizer(0);
        sizer.write_fmt(args).map_err(|_| EncodeError::Format)?;

        let mut scratch = String::new();
        scratch
            .try_reserve_exact(sizer.0)
            .map_err(|_| EncodeError::OutOfMemory { requested: sizer.0 })?;
        scratch.write_fmt(args).map_err(|_| EncodeError::Format)?;
        self.push_bytes(scratch.as_bytes())
    }

    /// Bytes appended so far.
    pub fn written(&self) -> usize {
        self.bytes.len()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    // Double until the request fits, never past the limit.
    fn grow_to(&mut self, needed: usize) -> Result<(), EncodeError> {
        let mut target = self.bytes.capacity().max(1);
        while target < needed {
            target = target.checked_mul(2).ok_or(EncodeError::OutOfMemory {
                requested: usize::MAX,
            })?;
        }
        if let Some(limit) = self.limit {
            target = target.min(limit.max(needed));
        }
        let additional = target - self.bytes.len();
        self.bytes
            .try_reserve_exact(additional)
            .map_err(|_| EncodeError::OutOfMemory { requested: target })
    }
}

/// Counts formatted bytes without storing them.
struct Sizer(usize);

impl fmt::Write for Sizer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_doubles_until_the_append_fits() {
        let mut buf = OutBuf::with_capacity(4).unwrap();
        buf.push_bytes(b"abc").unwrap();
        assert_eq!(buf.capacity(), 4);

        buf.push_bytes(b"0123456789").unwrap();
        assert!(buf.capacity() >= 16);
        assert_eq!(buf.into_bytes(), b"abc0123456789");
    }

    #[test]
    fn zero_capacity_buffer_still_grows() {
        let mut buf = OutBuf::with_capacity(0).unwrap();
        buf.push_bytes(b"x").unwrap();
        buf.push_bytes(b"").unwrap();
        assert_eq!(buf.into_bytes(), b"x");
    }

    #[test]
    fn formatted_append_writes_exact_text() {
        let mut buf = OutBuf::new().unwrap();
        buf.push_fmt(format_args!("integer {}\n", -42i64)).unwrap();
        buf.push_fmt(format_args!("string {}\n", 0usize)).unwrap();
        assert_eq!(buf.into_bytes(), b"integer -42\nstring 0\n");
    }

    #[test]
    fn limit_rejects_overflowing_append_and_keeps_prior_bytes() {
        let mut buf = OutBuf::with_capacity(2).unwrap().with_limit(Some(5));
        buf.push_bytes(b"nil\n").unwrap();
        let err = buf.push_bytes(b"nil\n").unwrap_err();
        assert_eq!(err, EncodeError::OutputLimit { limit: 5 });
        assert_eq!(buf.written(), 4);
    }

    #[test]
    fn embedded_nul_bytes_are_copied() {
        let mut buf = OutBuf::new().unwrap();
        buf.push_bytes(b"a\0b").unwrap();
        assert_eq!(buf.into_bytes(), b"a\0b");
    }
}

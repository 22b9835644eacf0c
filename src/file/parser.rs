//! Cursor-based byte stream parser for CIL method bodies.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over
//! a byte slice. The instruction decoder drives one parser per method body, reading opcode
//! bytes with [`Parser::read_le`] and operands of whatever width the opcode table prescribes.
//!
//! # Examples
//!
//! ```rust
//! use dotlint::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let mut parser = Parser::new(&data);
//!
//! let first = parser.read_le::<u32>()?;
//! assert_eq!(first, 0x04030201);
//!
//! parser.seek(6)?;
//! assert_eq!(parser.read_le::<u16>()?, 0x0807);
//! assert!(!parser.has_more_data());
//! # Ok::<(), dotlint::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    Error::OutOfBounds,
    Result,
};

/// A binary data parser for reading CIL bytecode.
///
/// `Parser` maintains an internal position cursor and validates every read against the end
/// of the buffer, so truncated operands surface as [`crate::Error::OutOfBounds`] instead of
/// panics.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if this would move past the end of the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let target = self.position.checked_add(step).ok_or(OutOfBounds)?;
        self.seek(target)
    }

    /// Current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The full underlying buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the parser is exhausted.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Read a little-endian value and advance past it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough bytes remain.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read `length` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.position.checked_add(length).ok_or(OutOfBounds)?;
        let bytes = self.data.get(self.position..end).ok_or(OutOfBounds)?;
        self.position = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let data = [0x2A, 0x01, 0x00, 0x00, 0x0A, 0xFF];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.len(), 6);
        assert_eq!(parser.read_le::<u8>().unwrap(), 0x2A);
        assert_eq!(parser.read_le::<u32>().unwrap(), 0x0A00_0001);
        assert_eq!(parser.pos(), 5);
        assert_eq!(parser.remaining(), 1);
        assert_eq!(parser.read_le::<i8>().unwrap(), -1);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn peek_does_not_advance() {
        let parser = Parser::new(&[0xFE, 0x01]);
        assert_eq!(parser.peek_byte().unwrap(), 0xFE);
        assert_eq!(parser.pos(), 0);
    }

    #[test]
    fn truncated_reads_fail() {
        let mut parser = Parser::new(&[0x01, 0x02]);
        assert!(matches!(parser.read_le::<u32>(), Err(OutOfBounds)));
        assert_eq!(parser.pos(), 0);
        assert!(matches!(parser.read_bytes(3), Err(OutOfBounds)));
        assert_eq!(parser.read_bytes(2).unwrap(), &[0x01, 0x02]);
        assert!(matches!(parser.peek_byte(), Err(OutOfBounds)));
    }

    #[test]
    fn seek_bounds() {
        let mut parser = Parser::new(&[0u8; 4]);
        assert!(parser.seek(4).is_ok());
        assert!(parser.seek(5).is_err());
        parser.seek(1).unwrap();
        assert!(parser.advance_by(3).is_ok());
        assert!(parser.advance_by(1).is_err());
    }

    #[test]
    fn empty() {
        let parser = Parser::new(&[]);
        assert!(parser.is_empty());
        assert!(!parser.has_more_data());
    }
}

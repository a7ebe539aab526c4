//! Streaming UTF-8 validation for text messages (RFC 6455 Section 8.1).
//!
//! A text message may be split across any number of frames, and each frame
//! may be delivered to the caller in several pieces. The validator therefore
//! works one byte at a time and keeps partial code-point state between calls.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator.
///
/// Feed it every payload chunk of one message in order. A multi-byte sequence
/// split across chunks validates exactly like an unsplit one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utf8Validator {
    sequence_in_progress: bool,
    bytes_remaining: u8,
    accumulated_bits: u32,
    minimum_value: u32,
}

impl Utf8Validator {
    /// Create a validator positioned at a character boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the next chunk of a message.
    ///
    /// `end_of_message` must be set on the chunk that completes the message;
    /// an unfinished sequence at that point is an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUtf8` on the first byte that cannot be part of a
    /// well-formed UTF-8 string. Surrogates and values above U+10FFFF are
    /// detected as soon as their second byte arrives.
    pub fn validate(&mut self, data: &[u8], end_of_message: bool) -> Result<()> {
        for &byte in data {
            if self.sequence_in_progress {
                self.continue_sequence(byte)?;
            } else {
                self.start_sequence(byte)?;
            }
        }

        if end_of_message && self.sequence_in_progress {
            return Err(Error::InvalidUtf8);
        }
        if end_of_message {
            self.reset();
        }
        Ok(())
    }

    fn start_sequence(&mut self, byte: u8) -> Result<()> {
        let (remaining, bits, minimum) = match byte {
            0x00..=0x7F => return Ok(()),
            0xC0..=0xDF => (1, byte & 0x1F, 0x80),
            0xE0..=0xEF => (2, byte & 0x0F, 0x800),
            0xF0..=0xF7 => (3, byte & 0x07, 0x1_0000),
            // Lone continuation byte, or a lead byte for a 5+ byte form.
            _ => return Err(Error::InvalidUtf8),
        };

        self.sequence_in_progress = true;
        self.bytes_remaining = remaining;
        self.accumulated_bits = u32::from(bits);
        self.minimum_value = minimum;
        Ok(())
    }

    fn continue_sequence(&mut self, byte: u8) -> Result<()> {
        if byte & 0xC0 != 0x80 {
            return Err(Error::InvalidUtf8);
        }

        self.accumulated_bits = (self.accumulated_bits << 6) | u32::from(byte & 0x3F);
        self.bytes_remaining -= 1;

        // After two bytes of a 3-byte form the top 10 bits are known:
        // 0x360..=0x37F covers U+D800..=U+DFFF.
        if self.minimum_value == 0x800
            && self.bytes_remaining == 1
            && (0x360..=0x37F).contains(&self.accumulated_bits)
        {
            return Err(Error::InvalidUtf8);
        }
        // After two bytes of a 4-byte form, 0x110 and up is beyond U+10FFFF.
        if self.minimum_value == 0x1_0000
            && self.bytes_remaining == 2
            && self.accumulated_bits >= 0x110
        {
            return Err(Error::InvalidUtf8);
        }

        if self.bytes_remaining == 0 {
            let value = self.accumulated_bits;
            if value < self.minimum_value
                || (0xD800..=0xDFFF).contains(&value)
                || value > 0x10_FFFF
            {
                return Err(Error::InvalidUtf8);
            }
            self.sequence_in_progress = false;
        }
        Ok(())
    }

    /// Discard any partial sequence.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` while a multi-byte sequence is waiting for more bytes.
    #[must_use]
    pub fn has_incomplete(&self) -> bool {
        self.sequence_in_progress
    }
}

/// Validate a complete, unfragmented payload.
///
/// # Errors
///
/// Returns `Error::InvalidUtf8` if the data is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    Utf8Validator::new().validate(data, true)
}

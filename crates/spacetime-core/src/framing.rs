//! Length-prefix framing
//!
//! A frame is a big-endian unsigned length of `prefix_bits` bits followed by
//! exactly that many payload bytes. Supported widths are 8, 16, 32 and 64.

use thiserror::Error;

/// Framing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Prefix width is not 8, 16, 32 or 64 bits
    #[error("Unsupported length prefix width: {0} bits")]
    UnsupportedPrefixWidth(u8),

    /// Payload length does not fit in the prefix
    #[error("Payload of {len} bytes does not fit a {bits}-bit length prefix")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Prefix width
        bits: u8,
    },

    /// Decoded length exceeds the configured frame limit
    #[error("Frame length {len} exceeds limit {max}")]
    FrameTooLarge {
        /// Decoded length
        len: u64,
        /// Configured limit
        max: usize,
    },

    /// Buffer is shorter than the frame it announces
    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes the frame needs
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Buffer holds bytes past the end of the frame
    #[error("Trailing bytes after frame: {0}")]
    TrailingBytes(usize),
}

/// Width of the prefix in bytes
pub fn prefix_len(prefix_bits: u8) -> Result<usize, FramingError> {
    match prefix_bits {
        8 | 16 | 32 | 64 => Ok(usize::from(prefix_bits / 8)),
        other => Err(FramingError::UnsupportedPrefixWidth(other)),
    }
}

/// Encode a payload length as a prefix
pub fn encode_length_prefix(len: usize, prefix_bits: u8) -> Result<Vec<u8>, FramingError> {
    let width = prefix_len(prefix_bits)?;
    let len64 = len as u64;
    if prefix_bits < 64 && len64 >> prefix_bits != 0 {
        return Err(FramingError::PayloadTooLarge {
            len,
            bits: prefix_bits,
        });
    }
    Ok(len64.to_be_bytes()[8 - width..].to_vec())
}

/// Decode a prefix into a payload length
pub fn decode_length_prefix(prefix: &[u8], prefix_bits: u8) -> Result<u64, FramingError> {
    let width = prefix_len(prefix_bits)?;
    if prefix.len() != width {
        return Err(FramingError::Truncated {
            expected: width,
            actual: prefix.len(),
        });
    }
    let mut bytes = [0u8; 8];
    bytes[8 - width..].copy_from_slice(prefix);
    Ok(u64::from_be_bytes(bytes))
}

/// Check a decoded length against a frame limit
pub fn checked_frame_len(len: u64, max_frame_size: usize) -> Result<usize, FramingError> {
    match usize::try_from(len) {
        Ok(len) if len <= max_frame_size => Ok(len),
        _ => Err(FramingError::FrameTooLarge {
            len,
            max: max_frame_size,
        }),
    }
}

/// Prefix and payload in one buffer
pub fn encode_frame(payload: &[u8], prefix_bits: u8) -> Result<Vec<u8>, FramingError> {
    let mut frame = encode_length_prefix(payload.len(), prefix_bits)?;
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Split one complete frame back into its payload
pub fn decode_frame(frame: &[u8], prefix_bits: u8) -> Result<Vec<u8>, FramingError> {
    let width = prefix_len(prefix_bits)?;
    if frame.len() < width {
        return Err(FramingError::Truncated {
            expected: width,
            actual: frame.len(),
        });
    }
    let len = decode_length_prefix(&frame[..width], prefix_bits)?;
    let len = checked_frame_len(len, frame.len() - width).map_err(|_| FramingError::Truncated {
        expected: width.saturating_add(usize::try_from(len).unwrap_or(usize::MAX)),
        actual: frame.len(),
    })?;
    let body = &frame[width..];
    if body.len() > len {
        return Err(FramingError::TrailingBytes(body.len() - len));
    }
    Ok(body.to_vec())
}

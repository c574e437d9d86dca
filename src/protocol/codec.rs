//! Framed codec for problems and answers.
//!
//! Every frame is a fixed-size header whose first field is the total frame
//! size (header included), followed by `size - header_len` raw payload bytes.
//! All integers are little-endian.

use std::io::{Read, Write};

use crate::error::FrameError;
use crate::protocol::message::{ANSWER_HEADER_LEN, Answer, PROBLEM_HEADER_LEN, Problem};

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// A message with a fixed header and an opaque payload.
pub trait Frame: Sized {
    /// Encoded header length, size field included.
    const HEADER_LEN: usize;

    /// Append the kind-specific header fields that follow the size field.
    fn encode_fields(&self, out: &mut Vec<u8>);

    /// Rebuild the message from a complete header and its payload.
    fn from_parts(header: &[u8], payload: Vec<u8>) -> Self;

    fn payload(&self) -> &[u8];
}

impl Frame for Problem {
    const HEADER_LEN: usize = PROBLEM_HEADER_LEN;

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.variants.to_le_bytes());
        out.extend_from_slice(&self.variant.to_le_bytes());
        out.extend_from_slice(&[0; 2]);
    }

    fn from_parts(header: &[u8], payload: Vec<u8>) -> Self {
        Self {
            id: u32_at(header, 8),
            kind: u16_at(header, 12),
            variants: u16_at(header, 14),
            variant: u16_at(header, 16),
            payload,
        }
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Frame for Answer {
    const HEADER_LEN: usize = ANSWER_HEADER_LEN;

    fn encode_fields(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.push(u8::from(self.failed));
        out.extend_from_slice(&[0; 3]);
    }

    fn from_parts(header: &[u8], payload: Vec<u8>) -> Self {
        Self {
            id: u32_at(header, 8),
            failed: header[12] != 0,
            payload,
        }
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

/// Encode a message as header bytes immediately followed by payload bytes.
pub fn encode<F: Frame>(frame: &F) -> Vec<u8> {
    let payload = frame.payload();
    let size = (F::HEADER_LEN + payload.len()) as u64;

    let mut out = Vec::with_capacity(F::HEADER_LEN + payload.len());
    out.extend_from_slice(&size.to_le_bytes());
    frame.encode_fields(&mut out);
    debug_assert_eq!(out.len(), F::HEADER_LEN);
    out.extend_from_slice(payload);
    out
}

/// Write one complete frame and flush it.
pub fn write_frame<F: Frame, W: Write>(writer: &mut W, frame: &F) -> Result<(), FrameError> {
    writer.write_all(&encode(frame)).map_err(FrameError::Write)?;
    writer.flush().map_err(FrameError::Write)
}

/// Read one complete frame.
///
/// Reads exactly the header, validates the declared size against
/// `max_frame_bytes`, then reads exactly the remaining payload.
pub fn read_frame<F: Frame, R: Read>(reader: &mut R, max_frame_bytes: usize) -> Result<F, FrameError> {
    let mut header = vec![0; F::HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|source| FrameError::Header {
            expected: F::HEADER_LEN,
            source,
        })?;

    let size = u64_at(&header, 0);
    if size < F::HEADER_LEN as u64 {
        return Err(FrameError::Undersized {
            size,
            header: F::HEADER_LEN,
        });
    }
    if size > max_frame_bytes as u64 {
        return Err(FrameError::Oversized {
            size,
            limit: max_frame_bytes,
        });
    }

    let expected = size as usize - F::HEADER_LEN;
    let mut payload = vec![0; expected];
    reader
        .read_exact(&mut payload)
        .map_err(|source| FrameError::Payload { expected, source })?;

    Ok(F::from_parts(&header, payload))
}

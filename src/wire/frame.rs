//! Stream framing for byte-stream transports.
//!
//! Each frame carries one request or reply:
//!
//! ```text
//! [magic: 4 bytes "SBEL"][version: 1 byte][opcode: 4 bytes LE]
//! [length: 4 bytes LE][payload: N bytes][crc32: 4 bytes LE]
//! ```
//!
//! The checksum covers the payload only; corruption anywhere in the
//! envelope is reported as a precise `TransportError` and fails the
//! connection rather than the process.

use std::io::{Read, Write};

use crc32fast::Hasher;

use crate::error::TransportError;

/// Magic bytes opening every frame.
pub const MAGIC: [u8; 4] = *b"SBEL";

/// Current framing version.
const FRAME_VERSION: u8 = 1;

/// Limits for reading and writing frames.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Largest accepted payload in bytes.
    pub max_frame_len: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_frame_len: 4 * 1024 * 1024,
        }
    }
}

/// One framed message: an opcode plus an opaque parcel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame around an encoded parcel.
    #[must_use]
    pub fn new(opcode: u32, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    /// Writes the frame to a byte stream.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::FrameTooLarge` if the payload exceeds the
    /// configured limit, or `TransportError::Io` on a write failure.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        config: &StreamConfig,
    ) -> Result<(), TransportError> {
        if self.payload.len() > config.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len: self.payload.len(),
                max: config.max_frame_len,
            });
        }

        let mut hasher = Hasher::new();
        hasher.update(&self.payload);
        let crc = hasher.finalize();

        writer.write_all(&MAGIC)?;
        writer.write_all(&[FRAME_VERSION])?;
        writer.write_all(&self.opcode.to_le_bytes())?;
        writer.write_all(&(self.payload.len() as u32).to_le_bytes())?;
        writer.write_all(&self.payload)?;
        writer.write_all(&crc.to_le_bytes())?;
        Ok(())
    }

    /// Reads one frame from a byte stream.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::BadMagic`, `UnsupportedVersion`,
    /// `FrameTooLarge`, or `ChecksumMismatch` on a malformed frame, and
    /// `TransportError::Io` on a read failure (including a clean EOF at
    /// a frame boundary, which surfaces as `UnexpectedEof`).
    pub fn read_from<R: Read>(
        reader: &mut R,
        config: &StreamConfig,
    ) -> Result<Self, TransportError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(TransportError::BadMagic);
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != FRAME_VERSION {
            return Err(TransportError::UnsupportedVersion {
                version: version[0],
            });
        }

        let mut opcode = [0u8; 4];
        reader.read_exact(&mut opcode)?;
        let opcode = u32::from_le_bytes(opcode);

        let mut len = [0u8; 4];
        reader.read_exact(&mut len)?;
        let len = u32::from_le_bytes(len) as usize;
        if len > config.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len,
                max: config.max_frame_len,
            });
        }

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;

        let mut crc = [0u8; 4];
        reader.read_exact(&mut crc)?;
        let stored = u32::from_le_bytes(crc);

        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let computed = hasher.finalize();
        if stored != computed {
            return Err(TransportError::ChecksumMismatch { stored, computed });
        }

        Ok(Self { opcode, payload })
    }
}

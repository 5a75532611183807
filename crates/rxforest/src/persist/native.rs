//! Binary container for model artifacts.
//!
//! A 32-byte header followed by a Postcard-encoded payload.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("RXFM")
//! 4       1     Version major
//! 5       1     Version minor
//! 6       1     Model type
//! 7       5     Reserved
//! 12      4     Payload size (bytes)
//! 16      4     CRC32 checksum of payload
//! 20      4     Number of features
//! 24      4     Number of classes
//! 28      4     Reserved
//! ```
//!
//! All integers are little-endian.

use std::io::{Read, Write};

use thiserror::Error;

use crate::repr::ForestValidationError;

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying an rxforest artifact.
pub const MAGIC: &[u8; 4] = b"RXFM";

pub const CURRENT_VERSION_MAJOR: u8 = 1;

pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Model Type
// ============================================================================

/// Model type identifier stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModelType {
    RandomForestClassifier = 0,
}

impl ModelType {
    /// Convert from u8, returning None for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::RandomForestClassifier),
            _ => None,
        }
    }
}

// ============================================================================
// Format Header
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub model_type: ModelType,
    pub payload_size: u32,
    pub checksum: u32,
    pub num_features: u32,
    pub num_classes: u32,
}

impl FormatHeader {
    /// Create a header with the current version; size and checksum are
    /// filled in when the payload is written.
    pub fn new(model_type: ModelType, num_features: u32, num_classes: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            model_type,
            payload_size: 0,
            checksum: 0,
            num_features,
            num_classes,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6] = self.model_type as u8;
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..24].copy_from_slice(&self.num_features.to_le_bytes());
        buf[24..28].copy_from_slice(&self.num_classes.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..4] != MAGIC {
            return Err(DeserializeError::NotAModel);
        }

        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        let model_type = ModelType::from_u8(buf[6])
            .ok_or_else(|| DeserializeError::CorruptPayload(format!("unknown model type {}", buf[6])))?;

        let le = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        Ok(Self {
            version_major,
            version_minor,
            model_type,
            payload_size: le(12),
            checksum: le(16),
            num_features: le(20),
            num_classes: le(24),
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while writing an artifact.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("payload of {0} bytes exceeds the format limit")]
    PayloadTooLarge(usize),
}

/// Errors that can occur while reading an artifact.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not an rxforest model file")]
    NotAModel,

    #[error("artifact requires format {major}.{minor} or later")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("file truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),

    #[error("invalid model structure: {0}")]
    InvalidModel(#[from] ForestValidationError),

    #[error("header declares {header} {field}, payload has {payload}")]
    HeaderMismatch {
        field: &'static str,
        header: u32,
        payload: u32,
    },
}

/// Compute CRC32 checksum of data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ============================================================================
// Native Codec
// ============================================================================

/// Reads and writes header + payload containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }

    /// Write header and payload; fills in the header's size and checksum.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        header: &mut FormatHeader,
        payload: &[u8],
    ) -> Result<(), SerializeError> {
        header.payload_size =
            u32::try_from(payload.len()).map_err(|_| SerializeError::PayloadTooLarge(payload.len()))?;
        header.checksum = compute_checksum(payload);
        writer.write_all(&header.to_bytes())?;
        writer.write_all(payload)?;
        Ok(())
    }

    /// Read header and payload, verifying the checksum.
    pub fn read_from<R: Read>(&self, reader: &mut R) -> Result<(FormatHeader, Vec<u8>), DeserializeError> {
        let mut header_buf = [0u8; HEADER_SIZE];
        let got = read_fully(reader, &mut header_buf)?;
        if got < HEADER_SIZE {
            return Err(DeserializeError::Truncated {
                expected: HEADER_SIZE,
                actual: got,
            });
        }
        let header = FormatHeader::from_bytes(&header_buf)?;

        // Grow with the bytes actually present; the declared size is untrusted.
        let expected = header.payload_size as usize;
        let mut payload = Vec::new();
        reader
            .by_ref()
            .take(u64::from(header.payload_size))
            .read_to_end(&mut payload)?;
        if payload.len() < expected {
            return Err(DeserializeError::Truncated {
                expected,
                actual: payload.len(),
            });
        }

        let actual = compute_checksum(&payload);
        if actual != header.checksum {
            return Err(DeserializeError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }
        Ok((header, payload))
    }

    /// Serialize a payload to bytes with header.
    pub fn serialize<T: serde::Serialize>(
        &self,
        model_type: ModelType,
        num_features: u32,
        num_classes: u32,
        payload: &T,
    ) -> Result<Vec<u8>, SerializeError> {
        let payload_bytes = postcard::to_allocvec(payload)?;
        let mut header = FormatHeader::new(model_type, num_features, num_classes);
        let mut output = Vec::with_capacity(HEADER_SIZE + payload_bytes.len());
        self.write_to(&mut output, &mut header, &payload_bytes)?;
        Ok(output)
    }

    /// Deserialize a payload from bytes.
    pub fn deserialize<T: for<'de> serde::Deserialize<'de>>(
        &self,
        bytes: &[u8],
    ) -> Result<(FormatHeader, T), DeserializeError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let (header, payload_bytes) = self.read_from(&mut cursor)?;
        let payload = postcard::from_bytes(&payload_bytes)?;
        Ok((header, payload))
    }
}

/// Read until `buf` is full or EOF; returns bytes read.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

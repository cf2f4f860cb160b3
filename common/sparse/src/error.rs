// Licensed under the Apache-2.0 license

use core::fmt;

/// Errors raised while expanding a sparse image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseError {
    /// Bad magic, version or header sizes.
    InvalidHeader,
    /// The image block size is not a multiple of the target block size.
    BlockSizeMismatch { image: u32, target: u32 },
    /// The target block size is larger than the fill buffer.
    UnsupportedBlockSize(u32),
    /// The image ends in the middle of a header or chunk.
    TruncatedImage,
    /// A chunk's sizes are inconsistent with its type.
    InvalidChunk { index: u32 },
    /// A chunk has an unknown type.
    UnknownChunkType { index: u32, chunk_type: u16 },
    /// A chunk would land past the end of the target.
    ExceedsPartition { index: u32 },
    /// The storage accepted fewer blocks than requested.
    WriteFailed { index: u32, requested: u64, written: u64 },
    /// The storage reserved fewer blocks than requested.
    ReserveFailed { index: u32, requested: u64, reserved: u64 },
}

impl fmt::Display for SparseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SparseError::InvalidHeader => write!(f, "invalid sparse image header"),
            SparseError::BlockSizeMismatch { .. } => write!(f, "sparse image block size issue"),
            SparseError::UnsupportedBlockSize(size) => {
                write!(f, "unsupported block size {}", size)
            }
            SparseError::TruncatedImage => write!(f, "sparse image truncated"),
            SparseError::InvalidChunk { index } => write!(f, "bad chunk size for chunk {}", index),
            SparseError::UnknownChunkType { chunk_type, .. } => {
                write!(f, "unknown chunk type 0x{:04x}", chunk_type)
            }
            SparseError::ExceedsPartition { .. } => {
                write!(f, "Request would exceed partition size!")
            }
            SparseError::WriteFailed {
                requested, written, ..
            } => write!(f, "flash write failure: {} of {} blocks", written, requested),
            SparseError::ReserveFailed {
                requested,
                reserved,
                ..
            } => write!(f, "flash reserve failure: {} of {} blocks", reserved, requested),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SparseError {}

// Licensed under the Apache-2.0 license

use crate::error::SparseError;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Magic number at the start of every sparse image.
pub const SPARSE_HEADER_MAGIC: u32 = 0xED26_FF3A;

/// Only major version 1 of the container exists.
pub const SPARSE_MAJOR_VERSION: u16 = 1;

/// Size of the file header written by current tools.
pub const SPARSE_HEADER_LEN: usize = core::mem::size_of::<SparseHeader>();

/// Size of a chunk header written by current tools.
pub const CHUNK_HEADER_LEN: usize = core::mem::size_of::<ChunkHeader>();

/// Chunk types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ChunkType {
    /// Literal block data follows the chunk header.
    Raw = 0xCAC1,
    /// A 4-byte pattern repeated over the chunk.
    Fill = 0xCAC2,
    /// Blocks the image does not care about; no data.
    DontCare = 0xCAC3,
    /// A 4-byte CRC32 of the data so far.
    Crc32 = 0xCAC4,
}

impl TryFrom<u16> for ChunkType {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, u16> {
        match value {
            0xCAC1 => Ok(ChunkType::Raw),
            0xCAC2 => Ok(ChunkType::Fill),
            0xCAC3 => Ok(ChunkType::DontCare),
            0xCAC4 => Ok(ChunkType::Crc32),
            other => Err(other),
        }
    }
}

/// Sparse file header. Fields are little-endian regardless of the host.
///
/// Layout:
/// - Bytes 0:3   - magic (0xED26FF3A)
/// - Bytes 4:7   - major / minor version
/// - Bytes 8:11  - file header size / chunk header size
/// - Bytes 12:15 - block size in bytes, a multiple of 4
/// - Bytes 16:27 - total output blocks, total chunks, image checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, Default)]
#[repr(C)]
pub struct SparseHeader {
    pub magic: U32,
    pub major_version: U16,
    pub minor_version: U16,
    pub file_hdr_sz: U16,
    pub chunk_hdr_sz: U16,
    pub blk_sz: U32,
    pub total_blks: U32,
    pub total_chunks: U32,
    pub image_checksum: U32,
}

impl SparseHeader {
    pub fn new(blk_sz: u32, total_blks: u32, total_chunks: u32) -> Self {
        Self {
            magic: U32::new(SPARSE_HEADER_MAGIC),
            major_version: U16::new(SPARSE_MAJOR_VERSION),
            minor_version: U16::ZERO,
            file_hdr_sz: U16::new(SPARSE_HEADER_LEN as u16),
            chunk_hdr_sz: U16::new(CHUNK_HEADER_LEN as u16),
            blk_sz: U32::new(blk_sz),
            total_blks: U32::new(total_blks),
            total_chunks: U32::new(total_chunks),
            image_checksum: U32::ZERO,
        }
    }

    /// Parse and sanity-check the header at the start of `image`.
    pub fn parse(image: &[u8]) -> Result<Self, SparseError> {
        let hdr = Self::read_from_prefix(image)
            .map_err(|_| SparseError::TruncatedImage)?
            .0;
        if !hdr.has_signature() {
            return Err(SparseError::InvalidHeader);
        }
        let blk_sz = hdr.blk_sz.get();
        if (hdr.file_hdr_sz.get() as usize) < SPARSE_HEADER_LEN
            || (hdr.chunk_hdr_sz.get() as usize) < CHUNK_HEADER_LEN
            || blk_sz == 0
            || blk_sz % 4 != 0
        {
            return Err(SparseError::InvalidHeader);
        }
        Ok(hdr)
    }

    /// Magic and major version match.
    pub fn has_signature(&self) -> bool {
        self.magic.get() == SPARSE_HEADER_MAGIC && self.major_version.get() == SPARSE_MAJOR_VERSION
    }
}

/// Chunk header. `chunk_sz` counts output blocks, `total_sz` counts input
/// bytes including this header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, Default)]
#[repr(C)]
pub struct ChunkHeader {
    pub chunk_type: U16,
    pub reserved1: U16,
    pub chunk_sz: U32,
    pub total_sz: U32,
}

impl ChunkHeader {
    pub fn new(chunk_type: ChunkType, chunk_sz: u32, data_len: u32) -> Self {
        Self {
            chunk_type: U16::new(chunk_type as u16),
            reserved1: U16::ZERO,
            chunk_sz: U32::new(chunk_sz),
            total_sz: U32::new(CHUNK_HEADER_LEN as u32 + data_len),
        }
    }
}

/// True if `image` starts with the sparse container signature.
pub fn is_sparse_image(image: &[u8]) -> bool {
    SparseHeader::read_from_prefix(image)
        .map(|(hdr, _)| hdr.has_signature())
        .unwrap_or(false)
}

// Licensed under the Apache-2.0 license

use crate::error::SparseError;
use crate::header::{ChunkHeader, ChunkType, SparseHeader};
use log::{debug, error, info};
use zerocopy::FromBytes;

/// Size of the on-stack buffer a FILL chunk is expanded into.
pub const FILL_BUF_LEN: usize = 4096;

/// Geometry of the region a sparse image is expanded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseTarget {
    /// Block size of the target device in bytes.
    pub block_size: u32,
    /// First block of the target region.
    pub start_block: u64,
    /// Hard ceiling on the number of blocks the image may cover.
    pub block_count: u64,
}

impl SparseTarget {
    fn end_block(&self) -> u64 {
        self.start_block.saturating_add(self.block_count)
    }
}

/// Storage callbacks the decoder drives once per chunk.
///
/// Block numbers are absolute device blocks in units of the target block size.
pub trait SparseStorage {
    /// Write `count` blocks of `data` starting at `block`. Returns the number
    /// of blocks written.
    fn write(&mut self, block: u64, count: u64, data: &[u8]) -> u64;

    /// Account for `count` blocks starting at `block` without transferring
    /// data. Returns the number of blocks reserved.
    fn reserve(&mut self, block: u64, count: u64) -> u64;
}

/// What a successful expansion covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SparseSummary {
    /// Target blocks covered, including reserved ones.
    pub blocks: u64,
    /// Bytes of data handed to `SparseStorage::write`.
    pub bytes_written: u64,
    /// Chunks processed.
    pub chunks: u32,
}

/// A sparse image decoder.
pub trait SparseDecoder {
    /// Expand `image` into `storage`, never touching blocks outside `target`.
    fn write_image(
        &mut self,
        target: &SparseTarget,
        storage: &mut dyn SparseStorage,
        image: &[u8],
    ) -> Result<SparseSummary, SparseError>;
}

/// Decoder for the Android sparse format (RAW, FILL, DONT_CARE and CRC32 chunks).
#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidSparseDecoder;

impl AndroidSparseDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn check_bounds(
    target: &SparseTarget,
    index: u32,
    block: u64,
    count: u64,
) -> Result<(), SparseError> {
    match block.checked_add(count) {
        Some(end) if end <= target.end_block() => Ok(()),
        _ => {
            error!(
                "sparse: chunk {} at block {} (+{}) exceeds partition end {}",
                index,
                block,
                count,
                target.end_block()
            );
            Err(SparseError::ExceedsPartition { index })
        }
    }
}

fn fill_blocks(
    target: &SparseTarget,
    storage: &mut dyn SparseStorage,
    index: u32,
    block: u64,
    count: u64,
    pattern: [u8; 4],
) -> Result<(), SparseError> {
    let block_size = target.block_size as u64;
    let per_write = FILL_BUF_LEN as u64 / block_size;
    if per_write == 0 {
        return Err(SparseError::UnsupportedBlockSize(target.block_size));
    }

    let mut buf = [0u8; FILL_BUF_LEN];
    for word in buf.chunks_exact_mut(4) {
        word.copy_from_slice(&pattern);
    }

    let mut current = block;
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(per_write);
        let len = (n * block_size) as usize;
        let written = storage.write(current, n, &buf[..len]);
        if written != n {
            return Err(SparseError::WriteFailed {
                index,
                requested: n,
                written,
            });
        }
        current += n;
        remaining -= n;
    }
    Ok(())
}

impl SparseDecoder for AndroidSparseDecoder {
    fn write_image(
        &mut self,
        target: &SparseTarget,
        storage: &mut dyn SparseStorage,
        image: &[u8],
    ) -> Result<SparseSummary, SparseError> {
        let hdr = SparseHeader::parse(image)?;
        let blk_sz = hdr.blk_sz.get();
        if target.block_size == 0 || blk_sz % target.block_size != 0 {
            error!(
                "sparse: image block size {} is not a multiple of {}",
                blk_sz, target.block_size
            );
            return Err(SparseError::BlockSizeMismatch {
                image: blk_sz,
                target: target.block_size,
            });
        }
        let ratio = (blk_sz / target.block_size) as u64;
        let chunk_hdr_sz = hdr.chunk_hdr_sz.get() as usize;

        debug!(
            "sparse: blk_sz {} total_blks {} total_chunks {}",
            blk_sz,
            hdr.total_blks.get(),
            hdr.total_chunks.get()
        );

        let mut offset = hdr.file_hdr_sz.get() as usize;
        if offset > image.len() {
            return Err(SparseError::TruncatedImage);
        }

        let mut block = target.start_block;
        let mut summary = SparseSummary::default();

        for index in 0..hdr.total_chunks.get() {
            let chunk = ChunkHeader::read_from_prefix(&image[offset..])
                .map_err(|_| SparseError::TruncatedImage)?
                .0;
            let total = chunk.total_sz.get() as usize;
            if total < chunk_hdr_sz {
                return Err(SparseError::InvalidChunk { index });
            }
            let chunk_end = offset
                .checked_add(total)
                .filter(|end| *end <= image.len())
                .ok_or(SparseError::TruncatedImage)?;
            let data = &image[offset + chunk_hdr_sz..chunk_end];
            let chunk_sz = chunk.chunk_sz.get() as u64;
            let count = chunk_sz * ratio;

            let chunk_type = ChunkType::try_from(chunk.chunk_type.get()).map_err(|chunk_type| {
                error!("sparse: unknown chunk type 0x{:04x}", chunk_type);
                SparseError::UnknownChunkType { index, chunk_type }
            })?;

            match chunk_type {
                ChunkType::Raw => {
                    let len = chunk_sz * blk_sz as u64;
                    if data.len() as u64 != len {
                        return Err(SparseError::InvalidChunk { index });
                    }
                    check_bounds(target, index, block, count)?;
                    let written = storage.write(block, count, data);
                    if written != count {
                        error!("sparse: write failure at block {}", block);
                        return Err(SparseError::WriteFailed {
                            index,
                            requested: count,
                            written,
                        });
                    }
                    summary.bytes_written += len;
                    block += count;
                }
                ChunkType::Fill => {
                    let pattern: [u8; 4] = data
                        .try_into()
                        .map_err(|_| SparseError::InvalidChunk { index })?;
                    check_bounds(target, index, block, count)?;
                    fill_blocks(target, storage, index, block, count, pattern)?;
                    summary.bytes_written += count * target.block_size as u64;
                    block += count;
                }
                ChunkType::DontCare => {
                    if !data.is_empty() {
                        return Err(SparseError::InvalidChunk { index });
                    }
                    check_bounds(target, index, block, count)?;
                    let reserved = storage.reserve(block, count);
                    if reserved != count {
                        return Err(SparseError::ReserveFailed {
                            index,
                            requested: count,
                            reserved,
                        });
                    }
                    block += count;
                }
                ChunkType::Crc32 => {
                    // Checksum is carried but not verified; no blocks are covered.
                    if data.len() != 4 {
                        return Err(SparseError::InvalidChunk { index });
                    }
                }
            }

            summary.chunks += 1;
            offset = chunk_end;
        }

        summary.blocks = block - target.start_block;
        info!(
            "sparse: wrote {} blocks ({} bytes) in {} chunks",
            summary.blocks, summary.bytes_written, summary.chunks
        );
        Ok(summary)
    }
}

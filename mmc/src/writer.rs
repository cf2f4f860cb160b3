// Licensed under the Apache-2.0 license

//! Writes a downloaded image into a resolved region.
//!
//! Payloads that start with the sparse container signature are handed to a
//! sparse decoder; everything else is written raw in one transaction.

use crate::device::BlockDevice;
use crate::error::{DeviceError, WriteError};
use crate::resolver::PartitionDescriptor;
use arrayvec::ArrayString;
use core::fmt;
use fb_config::flash::PARTITION_NAME_MAX_LEN;
use fb_sparse::{is_sparse_image, SparseDecoder, SparseStorage, SparseTarget};
use log::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Raw,
    Sparse,
    /// Kernel repacked into an Android boot image.
    ZImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub target: ArrayString<PARTITION_NAME_MAX_LEN>,
    pub image: ImageKind,
    pub bytes_written: u64,
    pub blocks_written: u64,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.image {
            ImageKind::ZImage => write!(f, "zImage was updated in {} partition", self.target),
            _ => write!(f, "wrote {} bytes to '{}'", self.bytes_written, self.target),
        }
    }
}

/// Sparse storage callbacks over a block device, fenced to one region.
struct BlockStorage<'d, D: ?Sized> {
    device: &'d mut D,
    start: u64,
    end: u64,
    error: Option<DeviceError>,
}

impl<D: ?Sized> BlockStorage<'_, D> {
    fn contains(&self, block: u64, count: u64) -> bool {
        block >= self.start && block.checked_add(count).is_some_and(|end| end <= self.end)
    }
}

impl<D: BlockDevice + ?Sized> SparseStorage for BlockStorage<'_, D> {
    fn write(&mut self, block: u64, count: u64, data: &[u8]) -> u64 {
        if !self.contains(block, count) {
            error!(
                "write: sparse chunk at block {} (+{}) outside {}..{}",
                block, count, self.start, self.end
            );
            return 0;
        }
        match self.device.write_blocks(block, count, data) {
            Ok(written) => written,
            Err(err) => {
                self.error = Some(err);
                0
            }
        }
    }

    fn reserve(&mut self, block: u64, count: u64) -> u64 {
        if !self.contains(block, count) {
            return 0;
        }
        count
    }
}

pub struct FlashWriter;

impl FlashWriter {
    pub fn write<D: BlockDevice + ?Sized>(
        device: &mut D,
        target: &PartitionDescriptor,
        payload: &[u8],
        decoder: &mut dyn SparseDecoder,
    ) -> Result<WriteOutcome, WriteError> {
        if target.block_size == 0 {
            error!("write: '{}' has block size 0", target.name);
            return Err(WriteError::InvalidBlockSize);
        }
        if is_sparse_image(payload) {
            Self::write_sparse(device, target, payload, decoder)
        } else {
            Self::write_raw(device, target, payload)
        }
    }

    fn write_raw<D: BlockDevice + ?Sized>(
        device: &mut D,
        target: &PartitionDescriptor,
        payload: &[u8],
    ) -> Result<WriteOutcome, WriteError> {
        let required = (payload.len() as u64).div_ceil(target.block_size as u64);
        if required > target.block_count {
            error!(
                "write: too large for partition '{}': {} blocks, capacity {}",
                target.name, required, target.block_count
            );
            return Err(WriteError::TooLarge {
                required,
                capacity: target.block_count,
            });
        }

        info!("Flashing Raw Image");
        if required > 0 {
            let written = device.write_blocks(target.start_block, required, payload)?;
            if written != required {
                error!(
                    "write: failed writing to device, {} of {} blocks",
                    written, required
                );
                return Err(WriteError::DeviceShortWrite {
                    requested: required,
                    written,
                });
            }
        }

        let outcome = WriteOutcome {
            target: target.name,
            image: ImageKind::Raw,
            bytes_written: payload.len() as u64,
            blocks_written: required,
        };
        info!("........ {}", outcome);
        Ok(outcome)
    }

    fn write_sparse<D: BlockDevice + ?Sized>(
        device: &mut D,
        target: &PartitionDescriptor,
        payload: &[u8],
        decoder: &mut dyn SparseDecoder,
    ) -> Result<WriteOutcome, WriteError> {
        info!(
            "Flashing sparse image at offset {} ({} blocks)",
            target.start_block, target.block_count
        );
        let geometry = SparseTarget {
            block_size: target.block_size,
            start_block: target.start_block,
            block_count: target.block_count,
        };
        let mut storage = BlockStorage {
            device,
            start: target.start_block,
            end: target.start_block.saturating_add(target.block_count),
            error: None,
        };

        let summary = match decoder.write_image(&geometry, &mut storage, payload) {
            Ok(summary) => summary,
            Err(err) => {
                error!("write: sparse image failed: {}", err);
                return Err(match storage.error {
                    Some(device_err) => WriteError::Device(device_err),
                    None => WriteError::Sparse(err),
                });
            }
        };

        let outcome = WriteOutcome {
            target: target.name,
            image: ImageKind::Sparse,
            bytes_written: summary.bytes_written,
            blocks_written: summary.blocks,
        };
        info!("........ {}", outcome);
        Ok(outcome)
    }
}

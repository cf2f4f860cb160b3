// Licensed under the Apache-2.0 license

use crate::device::BlockDevice;
use crate::error::DeviceError;
use crate::resolver::PartitionDescriptor;
use arrayvec::ArrayString;
use core::fmt;
use fb_config::flash::PARTITION_NAME_MAX_LEN;
use log::{error, info};

/// A block range aligned to erase group boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseRange {
    pub start_block: u64,
    pub block_count: u64,
}

/// Shrink `[start, start + count)` to whole erase groups of `group` blocks.
///
/// The result starts at the smallest multiple of `group` not below `start`
/// and covers the largest multiple of `group` that still fits. It is empty
/// when no full group fits.
pub fn aligned_erase_range(start: u64, count: u64, group: u64) -> Result<EraseRange, DeviceError> {
    if group == 0 {
        return Err(DeviceError::InvalidEraseGroup);
    }
    let Some(aligned) = start.div_ceil(group).checked_mul(group) else {
        return Ok(EraseRange {
            start_block: start,
            block_count: 0,
        });
    };
    let usable = count.saturating_sub(aligned - start);
    Ok(EraseRange {
        start_block: aligned,
        block_count: usable - usable % group,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseOutcome {
    pub target: ArrayString<PARTITION_NAME_MAX_LEN>,
    pub blocks_erased: u64,
    pub block_size: u32,
}

impl EraseOutcome {
    pub fn bytes_erased(&self) -> u64 {
        self.blocks_erased * self.block_size as u64
    }
}

impl fmt::Display for EraseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "erased {} bytes from '{}'", self.bytes_erased(), self.target)
    }
}

pub struct EraseEngine;

impl EraseEngine {
    /// Erase the whole erase groups inside `target`. Returns the number of
    /// blocks erased, which is zero when the region holds no full group.
    pub fn erase<D: BlockDevice + ?Sized>(
        device: &mut D,
        target: &PartitionDescriptor,
        erase_group_size: u64,
    ) -> Result<u64, DeviceError> {
        let range = aligned_erase_range(target.start_block, target.block_count, erase_group_size)
            .inspect_err(|_| error!("erase: invalid erase group size 0"))?;

        if range.block_count == 0 {
            info!(
                "erase: '{}' holds no full erase group of {} blocks",
                target.name, erase_group_size
            );
            return Ok(0);
        }

        info!(
            "erase: '{}' blocks {}..{} (group {})",
            target.name,
            range.start_block,
            range.start_block + range.block_count,
            erase_group_size
        );
        let erased = device.erase_blocks(range.start_block, range.block_count)?;
        if erased != range.block_count {
            error!(
                "erase: failed erasing from device, {} of {} blocks",
                erased, range.block_count
            );
            return Err(DeviceError::EraseMismatch {
                requested: range.block_count,
                erased,
            });
        }

        info!(
            "........ erased {} bytes from '{}'",
            erased * target.block_size as u64,
            target.name
        );
        Ok(erased)
    }
}

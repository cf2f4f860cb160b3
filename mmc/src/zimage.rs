// Licensed under the Apache-2.0 license

//! Replace the kernel inside an Android boot image in place.
//!
//! Boot image layout, each part rounded up to `page_size`:
//! header page | kernel | ramdisk | second stage.
//!
//! The ramdisk is saved into scratch memory, the header is rewritten with
//! the new kernel size, and the ramdisk is written back after the new
//! kernel.

use crate::device::BlockDevice;
use crate::error::ProvisionError;
use crate::resolver::PartitionDescriptor;
use crate::writer::{ImageKind, WriteOutcome};
use core::fmt;
use log::{error, info};
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Name of the partition holding the boot image.
pub const BOOT_PARTITION_NAME: &str = "boot";

pub const BOOT_MAGIC: &[u8; 8] = b"ANDROID!";

/// Android boot image header, version 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable)]
#[repr(C)]
pub struct AndroidBootHeader {
    pub magic: [u8; 8],
    pub kernel_size: u32,
    pub kernel_addr: u32,
    pub ramdisk_size: u32,
    pub ramdisk_addr: u32,
    pub second_size: u32,
    pub second_addr: u32,
    pub tags_addr: u32,
    pub page_size: u32,
    pub header_version: u32,
    pub os_version: u32,
    pub name: [u8; 16],
    pub cmdline: [u8; 512],
    pub id: [u32; 8],
    pub extra_cmdline: [u8; 1024],
}

pub const BOOT_HEADER_LEN: usize = core::mem::size_of::<AndroidBootHeader>();

impl AndroidBootHeader {
    pub fn has_magic(&self) -> bool {
        &self.magic == BOOT_MAGIC
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZImageError {
    HeaderRead,
    /// No boot image magic in the boot partition.
    NotInitialized,
    SecondStage,
    /// Page size is smaller than the header or not a multiple of the block size.
    InvalidPageSize(u32),
    RamdiskRead,
    /// The new kernel and the saved ramdisk do not fit.
    KernelTooLarge,
    HeaderWrite,
    KernelWrite,
    RamdiskWrite,
}

impl fmt::Display for ZImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZImageError::HeaderRead => write!(f, "cannot read header from boot partition"),
            ZImageError::NotInitialized => write!(f, "boot partition not initialized"),
            ZImageError::SecondStage => write!(f, "moving second stage is not supported yet"),
            ZImageError::InvalidPageSize(size) => write!(f, "invalid boot image page size {}", size),
            ZImageError::RamdiskRead => write!(f, "cannot read ramdisk from boot partition"),
            ZImageError::KernelTooLarge => write!(f, "kernel too large for boot partition"),
            ZImageError::HeaderWrite => write!(f, "cannot write back boot image header"),
            ZImageError::KernelWrite => write!(f, "cannot write new kernel"),
            ZImageError::RamdiskWrite => write!(f, "cannot write back original ramdisk"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ZImageError {}

fn read_exact<D: BlockDevice + ?Sized>(
    device: &mut D,
    start: u64,
    count: u64,
    buf: &mut [u8],
    err: ZImageError,
) -> Result<(), ZImageError> {
    match device.read_blocks(start, count, buf) {
        Ok(read) if read == count => Ok(()),
        _ => {
            error!("zimage: {}", err);
            Err(err)
        }
    }
}

fn write_exact<D: BlockDevice + ?Sized>(
    device: &mut D,
    start: u64,
    count: u64,
    data: &[u8],
    err: ZImageError,
) -> Result<(), ZImageError> {
    match device.write_blocks(start, count, data) {
        Ok(written) if written == count => Ok(()),
        _ => {
            error!("zimage: {}", err);
            Err(err)
        }
    }
}

/// Write `kernel` into the boot image in `boot`, keeping its ramdisk.
///
/// `scratch` holds the header blocks followed by the saved ramdisk.
pub fn update_zimage<D: BlockDevice + ?Sized>(
    device: &mut D,
    boot: &PartitionDescriptor,
    kernel: &[u8],
    scratch: &mut [u8],
) -> Result<WriteOutcome, ProvisionError> {
    info!("Flashing zImage");
    let block_size = boot.block_size as u64;
    if block_size == 0 {
        return Err(ZImageError::InvalidPageSize(0).into());
    }

    let hdr_blocks = (BOOT_HEADER_LEN as u64).div_ceil(block_size);
    let hdr_len = (hdr_blocks * block_size) as usize;
    if scratch.len() < hdr_len {
        return Err(ProvisionError::BufferTooSmall {
            required: hdr_len as u64,
            available: scratch.len() as u64,
        });
    }
    let (hdr_buf, ramdisk_buf) = scratch.split_at_mut(hdr_len);

    read_exact(device, boot.start_block, hdr_blocks, hdr_buf, ZImageError::HeaderRead)?;
    let mut hdr = AndroidBootHeader::read_from_prefix(hdr_buf)
        .map_err(|_| ZImageError::HeaderRead)?
        .0;
    if !hdr.has_magic() {
        error!("zimage: bad boot image magic");
        return Err(ZImageError::NotInitialized.into());
    }
    if hdr.second_size > 0 {
        error!("zimage: {}", ZImageError::SecondStage);
        return Err(ZImageError::SecondStage.into());
    }
    let page_size = hdr.page_size as u64;
    // The header must fit in the first page; the kernel starts on the second.
    if page_size < BOOT_HEADER_LEN as u64 || page_size % block_size != 0 {
        return Err(ZImageError::InvalidPageSize(hdr.page_size).into());
    }

    let blocks_per_page = page_size / block_size;
    let pages = |bytes: u64| bytes.div_ceil(page_size) * blocks_per_page;
    let kernel_start = boot.start_block + blocks_per_page;

    let ramdisk_blocks = pages(hdr.ramdisk_size as u64);
    let ramdisk_len = ramdisk_blocks * block_size;
    if (ramdisk_buf.len() as u64) < ramdisk_len {
        return Err(ProvisionError::BufferTooSmall {
            required: hdr_len as u64 + ramdisk_len,
            available: (hdr_len + ramdisk_buf.len()) as u64,
        });
    }
    let ramdisk_buf = &mut ramdisk_buf[..ramdisk_len as usize];
    read_exact(
        device,
        kernel_start + pages(hdr.kernel_size as u64),
        ramdisk_blocks,
        ramdisk_buf,
        ZImageError::RamdiskRead,
    )?;

    let kernel_size = u32::try_from(kernel.len()).map_err(|_| ZImageError::KernelTooLarge)?;
    let kernel_blocks = pages(kernel_size as u64);
    let new_ramdisk_start = kernel_start + kernel_blocks;
    if new_ramdisk_start + ramdisk_blocks > boot.start_block + boot.block_count {
        error!("zimage: {}", ZImageError::KernelTooLarge);
        return Err(ZImageError::KernelTooLarge.into());
    }

    hdr.kernel_size = kernel_size;
    hdr_buf[..BOOT_HEADER_LEN].copy_from_slice(hdr.as_bytes());
    write_exact(device, boot.start_block, hdr_blocks, hdr_buf, ZImageError::HeaderWrite)?;
    write_exact(device, kernel_start, kernel_blocks, kernel, ZImageError::KernelWrite)?;
    write_exact(
        device,
        new_ramdisk_start,
        ramdisk_blocks,
        ramdisk_buf,
        ZImageError::RamdiskWrite,
    )?;

    info!("........ zImage was updated in boot partition");
    Ok(WriteOutcome {
        target: boot.name,
        image: ImageKind::ZImage,
        bytes_written: kernel.len() as u64,
        blocks_written: hdr_blocks + kernel_blocks + ramdisk_blocks,
    })
}

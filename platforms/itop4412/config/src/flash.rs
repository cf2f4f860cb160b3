// Licensed under the Apache-2.0 license

// Regions hard-coded on the iTop-4412 eMMC. The bootloader sits in boot
// partition 1, which no GPT can describe; the rest sit at the start of the
// user area ahead of any partition table. Units are 512-byte blocks.

use fb_config::flash::DEFAULT_BLOCK_SIZE;
use fb_config::{AccessClass, ConfigError, StaticRegion, StaticRegionTable};

pub const EMMC_BLOCK_SIZE: u32 = DEFAULT_BLOCK_SIZE;

// 640 KiB
pub const BOOTLOADER_REGION: StaticRegion<'static> = StaticRegion {
    name: "bootloader",
    start_block: 0x0000,
    block_count: 0x0500,
    access_class: AccessClass::Protected,
};

// 16 KiB of bootloader environment
pub const ENV_REGION: StaticRegion<'static> = StaticRegion {
    name: "env",
    start_block: 0x0001,
    block_count: 0x0020,
    access_class: AccessClass::Normal,
};

// 128 KiB, right after the environment
pub const DEVICE_TREE_REGION: StaticRegion<'static> = StaticRegion {
    name: "device_tree",
    start_block: 0x0021,
    block_count: 0x0100,
    access_class: AccessClass::Normal,
};

// 4 MiB
pub const KERNEL_REGION: StaticRegion<'static> = StaticRegion {
    name: "kernel",
    start_block: 0x0200,
    block_count: 0x2000,
    access_class: AccessClass::Normal,
};

pub const STATIC_REGIONS: &[StaticRegion<'static>] = &[
    BOOTLOADER_REGION,
    ENV_REGION,
    DEVICE_TREE_REGION,
    KERNEL_REGION,
];

/// Validated region table for this board.
pub fn static_region_table() -> Result<StaticRegionTable<'static>, ConfigError> {
    StaticRegionTable::new(STATIC_REGIONS, EMMC_BLOCK_SIZE)
}

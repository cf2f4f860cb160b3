// Licensed under the Apache-2.0 license

use core::fmt;

/// Longest partition name accepted anywhere in the lookup chain (the GPT name length).
pub const PARTITION_NAME_MAX_LEN: usize = 36;

/// Block size of eMMC devices and of hard-coded region tables.
pub const DEFAULT_BLOCK_SIZE: u32 = 512;

/// Which access mode the device must be in to reach a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    /// Region lives in the user data area.
    Normal,
    /// Region lives in a boot partition; the device must be switched over first.
    Protected,
}

/// A region that exists before any on-device partition table does.
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub struct StaticRegion<'a> {
    pub name: &'a str,             // name requested by the host
    pub start_block: u64,          // first block of the region
    pub block_count: u64,          // size in blocks
    pub access_class: AccessClass, // user area or boot partition
}

/// Errors found while validating a region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// An entry has an empty name.
    EmptyName { index: usize },
    /// An entry's name exceeds `PARTITION_NAME_MAX_LEN`.
    NameTooLong { index: usize },
    /// Two entries share a name.
    DuplicateName { first: usize, second: usize },
    /// An entry covers zero blocks.
    EmptyRegion { index: usize },
    /// More than one entry is marked protected.
    MultipleProtected { first: usize, second: usize },
    /// The table block size is zero or not a power of two.
    InvalidBlockSize(u32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyName { index } => write!(f, "region {} has an empty name", index),
            ConfigError::NameTooLong { index } => write!(f, "region {} name is too long", index),
            ConfigError::DuplicateName { first, second } => {
                write!(f, "regions {} and {} share a name", first, second)
            }
            ConfigError::EmptyRegion { index } => write!(f, "region {} has no blocks", index),
            ConfigError::MultipleProtected { first, second } => {
                write!(f, "regions {} and {} are both protected", first, second)
            }
            ConfigError::InvalidBlockSize(size) => write!(f, "invalid block size {}", size),
        }
    }
}

/// Validated, ordered list of compiled-in regions.
///
/// Names are unique and at most one entry is `Protected`. Lookups scan the
/// entries in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRegionTable<'a> {
    regions: &'a [StaticRegion<'a>],
    block_size: u32,
}

impl<'a> StaticRegionTable<'a> {
    pub fn new(regions: &'a [StaticRegion<'a>], block_size: u32) -> Result<Self, ConfigError> {
        if block_size == 0 || !block_size.is_power_of_two() {
            return Err(ConfigError::InvalidBlockSize(block_size));
        }

        let mut protected: Option<usize> = None;
        for (index, region) in regions.iter().enumerate() {
            if region.name.is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if region.name.len() > PARTITION_NAME_MAX_LEN {
                return Err(ConfigError::NameTooLong { index });
            }
            if region.block_count == 0 {
                return Err(ConfigError::EmptyRegion { index });
            }
            if let Some(first) = regions[..index].iter().position(|r| r.name == region.name) {
                return Err(ConfigError::DuplicateName {
                    first,
                    second: index,
                });
            }
            if region.access_class == AccessClass::Protected {
                if let Some(first) = protected {
                    return Err(ConfigError::MultipleProtected {
                        first,
                        second: index,
                    });
                }
                protected = Some(index);
            }
        }

        Ok(Self {
            regions,
            block_size,
        })
    }

    /// Exact-match lookup by name.
    pub fn find(&self, name: &str) -> Option<&'a StaticRegion<'a>> {
        self.regions.iter().find(|region| region.name == name)
    }

    /// The single protected entry, if the table has one.
    pub fn protected(&self) -> Option<&'a StaticRegion<'a>> {
        self.regions
            .iter()
            .find(|region| region.access_class == AccessClass::Protected)
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn regions(&self) -> &'a [StaticRegion<'a>] {
        self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

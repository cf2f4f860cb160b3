// Licensed under the Apache-2.0 license

//! Maps a requested target name to a block range.
//!
//! Lookup order, first match wins:
//! 1. the dynamic on-device partition table,
//! 2. the alias map, retried against the dynamic table,
//! 3. the compiled-in static region table.

use crate::error::ResolveError;
use arrayvec::ArrayString;
use fb_config::flash::PARTITION_NAME_MAX_LEN;
use fb_config::{AccessClass, StaticRegionTable};
use log::{debug, error};

/// Geometry of a partition found in an on-device table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfo {
    pub start_block: u64,
    pub block_count: u64,
    pub block_size: u32,
}

/// Maps a requested name to an alternate name.
pub trait AliasMap {
    fn lookup(&self, name: &str) -> Option<&str>;
}

/// Partition table read from the device (GPT, MBR, ...).
pub trait PartitionTable {
    fn lookup_by_name(&self, name: &str) -> Option<PartitionInfo>;

    fn lookup_by_name_or_alias(&self, name: &str, aliases: &dyn AliasMap) -> Option<PartitionInfo> {
        self.lookup_by_name(name).or_else(|| {
            let target = aliases.lookup(name)?;
            debug!("resolver: '{}' is an alias for '{}'", name, target);
            self.lookup_by_name(target)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionAlias<'a> {
    pub name: &'a str,
    pub target: &'a str,
}

/// Alias map backed by a slice.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable<'a>(pub &'a [PartitionAlias<'a>]);

impl AliasMap for AliasTable<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|alias| alias.name == name)
            .map(|alias| alias.target)
    }
}

/// The empty alias map.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAliases;

impl AliasMap for NoAliases {
    fn lookup(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// A resolved target. Scoped to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionDescriptor {
    pub name: ArrayString<PARTITION_NAME_MAX_LEN>,
    pub start_block: u64,
    pub block_count: u64,
    pub block_size: u32,
    pub access_class: AccessClass,
}

impl PartitionDescriptor {
    /// Region size in bytes, `None` if it does not fit in a `u64`.
    pub fn size_bytes(&self) -> Option<u64> {
        self.block_count.checked_mul(self.block_size as u64)
    }

    pub fn is_protected(&self) -> bool {
        self.access_class == AccessClass::Protected
    }
}

pub struct PartitionResolver<'a> {
    dynamic: Option<&'a dyn PartitionTable>,
    aliases: &'a dyn AliasMap,
    static_regions: Option<StaticRegionTable<'a>>,
}

impl Default for PartitionResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> PartitionResolver<'a> {
    /// A resolver with no sources; every lookup fails.
    pub fn new() -> Self {
        Self {
            dynamic: None,
            aliases: &NoAliases,
            static_regions: None,
        }
    }

    pub fn with_dynamic_table(mut self, table: &'a dyn PartitionTable) -> Self {
        self.dynamic = Some(table);
        self
    }

    pub fn with_aliases(mut self, aliases: &'a dyn AliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_static_regions(mut self, regions: StaticRegionTable<'a>) -> Self {
        self.static_regions = Some(regions);
        self
    }

    pub fn static_regions(&self) -> Option<&StaticRegionTable<'a>> {
        self.static_regions.as_ref()
    }

    pub fn resolve(&self, name: &str) -> Result<PartitionDescriptor, ResolveError> {
        let Ok(label) = ArrayString::from(name) else {
            error!("resolver: name too long ({} bytes)", name.len());
            return Err(ResolveError::NotFound);
        };

        if let Some(info) = self
            .dynamic
            .and_then(|table| table.lookup_by_name_or_alias(name, self.aliases))
        {
            debug!(
                "resolver: '{}' found in partition table at block {}",
                name, info.start_block
            );
            return Ok(PartitionDescriptor {
                name: label,
                start_block: info.start_block,
                block_count: info.block_count,
                block_size: info.block_size,
                access_class: AccessClass::Normal,
            });
        }

        if let Some(table) = &self.static_regions {
            if let Some(region) = table.find(name) {
                debug!(
                    "resolver: '{}' found in static table at block {}",
                    name, region.start_block
                );
                return Ok(PartitionDescriptor {
                    name: label,
                    start_block: region.start_block,
                    block_count: region.block_count,
                    block_size: table.block_size(),
                    access_class: region.access_class,
                });
            }
        }

        error!("resolver: cannot find partition '{}'", name);
        Err(ResolveError::NotFound)
    }
}

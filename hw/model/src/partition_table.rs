// Licensed under the Apache-2.0 license

use fb_mmc::{PartitionInfo, PartitionTable};

/// In-memory stand-in for a partition table read from the device.
#[derive(Debug, Clone, Default)]
pub struct MemoryPartitionTable {
    block_size: u32,
    entries: Vec<(String, u64, u64)>,
}

impl MemoryPartitionTable {
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size,
            entries: Vec::new(),
        }
    }

    pub fn with_partition(mut self, name: &str, start_block: u64, block_count: u64) -> Self {
        self.entries.push((name.to_string(), start_block, block_count));
        self
    }
}

impl PartitionTable for MemoryPartitionTable {
    fn lookup_by_name(&self, name: &str) -> Option<PartitionInfo> {
        self.entries
            .iter()
            .find(|(entry, _, _)| entry == name)
            .map(|&(_, start_block, block_count)| PartitionInfo {
                start_block,
                block_count,
                block_size: self.block_size,
            })
    }
}

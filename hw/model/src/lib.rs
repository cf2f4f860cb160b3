// Licensed under the Apache-2.0 license

//! Host-side model of an eMMC device for exercising the provisioning core
//! without hardware.

mod emmc;
mod partition_table;

pub use emmc::{Area, EmulatedMmc, Faults, Transaction};
pub use partition_table::MemoryPartitionTable;

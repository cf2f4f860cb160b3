// Licensed under the Apache-2.0 license

//! Provisioning core for eMMC devices: resolves target names to block
//! ranges, switches boot-partition access on and off, and performs
//! bounds-checked writes and erase-group-aligned erases.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod boot_access;
pub mod device;
pub mod erase;
pub mod error;
pub mod ext_csd;
pub mod provisioner;
pub mod resolver;
pub mod response;
pub mod writer;
pub mod zimage;


pub use boot_access::{AccessSession, BootAccessController};
pub use device::{BlockDevice, MmcCommand, MmcDevice, MmcHost, MmcResponse, ResponseType};
pub use erase::{aligned_erase_range, EraseEngine, EraseOutcome, EraseRange};
pub use error::{DeviceError, ProvisionError, ResolveError, WriteError};
pub use provisioner::{ProvisionReport, Provisioner, ReadOutcome};
pub use resolver::{
    AliasMap, AliasTable, NoAliases, PartitionAlias, PartitionDescriptor, PartitionInfo,
    PartitionResolver, PartitionTable,
};
pub use response::Response;
pub use writer::{FlashWriter, ImageKind, WriteOutcome};
pub use zimage::{AndroidBootHeader, ZImageError};

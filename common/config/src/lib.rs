// Licensed under the Apache-2.0 license

//! Board-independent configuration types for eMMC provisioning.

#![cfg_attr(not(test), no_std)]

pub mod boot;
pub mod flash;

pub use boot::{BootAccessConfig, BootBusWidth, BootPartition};
pub use flash::{AccessClass, ConfigError, StaticRegion, StaticRegionTable};

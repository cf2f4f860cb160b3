// Licensed under the Apache-2.0 license

//! Tunables for switching the device into and out of boot-partition access.

/// Boot partition selected for access while a protected session is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootPartition {
    Boot1 = 1,
    Boot2 = 2,
}

/// Bus width the card uses during the boot operation (EXT_CSD BOOT_BUS_WIDTH[1:0]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootBusWidth {
    X1 = 0,
    X4 = 1,
    X8 = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootAccessConfig {
    /// Boot partition that protected regions live in.
    pub boot_partition: BootPartition,
    /// Whether the card sends a boot acknowledge.
    pub boot_ack: bool,
    /// Boot bus width programmed when the session opens.
    pub open_bus_width: BootBusWidth,
    /// Boot bus width programmed when the session closes.
    pub close_bus_width: BootBusWidth,
    /// Fixed delay after every SWITCH transaction, in microseconds.
    pub settle_delay_us: u32,
    /// Maximum number of SEND_STATUS polls before the switch is declared timed out.
    pub status_poll_limit: u32,
    /// Delay between two SEND_STATUS polls, in microseconds.
    pub status_poll_interval_us: u32,
}

impl Default for BootAccessConfig {
    fn default() -> Self {
        Self {
            boot_partition: BootPartition::Boot1,
            boot_ack: true,
            open_bus_width: BootBusWidth::X4,
            close_bus_width: BootBusWidth::X4,
            settle_delay_us: 1000,
            status_poll_limit: 100,
            status_poll_interval_us: 100,
        }
    }
}

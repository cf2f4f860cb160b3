// Licensed under the Apache-2.0 license

//! EXT_CSD fields touched by boot-partition access and the CMD6 argument
//! that writes them.

use crate::device::{MmcCommand, ResponseType, CMD_SWITCH};
use bitfield::bitfield;
use fb_config::{BootBusWidth, BootPartition};

/// EXT_CSD byte index of PARTITION_CONFIG.
pub const EXT_CSD_PART_CONFIG: u8 = 179;

/// EXT_CSD byte index of BOOT_BUS_CONDITIONS (BOOT_BUS_WIDTH).
pub const EXT_CSD_BOOT_BUS_WIDTH: u8 = 177;

/// Card state reported in the TRAN state of the R1 status.
pub const CARD_STATE_TRAN: u8 = 4;

/// PARTITION_ACCESS value selecting the user data area.
pub const PARTITION_ACCESS_USER: u8 = 0;

/// CMD6 access modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SwitchAccess {
    CommandSet = 0,
    SetBits = 1,
    ClearBits = 2,
    WriteByte = 3,
}

bitfield! {
    /// CMD6 SWITCH argument.
    /// - Bits 25:24: access mode
    /// - Bits 23:16: EXT_CSD byte index
    /// - Bits 15:8: value
    /// - Bits 2:0: command set
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct SwitchArg(u32);
    impl Debug;
    pub u8, access, set_access: 25, 24;
    pub u8, index, set_index: 23, 16;
    pub u8, value, set_value: 15, 8;
    pub u8, cmd_set, set_cmd_set: 2, 0;
}

bitfield! {
    /// EXT_CSD[179] PARTITION_CONFIG.
    /// - Bit 6: boot acknowledge
    /// - Bits 5:3: boot partition enable
    /// - Bits 2:0: partition access
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct PartitionConfig(u8);
    impl Debug;
    pub boot_ack, set_boot_ack: 6;
    pub u8, boot_partition_enable, set_boot_partition_enable: 5, 3;
    pub u8, partition_access, set_partition_access: 2, 0;
}

bitfield! {
    /// EXT_CSD[177] BOOT_BUS_CONDITIONS.
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct BootBusConditions(u8);
    impl Debug;
    pub u8, boot_mode, set_boot_mode: 4, 3;
    pub reset_boot_bus, set_reset_boot_bus: 2;
    pub u8, boot_bus_width, set_boot_bus_width: 1, 0;
}

bitfield! {
    /// R1 card status, the fields the settle-wait looks at.
    #[derive(Copy, Clone, PartialEq, Eq, Default)]
    pub struct CardStatus(u32);
    impl Debug;
    pub u8, current_state, _: 12, 9;
    pub ready_for_data, _: 8;
    pub switch_error, _: 7;
}

impl CardStatus {
    /// Ready for the next command after a switch.
    pub fn is_settled(&self) -> bool {
        self.ready_for_data() && self.current_state() == CARD_STATE_TRAN
    }
}

/// One EXT_CSD byte write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtCsdSwitch {
    pub access: SwitchAccess,
    pub index: u8,
    pub value: u8,
}

impl ExtCsdSwitch {
    pub const fn write_byte(index: u8, value: u8) -> Self {
        Self {
            access: SwitchAccess::WriteByte,
            index,
            value,
        }
    }

    /// Encodes the CMD6 argument word:
    /// `access << 24 | index << 16 | value << 8 | cmd_set`, command set 0.
    pub fn encode(&self) -> u32 {
        let mut arg = SwitchArg(0);
        arg.set_access(self.access as u8);
        arg.set_index(self.index);
        arg.set_value(self.value);
        arg.0
    }

    /// The CMD6 command carrying this write. SWITCH signals busy on DAT0.
    pub fn command(&self) -> MmcCommand {
        MmcCommand::new(CMD_SWITCH, self.encode(), ResponseType::R1b)
    }
}

/// PARTITION_CONFIG value enabling `partition` for boot and selecting
/// `access` for subsequent transfers.
pub fn partition_config(partition: BootPartition, boot_ack: bool, access: u8) -> PartitionConfig {
    let mut config = PartitionConfig(0);
    config.set_boot_ack(boot_ack);
    config.set_boot_partition_enable(partition as u8);
    config.set_partition_access(access);
    config
}

/// BOOT_BUS_CONDITIONS value for `width`, SDR, bus width not retained.
pub fn boot_bus_conditions(width: BootBusWidth) -> BootBusConditions {
    let mut conditions = BootBusConditions(0);
    conditions.set_boot_bus_width(width as u8);
    conditions
}

// Licensed under the Apache-2.0 license

//! Device seams the provisioning core drives.
//!
//! The low-level MMC driver (command transport, block transfer engine, card
//! discovery) lives outside this crate and is reached only through these
//! traits.

use crate::error::DeviceError;
use embedded_hal::delay::DelayNs;

/// CMD6: SWITCH, writes one EXT_CSD byte.
pub const CMD_SWITCH: u8 = 6;

/// CMD13: SEND_STATUS, returns the R1 card status.
pub const CMD_SEND_STATUS: u8 = 13;

/// Expected response format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    None,
    /// 48-bit response with card status.
    R1,
    /// R1 plus busy signalling on DAT0.
    R1b,
    /// 136-bit CID/CSD response.
    R2,
}

/// A single command on the MMC command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmcCommand {
    pub index: u8,
    pub arg: u32,
    pub resp_type: ResponseType,
}

impl MmcCommand {
    pub const fn new(index: u8, arg: u32, resp_type: ResponseType) -> Self {
        Self {
            index,
            arg,
            resp_type,
        }
    }
}

/// Raw response words; `words[0]` holds the R1 card status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MmcResponse {
    pub words: [u32; 4],
}

impl MmcResponse {
    pub const fn r1(status: u32) -> Self {
        Self {
            words: [status, 0, 0, 0],
        }
    }

    pub fn status(&self) -> u32 {
        self.words[0]
    }
}

/// Command transport of the host controller.
pub trait MmcHost {
    /// Issue `cmd` and wait for its response.
    fn send_command(&mut self, cmd: &MmcCommand) -> Result<MmcResponse, DeviceError>;

    /// Relative card address assigned during discovery.
    fn rca(&self) -> u16;
}

/// Block transfer engine of the host controller.
///
/// Block numbers address whichever physical area (user area or boot
/// partition) the device currently has selected.
pub trait BlockDevice {
    /// Size of one block in bytes.
    fn block_size(&self) -> u32;

    /// Read `count` blocks starting at `start` into `buf`. Returns the number
    /// of blocks read.
    fn read_blocks(&mut self, start: u64, count: u64, buf: &mut [u8]) -> Result<u64, DeviceError>;

    /// Write `count` blocks starting at `start`. `data` may end short of the
    /// last block; the device pads the remainder with zeros. Returns the
    /// number of blocks written.
    fn write_blocks(&mut self, start: u64, count: u64, data: &[u8]) -> Result<u64, DeviceError>;

    /// Erase `count` blocks starting at `start`. Returns the number of blocks
    /// erased.
    fn erase_blocks(&mut self, start: u64, count: u64) -> Result<u64, DeviceError>;
}

/// A discovered eMMC device.
pub trait MmcDevice: MmcHost + BlockDevice + DelayNs {
    /// False once discovery failed or the card went away.
    fn is_present(&self) -> bool;

    /// Erase group size in blocks.
    fn erase_group_size(&self) -> u64;
}

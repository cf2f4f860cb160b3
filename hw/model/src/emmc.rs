// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;
use fb_mmc::device::{CMD_SEND_STATUS, CMD_SWITCH};
use fb_mmc::ext_csd::{PartitionConfig, SwitchAccess, SwitchArg, CARD_STATE_TRAN, EXT_CSD_PART_CONFIG};
use fb_mmc::{BlockDevice, DeviceError, MmcCommand, MmcDevice, MmcHost, MmcResponse};
use log::trace;

const EXT_CSD_LEN: usize = 512;

/// EXT_CSD[226] BOOT_SIZE_MULT, boot partition size in 128 KiB units.
const EXT_CSD_BOOT_SIZE_MULT: usize = 226;

/// Card state while a switch is being programmed.
const CARD_STATE_PRG: u32 = 7;

/// Physical area selected by PARTITION_CONFIG[2:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    User,
    Boot1,
    Boot2,
}

impl Area {
    fn from_access(access: u8) -> Option<Area> {
        match access {
            0 => Some(Area::User),
            1 => Some(Area::Boot1),
            2 => Some(Area::Boot2),
            _ => None,
        }
    }
}

/// Everything the host did to the device, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    Command { index: u8, arg: u32 },
    Read { area: Area, start: u64, count: u64 },
    Write { area: Area, start: u64, count: u64 },
    Erase { area: Area, start: u64, count: u64 },
}

/// Injected failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Fail the n-th SWITCH command (0-based) on the command line.
    pub fail_switch: Option<usize>,
    /// Report SWITCH_ERROR in every status after a switch.
    pub switch_error: bool,
    /// Stay in the programming state forever after a switch.
    pub never_ready: bool,
    /// Accept at most this many blocks per read, write or erase.
    pub transfer_limit: Option<u64>,
}

/// Emulated eMMC: a user area, two boot partitions and the EXT_CSD bytes
/// that select between them.
pub struct EmulatedMmc {
    block_size: u32,
    user: Vec<u8>,
    boot: [Vec<u8>; 2],
    ext_csd: [u8; EXT_CSD_LEN],
    erase_group: u64,
    present: bool,
    rca: u16,
    faults: Faults,
    /// SEND_STATUS polls answered with PRG after each switch.
    switch_busy_polls: u32,
    busy_remaining: u32,
    switch_error: bool,
    switches: usize,
    trace: Vec<Transaction>,
    elapsed_ns: u64,
}

impl EmulatedMmc {
    /// A device with `user_blocks` blocks of user area and two boot
    /// partitions of `boot_blocks` blocks each, 512-byte blocks.
    pub fn new(user_blocks: u64, boot_blocks: u64) -> Self {
        let block_size = fb_config::flash::DEFAULT_BLOCK_SIZE;
        let boot_len = (boot_blocks * block_size as u64) as usize;
        let mut ext_csd = [0u8; EXT_CSD_LEN];
        ext_csd[EXT_CSD_BOOT_SIZE_MULT] = (boot_len / (128 * 1024)).min(u8::MAX as usize) as u8;
        Self {
            block_size,
            user: vec![0; (user_blocks * block_size as u64) as usize],
            boot: [vec![0; boot_len], vec![0; boot_len]],
            ext_csd,
            erase_group: 1024,
            present: true,
            rca: 1,
            faults: Faults::default(),
            switch_busy_polls: 1,
            busy_remaining: 0,
            switch_error: false,
            switches: 0,
            trace: Vec::new(),
            elapsed_ns: 0,
        }
    }

    pub fn with_erase_group(mut self, blocks: u64) -> Self {
        self.erase_group = blocks;
        self
    }

    /// Number of SEND_STATUS polls a switch keeps the card busy for.
    pub fn with_switch_busy_polls(mut self, polls: u32) -> Self {
        self.switch_busy_polls = polls;
        self
    }

    /// Hardware reset: the user area is selected again and pending switch
    /// state is dropped. EXT_CSD boot configuration is kept.
    pub fn reset(&mut self) {
        let mut part = PartitionConfig(self.ext_csd[EXT_CSD_PART_CONFIG as usize]);
        part.set_partition_access(0);
        self.ext_csd[EXT_CSD_PART_CONFIG as usize] = part.0;
        self.busy_remaining = 0;
        self.switch_error = false;
    }

    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    pub fn faults_mut(&mut self) -> &mut Faults {
        &mut self.faults
    }

    pub fn area(&self, area: Area) -> &[u8] {
        match area {
            Area::User => &self.user,
            Area::Boot1 => &self.boot[0],
            Area::Boot2 => &self.boot[1],
        }
    }

    pub fn area_mut(&mut self, area: Area) -> &mut [u8] {
        match area {
            Area::User => &mut self.user,
            Area::Boot1 => &mut self.boot[0],
            Area::Boot2 => &mut self.boot[1],
        }
    }

    /// Area currently selected for transfers, `None` for reserved values.
    pub fn partition_access(&self) -> Option<Area> {
        Area::from_access(PartitionConfig(self.ext_csd[EXT_CSD_PART_CONFIG as usize]).partition_access())
    }

    pub fn ext_csd(&self) -> &[u8; EXT_CSD_LEN] {
        &self.ext_csd
    }

    pub fn trace(&self) -> &[Transaction] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// SWITCH arguments in the order they were issued.
    pub fn switch_args(&self) -> Vec<u32> {
        self.trace
            .iter()
            .filter_map(|t| match t {
                Transaction::Command { index, arg } if *index == CMD_SWITCH => Some(*arg),
                _ => None,
            })
            .collect()
    }

    /// Total time spent in delays, in nanoseconds.
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }

    fn switch(&mut self, arg: SwitchArg) -> Result<(), DeviceError> {
        let n = self.switches;
        self.switches += 1;
        if self.faults.fail_switch == Some(n) {
            return Err(DeviceError::CommandFailed {
                command: CMD_SWITCH,
            });
        }

        let index = arg.index() as usize;
        let value = arg.value();
        let byte = &mut self.ext_csd[index];
        match arg.access() {
            a if a == SwitchAccess::WriteByte as u8 => *byte = value,
            a if a == SwitchAccess::SetBits as u8 => *byte |= value,
            a if a == SwitchAccess::ClearBits as u8 => *byte &= !value,
            _ => {}
        }
        self.busy_remaining = self.switch_busy_polls;
        self.switch_error = self.faults.switch_error;
        Ok(())
    }

    fn status(&mut self) -> u32 {
        let busy = self.faults.never_ready || self.busy_remaining > 0;
        self.busy_remaining = self.busy_remaining.saturating_sub(1);
        let mut status = if busy {
            CARD_STATE_PRG << 9
        } else {
            (CARD_STATE_TRAN as u32) << 9 | 1 << 8
        };
        if self.switch_error {
            status |= 1 << 7;
        }
        status
    }

    fn limit(&self, count: u64) -> u64 {
        self.faults.transfer_limit.map_or(count, |limit| count.min(limit))
    }

    /// Byte range of `count` blocks at `start` in the selected area.
    fn span(&self, start: u64, count: u64) -> Result<(Area, core::ops::Range<usize>), DeviceError> {
        let area = self.partition_access().ok_or(DeviceError::Io)?;
        let bs = self.block_size as u64;
        let begin = start.checked_mul(bs).ok_or(DeviceError::Io)?;
        let end = start
            .checked_add(count)
            .and_then(|end| end.checked_mul(bs))
            .ok_or(DeviceError::Io)?;
        if end > self.area(area).len() as u64 {
            return Err(DeviceError::Io);
        }
        Ok((area, begin as usize..end as usize))
    }

    fn current_area(&self) -> Area {
        self.partition_access().unwrap_or(Area::User)
    }
}

impl MmcHost for EmulatedMmc {
    fn send_command(&mut self, cmd: &MmcCommand) -> Result<MmcResponse, DeviceError> {
        trace!("emmc: CMD{} arg 0x{:08x}", cmd.index, cmd.arg);
        self.trace.push(Transaction::Command {
            index: cmd.index,
            arg: cmd.arg,
        });
        if !self.present {
            return Err(DeviceError::NoDevice);
        }
        match cmd.index {
            CMD_SWITCH => {
                self.switch(SwitchArg(cmd.arg))?;
                Ok(MmcResponse::r1(0))
            }
            CMD_SEND_STATUS => Ok(MmcResponse::r1(self.status())),
            _ => Ok(MmcResponse::r1(self.status())),
        }
    }

    fn rca(&self) -> u16 {
        self.rca
    }
}

impl BlockDevice for EmulatedMmc {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn read_blocks(&mut self, start: u64, count: u64, buf: &mut [u8]) -> Result<u64, DeviceError> {
        self.trace.push(Transaction::Read {
            area: self.current_area(),
            start,
            count,
        });
        let count = self.limit(count);
        let (area, range) = self.span(start, count)?;
        if buf.len() < range.len() {
            return Err(DeviceError::Io);
        }
        buf[..range.len()].copy_from_slice(&self.area(area)[range]);
        Ok(count)
    }

    fn write_blocks(&mut self, start: u64, count: u64, data: &[u8]) -> Result<u64, DeviceError> {
        self.trace.push(Transaction::Write {
            area: self.current_area(),
            start,
            count,
        });
        let count = self.limit(count);
        let (area, range) = self.span(start, count)?;
        let len = range.len().min(data.len());
        let dst = &mut self.area_mut(area)[range];
        dst[..len].copy_from_slice(&data[..len]);
        dst[len..].fill(0);
        Ok(count)
    }

    fn erase_blocks(&mut self, start: u64, count: u64) -> Result<u64, DeviceError> {
        self.trace.push(Transaction::Erase {
            area: self.current_area(),
            start,
            count,
        });
        let count = self.limit(count);
        let (area, range) = self.span(start, count)?;
        self.area_mut(area)[range].fill(0xFF);
        Ok(count)
    }
}

impl DelayNs for EmulatedMmc {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

impl MmcDevice for EmulatedMmc {
    fn is_present(&self) -> bool {
        self.present
    }

    fn erase_group_size(&self) -> u64 {
        self.erase_group
    }
}

// Licensed under the Apache-2.0 license

//! Switches the device into and out of boot-partition access.
//!
//! `Closed --open()--> Opening --> Open --close()--> Closing --> Closed`.
//!
//! Each transition is two CMD6 SWITCH transactions: PARTITION_CONFIG, then
//! BOOT_BUS_WIDTH. Every SWITCH is followed by the settle delay and a
//! SEND_STATUS poll until the card is back in TRAN. A failed transition is
//! not retried: the session stays where it stopped and the controller is
//! poisoned until `reset()`.

use crate::device::{MmcCommand, MmcHost, ResponseType, CMD_SEND_STATUS};
use crate::error::DeviceError;
use crate::ext_csd::{
    boot_bus_conditions, partition_config, CardStatus, ExtCsdSwitch, EXT_CSD_BOOT_BUS_WIDTH,
    EXT_CSD_PART_CONFIG, PARTITION_ACCESS_USER,
};
use embedded_hal::delay::DelayNs;
use fb_config::{BootAccessConfig, BootBusWidth};
use log::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSession {
    Closed,
    Opening,
    Open,
    Closing,
}

#[derive(Debug)]
pub struct BootAccessController {
    config: BootAccessConfig,
    session: AccessSession,
    poisoned: bool,
}

impl Default for BootAccessController {
    fn default() -> Self {
        Self::new(BootAccessConfig::default())
    }
}

impl BootAccessController {
    pub fn new(config: BootAccessConfig) -> Self {
        Self {
            config,
            session: AccessSession::Closed,
            poisoned: false,
        }
    }

    pub fn session(&self) -> AccessSession {
        self.session
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn config(&self) -> &BootAccessConfig {
        &self.config
    }

    /// Forget any half-finished session. Call after the device has been
    /// reset and rediscovered.
    pub fn reset(&mut self) {
        if self.session != AccessSession::Closed || self.poisoned {
            info!("boot access: reset from {:?}", self.session);
        }
        self.session = AccessSession::Closed;
        self.poisoned = false;
    }

    /// Select the configured boot partition for subsequent transfers.
    pub fn open<D: MmcHost + DelayNs + ?Sized>(&mut self, device: &mut D) -> Result<(), DeviceError> {
        if self.poisoned {
            error!("boot access: open refused, session poisoned");
            return Err(DeviceError::SessionPoisoned);
        }
        if self.session != AccessSession::Closed {
            error!("boot access: open refused in state {:?}", self.session);
            return Err(DeviceError::SessionBusy);
        }

        self.session = AccessSession::Opening;
        let part = partition_config(
            self.config.boot_partition,
            self.config.boot_ack,
            self.config.boot_partition as u8,
        );
        if let Err(err) = self.transition(device, part.0, self.config.open_bus_width) {
            error!("boot access: open failed: {}", err);
            self.poisoned = true;
            return Err(err);
        }

        self.session = AccessSession::Open;
        info!("boot access: open ({:?})", self.config.boot_partition);
        Ok(())
    }

    /// Restore user-area access. A no-op when already closed.
    pub fn close<D: MmcHost + DelayNs + ?Sized>(&mut self, device: &mut D) -> Result<(), DeviceError> {
        if self.poisoned {
            error!("boot access: close refused, session poisoned");
            return Err(DeviceError::SessionPoisoned);
        }
        if self.session == AccessSession::Closed {
            return Ok(());
        }

        self.session = AccessSession::Closing;
        let part = partition_config(
            self.config.boot_partition,
            self.config.boot_ack,
            PARTITION_ACCESS_USER,
        );
        if let Err(err) = self.transition(device, part.0, self.config.close_bus_width) {
            error!("boot access: close failed: {}", err);
            self.poisoned = true;
            return Err(err);
        }

        self.session = AccessSession::Closed;
        info!("boot access: closed");
        Ok(())
    }

    fn transition<D: MmcHost + DelayNs + ?Sized>(
        &self,
        device: &mut D,
        part_config: u8,
        width: BootBusWidth,
    ) -> Result<(), DeviceError> {
        self.switch(device, ExtCsdSwitch::write_byte(EXT_CSD_PART_CONFIG, part_config))?;
        self.switch(
            device,
            ExtCsdSwitch::write_byte(EXT_CSD_BOOT_BUS_WIDTH, boot_bus_conditions(width).0),
        )
    }

    fn switch<D: MmcHost + DelayNs + ?Sized>(
        &self,
        device: &mut D,
        switch: ExtCsdSwitch,
    ) -> Result<(), DeviceError> {
        let cmd = switch.command();
        debug!(
            "boot access: CMD6 index {} value 0x{:02x} (arg 0x{:08x})",
            switch.index, switch.value, cmd.arg
        );
        let result = device.send_command(&cmd);
        device.delay_us(self.config.settle_delay_us);
        result?;
        self.wait_settled(device)
    }

    /// Poll SEND_STATUS until the card is ready in TRAN. A poll limit of
    /// zero skips the wait.
    fn wait_settled<D: MmcHost + DelayNs + ?Sized>(&self, device: &mut D) -> Result<(), DeviceError> {
        if self.config.status_poll_limit == 0 {
            return Ok(());
        }
        let cmd = MmcCommand::new(CMD_SEND_STATUS, (device.rca() as u32) << 16, ResponseType::R1);
        for _ in 0..self.config.status_poll_limit {
            let status = CardStatus(device.send_command(&cmd)?.status());
            if status.switch_error() {
                return Err(DeviceError::SwitchRejected);
            }
            if status.is_settled() {
                return Ok(());
            }
            device.delay_us(self.config.status_poll_interval_us);
        }
        Err(DeviceError::Timeout)
    }
}

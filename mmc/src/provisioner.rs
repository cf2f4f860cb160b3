// Licensed under the Apache-2.0 license

//! One end-to-end provisioning request:
//! resolve, open protected access if needed, run the operation, close
//! protected access, report.

use crate::boot_access::BootAccessController;
use crate::device::MmcDevice;
use crate::erase::{EraseEngine, EraseOutcome};
use crate::error::{DeviceError, ProvisionError};
use crate::resolver::{PartitionDescriptor, PartitionResolver};
use crate::response::Response;
use crate::writer::{FlashWriter, WriteOutcome};
use crate::zimage::{self, BOOT_PARTITION_NAME};
use arrayvec::ArrayString;
use core::fmt;
use fb_config::flash::PARTITION_NAME_MAX_LEN;
use fb_sparse::SparseDecoder;
use log::{error, info, warn};

/// Target names routed to the zImage update instead of a plain write.
const ZIMAGE_TARGET: &str = "zimage";

/// Appended to a response when protected access could not be closed.
pub const UNCONFIRMED_NOTE: &str = " (boot mode unconfirmed)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    pub target: ArrayString<PARTITION_NAME_MAX_LEN>,
    pub bytes_read: u64,
}

impl fmt::Display for ReadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "read {} bytes from '{}'", self.bytes_read, self.target)
    }
}

/// Result of one request.
///
/// `result` is the operation's own outcome. `close_error` is set when
/// protected access was opened and could not be closed again; the device's
/// access mode is then unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionReport<T> {
    pub target: Option<PartitionDescriptor>,
    pub result: Result<T, ProvisionError>,
    pub close_error: Option<DeviceError>,
}

impl<T> ProvisionReport<T> {
    fn failed(target: Option<PartitionDescriptor>, err: ProvisionError) -> Self {
        Self {
            target,
            result: Err(err),
            close_error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, ProvisionError> {
        self.result
    }
}

impl<T: fmt::Display> ProvisionReport<T> {
    /// Status for the remote client. The operation decides OKAY or FAIL; a
    /// close failure adds a warning that is never truncated away.
    pub fn response(&self) -> Response {
        match (&self.result, self.close_error) {
            (Ok(outcome), None) => Response::okay(format_args!("{}", outcome)),
            (Ok(outcome), Some(_)) => {
                Response::okay_with_note(format_args!("{}", outcome), UNCONFIRMED_NOTE)
            }
            (Err(err), None) => Response::fail(format_args!("{}", err)),
            (Err(err), Some(_)) => Response::fail_with_note(format_args!("{}", err), UNCONFIRMED_NOTE),
        }
    }
}

/// Serves requests against one device. Holding the device borrow keeps
/// requests from interleaving.
pub struct Provisioner<'a, D: MmcDevice, S: SparseDecoder> {
    device: &'a mut D,
    resolver: PartitionResolver<'a>,
    boot_access: BootAccessController,
    decoder: S,
    scratch: Option<&'a mut [u8]>,
}

impl<'a, D: MmcDevice, S: SparseDecoder> Provisioner<'a, D, S> {
    pub fn new(
        device: &'a mut D,
        resolver: PartitionResolver<'a>,
        boot_access: BootAccessController,
        decoder: S,
    ) -> Self {
        Self {
            device,
            resolver,
            boot_access,
            decoder,
            scratch: None,
        }
    }

    /// Scratch memory for operations that must stage data (zImage update).
    pub fn with_scratch(mut self, scratch: &'a mut [u8]) -> Self {
        self.scratch = Some(scratch);
        self
    }

    pub fn boot_access(&self) -> &BootAccessController {
        &self.boot_access
    }

    pub fn device(&mut self) -> &mut D {
        &mut *self.device
    }

    /// Clear a poisoned boot access session. Call only after the device
    /// itself was reset and rediscovered.
    pub fn reset_boot_access(&mut self) {
        self.boot_access.reset();
    }

    /// Write `payload` to the region named `name`.
    pub fn flash(&mut self, name: &str, payload: &[u8]) -> ProvisionReport<WriteOutcome> {
        if is_zimage_target(name) {
            return self.update_zimage(payload);
        }
        self.guarded(name, |device, decoder, _, target| {
            Ok(FlashWriter::write(device, target, payload, decoder)?)
        })
    }

    /// Erase the whole erase groups of the region named `name`.
    pub fn erase(&mut self, name: &str) -> ProvisionReport<EraseOutcome> {
        self.guarded(name, |device, _, _, target| {
            let group = device.erase_group_size();
            let blocks_erased = EraseEngine::erase(device, target, group)?;
            Ok(EraseOutcome {
                target: target.name,
                blocks_erased,
                block_size: target.block_size,
            })
        })
    }

    /// Read the whole region named `name` into the front of `buf`.
    pub fn read(&mut self, name: &str, buf: &mut [u8]) -> ProvisionReport<ReadOutcome> {
        self.guarded(name, |device, _, _, target| {
            let required = target.size_bytes().unwrap_or(u64::MAX);
            if (buf.len() as u64) < required {
                error!(
                    "read: '{}' needs {} bytes, buffer holds {}",
                    target.name,
                    required,
                    buf.len()
                );
                return Err(ProvisionError::BufferTooSmall {
                    required,
                    available: buf.len() as u64,
                });
            }
            let read = device.read_blocks(
                target.start_block,
                target.block_count,
                &mut buf[..required as usize],
            )?;
            if read != target.block_count {
                error!("read: {} of {} blocks", read, target.block_count);
                return Err(DeviceError::ShortRead {
                    requested: target.block_count,
                    read,
                }
                .into());
            }
            info!("........ read {} bytes from '{}'", required, target.name);
            Ok(ReadOutcome {
                target: target.name,
                bytes_read: required,
            })
        })
    }

    /// Replace the kernel of the Android boot image in the boot partition.
    pub fn update_zimage(&mut self, kernel: &[u8]) -> ProvisionReport<WriteOutcome> {
        self.guarded(BOOT_PARTITION_NAME, |device, _, scratch, target| {
            let scratch = scratch.ok_or(ProvisionError::NoScratch)?;
            zimage::update_zimage(device, target, kernel, scratch)
        })
    }

    fn guarded<T, F>(&mut self, name: &str, op: F) -> ProvisionReport<T>
    where
        F: FnOnce(&mut D, &mut S, Option<&mut [u8]>, &PartitionDescriptor) -> Result<T, ProvisionError>,
    {
        if !self.device.is_present() {
            error!("invalid mmc device");
            return ProvisionReport::failed(None, DeviceError::NoDevice.into());
        }
        // A failed mode switch leaves the selected area unknown.
        if self.boot_access.is_poisoned() {
            error!("device access mode unconfirmed, reset required");
            return ProvisionReport::failed(None, DeviceError::SessionPoisoned.into());
        }

        let target = match self.resolver.resolve(name) {
            Ok(target) => target,
            Err(err) => return ProvisionReport::failed(None, err.into()),
        };

        let opened = target.is_protected();
        if opened {
            if let Err(err) = self.boot_access.open(&mut *self.device) {
                error!("'{}': cannot open boot access: {}", target.name, err);
                return ProvisionReport::failed(Some(target), ProvisionError::OpenFailed(err));
            }
        }

        let result = op(
            &mut *self.device,
            &mut self.decoder,
            self.scratch.as_deref_mut(),
            &target,
        );
        if let Err(err) = &result {
            error!("'{}': {}", target.name, err);
        }

        let close_error = if opened {
            self.boot_access.close(&mut *self.device).err()
        } else {
            None
        };
        if let Some(err) = close_error {
            warn!(
                "'{}': cannot close boot access, mode unconfirmed: {}",
                target.name, err
            );
        }

        ProvisionReport {
            target: Some(target),
            result,
            close_error,
        }
    }
}

fn is_zimage_target(name: &str) -> bool {
    name.len() >= ZIMAGE_TARGET.len()
        && name.as_bytes()[..ZIMAGE_TARGET.len()].eq_ignore_ascii_case(ZIMAGE_TARGET.as_bytes())
}

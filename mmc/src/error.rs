// Licensed under the Apache-2.0 license

use crate::zimage::ZImageError;
use core::fmt;
use fb_sparse::SparseError;

/// Failures of a control or bulk transaction, or of the access session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// No device was discovered, or it went away.
    NoDevice,
    /// The host reported an error for a command.
    CommandFailed { command: u8 },
    /// The card did not become ready within the poll ceiling.
    Timeout,
    /// The card flagged SWITCH_ERROR for a mode switch.
    SwitchRejected,
    /// A previous mode switch failed; the device needs a reset.
    SessionPoisoned,
    /// Protected access is already open.
    SessionBusy,
    /// The device reported an erase group size of zero.
    InvalidEraseGroup,
    /// The device erased fewer blocks than requested.
    EraseMismatch { requested: u64, erased: u64 },
    /// The device read fewer blocks than requested.
    ShortRead { requested: u64, read: u64 },
    /// Data transfer failed on the bus.
    Io,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NoDevice => write!(f, "invalid mmc device"),
            DeviceError::CommandFailed { command } => write!(f, "CMD{} failed", command),
            DeviceError::Timeout => write!(f, "device timed out"),
            DeviceError::SwitchRejected => write!(f, "mode switch rejected"),
            DeviceError::SessionPoisoned => write!(f, "boot access unusable until reset"),
            DeviceError::SessionBusy => write!(f, "boot access already open"),
            DeviceError::InvalidEraseGroup => write!(f, "invalid erase group size"),
            DeviceError::EraseMismatch { requested, erased } => write!(
                f,
                "failed erasing from device ({} of {} blocks)",
                erased, requested
            ),
            DeviceError::ShortRead { requested, read } => write!(
                f,
                "failed reading from device ({} of {} blocks)",
                read, requested
            ),
            DeviceError::Io => write!(f, "device I/O error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// No dynamic, aliased or static region carries the name.
    NotFound,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound => write!(f, "cannot find partition"),
        }
    }
}

/// Failures of a flash write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteError {
    /// The raw payload needs more blocks than the region has.
    TooLarge { required: u64, capacity: u64 },
    /// The device wrote fewer blocks than requested.
    DeviceShortWrite { requested: u64, written: u64 },
    /// The target reports a block size of zero.
    InvalidBlockSize,
    Device(DeviceError),
    /// The sparse decoder failed.
    Sparse(SparseError),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::TooLarge { .. } => write!(f, "too large for partition"),
            WriteError::DeviceShortWrite { requested, written } => write!(
                f,
                "failed writing to device ({} of {} blocks)",
                written, requested
            ),
            WriteError::InvalidBlockSize => write!(f, "invalid block size"),
            WriteError::Device(err) => write!(f, "{}", err),
            WriteError::Sparse(err) => write!(f, "{}", err),
        }
    }
}

impl From<DeviceError> for WriteError {
    fn from(err: DeviceError) -> Self {
        WriteError::Device(err)
    }
}

impl From<SparseError> for WriteError {
    fn from(err: SparseError) -> Self {
        WriteError::Sparse(err)
    }
}

/// Failures of one end-to-end provisioning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionError {
    NotFound,
    Device(DeviceError),
    /// Protected access could not be opened; nothing was written.
    OpenFailed(DeviceError),
    Write(WriteError),
    /// The caller's buffer cannot hold the whole region.
    BufferTooSmall { required: u64, available: u64 },
    ZImage(ZImageError),
    /// The operation needs scratch memory and none was supplied.
    NoScratch,
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::NotFound => write!(f, "{}", ResolveError::NotFound),
            ProvisionError::Device(err) => write!(f, "{}", err),
            ProvisionError::OpenFailed(err) => write!(f, "boot access open failed: {}", err),
            ProvisionError::Write(err) => write!(f, "{}", err),
            ProvisionError::BufferTooSmall { .. } => write!(f, "buffer too small for partition"),
            ProvisionError::ZImage(err) => write!(f, "{}", err),
            ProvisionError::NoScratch => write!(f, "no scratch buffer"),
        }
    }
}

impl From<ResolveError> for ProvisionError {
    fn from(_: ResolveError) -> Self {
        ProvisionError::NotFound
    }
}

impl From<DeviceError> for ProvisionError {
    fn from(err: DeviceError) -> Self {
        ProvisionError::Device(err)
    }
}

impl From<WriteError> for ProvisionError {
    fn from(err: WriteError) -> Self {
        ProvisionError::Write(err)
    }
}

impl From<ZImageError> for ProvisionError {
    fn from(err: ZImageError) -> Self {
        ProvisionError::ZImage(err)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeviceError {}

#[cfg(feature = "std")]
impl std::error::Error for ResolveError {}

#[cfg(feature = "std")]
impl std::error::Error for WriteError {}

#[cfg(feature = "std")]
impl std::error::Error for ProvisionError {}

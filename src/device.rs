//! Device identity, immutable capabilities, and the process-wide registry
//! enforcing "at most one open `Session` per `Device`" (spec §5, §9 redesign
//! note: "C-global open-device bitmap" → "`DeviceRegistry` behind a
//! `Mutex<HashSet<DeviceId>>`, built once via `OnceLock`").

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use crate::error::BackendError;
use crate::options::{Mode, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

/// Which physical transport a device is reachable over (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    UsbScsi,
    ParallelPort,
}

/// Immutable capabilities of a device model (spec §3 component J).
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub vendor: &'static str,
    pub model: &'static str,
    pub transport: TransportKind,
    pub optical_dpi_x: u32,
    pub optical_dpi_y: u32,
    pub min_dpi: u32,
    pub bit_depths: &'static [u8],
    pub modes: &'static [Mode],
    pub sources: &'static [Source],
    pub has_adf: bool,
    pub has_duplex: bool,
    pub has_tpa: bool,
    /// True for devices that capture all three color planes in one pass
    /// (CCD line sensor with three rows); false for single-row sensors that
    /// require three successive monochrome passes under red/green/blue
    /// illumination (spec §3 DerivedParams `frame_format`/`last_frame`).
    pub single_pass_color: bool,
}

/// Static capability table, one entry per supported model (spec §3
/// component J). Grounded on the field layouts in the original source's
/// `kvs20xx.h` (USB/SCSI sheetfed family) and `plustek-pp_types.h`
/// (parallel-port flatbed family).
pub static DEVICES: &[Device] = &[
    Device {
        id: DeviceId(1),
        vendor: "Panasonic",
        model: "KV-S2026C",
        transport: TransportKind::UsbScsi,
        optical_dpi_x: 600,
        optical_dpi_y: 600,
        min_dpi: 50,
        bit_depths: &[1, 8, 24],
        modes: &[Mode::Lineart, Mode::Halftone, Mode::Gray, Mode::Color],
        sources: &[Source::Adf],
        has_adf: true,
        has_duplex: true,
        has_tpa: false,
        single_pass_color: false,
    },
    Device {
        id: DeviceId(2),
        vendor: "Plustek",
        model: "OpticPro P96",
        transport: TransportKind::ParallelPort,
        optical_dpi_x: 600,
        optical_dpi_y: 1200,
        min_dpi: 50,
        bit_depths: &[1, 8, 24, 48],
        modes: &[Mode::Lineart, Mode::Halftone, Mode::Gray, Mode::Color],
        sources: &[Source::Flatbed, Source::Tpa],
        has_adf: false,
        has_duplex: false,
        has_tpa: true,
        single_pass_color: true,
    },
];

pub fn lookup(id: DeviceId) -> Option<&'static Device> {
    DEVICES.iter().find(|d| d.id == id)
}

/// Process-wide "which devices currently have an open session" set. A
/// `HashSet` behind a `Mutex` rather than a C-style global bitmap, built
/// lazily exactly once via `OnceLock` (spec §9).
pub struct DeviceRegistry {
    open: Mutex<HashSet<DeviceId>>,
}

impl DeviceRegistry {
    fn new() -> Self {
        DeviceRegistry { open: Mutex::new(HashSet::new()) }
    }

    pub fn global() -> &'static DeviceRegistry {
        static REGISTRY: OnceLock<DeviceRegistry> = OnceLock::new();
        REGISTRY.get_or_init(DeviceRegistry::new)
    }

    /// Claim a device for a new session. Fails with `DeviceBusy` if the
    /// device already has an open session (spec §5 invariant).
    pub fn open(&self, id: DeviceId) -> Result<(), BackendError> {
        let mut open = self.open.lock().expect("device registry poisoned");
        if !open.insert(id) {
            return Err(BackendError::DeviceBusy);
        }
        Ok(())
    }

    /// Release a device on `close`. No-op if the device wasn't registered
    /// as open (idempotent, matching `close` being safe to call once the
    /// session has already faulted out of existence).
    pub fn close(&self, id: DeviceId) {
        self.open.lock().expect("device registry poisoned").remove(&id);
    }

    pub fn is_open(&self, id: DeviceId) -> bool {
        self.open.lock().expect("device registry poisoned").contains(&id)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_device() {
        assert!(lookup(DeviceId(1)).is_some());
        assert!(lookup(DeviceId(9999)).is_none());
    }

    #[test]
    fn registry_refuses_second_open() {
        let registry = DeviceRegistry::new();
        let id = DeviceId(42);
        assert!(registry.open(id).is_ok());
        assert_eq!(registry.open(id), Err(BackendError::DeviceBusy));
        registry.close(id);
        assert!(registry.open(id).is_ok());
    }

    #[test]
    fn registry_close_is_idempotent() {
        let registry = DeviceRegistry::new();
        let id = DeviceId(7);
        registry.close(id);
        registry.close(id);
        assert!(!registry.is_open(id));
    }
}

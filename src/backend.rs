//! Top-level frontend-facing entry points: `init`/`exit`/`get_devices`
//! (spec §6.1), owning the process-wide device table and registry.

use crate::device::{Device, DeviceId, DeviceRegistry, DEVICES};
use crate::error::BackendError;

pub struct Backend {
    registry: &'static DeviceRegistry,
}

impl Backend {
    /// Version code is accepted but unused beyond logging; no
    /// authentication callback is modeled since the core has no
    /// credentialed devices (spec §6.1 `init`).
    pub fn init(version_code: u32) -> Result<Backend, BackendError> {
        log::info!("sanecore backend init, frontend version {version_code:#x}");
        Ok(Backend { registry: DeviceRegistry::global() })
    }

    pub fn exit(&self) {
        log::info!("sanecore backend exit");
    }

    pub fn get_devices(&self, local_only: bool) -> &'static [Device] {
        let _ = local_only;
        DEVICES
    }

    pub fn lookup(&self, id: DeviceId) -> Option<&'static Device> {
        crate::device::lookup(id)
    }

    pub fn registry(&self) -> &'static DeviceRegistry {
        self.registry
    }
}

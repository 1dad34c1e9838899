use tracing::{debug, info};

use crate::machine::Machine;
use crate::types::{HardwareChange, HardwareSpec, VmRecord};
use crate::{Error, Result};

/// Work out the smallest edit that moves `current` to `requested`.
///
/// A dimension is included only when requested is non-zero and differs from
/// the live value. Disks never shrink.
pub(crate) fn plan(current: &VmRecord, requested: &HardwareSpec) -> Result<HardwareChange> {
    if requested.disk_gb != 0 && requested.disk_gb < current.disk_gb {
        return Err(Error::ShrinkNotAllowed {
            vm_id: current.id.clone(),
            current_gb: current.disk_gb,
            requested_gb: requested.disk_gb,
        });
    }

    Ok(HardwareChange {
        cpus: differs(requested.cpus, current.cpus),
        memory_mb: differs(requested.memory_mb, current.memory_mb),
        disk_gb: differs(requested.disk_gb, current.disk_gb),
    })
}

fn differs(requested: u32, current: u32) -> Option<u32> {
    (requested != 0 && requested != current).then_some(requested)
}

impl Machine {
    /// Bring the environment's VM to `requested` hardware.
    ///
    /// No edit is sent when nothing differs. After an edit the machine waits
    /// with the hardware profile for the VM to come back.
    pub async fn reconcile_hardware(&mut self, requested: HardwareSpec) -> Result<()> {
        if requested.is_unmanaged() {
            debug!(machine = %self.name(), "hardware not managed");
            return Ok(());
        }

        let env_id = self.environment_id()?;
        let snapshot = self.client.get_environment_extended(&env_id).await?;
        let current = snapshot
            .vms
            .first()
            .ok_or_else(|| Error::NoVms(env_id.clone()))?;

        let change = plan(current, &requested)?;
        if change.is_empty() {
            debug!(vm_id = %current.id, "hardware already matches");
            return Ok(());
        }

        info!(
            vm_id = %current.id,
            cpus = ?change.cpus,
            memory_mb = ?change.memory_mb,
            disk_gb = ?change.disk_gb,
            "adjusting vm hardware"
        );
        self.client.edit_vm_hardware(&current.id, &change).await?;

        let profile = self.config.timeouts.hardware;
        self.wait_until_ready(profile).await?;
        Ok(())
    }
}

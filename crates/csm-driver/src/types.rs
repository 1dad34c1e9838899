use cloudshare_api::{EnvironmentStatus, PolicyAction};
use serde::{Deserialize, Serialize};

use crate::state::{MachineState, translate};

/// VM `statusText` once the guest is up.
pub const VM_RUNNING: &str = "Running";
/// VM `statusText` while a reboot is in progress.
pub const VM_REBOOTING: &str = "Rebooting";

/// Provider-assigned environment identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentId(pub String);

/// Provider-assigned VM identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmId(pub String);

impl std::fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for VmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One status query's view of an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    pub status: EnvironmentStatus,
    pub vms: Vec<VmRecord>,
}

impl EnvironmentSnapshot {
    /// The VM to hand out, if the environment counts as usable.
    ///
    /// Usable means the environment status translates to `Running` and the
    /// first VM reports `statusText == "Running"`.
    pub fn ready_vm(&self) -> Option<&VmRecord> {
        if translate(self.status) != MachineState::Running {
            return None;
        }
        self.vms.first().filter(|vm| vm.status_text == VM_RUNNING)
    }

    /// First VM's status text, for diagnostics.
    pub fn vm_status(&self) -> &str {
        self.vms
            .first()
            .map(|vm| vm.status_text.as_str())
            .unwrap_or("<no vm>")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    pub id: VmId,
    pub hostname: String,
    pub password: Option<String>,
    pub status_text: String,
    pub cpus: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
}

/// Requested hardware. Zero in any field means "leave as is".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSpec {
    pub cpus: u32,
    pub memory_mb: u32,
    pub disk_gb: u32,
}

impl HardwareSpec {
    pub fn is_unmanaged(&self) -> bool {
        *self == Self::default()
    }
}

/// Minimal hardware mutation. `None` fields are not sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardwareChange {
    pub cpus: Option<u32>,
    pub memory_mb: Option<u32>,
    pub disk_gb: Option<u32>,
}

impl HardwareChange {
    pub fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.memory_mb.is_none() && self.disk_gb.is_none()
    }
}

/// Time-boxed policy to attach to a new environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySpec {
    pub name: String,
    pub project_id: String,
    pub expiry_days: u32,
    pub action: PolicyAction,
    pub grace_period_minutes: u32,
}

/// Create-from-template request with every reference already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub name: String,
    pub description: String,
    pub project_id: String,
    pub region_id: String,
    pub policy_id: Option<String>,
    pub vm: VmLineItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmLineItem {
    pub name: String,
    pub description: String,
    pub template_vm_id: String,
}

use serde::{Deserialize, Serialize};

// ── Projects ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

// ── Templates ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
}

/// Query filter for `GET templates`. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFilter {
    pub project_id: Option<String>,
    pub region_id: Option<String>,
}

impl TemplateFilter {
    pub(crate) fn query(&self) -> Vec<(&'static str, &str)> {
        let mut query = Vec::new();
        if let Some(p) = &self.project_id {
            query.push(("projectId", p.as_str()));
        }
        if let Some(r) = &self.region_id {
            query.push(("regionId", r.as_str()));
        }
        query
    }
}

// ── Policies ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Action taken when a policy threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyAction {
    Suspend,
    Delete,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolicyRequest {
    pub name: String,
    pub project_id: String,
    pub lifetime_days: u32,
    pub lifetime_action: PolicyAction,
    pub runtime_action: PolicyAction,
    pub grace_period_minutes: u32,
}

// ── Environments ────────────────────────────────────────────────────

/// Environment status code as reported by `getextended` and `envs`.
///
/// Codes the client does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum EnvironmentStatus {
    Preparing,
    Ready,
    Suspended,
    Stopping,
    Deleted,
    CreationFailed,
    Archived,
    Publishing,
    InGrace,
    AllocationScheduledNoRun,
    Other(i64),
}

impl From<i64> for EnvironmentStatus {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Preparing,
            2 => Self::Ready,
            3 => Self::Suspended,
            4 => Self::Stopping,
            5 => Self::Deleted,
            6 => Self::CreationFailed,
            7 => Self::Archived,
            8 => Self::Publishing,
            9 => Self::InGrace,
            10 => Self::AllocationScheduledNoRun,
            other => Self::Other(other),
        }
    }
}

impl From<EnvironmentStatus> for i64 {
    fn from(status: EnvironmentStatus) -> Self {
        match status {
            EnvironmentStatus::Preparing => 1,
            EnvironmentStatus::Ready => 2,
            EnvironmentStatus::Suspended => 3,
            EnvironmentStatus::Stopping => 4,
            EnvironmentStatus::Deleted => 5,
            EnvironmentStatus::CreationFailed => 6,
            EnvironmentStatus::Archived => 7,
            EnvironmentStatus::Publishing => 8,
            EnvironmentStatus::InGrace => 9,
            EnvironmentStatus::AllocationScheduledNoRun => 10,
            EnvironmentStatus::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentExtended {
    pub id: String,
    pub name: String,
    pub status_code: EnvironmentStatus,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub vms: Vec<Vm>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vm {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub fqdn: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub cpu_count: u32,
    #[serde(default, rename = "memorySizeMb")]
    pub memory_size_mb: u32,
    #[serde(default, rename = "diskSizeGb")]
    pub disk_size_gb: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentRequest {
    pub environment: EnvironmentRequest,
    pub items_cart: Vec<VmItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentRequest {
    pub name: String,
    pub description: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    pub region_id: String,
}

/// A VM line item cloned from a template VM.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmItem {
    #[serde(rename = "type")]
    pub item_type: u8,
    pub name: String,
    pub template_vm_id: String,
    pub description: String,
}

impl VmItem {
    /// Item type code for "VM from template".
    pub const TEMPLATE_VM: u8 = 2;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentResponse {
    pub environment_id: String,
}

// ── VMs ─────────────────────────────────────────────────────────────

/// Hardware edit. Unset fields are left untouched by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditVmHardwareRequest {
    pub vm_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_cpus: Option<u32>,
    #[serde(rename = "memorySizeMBs", skip_serializing_if = "Option::is_none")]
    pub memory_size_mbs: Option<u32>,
    #[serde(rename = "diskSizeGBs", skip_serializing_if = "Option::is_none")]
    pub disk_size_gbs: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditVmHardwareResponse {
    #[serde(default)]
    pub conflicts_found: bool,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

use csm_driver::{
    DriverConfig, Machine, MachineRecord, MachineState, RegionTable, TemplateRef, environment_name,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ── Requests ───────────────────────────────────────────────────────

/// Create body. Unset fields fall back to the server's configuration.
#[derive(Debug, Default, Deserialize)]
pub struct CreateMachineRequest {
    pub name: String,
    pub template_id: Option<String>,
    pub template_name: Option<String>,
    pub region: Option<String>,
    pub project_id: Option<String>,
    pub expiry_days: Option<u32>,
    pub cpus: Option<u32>,
    pub memory_mb: Option<u32>,
    pub disk_gb: Option<u32>,
}

impl CreateMachineRequest {
    /// Docker-machine naming: alphanumeric first, then alphanumerics, `-` or `.`.
    pub fn validate_name(&self) -> Result<(), ApiError> {
        let mut chars = self.name.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if valid {
            Ok(())
        } else {
            Err(ApiError::BadRequest(format!(
                "invalid machine name '{}'",
                self.name
            )))
        }
    }

    /// Server defaults with this request's overrides applied.
    pub fn apply(&self, base: &DriverConfig, regions: &RegionTable) -> Result<DriverConfig, ApiError> {
        let mut config = base.clone();

        config.template = match (&self.template_id, &self.template_name) {
            (Some(_), Some(_)) => {
                return Err(ApiError::BadRequest(
                    "template_id and template_name are mutually exclusive".into(),
                ));
            }
            (Some(id), None) => TemplateRef::Id(id.clone()),
            (None, Some(name)) => TemplateRef::Name(name.clone()),
            (None, None) => config.template,
        };
        if let Some(region) = &self.region {
            config.region = regions.resolve(region)?;
        }
        if self.project_id.is_some() {
            config.project_id.clone_from(&self.project_id);
        }
        if let Some(days) = self.expiry_days {
            config.expiry_days = (days > 0).then_some(days);
        }
        if let Some(cpus) = self.cpus {
            config.hardware.cpus = cpus;
        }
        if let Some(memory_mb) = self.memory_mb {
            config.hardware.memory_mb = memory_mb;
        }
        if let Some(disk_gb) = self.disk_gb {
            config.hardware.disk_gb = disk_gb;
        }
        Ok(config)
    }
}

// ── Responses ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MachineResponse {
    pub name: String,
    pub environment_name: String,
    pub environment_id: Option<String>,
    pub vm_id: Option<String>,
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<MachineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision_step: Option<String>,
}

impl From<&MachineRecord> for MachineResponse {
    fn from(record: &MachineRecord) -> Self {
        Self {
            name: record.machine_name.clone(),
            environment_name: environment_name(&record.machine_name),
            environment_id: record.environment_id.as_ref().map(|id| id.0.clone()),
            vm_id: record.vm_id.as_ref().map(|id| id.0.clone()),
            hostname: record.hostname.clone(),
            state: None,
            provision_step: None,
        }
    }
}

impl MachineResponse {
    pub fn with_state(mut self, state: MachineState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn provisioned(machine: &Machine) -> Self {
        Self {
            provision_step: Some(machine.provision_step().to_string()),
            ..Self::from(machine.record())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub name: String,
    pub state: MachineState,
}

#[derive(Debug, Serialize)]
pub struct UrlResponse {
    pub url: String,
}

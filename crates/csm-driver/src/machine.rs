use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::bootstrap::Bootstrap;
use crate::config::DriverConfig;
use crate::provision::ProvisionStep;
use crate::types::{EnvironmentId, VmId, VmRecord};
use crate::{EnvironmentClient, Error, Result};

const ENVIRONMENT_PREFIX: &str = "docker-machine-";

/// Environment name used to create and look up a machine's environment.
pub fn environment_name(machine_name: &str) -> String {
    format!("{ENVIRONMENT_PREFIX}{machine_name}")
}

/// Persisted per-machine state.
///
/// `hostname`, `password` and `vm_id` are filled once, from the first ready
/// snapshot, and never refreshed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub machine_name: String,
    #[serde(default)]
    pub environment_id: Option<EnvironmentId>,
    #[serde(default)]
    pub vm_id: Option<VmId>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl MachineRecord {
    pub fn new(machine_name: impl Into<String>) -> Self {
        Self {
            machine_name: machine_name.into(),
            ..Default::default()
        }
    }
}

/// One docker-machine host backed by one CloudShare environment.
///
/// Operations take `&mut self`; the caller serializes access per machine.
pub struct Machine {
    pub(crate) client: Arc<dyn EnvironmentClient>,
    pub(crate) bootstrap: Arc<dyn Bootstrap>,
    pub(crate) config: DriverConfig,
    pub(crate) record: MachineRecord,
    pub(crate) step: ProvisionStep,
    pub(crate) cancel: CancellationToken,
}

impl Machine {
    pub fn new(
        record: MachineRecord,
        config: DriverConfig,
        client: Arc<dyn EnvironmentClient>,
        bootstrap: Arc<dyn Bootstrap>,
    ) -> Self {
        Self {
            client,
            bootstrap,
            config,
            record,
            step: ProvisionStep::Idle,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort polling loops when `token` fires. Checked between polls only.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn name(&self) -> &str {
        &self.record.machine_name
    }

    pub fn environment_name(&self) -> String {
        environment_name(&self.record.machine_name)
    }

    pub fn record(&self) -> &MachineRecord {
        &self.record
    }

    pub fn provision_step(&self) -> ProvisionStep {
        self.step
    }

    pub(crate) fn environment_id(&self) -> Result<EnvironmentId> {
        self.record
            .environment_id
            .clone()
            .ok_or_else(|| Error::NotCreated(self.record.machine_name.clone()))
    }

    /// Fill the connection cache from `vm` unless it is already populated.
    pub(crate) fn remember_vm(&mut self, vm: &VmRecord) {
        if self.record.hostname.is_some() {
            return;
        }
        self.record.hostname = Some(vm.hostname.clone());
        self.record.password = vm.password.clone();
        self.record.vm_id = Some(vm.id.clone());
    }
}

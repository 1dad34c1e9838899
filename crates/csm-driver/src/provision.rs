use std::fmt;

use cloudshare_api::{PolicyAction, TemplateFilter};
use tracing::{debug, error, info};

use crate::bootstrap::BootstrapTarget;
use crate::config::TemplateRef;
use crate::machine::Machine;
use crate::types::{EnvironmentSpec, PolicySpec, VmLineItem};
use crate::{Error, Result};

const ENVIRONMENT_DESCRIPTION: &str = "Docker-Machine Environment";
const VM_NAME: &str = "docker-machine";
const VM_DESCRIPTION: &str = "Docker-Machine VM";
/// Minutes an environment may stay past its policy threshold before suspension.
pub const POLICY_GRACE_MINUTES: u32 = 60;

/// Name of the expiry policy shared by every machine with the same expiry.
pub fn expiry_policy_name(days: u32) -> String {
    format!("docker-machine-policy-delete-after-{days}-days")
}

/// Where `create` is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Idle,
    CheckingExisting,
    ResolvingTemplate,
    Creating,
    WaitingReady,
    ReconcilingHardware,
    Bootstrapping,
    Done,
    Errored,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CheckingExisting => "checking-existing",
            Self::ResolvingTemplate => "resolving-template",
            Self::Creating => "creating",
            Self::WaitingReady => "waiting-ready",
            Self::ReconcilingHardware => "reconciling-hardware",
            Self::Bootstrapping => "bootstrapping",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

impl Machine {
    /// Create the environment and bring the machine to a usable state.
    ///
    /// Stops at the first failing step. Nothing created remotely is rolled
    /// back; the environment id stays in the record for diagnosis.
    pub async fn create(&mut self) -> Result<()> {
        match self.provision().await {
            Ok(()) => {
                self.enter(ProvisionStep::Done);
                Ok(())
            }
            Err(e) => {
                error!(
                    machine = %self.name(),
                    step = %self.step,
                    environment_id = ?self.record.environment_id,
                    error = %e,
                    "provisioning failed"
                );
                self.step = ProvisionStep::Errored;
                Err(e)
            }
        }
    }

    async fn provision(&mut self) -> Result<()> {
        self.enter(ProvisionStep::CheckingExisting);
        let env_name = self.environment_name();
        if let Some(existing) = self.client.find_environment_by_name(&env_name).await? {
            return Err(Error::AlreadyExists {
                machine: self.name().to_string(),
                environment: existing.name,
                environment_id: existing.id,
            });
        }

        self.enter(ProvisionStep::ResolvingTemplate);
        let template_vm_id = self.resolve_template().await?;

        self.enter(ProvisionStep::Creating);
        let project_id = self.resolve_project().await?;
        let policy_id = match self.config.expiry_days {
            Some(days) => Some(self.ensure_expiry_policy(&project_id, days).await?),
            None => None,
        };

        info!(
            machine = %self.name(),
            template = %template_vm_id,
            region = %self.config.region.name,
            "creating environment from template"
        );
        let spec = EnvironmentSpec {
            name: env_name,
            description: ENVIRONMENT_DESCRIPTION.into(),
            project_id,
            region_id: self.config.region.id.clone(),
            policy_id,
            vm: VmLineItem {
                name: VM_NAME.into(),
                description: VM_DESCRIPTION.into(),
                template_vm_id,
            },
        };
        let env_id = self.client.create_environment_from_template(&spec).await?;
        info!(machine = %self.name(), environment_id = %env_id, "environment created");
        self.record.environment_id = Some(env_id);

        self.enter(ProvisionStep::WaitingReady);
        let profile = self.config.timeouts.create;
        let vm = self.wait_until_ready(profile).await?;

        self.enter(ProvisionStep::ReconcilingHardware);
        let requested = self.config.hardware;
        self.reconcile_hardware(requested).await?;

        self.enter(ProvisionStep::Bootstrapping);
        let target = BootstrapTarget {
            hostname: self.record.hostname.clone().unwrap_or(vm.hostname),
            port: self.config.ssh_port,
            username: self.config.ssh_user.clone(),
            password: self.record.password.clone(),
            key_path: self.config.ssh_key_path(self.name()),
        };
        self.bootstrap.install_credential(&target).await?;

        Ok(())
    }

    fn enter(&mut self, step: ProvisionStep) {
        debug!(machine = %self.name(), from = %self.step, to = %step, "provision step");
        self.step = step;
    }

    async fn resolve_template(&self) -> Result<String> {
        match &self.config.template {
            TemplateRef::Id(id) => Ok(id.clone()),
            TemplateRef::Name(name) => {
                let filter = TemplateFilter {
                    project_id: self.config.project_id.clone(),
                    region_id: Some(self.config.region.id.clone()),
                };
                let templates = self.client.list_templates(&filter).await?;
                let found = templates
                    .into_iter()
                    .find(|t| t.name == *name)
                    .ok_or_else(|| Error::TemplateNotFound(name.clone()))?;
                debug!(template = %name, id = %found.id, "template resolved");
                Ok(found.id)
            }
        }
    }

    async fn resolve_project(&self) -> Result<String> {
        if let Some(id) = &self.config.project_id {
            return Ok(id.clone());
        }
        let projects = self.client.list_projects().await?;
        let first = projects
            .into_iter()
            .next()
            .ok_or(Error::NoProjectsAvailable)?;
        debug!(project_id = %first.id, "using first project");
        Ok(first.id)
    }

    async fn ensure_expiry_policy(&self, project_id: &str, days: u32) -> Result<String> {
        let name = expiry_policy_name(days);
        let policies = self.client.list_policies(project_id).await?;
        if let Some(existing) = policies.into_iter().find(|p| p.name == name) {
            debug!(policy = %name, id = %existing.id, "reusing expiry policy");
            return Ok(existing.id);
        }

        let spec = PolicySpec {
            name: name.clone(),
            project_id: project_id.to_string(),
            expiry_days: days,
            action: PolicyAction::Suspend,
            grace_period_minutes: POLICY_GRACE_MINUTES,
        };
        let created = self.client.create_policy(&spec).await?;
        info!(policy = %name, id = %created.id, "expiry policy created");
        Ok(created.id)
    }
}

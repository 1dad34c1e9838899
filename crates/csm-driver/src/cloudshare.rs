//! [`EnvironmentClient`] backed by the CloudShare REST API.

use async_trait::async_trait;
use cloudshare_api::{
    CloudShareClient, CreateEnvironmentRequest, CreatePolicyRequest, EditVmHardwareRequest,
    Environment, EnvironmentExtended, EnvironmentRequest, Policy, Project, Template,
    TemplateFilter, Vm, VmItem,
};
use tracing::debug;

use crate::config::Credentials;
use crate::types::{
    EnvironmentId, EnvironmentSnapshot, EnvironmentSpec, HardwareChange, PolicySpec, VmId,
    VmRecord,
};
use crate::{EnvironmentClient, Error, Result};

/// Build the production client from configured credentials.
pub fn client(credentials: &Credentials) -> CloudShareClient {
    CloudShareClient::new(&credentials.api_id, &credentials.api_key)
}

#[async_trait]
impl EnvironmentClient for CloudShareClient {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(CloudShareClient::list_projects(self).await?)
    }

    async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        Ok(CloudShareClient::list_templates(self, filter).await?)
    }

    async fn list_policies(&self, project_id: &str) -> Result<Vec<Policy>> {
        Ok(CloudShareClient::list_policies(self, project_id).await?)
    }

    async fn create_policy(&self, spec: &PolicySpec) -> Result<Policy> {
        let req = CreatePolicyRequest {
            name: spec.name.clone(),
            project_id: spec.project_id.clone(),
            lifetime_days: spec.expiry_days,
            lifetime_action: spec.action,
            runtime_action: spec.action,
            grace_period_minutes: spec.grace_period_minutes,
        };
        Ok(CloudShareClient::create_policy(self, &req).await?)
    }

    async fn find_environment_by_name(&self, name: &str) -> Result<Option<Environment>> {
        let envs = self.list_environments().await?;
        debug!(count = envs.len(), name, "searching environments by name");
        Ok(envs.into_iter().find(|env| env.name == name))
    }

    async fn create_environment_from_template(
        &self,
        spec: &EnvironmentSpec,
    ) -> Result<EnvironmentId> {
        let resp = CloudShareClient::create_environment_from_template(self, &create_request(spec))
            .await?;
        Ok(EnvironmentId(resp.environment_id))
    }

    async fn get_environment_extended(&self, id: &EnvironmentId) -> Result<EnvironmentSnapshot> {
        let env = CloudShareClient::get_environment_extended(self, &id.0).await?;
        Ok(snapshot(env))
    }

    async fn edit_vm_hardware(&self, vm: &VmId, change: &HardwareChange) -> Result<()> {
        let req = EditVmHardwareRequest {
            vm_id: vm.0.clone(),
            num_cpus: change.cpus,
            memory_size_mbs: change.memory_mb,
            disk_size_gbs: change.disk_gb,
        };
        let resp = CloudShareClient::edit_vm_hardware(self, &req).await?;
        if resp.conflicts_found {
            return Err(Error::HardwareConflict {
                vm_id: vm.clone(),
                conflicts: resp.conflicts,
            });
        }
        Ok(())
    }

    async fn suspend(&self, id: &EnvironmentId) -> Result<()> {
        Ok(self.suspend_environment(&id.0).await?)
    }

    async fn resume(&self, id: &EnvironmentId) -> Result<()> {
        Ok(self.resume_environment(&id.0).await?)
    }

    async fn reboot_vm(&self, vm: &VmId) -> Result<()> {
        Ok(CloudShareClient::reboot_vm(self, &vm.0).await?)
    }

    async fn delete(&self, id: &EnvironmentId) -> Result<()> {
        Ok(self.delete_environment(&id.0).await?)
    }
}

fn create_request(spec: &EnvironmentSpec) -> CreateEnvironmentRequest {
    CreateEnvironmentRequest {
        environment: EnvironmentRequest {
            name: spec.name.clone(),
            description: spec.description.clone(),
            project_id: spec.project_id.clone(),
            policy_id: spec.policy_id.clone(),
            region_id: spec.region_id.clone(),
        },
        items_cart: vec![VmItem {
            item_type: VmItem::TEMPLATE_VM,
            name: spec.vm.name.clone(),
            template_vm_id: spec.vm.template_vm_id.clone(),
            description: spec.vm.description.clone(),
        }],
    }
}

fn snapshot(env: EnvironmentExtended) -> EnvironmentSnapshot {
    EnvironmentSnapshot {
        status: env.status_code,
        vms: env.vms.into_iter().map(vm_record).collect(),
    }
}

fn vm_record(vm: Vm) -> VmRecord {
    VmRecord {
        id: VmId(vm.id),
        hostname: vm.fqdn,
        password: vm.password,
        status_text: vm.status_text,
        cpus: vm.cpu_count,
        memory_mb: vm.memory_size_mb,
        disk_gb: vm.disk_size_gb,
    }
}

//! In-memory CloudShare stand-in for lifecycle tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cloudshare_api::{
    Environment, EnvironmentStatus, Policy, Project, StatusCode, Template, TemplateFilter,
};

use crate::bootstrap::{Bootstrap, BootstrapTarget};
use crate::config::{Credentials, DriverConfig, PollProfile, Region, TemplateRef, Timeouts};
use crate::machine::{Machine, MachineRecord};
use crate::types::{
    EnvironmentId, EnvironmentSnapshot, EnvironmentSpec, HardwareChange, HardwareSpec, PolicySpec,
    VmId, VmRecord,
};
use crate::{EnvironmentClient, Error, Result};

/// One scripted answer to `get_environment_extended`.
#[derive(Clone)]
pub enum Scripted {
    Snapshot(EnvironmentSnapshot),
    /// A 503 from the API.
    Fail,
}

#[derive(Default)]
struct FakeState {
    projects: Vec<Project>,
    templates: Vec<Template>,
    policies: Vec<Policy>,
    environments: Vec<Environment>,
    extended: VecDeque<Scripted>,
    extended_calls: u32,
    created: Vec<EnvironmentSpec>,
    created_policies: Vec<PolicySpec>,
    template_filters: Vec<TemplateFilter>,
    hardware_edits: Vec<(VmId, HardwareChange)>,
    suspended: Vec<EnvironmentId>,
    resumed: Vec<EnvironmentId>,
    reboots: Vec<VmId>,
    deleted: Vec<EnvironmentId>,
}

/// Stateful fake: created environments become visible to name lookups, and
/// extended-status answers are served from a script whose last entry repeats.
#[derive(Clone, Default)]
pub struct FakeCloudShare {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCloudShare {
    pub fn new() -> Self {
        let fake = Self::default();
        {
            let mut state = fake.lock();
            state.projects = vec![project("PR1")];
            state.templates = vec![
                template("VMT1", "Docker 16"),
                template("VMT2", "Docker 14"),
            ];
        }
        fake
    }

    pub fn script(self, answers: impl IntoIterator<Item = Scripted>) -> Self {
        self.lock().extended.extend(answers);
        self
    }

    pub fn with_projects(self, projects: Vec<Project>) -> Self {
        self.lock().projects = projects;
        self
    }

    pub fn with_policies(self, policies: Vec<Policy>) -> Self {
        self.lock().policies = policies;
        self
    }

    pub fn with_environment(self, id: &str, name: &str) -> Self {
        self.lock().environments.push(environment(id, name));
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn extended_calls(&self) -> u32 {
        self.lock().extended_calls
    }

    pub fn created(&self) -> Vec<EnvironmentSpec> {
        self.lock().created.clone()
    }

    pub fn created_policies(&self) -> Vec<PolicySpec> {
        self.lock().created_policies.clone()
    }

    pub fn template_filters(&self) -> Vec<TemplateFilter> {
        self.lock().template_filters.clone()
    }

    pub fn hardware_edits(&self) -> Vec<(VmId, HardwareChange)> {
        self.lock().hardware_edits.clone()
    }

    pub fn suspended(&self) -> Vec<EnvironmentId> {
        self.lock().suspended.clone()
    }

    pub fn resumed(&self) -> Vec<EnvironmentId> {
        self.lock().resumed.clone()
    }

    pub fn reboots(&self) -> Vec<VmId> {
        self.lock().reboots.clone()
    }

    pub fn deleted(&self) -> Vec<EnvironmentId> {
        self.lock().deleted.clone()
    }
}

pub fn transient_error() -> Error {
    Error::Api(cloudshare_api::Error::Api {
        endpoint: "get environment extended",
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: "try again".into(),
    })
}

#[async_trait]
impl EnvironmentClient for FakeCloudShare {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.lock().projects.clone())
    }

    async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>> {
        let mut state = self.lock();
        state.template_filters.push(filter.clone());
        Ok(state.templates.clone())
    }

    async fn list_policies(&self, project_id: &str) -> Result<Vec<Policy>> {
        Ok(self
            .lock()
            .policies
            .iter()
            .filter(|p| p.project_id.as_deref() == Some(project_id))
            .cloned()
            .collect())
    }

    async fn create_policy(&self, spec: &PolicySpec) -> Result<Policy> {
        let mut state = self.lock();
        state.created_policies.push(spec.clone());
        let policy = Policy {
            id: format!("PO{}", state.policies.len() + 1),
            name: spec.name.clone(),
            project_id: Some(spec.project_id.clone()),
        };
        state.policies.push(policy.clone());
        Ok(policy)
    }

    async fn find_environment_by_name(&self, name: &str) -> Result<Option<Environment>> {
        Ok(self
            .lock()
            .environments
            .iter()
            .find(|env| env.name == name)
            .cloned())
    }

    async fn create_environment_from_template(
        &self,
        spec: &EnvironmentSpec,
    ) -> Result<EnvironmentId> {
        let mut state = self.lock();
        state.created.push(spec.clone());
        let id = format!("EN{}", state.created.len());
        state.environments.push(environment(&id, &spec.name));
        Ok(EnvironmentId(id))
    }

    async fn get_environment_extended(&self, _id: &EnvironmentId) -> Result<EnvironmentSnapshot> {
        let mut state = self.lock();
        state.extended_calls += 1;
        let answer = if state.extended.len() > 1 {
            state.extended.pop_front()
        } else {
            state.extended.front().cloned()
        };
        match answer {
            Some(Scripted::Snapshot(snapshot)) => Ok(snapshot),
            Some(Scripted::Fail) | None => Err(transient_error()),
        }
    }

    async fn edit_vm_hardware(&self, vm: &VmId, change: &HardwareChange) -> Result<()> {
        self.lock().hardware_edits.push((vm.clone(), *change));
        Ok(())
    }

    async fn suspend(&self, id: &EnvironmentId) -> Result<()> {
        self.lock().suspended.push(id.clone());
        Ok(())
    }

    async fn resume(&self, id: &EnvironmentId) -> Result<()> {
        self.lock().resumed.push(id.clone());
        Ok(())
    }

    async fn reboot_vm(&self, vm: &VmId) -> Result<()> {
        self.lock().reboots.push(vm.clone());
        Ok(())
    }

    async fn delete(&self, id: &EnvironmentId) -> Result<()> {
        let mut state = self.lock();
        state.deleted.push(id.clone());
        state.environments.retain(|env| env.id != id.0);
        Ok(())
    }
}

/// Bootstrap that records its targets instead of touching SSH.
#[derive(Clone, Default)]
pub struct RecordingBootstrap {
    targets: Arc<Mutex<Vec<BootstrapTarget>>>,
}

impl RecordingBootstrap {
    pub fn targets(&self) -> Vec<BootstrapTarget> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bootstrap for RecordingBootstrap {
    async fn install_credential(&self, target: &BootstrapTarget) -> Result<()> {
        self.targets.lock().unwrap().push(target.clone());
        Ok(())
    }
}

pub fn project(id: &str) -> Project {
    Project {
        id: id.into(),
        name: format!("project {id}"),
        is_active: Some(true),
    }
}

pub fn template(id: &str, name: &str) -> Template {
    Template {
        id: id.into(),
        name: name.into(),
        description: None,
        project_id: None,
        region_id: None,
    }
}

pub fn environment(id: &str, name: &str) -> Environment {
    Environment {
        id: id.into(),
        name: name.into(),
        project_id: Some("PR1".into()),
        status: None,
    }
}

pub fn vm(status_text: &str, cpus: u32, memory_mb: u32, disk_gb: u32) -> VmRecord {
    VmRecord {
        id: VmId("MC1".into()),
        hostname: "uvm1.cloudshare.test".into(),
        password: Some("pw".into()),
        status_text: status_text.into(),
        cpus,
        memory_mb,
        disk_gb,
    }
}

pub fn snapshot(status: EnvironmentStatus, vms: Vec<VmRecord>) -> EnvironmentSnapshot {
    EnvironmentSnapshot {
        status,
        vms,
    }
}

pub fn test_config() -> DriverConfig {
    let fast = PollProfile::new(Duration::from_secs(30), Duration::from_secs(5));
    DriverConfig {
        credentials: Credentials {
            api_id: "id".into(),
            api_key: "key".into(),
        },
        template: TemplateRef::Id("VMT1".into()),
        region: Region {
            name: "Lab".into(),
            id: "RE-LAB".into(),
        },
        project_id: None,
        expiry_days: None,
        hardware: HardwareSpec::default(),
        ssh_user: "sysadmin".into(),
        ssh_port: 22,
        docker_port: 2376,
        store_path: PathBuf::from("/tmp/csm-test"),
        timeouts: Timeouts {
            create: fast,
            hardware: fast,
            restart: fast,
        },
    }
}

pub fn machine_with(fake: &FakeCloudShare, record: MachineRecord) -> Machine {
    machine_with_config(fake, record, test_config(), RecordingBootstrap::default())
}

pub fn machine_with_config(
    fake: &FakeCloudShare,
    record: MachineRecord,
    config: DriverConfig,
    bootstrap: RecordingBootstrap,
) -> Machine {
    Machine::new(record, config, Arc::new(fake.clone()), Arc::new(bootstrap))
}

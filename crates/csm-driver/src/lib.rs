//! Lifecycle driver for docker-machine style hosts backed by CloudShare
//! environments.
//!
//! A [`Machine`] owns one environment: it creates it from a template, waits
//! for the environment and its VM to come up, reconciles hardware, installs
//! an SSH credential, and afterwards starts, stops, restarts and removes it.
//! All provider calls go through the [`EnvironmentClient`] seam.

pub mod bootstrap;
pub mod cloudshare;
pub mod config;
mod hardware;
mod lifecycle;
mod machine;
mod poll;
mod provision;
pub mod state;
#[cfg(test)]
mod testing;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use cloudshare_api::{Environment, Policy, Project, Template, TemplateFilter};

#[cfg(test)]
use mockall::automock;

pub use bootstrap::{Bootstrap, BootstrapTarget, SshKeyBootstrap};
pub use config::{Credentials, DriverConfig, PollProfile, Region, RegionTable, TemplateRef, Timeouts};
pub use machine::{Machine, MachineRecord, environment_name};
pub use provision::ProvisionStep;
pub use state::{MachineState, translate};
pub use types::{
    EnvironmentId, EnvironmentSnapshot, EnvironmentSpec, HardwareChange, HardwareSpec, PolicySpec,
    VmId, VmLineItem, VmRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cloudshare error: {0}")]
    Api(#[from] cloudshare_api::Error),

    #[error("missing required setting: {0}")]
    MissingConfig(String),

    #[error("invalid setting: {0}")]
    InvalidConfig(String),

    #[error("unknown region: {0}")]
    UnknownRegion(String),

    #[error("no template named '{0}'")]
    TemplateNotFound(String),

    #[error("account has no projects to create environments in")]
    NoProjectsAvailable,

    #[error("environment '{environment}' already exists for machine '{machine}' ({environment_id})")]
    AlreadyExists {
        machine: String,
        environment: String,
        environment_id: String,
    },

    #[error(
        "cannot shrink disk of vm {vm_id}: current size is {current_gb}GB, requested {requested_gb}GB"
    )]
    ShrinkNotAllowed {
        vm_id: VmId,
        current_gb: u32,
        requested_gb: u32,
    },

    #[error(
        "environment {environment_id} not ready after {}s (status {status}, vm status {vm_status})",
        .waited.as_secs()
    )]
    NotReady {
        environment_id: EnvironmentId,
        waited: Duration,
        status: String,
        vm_status: String,
    },

    #[error("wait on environment {environment_id} was cancelled")]
    Cancelled { environment_id: EnvironmentId },

    #[error("unexpected status '{status}' for vm {vm_id}")]
    UnexpectedVmStatus { vm_id: VmId, status: String },

    #[error("hardware edit on vm {vm_id} rejected: {}", .conflicts.join("; "))]
    HardwareConflict { vm_id: VmId, conflicts: Vec<String> },

    #[error("environment {0} contains no vms")]
    NoVms(EnvironmentId),

    #[error("machine '{0}' has no environment yet")]
    NotCreated(String),

    #[error("kill is not supported for CloudShare machines, use stop, rm or restart")]
    KillUnsupported,

    #[error("bootstrap failed: {0}")]
    Bootstrap(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Provider operations the lifecycle depends on.
///
/// Production code uses the [`cloudshare_api::CloudShareClient`] impl in
/// [`cloudshare`]; tests substitute fakes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EnvironmentClient: Send + Sync + 'static {
    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn list_templates(&self, filter: &TemplateFilter) -> Result<Vec<Template>>;

    async fn list_policies(&self, project_id: &str) -> Result<Vec<Policy>>;

    async fn create_policy(&self, spec: &PolicySpec) -> Result<Policy>;

    /// Exact-name lookup. `None` when no environment carries the name.
    async fn find_environment_by_name(&self, name: &str) -> Result<Option<Environment>>;

    async fn create_environment_from_template(&self, spec: &EnvironmentSpec)
        -> Result<EnvironmentId>;

    async fn get_environment_extended(&self, id: &EnvironmentId) -> Result<EnvironmentSnapshot>;

    async fn edit_vm_hardware(&self, vm: &VmId, change: &HardwareChange) -> Result<()>;

    async fn suspend(&self, id: &EnvironmentId) -> Result<()>;

    async fn resume(&self, id: &EnvironmentId) -> Result<()>;

    async fn reboot_vm(&self, vm: &VmId) -> Result<()>;

    async fn delete(&self, id: &EnvironmentId) -> Result<()>;
}

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::types::HardwareSpec;
use crate::{Error, Result};

/// Template used when neither an id nor a name is configured.
pub const DEFAULT_TEMPLATE_ID: &str = "VMQ5ZA0uXzxxGyQfYdS5RxaQ2";
pub const DEFAULT_REGION: &str = "Miami";
pub const DEFAULT_SSH_USER: &str = "sysadmin";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_DOCKER_PORT: u16 = 2376;
pub const DEFAULT_STORE_PATH: &str = "./machines";

/// API identity pair. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// How the VM template is referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Id(String),
    /// Display name, resolved by exact match before creation.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub id: String,
}

/// Region name to id table.
///
/// Regions change rarely, so the table is shipped rather than fetched per
/// create. Callers can replace it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTable(HashMap<String, String>);

impl RegionTable {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn resolve(&self, name: &str) -> Result<Region> {
        self.0
            .get(name)
            .map(|id| Region {
                name: name.to_string(),
                id: id.clone(),
            })
            .ok_or_else(|| Error::UnknownRegion(name.to_string()))
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new([
            ("Miami".to_string(), "REKolD1-ab84YIxODeMGob9A2".to_string()),
            (
                "VMware_Singapore".to_string(),
                "RE0YOUV7_lTmgb0X8D1UjM3g2".to_string(),
            ),
            (
                "VMWare_Amsterdam".to_string(),
                "RE6OEZs-y-mkK1mEMGwIgZiw2".to_string(),
            ),
        ])
    }
}

/// Time budget and cadence for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollProfile {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollProfile {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Polling profiles for each waiting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Waiting for a freshly created environment.
    pub create: PollProfile,
    /// Waiting after a hardware edit.
    pub hardware: PollProfile,
    /// Waiting for a VM reboot to finish.
    pub restart: PollProfile,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: PollProfile::new(Duration::from_secs(600), Duration::from_secs(5)),
            hardware: PollProfile::new(Duration::from_secs(300), Duration::from_secs(5)),
            restart: PollProfile::new(Duration::from_secs(300), Duration::from_secs(3)),
        }
    }
}

/// Settings shared by every machine the driver manages.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub credentials: Credentials,
    pub template: TemplateRef,
    pub region: Region,
    pub project_id: Option<String>,
    pub expiry_days: Option<u32>,
    pub hardware: HardwareSpec,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub docker_port: u16,
    pub store_path: PathBuf,
    pub timeouts: Timeouts,
}

impl DriverConfig {
    /// Load from env vars:
    ///
    /// - `CLOUDSHARE_API_ID`, `CLOUDSHARE_API_KEY` (required)
    /// - `CLOUDSHARE_VM_TEMPLATE` or `CLOUDSHARE_VM_TEMPLATE_NAME` (not both)
    /// - `CLOUDSHARE_REGION_NAME` (default: `"Miami"`)
    /// - `CLOUDSHARE_PROJECT_ID`, `CLOUDSHARE_EXPIRY_DAYS` (optional)
    /// - `CLOUDSHARE_CPUS`, `CLOUDSHARE_RAM_MB`, `CLOUDSHARE_DISK_GB` (0 = unmanaged)
    /// - `CLOUDSHARE_SSH_USER` (default: `"sysadmin"`)
    /// - `CSM_STORE_PATH` (default: `"./machines"`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok(), &RegionTable::default())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F, regions: &RegionTable) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_id = get("CLOUDSHARE_API_ID")
            .ok_or_else(|| Error::MissingConfig("CLOUDSHARE_API_ID".into()))?;
        let api_key = get("CLOUDSHARE_API_KEY")
            .ok_or_else(|| Error::MissingConfig("CLOUDSHARE_API_KEY".into()))?;

        let template = match (get("CLOUDSHARE_VM_TEMPLATE"), get("CLOUDSHARE_VM_TEMPLATE_NAME")) {
            (Some(_), Some(_)) => {
                return Err(Error::InvalidConfig(
                    "CLOUDSHARE_VM_TEMPLATE and CLOUDSHARE_VM_TEMPLATE_NAME are mutually exclusive"
                        .into(),
                ));
            }
            (Some(id), None) => TemplateRef::Id(id),
            (None, Some(name)) => TemplateRef::Name(name),
            (None, None) => TemplateRef::Id(DEFAULT_TEMPLATE_ID.into()),
        };

        let region_name = get("CLOUDSHARE_REGION_NAME").unwrap_or_else(|| DEFAULT_REGION.into());
        let region = regions.resolve(&region_name)?;

        let expiry_days = parse::<u32>(&get, "CLOUDSHARE_EXPIRY_DAYS")?.filter(|d| *d > 0);

        let hardware = HardwareSpec {
            cpus: parse(&get, "CLOUDSHARE_CPUS")?.unwrap_or(0),
            memory_mb: parse(&get, "CLOUDSHARE_RAM_MB")?.unwrap_or(0),
            disk_gb: parse(&get, "CLOUDSHARE_DISK_GB")?.unwrap_or(0),
        };

        Ok(Self {
            credentials: Credentials { api_id, api_key },
            template,
            region,
            project_id: get("CLOUDSHARE_PROJECT_ID"),
            expiry_days,
            hardware,
            ssh_user: get("CLOUDSHARE_SSH_USER").unwrap_or_else(|| DEFAULT_SSH_USER.into()),
            ssh_port: DEFAULT_SSH_PORT,
            docker_port: DEFAULT_DOCKER_PORT,
            store_path: get("CSM_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            timeouts: Timeouts::default(),
        })
    }

    /// Directory holding per-machine state (record, SSH key).
    pub fn machine_dir(&self, machine_name: &str) -> PathBuf {
        self.store_path.join(machine_name)
    }

    pub fn ssh_key_path(&self, machine_name: &str) -> PathBuf {
        self.machine_dir(machine_name).join("id_rsa")
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| Error::InvalidConfig(format!("{key}={raw}")))
        })
        .transpose()
}

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use csm_driver::{Bootstrap, DriverConfig, EnvironmentClient, Machine, MachineRecord, RegionTable};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::store::MachineStore;

/// A machine shared between requests. Operations on one machine run one at
/// a time.
pub type SharedMachine = Arc<Mutex<Machine>>;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub regions: RegionTable,
    pub client: Arc<dyn EnvironmentClient>,
    pub bootstrap: Arc<dyn Bootstrap>,
    pub store: MachineStore,
    pub machines: Arc<Mutex<HashMap<String, SharedMachine>>>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        regions: RegionTable,
        client: Arc<dyn EnvironmentClient>,
        bootstrap: Arc<dyn Bootstrap>,
        shutdown: CancellationToken,
    ) -> Self {
        let store = MachineStore::new(config.driver.store_path.clone());
        Self {
            config,
            regions,
            client,
            bootstrap,
            store,
            machines: Arc::new(Mutex::new(HashMap::new())),
            shutdown,
        }
    }

    fn build(&self, record: MachineRecord, config: DriverConfig) -> Machine {
        Machine::new(record, config, self.client.clone(), self.bootstrap.clone())
            .with_cancellation(self.shutdown.child_token())
    }

    /// Register a brand-new machine. Fails if the name is already known,
    /// in memory or on disk.
    pub async fn register(&self, name: &str, config: DriverConfig) -> Result<SharedMachine, ApiError> {
        if self.store.load(name).await?.is_some() {
            return Err(ApiError::Conflict(format!("machine '{name}' already exists")));
        }

        let mut machines = self.machines.lock().await;
        match machines.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ApiError::Conflict(format!(
                "machine '{name}' already exists"
            ))),
            Entry::Vacant(slot) => {
                let machine = self.build(MachineRecord::new(name), config);
                Ok(slot.insert(Arc::new(Mutex::new(machine))).clone())
            }
        }
    }

    /// Known machine by name, loading its record from the store on first use.
    pub async fn machine(&self, name: &str) -> Result<SharedMachine, ApiError> {
        if let Some(machine) = self.machines.lock().await.get(name) {
            return Ok(machine.clone());
        }

        let record = self.store.load(name).await?.ok_or(ApiError::NotFound)?;
        let machine = self.build(record, self.config.driver.clone());
        let mut machines = self.machines.lock().await;
        Ok(machines
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(machine)))
            .clone())
    }

    pub async fn forget(&self, name: &str) {
        self.machines.lock().await.remove(name);
    }

    pub async fn persist(&self, machine: &Machine) -> Result<(), ApiError> {
        self.store.save(machine.record()).await?;
        Ok(())
    }
}

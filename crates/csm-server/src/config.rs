use std::net::SocketAddr;

use csm_driver::{DriverConfig, Error, RegionTable, Result};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub api_key: String,
    pub driver: DriverConfig,
}

impl AppConfig {
    /// `LISTEN_ADDR`, `CSM_API_KEY` plus everything [`DriverConfig`] reads.
    pub fn from_env(regions: &RegionTable) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), regions)
    }

    pub fn from_lookup<F>(lookup: F, regions: &RegionTable) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into())
            .parse()
            .map_err(|_| Error::InvalidConfig("LISTEN_ADDR must be a socket address".into()))?;
        let api_key = lookup("CSM_API_KEY")
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingConfig("CSM_API_KEY".into()))?;
        let driver = DriverConfig::from_lookup(&lookup, regions)?;

        Ok(Self {
            listen_addr,
            api_key,
            driver,
        })
    }
}

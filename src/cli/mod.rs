//! CLI command implementations.

pub mod disk;
pub mod monit;
pub mod net;
pub mod ssh;
pub mod vitals;

use guest_agent::config::AgentConfig;
use guest_agent::directories::DirProvider;
use guest_agent::net::Networks;
use guest_agent::platform::{Platform, PlatformProvider};
use guest_agent::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Configuration shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: AgentConfig,
}

impl Context {
    /// Load the configuration file (or defaults) and apply overrides.
    pub fn load(path: Option<&Path>, platform: Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => AgentConfig::load(path)?,
            None => AgentConfig::default(),
        };
        if let Some(platform) = platform {
            config.platform = platform;
        }
        Ok(Self { config })
    }

    pub fn dirs(&self) -> DirProvider {
        DirProvider::new(&self.config.base_dir)
    }

    /// Build the provider and pick the configured platform.
    ///
    /// The provider is returned too; dropping it stops stats collection.
    pub fn platform(&self) -> Result<(PlatformProvider, Arc<dyn Platform>)> {
        let provider =
            PlatformProvider::with_defaults(self.dirs(), self.config.options.clone())?;
        let platform = provider.get(&self.config.platform)?;
        Ok((provider, platform))
    }
}

/// Read a networks document (JSON object keyed by network name).
pub fn load_networks(path: &Path) -> Result<Networks> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::config("load networks", format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| Error::config("parse networks", format!("{}: {}", path.display(), e)))
}

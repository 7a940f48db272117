use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};
use texter_core::Field;
use texter_server::{FailurePolicy, SyncPolicy};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/texter.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Label file location.
    pub store_path: PathBuf,
    /// Worlds loaded at startup, in id order.
    pub worlds: Vec<String>,
    /// World used when a command does not name one.
    pub default_world: String,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_filter: String,
    pub sync: SyncSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSection {
    pub rebroadcast_after_world_rollback: bool,
    /// Per-field failure policy, e.g. `title = "rollback"`.
    pub policies: BTreeMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/labels.txlb"),
            worlds: vec!["world".to_string(), "nether".to_string(), "the_end".to_string()],
            default_world: "world".to_string(),
            log_filter: "info".to_string(),
            sync: SyncSection::default(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            rebroadcast_after_world_rollback: SyncPolicy::default()
                .rebroadcast_after_world_rollback,
            policies: BTreeMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ServerConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ServerConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else if path != Path::new(DEFAULT_CONFIG_PATH) {
                    warn!("Config not found at {}. Using defaults", path.display());
                }
                ServerConfig::default()
            }
        }
    }

    /// Save configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }

    /// Build the synchronizer policy. Unknown field or policy names are errors.
    pub fn sync_policy(&self) -> Result<SyncPolicy> {
        let mut policy = SyncPolicy::default()
            .with_rebroadcast_after_world_rollback(self.sync.rebroadcast_after_world_rollback);
        for (field_name, policy_name) in &self.sync.policies {
            let Some(field) = Field::parse(field_name) else {
                bail!("unknown label field `{field_name}` in [sync.policies]");
            };
            let Some(failure) = FailurePolicy::parse(policy_name) else {
                bail!("unknown failure policy `{policy_name}` for `{field_name}`");
            };
            policy = policy.with_failure_policy(field, failure);
        }
        Ok(policy)
    }
}

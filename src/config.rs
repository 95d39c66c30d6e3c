//! Server configuration.

use crate::accounts::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotConfig {
    pub store_name: String,
    pub listen_addr: String,
    pub database_path: PathBuf,
    pub session_ttl_secs: i64,
    pub max_payload_size: usize,
    /// Optional JSON file of catalog entries loaded when the catalog is
    /// empty.
    pub seed_path: Option<PathBuf>,
    /// Account provisioned when the credential store is empty, so the
    /// maintenance surface is reachable on a fresh install.
    pub bootstrap: Option<BootstrapAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAccount {
    pub username: String,
    pub password: String,
    #[serde(default = "default_algorithm")]
    pub hash_algorithm: HashAlgorithm,
    #[serde(default = "default_rehash_count")]
    pub rehash_count: u32,
}

fn default_algorithm() -> HashAlgorithm {
    HashAlgorithm::Sha512
}

fn default_rehash_count() -> u32 {
    64
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            store_name: "Game Depot".to_string(),
            listen_addr: "127.0.0.1:8640".to_string(),
            database_path: PathBuf::from("depot.db"),
            session_ttl_secs: 86_400,
            max_payload_size: 65_536,
            seed_path: None,
            bootstrap: None,
        }
    }
}

impl DepotConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let cfg = DepotConfig::default();
        assert_eq!(cfg.listen_addr, "127.0.0.1:8640");
        assert!(cfg.seed_path.is_none());
        assert!(cfg.bootstrap.is_none());
    }

    #[test]
    fn load_accepts_partial_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "store_name = \"Drauger Games\"\nlisten_addr = \"0.0.0.0:9000\"\n\n\
             [bootstrap]\nusername = \"root\"\npassword = \"toor\"\nrehash_count = 12"
        )
        .unwrap();

        let cfg = DepotConfig::load(file.path()).unwrap();
        assert_eq!(cfg.store_name, "Drauger Games");
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        // Unlisted keys fall back to defaults
        assert_eq!(cfg.session_ttl_secs, 86_400);

        let boot = cfg.bootstrap.unwrap();
        assert_eq!(boot.username, "root");
        assert_eq!(boot.hash_algorithm, HashAlgorithm::Sha512);
        assert_eq!(boot.rehash_count, 12);
    }
}

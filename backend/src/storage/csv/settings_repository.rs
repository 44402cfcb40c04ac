//! # Institute Settings Repository
//!
//! File-based institute settings storage using a single YAML file
//! `institute.yaml` at the root of the data directory.
//!
//! ## YAML Format
//!
//! ```yaml
//! institute_name: "My Institute"
//! currency_symbol: "₹"
//! max_name_length: 100
//! max_notes_length: 256
//! ```
//!
//! Missing file means defaults; writes are atomic via a temp file.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use shared::InstituteConfig;
use std::fs;

use super::connection::CsvConnection;
use crate::storage::SettingsStorage;

/// YAML-backed settings repository
#[derive(Clone)]
pub struct SettingsRepository {
    connection: CsvConnection,
}

impl SettingsRepository {
    /// Create a new settings repository
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SettingsStorage for SettingsRepository {
    async fn get_config(&self) -> Result<InstituteConfig> {
        let settings_path = self.connection.get_settings_file_path();

        if !settings_path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(InstituteConfig::default());
        }

        let yaml_content = fs::read_to_string(&settings_path)?;
        let config: InstituteConfig = serde_yaml::from_str(&yaml_content)?;
        Ok(config)
    }

    async fn store_config(&self, config: &InstituteConfig) -> Result<()> {
        let settings_path = self.connection.get_settings_file_path();
        let yaml_content = serde_yaml::to_string(config)?;

        // Atomic write using temp file
        let temp_path = settings_path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, &settings_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_repo() -> (SettingsRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (SettingsRepository::new(connection), temp_dir)
    }

    #[tokio::test]
    async fn test_defaults_when_no_file_exists() {
        let (repo, _temp_dir) = setup_test_repo();

        let config = repo.get_config().await.unwrap();
        assert_eq!(config, InstituteConfig::default());
        assert_eq!(config.institute_name, "My Institute");
        assert_eq!(config.currency_symbol, "₹");
    }

    #[tokio::test]
    async fn test_store_and_reload_config() {
        let (repo, _temp_dir) = setup_test_repo();

        let config = InstituteConfig {
            institute_name: "Sunrise Academy".to_string(),
            currency_symbol: "$".to_string(),
            ..InstituteConfig::default()
        };
        repo.store_config(&config).await.unwrap();

        let reloaded = repo.get_config().await.unwrap();
        assert_eq!(reloaded, config);
    }
}

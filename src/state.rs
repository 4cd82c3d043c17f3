// State management for voice-rating

use anyhow::{anyhow, Context, Result};

use crate::auth::{ExportGate, LoginGate};
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::dataset::{DatasetIndex, Sampler};
use crate::ratings::{BatchCoordinator, RatingValidator};

/// Everything a request handler needs, built once at startup and shared by `Arc`
pub struct AppState {
    config: AppConfig,
    sampler: Sampler,
    database: DatabaseManager,
    coordinator: BatchCoordinator,
    login_gate: LoginGate,
    export_gate: ExportGate,
}

impl AppState {
    pub fn new(config: AppConfig, index: DatasetIndex, database: DatabaseManager) -> Self {
        let validator = RatingValidator::new(config.rating_bounds.clone());
        let coordinator = BatchCoordinator::new(validator, config.submit_timeout);
        let login_gate = LoginGate::new(&config.admin_user, config.admin_password.as_deref());
        let export_gate = ExportGate::new(config.admin_password.as_deref());

        Self {
            sampler: Sampler::new(index),
            database,
            coordinator,
            login_gate,
            export_gate,
            config,
        }
    }

    /// Open the database and load the dataset index described by `config`
    pub async fn initialize(config: AppConfig) -> Result<Self> {
        let db_path = config.database_path.clone();
        let database = tokio::task::spawn_blocking(move || DatabaseManager::new(db_path))
            .await
            .context("Database initialization task failed")??;

        let (index, load_error) = config.dataset.load().await;
        if index.is_empty() {
            if config.require_dataset {
                return Err(match load_error {
                    Some(e) => anyhow!(e).context("Dataset is required but failed to load"),
                    None => anyhow!("Dataset is required but contains no entries"),
                });
            }
            log::warn!("Starting with an empty dataset. `voices` requests will return errors.");
        }

        Ok(Self::new(config, index, database))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn db(&self) -> &DatabaseManager {
        &self.database
    }

    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    pub fn login_gate(&self) -> &LoginGate {
        &self.login_gate
    }

    pub fn export_gate(&self) -> &ExportGate {
        &self.export_gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetSource;
    use tempfile::tempdir;

    fn config_for(dir: &std::path::Path, dataset: &str, require_dataset: bool) -> AppConfig {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.database_path = dir.join("database.db");
        config.dataset = DatasetSource::File(dir.join(dataset));
        config.require_dataset = require_dataset;
        config
    }

    #[tokio::test]
    async fn test_initialize_loads_dataset_and_database() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("test.tsv"), "path\tsentence\na.mp3\thello\n").unwrap();

        let state = AppState::initialize(config_for(dir.path(), "test.tsv", true)).await.unwrap();

        assert_eq!(state.sampler().population(), 1);
        assert_eq!(state.db().count_ratings().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_dataset_is_tolerated_unless_required() {
        let dir = tempdir().unwrap();

        let state = AppState::initialize(config_for(dir.path(), "absent.tsv", false)).await.unwrap();
        assert_eq!(state.sampler().population(), 0);

        assert!(AppState::initialize(config_for(dir.path(), "absent.tsv", true)).await.is_err());
    }
}

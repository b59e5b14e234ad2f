//! Wiring of the production collaborators.

use anyhow::{Context, Result};
use bridge_desktop::{ReqwestHttpClient, StdinConfirmationPrompt};
use bridge_traits::catalog::CatalogClient;
use core_runtime::PipelineConfig;
use core_storage::ObjectStoreGateway;
use provider_s3::S3ObjectStore;
use provider_spotify::SpotifyCatalogClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AppContext {
    pub config: PipelineConfig,
}

impl AppContext {
    pub fn from_env() -> Result<Self> {
        let config = PipelineConfig::from_env().context("Failed to load configuration")?;
        Ok(Self { config })
    }

    pub async fn gateway(&self) -> Arc<ObjectStoreGateway> {
        let store = S3ObjectStore::from_settings(&self.config.object_store).await;
        Arc::new(ObjectStoreGateway::new(
            Arc::new(store),
            self.config.transfer.clone(),
        ))
    }

    pub fn catalog(&self) -> Result<Arc<dyn CatalogClient>> {
        let http = ReqwestHttpClient::new().context("Failed to build HTTP client")?;
        Ok(Arc::new(SpotifyCatalogClient::new(Arc::new(http))))
    }

    pub fn prompt(&self) -> Arc<StdinConfirmationPrompt> {
        Arc::new(StdinConfirmationPrompt::new())
    }

    /// `bucket`, or the snapshots bucket when unset.
    pub fn bucket_or_default(&self, bucket: Option<String>) -> String {
        bucket.unwrap_or_else(|| self.config.buckets.snapshots.clone())
    }

    /// `filename` relative to the data directory. Absolute paths are kept.
    pub fn data_path(&self, filename: &Path) -> PathBuf {
        self.config.layout.data_dir.join(filename)
    }
}

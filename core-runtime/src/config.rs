//! # Pipeline Configuration
//!
//! A single immutable [`PipelineConfig`] is constructed at startup and passed
//! explicitly to every component that needs part of it. Nothing downstream
//! reads the environment.
//!
//! ## Usage
//!
//! ### From the environment
//!
//! ```ignore
//! use core_runtime::config::PipelineConfig;
//!
//! let config = PipelineConfig::from_env()?;
//! ```
//!
//! ### With the builder
//!
//! ```
//! use bridge_traits::catalog::CredentialPair;
//! use core_runtime::config::PipelineConfig;
//!
//! let config = PipelineConfig::builder()
//!     .data_dir("/var/lib/snapshots")
//!     .credential(CredentialPair::new("client-a", "secret-a"))
//!     .utc_offset_hours(-5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.credentials.len(), 1);
//! assert_eq!(config.layout.shard_prefix, "spotify-data_");
//! ```
//!
//! ## Environment variables
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `CLIENT_IDS` / `CLIENT_SECRETS` | Comma-separated credential pool, zipped pairwise | empty |
//! | `STORAGE_ENDPOINT` | S3-compatible endpoint URL | provider default |
//! | `STORAGE_ACCESS_KEY_ID` / `STORAGE_SECRET_ACCESS_KEY` | Static object store keys | ambient AWS chain |
//! | `STORAGE_REGION` | Region name | `auto` |
//! | `DATA_DIR` | Directory holding shards and the canonical file | `.` |
//! | `UTC_OFFSET_HOURS` | Deployment reference time zone | `-5` |
//! | `SNAPSHOTS_BUCKET` / `BACKUPS_BUCKET` / `ARTIST_IDS_BUCKET` | Bucket names | `spotify-data` / `spotify-data-backups` / `artist-ids` |

use crate::error::{Error, Result};
use bridge_traits::catalog::CredentialPair;
use chrono::FixedOffset;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Smallest part size accepted by S3-compatible multipart uploads.
pub const MIN_PART_SIZE: u64 = 5 * MIB;

/// Object store connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStoreSettings {
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
}

impl Default for ObjectStoreSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            region: "auto".to_string(),
        }
    }
}

impl fmt::Debug for ObjectStoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("region", &self.region)
            .finish()
    }
}

/// Bucket names known to the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNames {
    /// Durable copies of shards and the canonical file
    pub snapshots: String,
    pub backups: String,
    /// Holds the artist-ID universe database
    pub artist_ids: String,
}

impl Default for BucketNames {
    fn default() -> Self {
        Self {
            snapshots: "spotify-data".to_string(),
            backups: "spotify-data-backups".to_string(),
            artist_ids: "artist-ids".to_string(),
        }
    }
}

/// Where files live on local disk and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub data_dir: PathBuf,
    /// Shards are named `<shard_prefix><timestamp>.<shard_extension>`
    pub shard_prefix: String,
    pub shard_extension: String,
    pub canonical_name: String,
    pub artist_ids_name: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            shard_prefix: "spotify-data_".to_string(),
            shard_extension: "db".to_string(),
            canonical_name: "merged-spotify-data.db".to_string(),
            artist_ids_name: "artist_ids.db".to_string(),
        }
    }
}

impl StorageLayout {
    pub fn canonical_path(&self) -> PathBuf {
        self.data_dir.join(&self.canonical_name)
    }

    pub fn artist_ids_path(&self) -> PathBuf {
        self.data_dir.join(&self.artist_ids_name)
    }
}

/// Snapshot collector tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Ids per catalog request; capped by the client's own limit
    pub batch_size: usize,
    /// Total calls made for one batch before it is given up
    pub max_attempts: u32,
    /// Attempts at or beyond this index use a random credential pair
    pub random_pair_after: u32,
    /// Delay after failed attempt `n` is `backoff_unit * backoff_base^n`
    pub backoff_base: u32,
    pub backoff_unit: Duration,
    pub max_backoff: Duration,
    /// Batches in flight at once
    pub concurrency: usize,
    /// Rows buffered before a transaction is issued
    pub flush_threshold: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_attempts: 20,
            random_pair_after: 5,
            backoff_base: 2,
            backoff_unit: Duration::from_secs(1),
            max_backoff: Duration::from_secs(600),
            concurrency: 8,
            flush_threshold: 250_000,
        }
    }
}

/// Merge engine tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSettings {
    /// Rows read per page from a source shard
    pub page_size: u32,
    /// Statements buffered before a transaction is committed
    pub flush_threshold: usize,
    /// Smallest shard accepted as a checkpoint base
    pub checkpoint_min_bytes: u64,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            page_size: 100_000,
            flush_threshold: 250_000,
            checkpoint_min_bytes: GIB,
        }
    }
}

/// Object transfer tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    /// Multipart part size; files at or below it go up in one request
    pub part_size: u64,
    /// Largest object the store copies server-side
    pub copy_limit: u64,
    pub download_concurrency: usize,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            part_size: 50 * MIB,
            copy_limit: 5 * GIB,
            download_concurrency: 4,
        }
    }
}

/// Process-wide pipeline configuration. Use [`PipelineConfigBuilder`] or
/// [`PipelineConfig::from_env`] to construct it.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credentials: Vec<CredentialPair>,
    pub object_store: ObjectStoreSettings,
    pub buckets: BucketNames,
    pub layout: StorageLayout,
    /// Reference time zone used to derive the hour of day
    pub utc_offset: FixedOffset,
    pub collector: CollectorSettings,
    pub merge: MergeSettings,
    pub transfer: TransferSettings,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Build from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut builder = Self::builder();

        let ids = get("CLIENT_IDS").map(|v| split_list(&v)).unwrap_or_default();
        let secrets = get("CLIENT_SECRETS")
            .map(|v| split_list(&v))
            .unwrap_or_default();
        if ids.len() != secrets.len() {
            return Err(Error::Config(format!(
                "CLIENT_IDS has {} entries but CLIENT_SECRETS has {}",
                ids.len(),
                secrets.len()
            )));
        }
        for (id, secret) in ids.into_iter().zip(secrets) {
            builder = builder.credential(CredentialPair::new(id, secret));
        }

        builder = builder.object_store(ObjectStoreSettings {
            endpoint: get("STORAGE_ENDPOINT"),
            access_key_id: get("STORAGE_ACCESS_KEY_ID"),
            secret_access_key: get("STORAGE_SECRET_ACCESS_KEY"),
            region: get("STORAGE_REGION").unwrap_or_else(|| "auto".to_string()),
        });

        let defaults = BucketNames::default();
        builder = builder.buckets(BucketNames {
            snapshots: get("SNAPSHOTS_BUCKET").unwrap_or(defaults.snapshots),
            backups: get("BACKUPS_BUCKET").unwrap_or(defaults.backups),
            artist_ids: get("ARTIST_IDS_BUCKET").unwrap_or(defaults.artist_ids),
        });

        if let Some(dir) = get("DATA_DIR") {
            builder = builder.data_dir(dir);
        }

        if let Some(offset) = get("UTC_OFFSET_HOURS") {
            let hours = offset
                .trim()
                .parse::<i32>()
                .map_err(|e| Error::InvalidVariable {
                    variable: "UTC_OFFSET_HOURS".to_string(),
                    message: format!("'{}' is not an integer: {}", offset, e),
                })?;
            builder = builder.utc_offset_hours(hours);
        }

        builder.build()
    }

    /// Checks the invariants every component relies on.
    pub fn validate(&self) -> Result<()> {
        if self.layout.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }
        if self.layout.shard_prefix.is_empty() || self.layout.shard_extension.is_empty() {
            return Err(Error::Config(
                "Shard prefix and extension must both be set".to_string(),
            ));
        }
        if self.layout.canonical_name.starts_with(&self.layout.shard_prefix) {
            return Err(Error::Config(format!(
                "Canonical name '{}' would be mistaken for a shard",
                self.layout.canonical_name
            )));
        }

        let collector = &self.collector;
        if collector.batch_size == 0 || collector.concurrency == 0 {
            return Err(Error::Config(
                "Collector batch size and concurrency must be greater than 0".to_string(),
            ));
        }
        if collector.max_attempts == 0 {
            return Err(Error::Config(
                "Collector must make at least one attempt per batch".to_string(),
            ));
        }
        if collector.flush_threshold == 0 || self.merge.flush_threshold == 0 {
            return Err(Error::Config(
                "Flush thresholds must be greater than 0".to_string(),
            ));
        }
        if self.merge.page_size == 0 {
            return Err(Error::Config("Merge page size must be greater than 0".to_string()));
        }

        if self.transfer.part_size < MIN_PART_SIZE {
            return Err(Error::Config(format!(
                "Part size {} is below the multipart minimum of {} bytes",
                self.transfer.part_size, MIN_PART_SIZE
            )));
        }
        if self.transfer.copy_limit == 0 || self.transfer.download_concurrency == 0 {
            return Err(Error::Config(
                "Copy limit and download concurrency must be greater than 0".to_string(),
            ));
        }

        if self.buckets.snapshots.is_empty()
            || self.buckets.backups.is_empty()
            || self.buckets.artist_ids.is_empty()
        {
            return Err(Error::Config("Bucket names cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|part| part.trim().to_string())
        .collect()
}

/// Builder for [`PipelineConfig`]. Unset sections fall back to their defaults.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    credentials: Vec<CredentialPair>,
    object_store: Option<ObjectStoreSettings>,
    buckets: Option<BucketNames>,
    layout: Option<StorageLayout>,
    data_dir: Option<PathBuf>,
    utc_offset_hours: Option<i32>,
    collector: Option<CollectorSettings>,
    merge: Option<MergeSettings>,
    transfer: Option<TransferSettings>,
}

impl PipelineConfigBuilder {
    /// Appends one pair to the credential pool. Order is significant.
    pub fn credential(mut self, pair: CredentialPair) -> Self {
        self.credentials.push(pair);
        self
    }

    pub fn credentials(mut self, pairs: impl IntoIterator<Item = CredentialPair>) -> Self {
        self.credentials.extend(pairs);
        self
    }

    pub fn object_store(mut self, settings: ObjectStoreSettings) -> Self {
        self.object_store = Some(settings);
        self
    }

    pub fn buckets(mut self, buckets: BucketNames) -> Self {
        self.buckets = Some(buckets);
        self
    }

    pub fn layout(mut self, layout: StorageLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Overrides only the data directory of the layout.
    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn utc_offset_hours(mut self, hours: i32) -> Self {
        self.utc_offset_hours = Some(hours);
        self
    }

    pub fn collector(mut self, settings: CollectorSettings) -> Self {
        self.collector = Some(settings);
        self
    }

    pub fn merge(mut self, settings: MergeSettings) -> Self {
        self.merge = Some(settings);
        self
    }

    pub fn transfer(mut self, settings: TransferSettings) -> Self {
        self.transfer = Some(settings);
        self
    }

    pub fn build(self) -> Result<PipelineConfig> {
        let hours = self.utc_offset_hours.unwrap_or(-5);
        if !(-12..=14).contains(&hours) {
            return Err(Error::Config(format!(
                "UTC offset {} is outside -12..=14 hours",
                hours
            )));
        }
        let utc_offset = FixedOffset::east_opt(hours * 3600)
            .ok_or_else(|| Error::Config(format!("Invalid UTC offset: {} hours", hours)))?;

        let mut layout = self.layout.unwrap_or_default();
        if let Some(dir) = self.data_dir {
            layout.data_dir = dir;
        }

        let config = PipelineConfig {
            credentials: self.credentials,
            object_store: self.object_store.unwrap_or_default(),
            buckets: self.buckets.unwrap_or_default(),
            layout,
            utc_offset,
            collector: self.collector.unwrap_or_default(),
            merge: self.merge.unwrap_or_default(),
            transfer: self.transfer.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::builder().build().unwrap();

        assert!(config.credentials.is_empty());
        assert_eq!(config.buckets.snapshots, "spotify-data");
        assert_eq!(config.layout.canonical_name, "merged-spotify-data.db");
        assert_eq!(config.utc_offset.local_minus_utc(), -5 * 3600);
        assert_eq!(config.collector.batch_size, 50);
        assert_eq!(config.collector.max_attempts, 20);
        assert_eq!(config.merge.page_size, 100_000);
        assert_eq!(config.merge.checkpoint_min_bytes, GIB);
        assert_eq!(config.transfer.part_size, 50 * MIB);
        assert_eq!(config.transfer.copy_limit, 5 * GIB);
    }

    #[test]
    fn test_from_lookup_zips_credentials() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("CLIENT_IDS", "a, b"),
            ("CLIENT_SECRETS", "sa,sb"),
            ("DATA_DIR", "/tmp/shards"),
            ("UTC_OFFSET_HOURS", "2"),
            ("STORAGE_ENDPOINT", "https://example.r2.dev"),
        ]))
        .unwrap();

        assert_eq!(
            config.credentials,
            vec![CredentialPair::new("a", "sa"), CredentialPair::new("b", "sb")]
        );
        assert_eq!(config.layout.data_dir, PathBuf::from("/tmp/shards"));
        assert_eq!(config.utc_offset.local_minus_utc(), 7200);
        assert_eq!(
            config.object_store.endpoint.as_deref(),
            Some("https://example.r2.dev")
        );
        assert_eq!(config.object_store.region, "auto");
    }

    #[test]
    fn test_from_lookup_rejects_mismatched_pool() {
        let result = PipelineConfig::from_lookup(lookup(&[
            ("CLIENT_IDS", "a,b"),
            ("CLIENT_SECRETS", "sa"),
        ]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup_rejects_bad_offset() {
        let result = PipelineConfig::from_lookup(lookup(&[("UTC_OFFSET_HOURS", "east")]));
        assert!(matches!(
            result,
            Err(Error::InvalidVariable { ref variable, .. }) if variable == "UTC_OFFSET_HOURS"
        ));

        let result = PipelineConfig::builder().utc_offset_hours(20).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_rejects_small_parts() {
        let result = PipelineConfig::builder()
            .transfer(TransferSettings {
                part_size: MIB,
                ..TransferSettings::default()
            })
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_rejects_canonical_shard_collision() {
        let layout = StorageLayout {
            canonical_name: "spotify-data_merged.db".to_string(),
            ..StorageLayout::default()
        };
        let result = PipelineConfig::builder().layout(layout).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = PipelineConfig::builder()
            .credential(CredentialPair::new("id", "top-secret"))
            .object_store(ObjectStoreSettings {
                secret_access_key: Some("storage-secret".to_string()),
                ..ObjectStoreSettings::default()
            })
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("storage-secret"));
    }
}

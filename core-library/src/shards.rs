//! Local shard files: naming, discovery and checkpoint selection.
//!
//! A shard is named `<prefix><timestamp>.<extension>`, e.g.
//! `spotify-data_1700000000.db`, where the timestamp is the run timestamp in
//! Unix seconds.

use crate::Result;
use core_runtime::config::StorageLayout;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A shard found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardFile {
    pub path: PathBuf,
    pub file_name: String,
    pub timestamp: i64,
    /// Bytes on disk when listed
    pub size: u64,
}

/// Names and locates shard files inside the data directory.
#[derive(Debug, Clone)]
pub struct ShardRegistry {
    layout: StorageLayout,
}

impl ShardRegistry {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn data_dir(&self) -> &Path {
        &self.layout.data_dir
    }

    pub fn file_name(&self, timestamp: i64) -> String {
        format!(
            "{}{}.{}",
            self.layout.shard_prefix, timestamp, self.layout.shard_extension
        )
    }

    pub fn path_for(&self, timestamp: i64) -> PathBuf {
        self.layout.data_dir.join(self.file_name(timestamp))
    }

    /// Timestamp encoded in a shard file name, or `None` when the name is not
    /// a shard name. Accepts bare names and object keys alike.
    pub fn parse_timestamp(&self, name: &str) -> Option<i64> {
        let name = name.rsplit('/').next().unwrap_or(name);
        let suffix = format!(".{}", self.layout.shard_extension);
        let digits = name
            .strip_prefix(self.layout.shard_prefix.as_str())?
            .strip_suffix(suffix.as_str())?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn is_shard_name(&self, name: &str) -> bool {
        self.parse_timestamp(name).is_some()
    }

    /// Shards in the data directory, ordered by timestamp.
    pub async fn list(&self) -> Result<Vec<ShardFile>> {
        let mut shards = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.layout.data_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(timestamp) = self.parse_timestamp(&file_name) else {
                continue;
            };

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            shards.push(ShardFile {
                path: entry.path(),
                file_name,
                timestamp,
                size: metadata.len(),
            });
        }

        shards.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        debug!(count = shards.len(), dir = %self.layout.data_dir.display(), "Listed local shards");
        Ok(shards)
    }

    /// Path of the merged output covering `earliest..=latest`, e.g.
    /// `merged-spotify-data_1700000000-1700086400.db`.
    pub fn range_path(&self, earliest: i64, latest: i64) -> PathBuf {
        let canonical = Path::new(&self.layout.canonical_name);
        let stem = canonical
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.layout.canonical_name.clone());
        let name = match canonical.extension() {
            Some(ext) => format!("{}_{}-{}.{}", stem, earliest, latest, ext.to_string_lossy()),
            None => format!("{}_{}-{}", stem, earliest, latest),
        };
        self.layout.data_dir.join(name)
    }
}

/// The largest shard of at least `min_bytes`. Ties keep the earliest listed.
pub fn find_checkpoint(shards: &[ShardFile], min_bytes: u64) -> Option<&ShardFile> {
    shards
        .iter()
        .filter(|shard| shard.size >= min_bytes)
        .fold(None, |best: Option<&ShardFile>, shard| match best {
            Some(current) if current.size >= shard.size => Some(current),
            _ => Some(shard),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(dir: &Path) -> ShardRegistry {
        ShardRegistry::new(StorageLayout {
            data_dir: dir.to_path_buf(),
            ..StorageLayout::default()
        })
    }

    fn shard(name: &str, timestamp: i64, size: u64) -> ShardFile {
        ShardFile {
            path: PathBuf::from(name),
            file_name: name.to_string(),
            timestamp,
            size,
        }
    }

    #[test]
    fn test_file_name_round_trip() {
        let registry = registry(Path::new("/data"));
        assert_eq!(registry.file_name(1_700_000_000), "spotify-data_1700000000.db");
        assert_eq!(
            registry.path_for(1_700_000_000),
            PathBuf::from("/data/spotify-data_1700000000.db")
        );
        assert_eq!(
            registry.parse_timestamp("spotify-data_1700000000.db"),
            Some(1_700_000_000)
        );
    }

    #[test]
    fn test_parse_rejects_other_files() {
        let registry = registry(Path::new("/data"));
        assert_eq!(registry.parse_timestamp("merged-spotify-data.db"), None);
        assert_eq!(registry.parse_timestamp("artist_ids.db"), None);
        assert_eq!(registry.parse_timestamp("spotify-data_.db"), None);
        assert_eq!(registry.parse_timestamp("spotify-data_12a.db"), None);
        assert_eq!(registry.parse_timestamp("spotify-data_12.db-journal"), None);
        assert_eq!(registry.parse_timestamp("shards/spotify-data_12.db"), Some(12));
    }

    #[test]
    fn test_range_path() {
        let registry = registry(Path::new("/data"));
        assert_eq!(
            registry.range_path(100, 200),
            PathBuf::from("/data/merged-spotify-data_100-200.db")
        );
    }

    #[test]
    fn test_find_checkpoint_picks_largest_above_floor() {
        let shards = vec![
            shard("a", 1, 10),
            shard("b", 2, 40),
            shard("c", 3, 40),
            shard("d", 4, 5),
        ];

        assert_eq!(find_checkpoint(&shards, 20).map(|s| s.timestamp), Some(2));
        assert_eq!(find_checkpoint(&shards, 0).map(|s| s.timestamp), Some(2));
        assert!(find_checkpoint(&shards, 41).is_none());
        assert!(find_checkpoint(&[], 0).is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_timestamp_and_skips_others() {
        let dir = TempDir::new().unwrap();
        for name in [
            "spotify-data_300.db",
            "spotify-data_100.db",
            "merged-spotify-data.db",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"abc").unwrap();
        }
        std::fs::create_dir(dir.path().join("spotify-data_50.db")).unwrap();

        let shards = registry(dir.path()).list().await.unwrap();
        let names: Vec<_> = shards.iter().map(|s| s.file_name.as_str()).collect();

        assert_eq!(names, vec!["spotify-data_100.db", "spotify-data_300.db"]);
        assert!(shards.iter().all(|s| s.size == 3));
    }
}

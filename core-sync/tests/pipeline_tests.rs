use async_trait::async_trait;
use bridge_traits::catalog::{ArtistMetric, CatalogClient, CredentialPair};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::prompt::{ConfirmationPrompt, FixedAnswerPrompt};
use bridge_traits::time::FixedClock;
use chrono::{FixedOffset, TimeZone, Utc};
use core_auth::CredentialRotator;
use core_library::artist_ids::ARTIST_ID_TABLE;
use core_library::db::{open_database, DatabaseConfig};
use core_library::schema::{create_snapshot_table, has_unique_constraint, index_names};
use core_library::{BulkWriter, ShardRegistry, SnapshotRow};
use core_runtime::config::{
    BucketNames, CollectorSettings, MergeSettings, StorageLayout, TransferSettings,
};
use core_storage::{MemoryObjectStore, ObjectStoreGateway};
use core_sync::{
    DeletionOptions, DeletionOutcome, MergeEngine, MergeOptions, Retention, ScheduleOptions,
    Scheduler, ShardTransfers, SnapshotCollector,
};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const SNAPSHOTS: &str = "spotify-data";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn layout(dir: &Path) -> StorageLayout {
    StorageLayout {
        data_dir: dir.to_path_buf(),
        ..StorageLayout::default()
    }
}

fn registry(dir: &Path) -> ShardRegistry {
    ShardRegistry::new(layout(dir))
}

async fn write_shard(dir: &Path, timestamp: i64, rows: Vec<SnapshotRow>, unique: bool) -> PathBuf {
    let path = registry(dir).path_for(timestamp);
    let pool = open_database(DatabaseConfig::new(&path).create_if_missing(true))
        .await
        .unwrap();
    create_snapshot_table(&pool, unique).await.unwrap();
    let mut writer = BulkWriter::new(pool.clone(), 10_000);
    writer.extend(rows);
    writer.flush().await.unwrap();
    pool.close().await;
    path
}

async fn write_universe(dir: &Path, ids: &[String]) {
    let pool = open_database(
        DatabaseConfig::new(layout(dir).artist_ids_path()).create_if_missing(true),
    )
    .await
    .unwrap();
    sqlx::query(&format!("CREATE TABLE {} (id TEXT)", ARTIST_ID_TABLE))
        .execute(&pool)
        .await
        .unwrap();
    for id in ids {
        sqlx::query(&format!("INSERT INTO {} (id) VALUES (?)", ARTIST_ID_TABLE))
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
}

async fn read_rows(path: &Path) -> Vec<SnapshotRow> {
    let pool = open_database(DatabaseConfig::new(path).read_only(true))
        .await
        .unwrap();
    let rows = all_rows(&pool).await;
    pool.close().await;
    rows
}

async fn all_rows(pool: &SqlitePool) -> Vec<SnapshotRow> {
    sqlx::query_as::<_, SnapshotRow>(
        "SELECT id, timestamp, followers, popularity FROM artist_snapshots ORDER BY id, timestamp",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

fn merge_settings(checkpoint_min_bytes: u64) -> MergeSettings {
    MergeSettings {
        page_size: 2,
        flush_threshold: 3,
        checkpoint_min_bytes,
    }
}

fn universe(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("artist{:03}", i)).collect()
}

/// Catalog that answers from the ids themselves and fails any batch
/// containing one of `failing`.
#[derive(Default)]
struct ScriptedCatalog {
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedCatalog {
    fn failing_on(ids: &[&str]) -> Self {
        Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogClient for ScriptedCatalog {
    fn max_ids_per_request(&self) -> usize {
        50
    }

    async fn get_artists(
        &self,
        credentials: &CredentialPair,
        ids: &[String],
    ) -> BridgeResult<Vec<ArtistMetric>> {
        self.calls
            .lock()
            .unwrap()
            .push((credentials.client_id.clone(), ids.to_vec()));

        if ids.iter().any(|id| self.failing.contains(id)) {
            return Err(BridgeError::RateLimited {
                retry_after_seconds: None,
            });
        }

        Ok(ids
            .iter()
            .map(|id| ArtistMetric {
                id: id.clone(),
                followers: id.len() as i64 * 10,
                popularity: 50,
            })
            .collect())
    }
}

fn collector_settings() -> CollectorSettings {
    CollectorSettings {
        batch_size: 4,
        max_attempts: 4,
        random_pair_after: 2,
        backoff_base: 2,
        backoff_unit: Duration::ZERO,
        max_backoff: Duration::ZERO,
        concurrency: 3,
        flush_threshold: 5,
    }
}

fn pool() -> Vec<CredentialPair> {
    (0..3)
        .map(|i| CredentialPair::new(format!("p{}", i), format!("secret{}", i)))
        .collect()
}

fn collector(dir: &Path, catalog: Arc<ScriptedCatalog>) -> SnapshotCollector {
    SnapshotCollector::new(
        catalog,
        CredentialRotator::new(pool()),
        registry(dir),
        collector_settings(),
        FixedOffset::east_opt(0).unwrap(),
    )
}

fn memory_gateway() -> (Arc<MemoryObjectStore>, Arc<ObjectStoreGateway>) {
    let store = Arc::new(MemoryObjectStore::new());
    let gateway = Arc::new(ObjectStoreGateway::new(
        store.clone(),
        TransferSettings::default(),
    ));
    (store, gateway)
}

struct RecordingPrompt {
    questions: Mutex<Vec<String>>,
}

#[async_trait]
impl ConfirmationPrompt for RecordingPrompt {
    async fn confirm(&self, question: &str) -> BridgeResult<bool> {
        self.questions.lock().unwrap().push(question.to_string());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_merge_drops_duplicate_snapshots() {
    let dir = TempDir::new().unwrap();
    write_shard(
        dir.path(),
        100,
        vec![
            SnapshotRow::new("A", 100, 10, 1),
            SnapshotRow::new("B", 100, 5, 2),
        ],
        false,
    )
    .await;
    write_shard(
        dir.path(),
        200,
        vec![
            SnapshotRow::new("A", 100, 10, 1),
            SnapshotRow::new("B", 200, 6, 3),
        ],
        false,
    )
    .await;

    let engine = MergeEngine::new(registry(dir.path()), merge_settings(1));
    let report = engine
        .merge(&MergeOptions {
            skip_checkpoint_as_base: true,
            skip_indexes: true,
            ..MergeOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.target, dir.path().join("merged-spotify-data.db"));
    assert_eq!(report.checkpoint, None);
    assert_eq!(report.shards_merged, 2);
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.total_rows, 3);
    assert!(!report.indexes_created);
    assert!(!dir.path().join("merged-spotify-data.db.partial").exists());

    assert_eq!(
        read_rows(&report.target).await,
        vec![
            SnapshotRow::new("A", 100, 10, 1),
            SnapshotRow::new("B", 100, 5, 2),
            SnapshotRow::new("B", 200, 6, 3),
        ]
    );
}

#[tokio::test]
async fn test_merge_twice_yields_same_rows() {
    let dir = TempDir::new().unwrap();
    for (timestamp, ids) in [(100, ["a", "b", "c"]), (200, ["b", "c", "d"]), (300, ["a", "d", "e"])] {
        let rows = ids
            .iter()
            .map(|id| SnapshotRow::new(*id, timestamp.min(200), 7, 7))
            .collect();
        write_shard(dir.path(), timestamp, rows, false).await;
    }

    let engine = MergeEngine::new(registry(dir.path()), merge_settings(u64::MAX));
    let first = engine
        .merge(&MergeOptions {
            target: Some(PathBuf::from("first.db")),
            ..MergeOptions::default()
        })
        .await
        .unwrap();
    let second = engine
        .merge(&MergeOptions {
            target: Some(PathBuf::from("second.db")),
            skip_indexes: true,
            ..MergeOptions::default()
        })
        .await
        .unwrap();

    let first_rows = read_rows(&first.target).await;
    assert_eq!(first_rows, read_rows(&second.target).await);
    assert_eq!(first.total_rows, 8);

    let keys: HashSet<(String, i64)> = first_rows
        .iter()
        .map(|row| (row.id.clone(), row.timestamp))
        .collect();
    assert_eq!(keys.len(), first_rows.len());

    let pool = open_database(DatabaseConfig::new(&first.target)).await.unwrap();
    assert_eq!(
        index_names(&pool).await.unwrap(),
        vec!["artist_snapshot_id", "artist_snapshot_timestamp"]
    );
    pool.close().await;
}

#[tokio::test]
async fn test_merge_extends_existing_canonical() {
    let dir = TempDir::new().unwrap();
    let first_shard =
        write_shard(dir.path(), 100, vec![SnapshotRow::new("A", 100, 10, 1)], false).await;

    let engine = MergeEngine::new(registry(dir.path()), merge_settings(u64::MAX));
    let first = engine.merge(&MergeOptions::default()).await.unwrap();
    assert_eq!(first.total_rows, 1);

    // Retention removes merged shards before the next collection window.
    std::fs::remove_file(&first_shard).unwrap();
    write_shard(dir.path(), 200, vec![SnapshotRow::new("B", 200, 20, 2)], false).await;

    let second = engine.merge(&MergeOptions::default()).await.unwrap();
    assert_eq!(second.target, first.target);
    assert_eq!(second.shards_merged, 1);
    assert_eq!(second.rows_read, 1);
    assert_eq!(second.total_rows, 2);
    assert!(!dir.path().join("merged-spotify-data.db.partial").exists());

    assert_eq!(
        read_rows(&second.target).await,
        vec![
            SnapshotRow::new("A", 100, 10, 1),
            SnapshotRow::new("B", 200, 20, 2),
        ]
    );

    // Re-merging the same shard leaves the canonical unchanged.
    let third = engine.merge(&MergeOptions::default()).await.unwrap();
    assert_eq!(third.duplicates_removed, 1);
    assert_eq!(third.total_rows, 2);
}

#[tokio::test]
async fn test_merge_uses_largest_shard_as_checkpoint() {
    let dir = TempDir::new().unwrap();
    let history: Vec<SnapshotRow> = (0..2_000)
        .map(|i| SnapshotRow::new(format!("artist{:04}", i), 100, i, 1))
        .collect();
    let checkpoint = write_shard(dir.path(), 100, history, true).await;
    write_shard(
        dir.path(),
        200,
        vec![
            SnapshotRow::new("artist0000", 100, 0, 1),
            SnapshotRow::new("artist0000", 200, 5, 2),
        ],
        false,
    )
    .await;

    let engine = MergeEngine::new(registry(dir.path()), merge_settings(1));
    let report = engine.merge(&MergeOptions::default()).await.unwrap();

    assert_eq!(report.checkpoint, Some(checkpoint.clone()));
    assert!(report.constraint_dropped);
    assert_eq!(report.shards_merged, 1);
    assert_eq!(report.total_rows, 2_001);
    assert!(report.indexes_created);
    // The checkpoint shard itself is left untouched.
    assert!(checkpoint.exists());

    let pool = open_database(DatabaseConfig::new(&report.target)).await.unwrap();
    assert!(!has_unique_constraint(&pool).await.unwrap());
    let with_checkpoint = all_rows(&pool).await;
    pool.close().await;

    let without = engine
        .merge(&MergeOptions {
            skip_checkpoint_as_base: true,
            target: Some(PathBuf::from("scratch.db")),
            ..MergeOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(without.checkpoint, None);
    assert_eq!(without.shards_merged, 2);
    assert_eq!(read_rows(&without.target).await, with_checkpoint);
}

#[tokio::test]
async fn test_checkpoint_requires_size_floor() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 100, vec![SnapshotRow::new("a", 100, 1, 1)], false).await;

    let engine = MergeEngine::new(registry(dir.path()), merge_settings(1 << 30));
    let report = engine.merge(&MergeOptions::default()).await.unwrap();

    assert_eq!(report.checkpoint, None);
    assert_eq!(report.shards_merged, 1);
    assert_eq!(report.total_rows, 1);
}

#[tokio::test]
async fn test_merge_discards_stale_staging_and_uses_range_name() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 1_700_000_000, vec![SnapshotRow::new("a", 1, 1, 1)], false).await;
    write_shard(dir.path(), 1_700_003_600, vec![SnapshotRow::new("b", 2, 2, 2)], false).await;

    let target = dir.path().join("merged-spotify-data_1700000000-1700003600.db");
    std::fs::write(dir.path().join("merged-spotify-data_1700000000-1700003600.db.partial"), b"junk")
        .unwrap();

    let engine = MergeEngine::new(registry(dir.path()), merge_settings(u64::MAX));
    let report = engine
        .merge(&MergeOptions {
            use_range_filename: true,
            skip_indexes: true,
            ..MergeOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.target, target);
    assert_eq!(read_rows(&target).await.len(), 2);
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_hourly_slices_cover_universe_exactly_once() {
    let dir = TempDir::new().unwrap();
    let ids = universe(53);
    write_universe(dir.path(), &ids).await;

    let catalog = Arc::new(ScriptedCatalog::default());
    let collector = collector(dir.path(), catalog.clone());

    let mut collected = Vec::new();
    for hour in 0..24i64 {
        let report = collector.collect_from_file(hour * 3600).await.unwrap();
        assert_eq!(report.hour, hour as u32);
        assert_eq!(report.failed_batches, 0);

        collected.extend(read_rows(&report.shard).await.into_iter().map(|row| row.id));
    }

    collected.sort();
    assert_eq!(collected, ids);
}

#[tokio::test]
async fn test_collector_rerun_skips_present_rows() {
    let dir = TempDir::new().unwrap();
    write_universe(dir.path(), &universe(48)).await;

    let catalog = Arc::new(ScriptedCatalog::default());
    let collector = collector(dir.path(), catalog.clone());

    let first = collector.collect_from_file(7_200).await.unwrap();
    assert_eq!(first.slice, 4..6);
    assert_eq!(first.inserted, 2);
    assert_eq!(catalog.calls().len(), 1);
    assert_eq!(catalog.calls()[0].0, "p2");

    let second = collector.collect_from_file(7_200).await.unwrap();
    assert_eq!(second.skipped_existing, 2);
    assert_eq!(second.batches, 0);
    assert_eq!(second.inserted, 0);
    assert_eq!(catalog.calls().len(), 1);

    let rows = read_rows(&first.shard).await;
    assert_eq!(
        rows,
        vec![
            SnapshotRow::new("artist004", 7_200, 90, 50),
            SnapshotRow::new("artist005", 7_200, 90, 50),
        ]
    );
}

#[tokio::test]
async fn test_failed_batch_is_absorbed() {
    let dir = TempDir::new().unwrap();
    // 240 ids: ten per hour, batches of four
    write_universe(dir.path(), &universe(240)).await;

    let catalog = Arc::new(ScriptedCatalog::failing_on(&["artist005"]));
    let collector = collector(dir.path(), catalog.clone());

    let report = collector.collect_from_file(0).await.unwrap();

    assert_eq!(report.slice, 0..10);
    assert_eq!(report.batches, 3);
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.inserted, 6);

    let failing_calls = catalog
        .calls()
        .iter()
        .filter(|(_, ids)| ids.contains(&"artist005".to_string()))
        .count();
    assert_eq!(failing_calls, 4);

    let ids: Vec<String> = read_rows(&report.shard)
        .await
        .into_iter()
        .map(|row| row.id)
        .collect();
    assert!(!ids.contains(&"artist004".to_string()));
    assert!(ids.contains(&"artist008".to_string()));
}

#[tokio::test]
async fn test_retry_bound_and_pair_switch() {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(ScriptedCatalog::failing_on(&["x"]));
    let collector = collector(dir.path(), catalog.clone());

    let outcome = collector
        .fetch_batch(4, &["x".to_string(), "y".to_string()])
        .await
        .unwrap();

    assert!(!outcome.succeeded);
    assert!(outcome.metrics.is_empty());
    assert_eq!(outcome.attempts, 4);

    let calls = catalog.calls();
    assert_eq!(calls.len(), 4);
    // Hour 4 maps to p1 for the first two attempts, then random pairs.
    assert_eq!(calls[0].0, "p1");
    assert_eq!(calls[1].0, "p1");
    assert!(calls[2..]
        .iter()
        .all(|(client, _)| ["p0", "p1", "p2"].contains(&client.as_str())));
}

#[tokio::test]
async fn test_empty_credential_pool_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_universe(dir.path(), &universe(24)).await;

    let collector = SnapshotCollector::new(
        Arc::new(ScriptedCatalog::default()),
        CredentialRotator::new(Vec::new()),
        registry(dir.path()),
        collector_settings(),
        FixedOffset::east_opt(0).unwrap(),
    );

    let error = collector.collect_from_file(0).await.unwrap_err();
    assert!(error.is_precondition());
}

#[tokio::test]
async fn test_missing_universe_is_precondition_failure() {
    let dir = TempDir::new().unwrap();
    let collector = collector(dir.path(), Arc::new(ScriptedCatalog::default()));

    let error = collector.collect_from_file(0).await.unwrap_err();
    assert!(error.is_precondition());
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

async fn retention_fixture(
    prompt: Arc<dyn ConfirmationPrompt>,
) -> (TempDir, Arc<MemoryObjectStore>, Retention) {
    let dir = TempDir::new().unwrap();
    for timestamp in [1, 2, 3] {
        write_shard(dir.path(), timestamp, Vec::new(), false).await;
    }

    let (store, gateway) = memory_gateway();
    for key in ["spotify-data_2.db", "spotify-data_3.db", "spotify-data_4.db"] {
        store.insert(SNAPSHOTS, key, b"shard".to_vec());
    }
    store.insert(SNAPSHOTS, "merged-spotify-data.db", b"canonical".to_vec());

    let retention = Retention::new(gateway, registry(dir.path()), SNAPSHOTS, prompt);
    (dir, store, retention)
}

#[tokio::test]
async fn test_stale_sets_are_the_intersection() {
    let (_dir, _store, retention) = retention_fixture(Arc::new(FixedAnswerPrompt(false))).await;

    assert_eq!(
        retention.stale_remote().await.unwrap(),
        vec!["spotify-data_2.db", "spotify-data_3.db"]
    );
    let local: Vec<String> = retention
        .stale_local()
        .await
        .unwrap()
        .into_iter()
        .map(|shard| shard.file_name)
        .collect();
    assert_eq!(local, vec!["spotify-data_2.db", "spotify-data_3.db"]);
}

#[tokio::test]
async fn test_dry_run_deletes_nothing() {
    let (dir, store, retention) = retention_fixture(Arc::new(FixedAnswerPrompt(true))).await;
    let dry = DeletionOptions {
        dry: true,
        skip_confirmation: true,
    };

    assert!(matches!(
        retention.delete_remote(dry).await.unwrap(),
        DeletionOutcome::DryRun { ref candidates } if candidates.len() == 2
    ));
    assert!(matches!(
        retention.delete_local(dry).await.unwrap(),
        DeletionOutcome::DryRun { .. }
    ));

    assert_eq!(store.keys(SNAPSHOTS).len(), 4);
    assert!(dir.path().join("spotify-data_2.db").exists());
}

#[tokio::test]
async fn test_declined_confirmation_deletes_nothing() {
    let (_dir, store, retention) = retention_fixture(Arc::new(FixedAnswerPrompt(false))).await;

    let outcome = retention
        .delete_remote(DeletionOptions::default())
        .await
        .unwrap();

    assert!(matches!(outcome, DeletionOutcome::Declined { .. }));
    assert_eq!(store.keys(SNAPSHOTS).len(), 4);
}

#[tokio::test]
async fn test_confirmed_remote_deletion() {
    let prompt = Arc::new(RecordingPrompt {
        questions: Mutex::new(Vec::new()),
    });
    let (_dir, store, retention) = retention_fixture(prompt.clone()).await;

    let outcome = retention
        .delete_remote(DeletionOptions::default())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DeletionOutcome::Deleted {
            requested: 2,
            deleted: vec!["spotify-data_2.db".to_string(), "spotify-data_3.db".to_string()],
        }
    );
    assert_eq!(
        prompt.questions.lock().unwrap().as_slice(),
        ["Delete 2 objects from bucket 'spotify-data'?"]
    );
    assert_eq!(
        store.keys(SNAPSHOTS),
        vec!["merged-spotify-data.db", "spotify-data_4.db"]
    );

    // Nothing left in both places.
    assert_eq!(
        retention.delete_remote(DeletionOptions::default()).await.unwrap(),
        DeletionOutcome::NothingToDelete
    );
}

#[tokio::test]
async fn test_local_deletion_keeps_unuploaded_shards() {
    let (dir, _store, retention) = retention_fixture(Arc::new(FixedAnswerPrompt(false))).await;

    let outcome = retention
        .delete_local(DeletionOptions {
            dry: false,
            skip_confirmation: true,
        })
        .await
        .unwrap();

    assert!(matches!(outcome, DeletionOutcome::Deleted { requested: 2, ref deleted } if deleted.len() == 2));
    assert!(dir.path().join("spotify-data_1.db").exists());
    assert!(!dir.path().join("spotify-data_2.db").exists());
    assert!(!dir.path().join("spotify-data_3.db").exists());
}

// ---------------------------------------------------------------------------
// Transfers and scheduling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_download_missing_shards_only() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 1, Vec::new(), false).await;

    let (store, gateway) = memory_gateway();
    store.insert(SNAPSHOTS, "spotify-data_1.db", b"remote copy".to_vec());
    store.insert(SNAPSHOTS, "spotify-data_2.db", b"second".to_vec());

    let transfers = ShardTransfers::new(gateway, registry(dir.path()), BucketNames::default());
    let report = transfers.download_missing_shards().await.unwrap();

    assert_eq!(report.remote, 2);
    assert_eq!(report.already_local, 1);
    assert_eq!(report.downloaded, vec![dir.path().join("spotify-data_2.db")]);
    assert_eq!(std::fs::read(dir.path().join("spotify-data_2.db")).unwrap(), b"second");
    assert_ne!(std::fs::read(dir.path().join("spotify-data_1.db")).unwrap(), b"remote copy");
}

#[tokio::test]
async fn test_backup_copies_canonical_into_backups_bucket() {
    let dir = TempDir::new().unwrap();
    let (store, gateway) = memory_gateway();
    store.insert(SNAPSHOTS, "merged-spotify-data.db", b"canonical".to_vec());

    let transfers = ShardTransfers::new(gateway, registry(dir.path()), BucketNames::default());
    let report = transfers.backup_canonical(None, 1_700_000_000).await.unwrap();

    assert_eq!(report.bucket, "spotify-data-backups");
    assert_eq!(report.key, "merged-spotify-data.1700000000.db");
    let backup = store
        .get("spotify-data-backups", "merged-spotify-data.1700000000.db")
        .unwrap();
    assert_eq!(&backup[..], b"canonical");
}

#[tokio::test]
async fn test_scheduler_cycle_collects_uploads_and_merges() {
    let dir = TempDir::new().unwrap();
    write_universe(dir.path(), &universe(24)).await;

    let (store, gateway) = memory_gateway();
    let catalog = Arc::new(ScriptedCatalog::default());
    let clock = FixedClock(Utc.timestamp_opt(3 * 3600 + 125, 0).unwrap());

    let scheduler = Scheduler::new(
        collector(dir.path(), catalog),
        Arc::new(clock),
        ScheduleOptions {
            merge_every: Some(1),
            upload_shards: true,
            max_cycles: Some(1),
            ..ScheduleOptions::default()
        },
    )
    .with_merge(MergeEngine::new(registry(dir.path()), merge_settings(u64::MAX)))
    .with_transfers(ShardTransfers::new(
        gateway,
        registry(dir.path()),
        BucketNames::default(),
    ));

    assert_eq!(scheduler.run().await.unwrap(), 1);

    assert!(dir.path().join("spotify-data_10800.db").exists());
    assert_eq!(
        store.keys(SNAPSHOTS),
        vec!["merged-spotify-data.db", "spotify-data_10800.db"]
    );
    assert_eq!(
        read_rows(&dir.path().join("merged-spotify-data.db")).await,
        vec![SnapshotRow::new("artist003", 10_800, 90, 50)]
    );
}

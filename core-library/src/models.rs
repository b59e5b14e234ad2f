//! Row types stored in snapshot databases.

use bridge_traits::catalog::ArtistMetric;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One snapshot fact. `(id, timestamp)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct SnapshotRow {
    /// Artist identifier
    pub id: String,
    /// Run timestamp, seconds since the Unix epoch
    pub timestamp: i64,
    pub followers: i64,
    /// 0-100
    pub popularity: i64,
}

impl SnapshotRow {
    pub fn new(id: impl Into<String>, timestamp: i64, followers: i64, popularity: i64) -> Self {
        Self {
            id: id.into(),
            timestamp,
            followers,
            popularity,
        }
    }

    /// Tag a catalog metric with the run timestamp.
    pub fn from_metric(metric: ArtistMetric, timestamp: i64) -> Self {
        Self {
            id: metric.id,
            timestamp,
            followers: metric.followers,
            popularity: metric.popularity,
        }
    }

    pub fn natural_key(&self) -> (&str, i64) {
        (&self.id, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_metric() {
        let row = SnapshotRow::from_metric(
            ArtistMetric {
                id: "artist-1".to_string(),
                followers: 1200,
                popularity: 64,
            },
            1_700_000_100,
        );

        assert_eq!(row, SnapshotRow::new("artist-1", 1_700_000_100, 1200, 64));
        assert_eq!(row.natural_key(), ("artist-1", 1_700_000_100));
    }
}

//! Catalog Web API response types

use bridge_traits::catalog::ArtistMetric;
use serde::Deserialize;

/// `GET /v1/artists` response. Unknown ids come back as `null` entries.
#[derive(Debug, Deserialize)]
pub struct ArtistsResponse {
    #[serde(default)]
    pub artists: Vec<Option<CatalogArtist>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogArtist {
    pub id: String,
    #[serde(default)]
    pub popularity: i64,
    #[serde(default)]
    pub followers: Followers,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Followers {
    pub total: Option<i64>,
}

impl From<CatalogArtist> for ArtistMetric {
    fn from(artist: CatalogArtist) -> Self {
        ArtistMetric {
            id: artist.id,
            followers: artist.followers.total.unwrap_or(0),
            popularity: artist.popularity,
        }
    }
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub status: u16,
    pub message: String,
}

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{MetadataError, SessionError};
use crate::io::HttpClient;

/// Default metadata endpoint.
pub const DEFAULT_METADATA_URL: &str = "https://maps.googleapis.com/maps/api/streetview/metadata";

/// Metadata status that allows the mosaic to proceed.
pub const STATUS_OK: &str = "OK";

// =============================================================================
// Data Model
// =============================================================================

/// A caller-supplied geographic location in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject coordinates that cannot name a point on the globe.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SessionError::InvalidLocation {
                message: format!("latitude {} is outside [-90, 90]", self.latitude),
            });
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SessionError::InvalidLocation {
                message: format!("longitude {} is outside [-180, 180]", self.longitude),
            });
        }
        Ok(())
    }
}

/// Panorama position as reported by the metadata service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default)]
    pub lat: f64,
    #[serde(default)]
    pub lng: f64,
}

/// Metadata document for the panorama nearest a location.
///
/// Missing fields deserialize to their defaults; `status` is the only field
/// the service always sends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub copyright: String,
    pub date: String,
    pub location: LatLng,
    pub pano_id: String,
    pub status: String,
}

impl Metadata {
    /// Check that the lookup found a usable panorama.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::NotOk`] for any status other than `"OK"`
    ///   (e.g. `"ZERO_RESULTS"`, `"REQUEST_DENIED"`)
    /// - [`MetadataError::Parse`] if the status is `"OK"` but no panorama
    ///   id was returned
    pub fn ensure_ok(&self) -> Result<(), MetadataError> {
        if self.status != STATUS_OK {
            return Err(MetadataError::NotOk {
                status: self.status.clone(),
            });
        }
        if self.pano_id.is_empty() {
            return Err(MetadataError::Parse(
                "status OK but pano_id is missing".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// MetadataResolver Trait
// =============================================================================

/// Resolves a location to panorama metadata.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Look up the panorama nearest `location`.
    ///
    /// Only transport, HTTP and parse failures are errors here; a document
    /// with a non-`"OK"` status is returned as-is and checked by the caller
    /// with [`Metadata::ensure_ok`].
    async fn resolve(&self, location: &Location) -> Result<Metadata, MetadataError>;
}

// =============================================================================
// Street View Metadata Client
// =============================================================================

/// Metadata lookup against the Street View metadata API.
pub struct StreetViewMetadataClient<C: HttpClient> {
    client: Arc<C>,
    base_url: Url,
    api_key: String,
}

impl<C: HttpClient> StreetViewMetadataClient<C> {
    pub fn new(client: Arc<C>, base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Build the lookup URL. Coordinates are written with six decimals.
    pub fn metadata_url(&self, location: &Location) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(
                "location",
                &format!("{:.6},{:.6}", location.latitude, location.longitude),
            )
            .append_pair("key", &self.api_key);
        url.into()
    }
}

#[async_trait]
impl<C: HttpClient> MetadataResolver for StreetViewMetadataClient<C> {
    async fn resolve(&self, location: &Location) -> Result<Metadata, MetadataError> {
        let url = self.metadata_url(location);
        let response = self.client.get(&url).await?;

        if !response.is_ok() {
            return Err(MetadataError::BadStatus {
                status: response.status,
            });
        }

        let metadata: Metadata = serde_json::from_slice(&response.body)
            .map_err(|e| MetadataError::Parse(e.to_string()))?;

        debug!(
            latitude = location.latitude,
            longitude = location.longitude,
            status = %metadata.status,
            pano_id = %metadata.pano_id,
            "Resolved panorama metadata"
        );

        Ok(metadata)
    }
}

// =============================================================================
// Tests
// =============================================================================

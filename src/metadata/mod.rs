//! Panorama metadata lookup.
//!
//! Resolves a geographic [`Location`] to the panorama that covers it. This is
//! the only upstream call made before any tile is requested: a lookup that
//! does not end in status `"OK"` aborts the mosaic with no tile traffic.
//!
//! # Components
//!
//! - [`Location`]: caller-supplied latitude/longitude, validated before use
//! - [`Metadata`]: the metadata service's JSON document
//! - [`MetadataResolver`]: the seam the orchestrator depends on
//! - [`StreetViewMetadataClient`]: the HTTP implementation

mod client;

pub use client::{
    LatLng, Location, Metadata, MetadataResolver, StreetViewMetadataClient,
    DEFAULT_METADATA_URL, STATUS_OK,
};

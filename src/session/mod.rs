//! Mosaic orchestration.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        MosaicService                         │
//! │  get_mosaic()                                                │
//! │  1. Validate location     4. Assemble exactly N results      │
//! │  2. Resolve metadata      5. Encode for the wire             │
//! │  3. Submit the grid       6. Persist (detached, optional)    │
//! └──────┬─────────────────────────┬──────────────────┬──────────┘
//!        │                         │                  │
//!        ▼                         ▼                  ▼
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ MetadataResolver │   │    WorkerPool    │   │ MosaicEncoder│
//! └──────────────────┘   └──────────────────┘   └──────────────┘
//! ```
//!
//! [`MosaicService`] is shared by every client. [`MosaicSession`] owns one
//! client's pool for as long as that client stays connected.

mod service;
mod stream;

pub use service::{MosaicConfig, MosaicImage, MosaicService};
pub use stream::MosaicSession;

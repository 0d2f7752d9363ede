//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          HTTP Layer                             │
//! │      GET /health     GET /mosaic?lat=&lng=     GET /session     │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────────────┐  ┌─────────────────┐  │
//! │  │  handlers   │  │         ws          │  │     routes      │  │
//! │  │ (one-shot)  │  │ (streaming session) │  │ (router config) │  │
//! │  └─────────────┘  └─────────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;
pub mod ws;

pub use handlers::{
    error_status, health_handler, mosaic_handler, AppState, ErrorResponse, HealthResponse,
    MosaicQueryParams,
};
pub use routes::{create_router, RouterConfig};
pub use ws::{
    run_session, session_handler, ErrorDescription, ImageHeader, SessionRequest, SessionResponse,
    MAX_PENDING_REQUESTS,
};

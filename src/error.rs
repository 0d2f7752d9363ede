use thiserror::Error;

/// Transport errors from the upstream HTTP services
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Network or connection error (DNS, TLS, timeout, reset)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The response body could not be read to completion
    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Errors that can occur when fetching a single tile.
///
/// Every variant is recoverable: the mosaic assembler logs it and leaves the
/// tile's region blank.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Every attempt returned a non-success status
    #[error("bad status url: \"{url}\" code: {status}, data: {body}")]
    BadStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// The tile service could not be reached
    #[error("transport error for \"{url}\": {message}")]
    Transport { url: String, message: String },

    /// The tile body was not a decodable image
    #[error("failed to decode tile from \"{url}\": {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Whether this failure came from the network rather than the service.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport { .. })
    }
}

/// Errors from the panorama metadata lookup
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// Transport error talking to the metadata service
    #[error("metadata request failed: {0}")]
    Io(#[from] IoError),

    /// The metadata service answered with a non-success HTTP status
    #[error("error bad status from metadata service {status}")]
    BadStatus { status: u16 },

    /// The metadata body was not the expected JSON document
    #[error("invalid metadata response: {0}")]
    Parse(String),

    /// The lookup succeeded but found no usable panorama (e.g. "ZERO_RESULTS")
    #[error("{status}")]
    NotOk { status: String },
}

/// Errors from the tile worker pool
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// The job queue is at capacity
    #[error("job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The pool has been stopped and accepts no more jobs
    #[error("worker pool has been stopped")]
    Stopped,
}

/// Errors from mosaic assembly
#[derive(Debug, Clone, Error)]
pub enum AssembleError {
    /// The result stream ended before the whole grid was accounted for
    #[error("result stream closed after {received} of {expected} tiles")]
    ResultsClosed { received: usize, expected: usize },
}

/// Errors writing a mosaic to local storage
#[derive(Debug, Clone, Error)]
pub enum PersistError {
    /// The JPEG copy could not be encoded
    #[error("failed to encode mosaic for storage: {0}")]
    Encode(String),

    /// The file could not be written
    #[error("failed to write mosaic to {path}: {message}")]
    Write { path: String, message: String },
}

/// Session-level errors.
///
/// These are the only errors a caller ever sees; per-tile failures are
/// absorbed by the assembler.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Latitude/longitude out of range or not finite
    #[error("invalid location: {message}")]
    InvalidLocation { message: String },

    /// Panorama metadata could not be resolved
    #[error("{0}")]
    Metadata(#[from] MetadataError),

    /// Tile jobs could not be dispatched
    #[error("{0}")]
    Pool(#[from] PoolError),

    /// Tile results could not be collected
    #[error("{0}")]
    Assemble(#[from] AssembleError),

    /// Every tile failed with a transport error
    #[error("tile service unreachable: all {failed} tile requests failed to connect")]
    TileServiceUnreachable { failed: usize },

    /// The mosaic could not be encoded for the wire
    #[error("failed to encode mosaic: {message}")]
    Encode { message: String },
}

impl SessionError {
    /// Whether a streaming session must end after reporting this error.
    ///
    /// Upstream failures end the session; request-level mistakes do not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::InvalidLocation { .. })
    }
}

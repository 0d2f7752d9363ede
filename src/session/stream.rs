use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SessionError;
use crate::io::HttpClient;
use crate::metadata::{Location, MetadataResolver};
use crate::pool::WorkerPool;

use super::service::{MosaicImage, MosaicService};

/// One client's mosaic session.
///
/// The session owns a pool for its whole lifetime and serves requests on it
/// one at a time. Cancelling the session token stops every worker, including
/// ones in the middle of a fetch.
pub struct MosaicSession<C: HttpClient + 'static, M: MetadataResolver> {
    service: Arc<MosaicService<C, M>>,
    pool: WorkerPool,
    cancel: CancellationToken,
    /// Set while a request may have left jobs or results in the pool
    dirty: bool,
}

impl<C, M> MosaicSession<C, M>
where
    C: HttpClient + 'static,
    M: MetadataResolver,
{
    /// Start a session whose workers stop when `cancel` fires.
    pub fn new(service: Arc<MosaicService<C, M>>, cancel: CancellationToken) -> Self {
        let pool = service.create_pool_with_cancellation(cancel.child_token());
        Self {
            service,
            pool,
            cancel,
            dirty: false,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Serve one location.
    ///
    /// If the previous request was interrupted, its pool is replaced first so
    /// stale results can never leak into this mosaic.
    pub async fn handle(&mut self, location: &Location) -> Result<MosaicImage, SessionError> {
        if self.dirty {
            debug!("Replacing worker pool after interrupted request");
            self.pool.stop().await;
            self.pool = self
                .service
                .create_pool_with_cancellation(self.cancel.child_token());
        }

        self.dirty = true;
        let result = self.service.get_mosaic(&mut self.pool, location).await;
        self.dirty = matches!(
            result,
            Err(SessionError::Pool(_)) | Err(SessionError::Assemble(_))
        );
        result
    }

    /// Stop every worker and wait for them to exit.
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.pool.stop().await;
        debug!("Session closed");
    }
}

//! Bounded pool of concurrent tile workers.
//!
//! # Architecture
//!
//! ```text
//!                 submit()                        next_result()
//!  Orchestrator ──────────► [ job queue ] ──┐    ┌──► MosaicAssembler
//!                                           │    │
//!                             ┌─────────────┼────┼───────────┐
//!                             │  worker 0   ▼    │           │
//!                             │  worker 1  fetch ─► [ results ]
//!                             │  ...                         │
//!                             │  worker N-1                  │
//!                             └──────────────▲───────────────┘
//!                                            │
//!                                  CancellationToken (broadcast)
//! ```
//!
//! Both queues are sized to the grid's tile count, so a whole grid can be
//! enqueued without blocking. Cancelling the token is observed by every
//! worker, not just one.

mod worker_pool;

pub use worker_pool::{default_worker_count, WorkerPool, DEFAULT_WORKER_MULTIPLIER};

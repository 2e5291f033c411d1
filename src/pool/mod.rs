//! Resource Pool Module
//!
//! This module provides a bounded pool of long-lived connections to a
//! backing store, shared by every request handler.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ResourcePool                            │
//! │                                                             │
//! │   idle (FIFO)  ┌────┐┌────┐┌────┐        size <= max_size   │
//! │   ────────────>│ C1 ││ C2 ││ C3 │──────> acquire()          │
//! │   release()    └────┘└────┘└────┘        -> Pooled          │
//! └─────────────────────────────────────────────────────────────┘
//!          ▲                                   │
//!          │ create                            │ destroy
//!   ┌──────┴───────┐                    ┌──────▼───────┐
//!   │ Growth task  │                    │ Reclamation  │
//!   │ (Tokio task) │                    │ (Tokio task) │
//!   └──────────────┘                    └──────────────┘
//! ```
//!
//! ## Features
//!
//! - **Warm start**: `min_size` connections are opened before the pool is returned
//! - **Bounded growth**: one connection at a time, never above `max_size`
//! - **Idle reclamation**: surplus connections idle past `max_idle_time` are closed
//! - **Scoped loans**: a [`Pooled`] handle returns its connection on drop
//! - **Bounded waits**: `acquire` fails with [`PoolError::Timeout`] instead of blocking forever

pub mod config;
pub mod handle;
pub mod maintenance;
pub mod manager;
pub mod resource;

// Re-export commonly used types
pub use config::{ConfigError, PoolConfig};
pub use handle::Pooled;
pub use manager::{ManageConnection, TcpConnector};
pub use resource::{PoolError, PoolState, ResourcePool};

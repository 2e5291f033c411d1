//! Bounded Resource Pool
//!
//! This module implements the pool itself: a FIFO set of idle connections
//! plus a count of every connection the pool has allocated, guarded by one
//! mutex and shared with the background tasks in
//! [`maintenance`](crate::pool::maintenance).
//!
//! ## Concurrency Model
//!
//! ```text
//!   acquire() ──pop front──┐          ┌──push back── Pooled::drop()
//!                          ▼          │
//!              ┌───────────────────────────────┐
//!              │ Mutex<PoolInner>              │
//!              │   idle: VecDeque<Idle<C>>     │
//!              │   size: usize                 │
//!              └───────────────────────────────┘
//!                 ▲ create (idle empty)   │ destroy (idle too long)
//!                 │                       ▼
//!            growth task            reclamation task
//! ```
//!
//! Two `Notify`s carry the wake-ups: `available` when a connection enters the
//! idle set, `demand` when it runs dry.

use crate::pool::config::{ConfigError, PoolConfig};
use crate::pool::handle::Pooled;
use crate::pool::maintenance;
use crate::pool::manager::ManageConnection;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tracing::{debug, info};

/// Errors returned by the pool.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    /// No connection became free in time; the caller may retry later
    #[error("no connection available after {0:?}")]
    Timeout(Duration),

    /// The manager failed to open a connection
    #[error("failed to create connection: {0}")]
    Create(String),

    #[error("pool is closed")]
    Closed,

    #[error("invalid pool configuration: {0}")]
    Config(String),
}

impl From<ConfigError> for PoolError {
    fn from(e: ConfigError) -> Self {
        PoolError::Config(e.to_string())
    }
}

/// A point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Connections allocated, idle or lent out
    pub size: usize,
    /// Connections waiting in the idle set
    pub idle: usize,
    /// `size - idle`
    pub in_use: usize,
}

/// An idle connection and the time it was last returned.
#[derive(Debug)]
pub(crate) struct Idle<C> {
    pub(crate) conn: C,
    pub(crate) idle_since: Instant,
}

impl<C> Idle<C> {
    pub(crate) fn new(conn: C) -> Self {
        Self {
            conn,
            idle_since: Instant::now(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct PoolInner<C> {
    pub(crate) idle: VecDeque<Idle<C>>,
    /// Allocated connections, including one being created
    pub(crate) size: usize,
    pub(crate) closed: bool,
    pub(crate) create_failures: u64,
    pub(crate) last_create_error: Option<String>,
}

/// State shared by the pool, its handles and its background tasks.
pub(crate) struct Shared<M: ManageConnection> {
    pub(crate) manager: M,
    pub(crate) config: PoolConfig,
    pub(crate) inner: Mutex<PoolInner<M::Connection>>,
    pub(crate) available: Notify,
    pub(crate) demand: Notify,
}

impl<M: ManageConnection> Shared<M> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, PoolInner<M::Connection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<Pooled<M>, PoolError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let failures_at_start = self.lock().create_failures;

        loop {
            // Register for a wake-up before looking, so a release between
            // the check and the wait is not missed
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if inner.closed {
                    return Err(PoolError::Closed);
                }
                if let Some(conn) = self.take_idle(&mut inner) {
                    return Ok(conn);
                }
                if inner.create_failures != failures_at_start {
                    let reason = inner.last_create_error.clone().unwrap_or_default();
                    return Err(PoolError::Create(reason));
                }
            }

            self.demand.notify_one();

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                // One last look before giving up
                let mut inner = self.lock();
                if inner.closed {
                    return Err(PoolError::Closed);
                }
                return self
                    .take_idle(&mut inner)
                    .ok_or(PoolError::Timeout(timeout));
            }
        }
    }

    fn take_idle(
        self: &Arc<Self>,
        inner: &mut PoolInner<M::Connection>,
    ) -> Option<Pooled<M>> {
        let idle = inner.idle.pop_front()?;
        if inner.idle.is_empty() {
            self.demand.notify_one();
        }
        Some(Pooled::new(Arc::clone(self), idle.conn))
    }

    /// Puts a connection back at the end of the idle set.
    pub(crate) fn release(&self, conn: M::Connection) {
        let mut inner = self.lock();
        if inner.closed {
            inner.size -= 1;
            drop(inner);
            drop(conn);
            return;
        }
        inner.idle.push_back(Idle::new(conn));
        drop(inner);
        self.available.notify_one();
    }

    /// Forgets a connection that will not come back.
    ///
    /// The growth task is always woken, since the pool may now be below
    /// `min_size` even with connections idle.
    pub(crate) fn forget(&self) {
        self.lock().size -= 1;
        self.demand.notify_one();
    }

    /// Destroys idle connections past `max_idle_time` while more than
    /// `min_size` are idle, oldest first. Returns how many were destroyed.
    pub(crate) fn reap_idle(&self) -> usize {
        let max_idle = self.config.max_idle_time();
        let mut expired = Vec::new();
        {
            let mut inner = self.lock();
            while inner.idle.len() > self.config.min_size {
                let front_expired = inner
                    .idle
                    .front()
                    .is_some_and(|front| front.idle_since.elapsed() >= max_idle);
                // FIFO order: anything behind the front is fresher
                if !front_expired {
                    break;
                }
                if let Some(idle) = inner.idle.pop_front() {
                    expired.push(idle.conn);
                    inner.size -= 1;
                }
            }
        }
        expired.len()
    }

    fn state(&self) -> PoolState {
        let inner = self.lock();
        PoolState {
            size: inner.size,
            idle: inner.idle.len(),
            in_use: inner.size - inner.idle.len(),
        }
    }

    fn close(&self) -> bool {
        let drained: Vec<_> = {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }
            inner.closed = true;
            let drained: Vec<_> = inner.idle.drain(..).collect();
            inner.size -= drained.len();
            drained
        };
        drop(drained);
        self.available.notify_waiters();
        true
    }
}

/// A bounded pool of connections created by a [`ManageConnection`].
///
/// The pool is built once at startup and shared (usually in an `Arc`) with
/// whatever needs a connection. Dropping it shuts the background tasks down.
///
/// # Example
///
/// ```ignore
/// use tinyweb::pool::{PoolConfig, ResourcePool, TcpConnector};
///
/// let config = PoolConfig::load_or_default("conf.json");
/// let pool = ResourcePool::new(TcpConnector::from_config(&config), config).await?;
///
/// {
///     let conn = pool.acquire().await?;
///     // use the connection...
/// } // returned here
/// ```
pub struct ResourcePool<M: ManageConnection> {
    shared: Arc<Shared<M>>,
    shutdown_tx: watch::Sender<bool>,
}

impl<M: ManageConnection> std::fmt::Debug for ResourcePool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("ResourcePool")
            .field("size", &state.size)
            .field("idle", &state.idle)
            .field("min_size", &self.shared.config.min_size)
            .field("max_size", &self.shared.config.max_size)
            .finish()
    }
}

impl<M: ManageConnection> ResourcePool<M> {
    /// Creates `min_size` connections, then starts the growth and
    /// reclamation tasks.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `manager` - Opens each pooled connection
    /// * `config` - Size bounds and timings; validated before anything is created
    ///
    /// # Errors
    ///
    /// [`PoolError::Config`] for an invalid configuration, and
    /// [`PoolError::Create`] if any warm-up connection cannot be opened.
    pub async fn new(manager: M, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let mut idle = VecDeque::with_capacity(config.max_size);
        for _ in 0..config.min_size {
            let conn = manager
                .connect()
                .await
                .map_err(|e| PoolError::Create(e.to_string()))?;
            idle.push_back(Idle::new(conn));
        }

        let size = idle.len();
        let shared = Arc::new(Shared {
            manager,
            inner: Mutex::new(PoolInner {
                idle,
                size,
                closed: false,
                create_failures: 0,
                last_create_error: None,
            }),
            config,
            available: Notify::new(),
            demand: Notify::new(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(maintenance::grow_loop(Arc::clone(&shared), shutdown_rx.clone()));
        tokio::spawn(maintenance::reap_loop(Arc::clone(&shared), shutdown_rx));

        info!(
            min_size = shared.config.min_size,
            max_size = shared.config.max_size,
            "Resource pool started"
        );

        Ok(Self {
            shared,
            shutdown_tx,
        })
    }

    /// Waits up to the configured `acquire_timeout` for a connection.
    pub async fn acquire(&self) -> Result<Pooled<M>, PoolError> {
        self.acquire_timeout(self.shared.config.acquire_timeout())
            .await
    }

    /// Waits up to `timeout` for a connection.
    ///
    /// Returns immediately when a connection is idle. Otherwise the call
    /// sleeps until one is returned or created, or the timeout passes.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<Pooled<M>, PoolError> {
        self.shared.acquire(timeout).await
    }

    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    pub fn manager(&self) -> &M {
        &self.shared.manager
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Stops the background tasks and destroys idle connections.
    ///
    /// Waiting and future `acquire` calls fail with [`PoolError::Closed`];
    /// lent connections are destroyed when their handles drop.
    pub fn close(&self) {
        if self.shared.close() {
            let _ = self.shutdown_tx.send(true);
            info!("Resource pool closed");
        } else {
            debug!("Resource pool already closed");
        }
    }
}

impl<M: ManageConnection> Drop for ResourcePool<M> {
    fn drop(&mut self) {
        self.close();
    }
}

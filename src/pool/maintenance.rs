//! Background Pool Maintenance
//!
//! Two Tokio tasks run for the lifetime of every pool:
//!
//! 1. **Growth**: whenever the idle set is empty and the pool is below
//!    `max_size`, create exactly one connection and wake a waiter. The pool
//!    is also topped back up to `min_size` after connections are detached.
//! 2. **Reclamation**: on a fixed interval, destroy idle connections that
//!    have sat unused for `max_idle_time`, never going below `min_size`.
//!
//! Both stop when the pool's shutdown signal fires.

use crate::pool::manager::ManageConnection;
use crate::pool::resource::{Idle, Shared};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, trace};

/// Creates one connection per observed "idle set empty, below max" event,
/// and whenever the pool has fallen below `min_size`.
pub(crate) async fn grow_loop<M: ManageConnection>(
    shared: Arc<Shared<M>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let demand = shared.demand.notified();

        // Reserve the slot before connecting so the size bound holds
        let reserved = {
            let mut inner = shared.lock();
            if inner.closed {
                return;
            }
            let wanted = inner.idle.is_empty() || inner.size < shared.config.min_size;
            if wanted && inner.size < shared.config.max_size {
                inner.size += 1;
                true
            } else {
                false
            }
        };

        if !reserved {
            tokio::select! {
                _ = demand => continue,
                _ = shutdown_rx.changed() => {
                    debug!("Pool growth task received shutdown signal");
                    return;
                }
            }
        }

        let created = tokio::select! {
            result = shared.manager.connect() => result,
            _ = shutdown_rx.changed() => {
                shared.lock().size -= 1;
                debug!("Pool growth task received shutdown signal");
                return;
            }
        };

        match created {
            Ok(conn) => {
                let mut inner = shared.lock();
                if inner.closed {
                    inner.size -= 1;
                    return;
                }
                inner.idle.push_back(Idle::new(conn));
                let size = inner.size;
                drop(inner);

                debug!(size = size, "Created pooled connection");
                shared.available.notify_one();
            }
            Err(e) => {
                {
                    let mut inner = shared.lock();
                    inner.size -= 1;
                    inner.create_failures += 1;
                    inner.last_create_error = Some(e.to_string());
                }
                error!(error = %e, "Failed to create pooled connection");
                shared.available.notify_waiters();

                tokio::select! {
                    _ = tokio::time::sleep(shared.config.create_retry_interval()) => {}
                    _ = shutdown_rx.changed() => return,
                }
            }
        }
    }
}

/// Periodically destroys connections idle for longer than `max_idle_time`.
pub(crate) async fn reap_loop<M: ManageConnection>(
    shared: Arc<Shared<M>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(shared.config.reap_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => {
                debug!("Pool reclamation task received shutdown signal");
                return;
            }
        }

        let reaped = shared.reap_idle();
        if reaped > 0 {
            let inner = shared.lock();
            debug!(
                reaped = reaped,
                size = inner.size,
                idle = inner.idle.len(),
                "Reclaimed idle connections"
            );
        } else {
            trace!("No idle connections to reclaim");
        }
    }
}

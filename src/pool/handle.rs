//! Pooled Connection Handles
//!
//! A [`Pooled`] grants exclusive use of one connection for as long as it is
//! alive. Dropping it hands the connection back to the pool, whichever way
//! the owning scope ends: normal return, `?`, or a panic unwinding.

use crate::pool::manager::ManageConnection;
use crate::pool::resource::Shared;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A connection on loan from a [`ResourcePool`](crate::pool::ResourcePool).
pub struct Pooled<M: ManageConnection> {
    shared: Arc<Shared<M>>,
    /// `Some` until the handle is dropped or detached
    conn: Option<M::Connection>,
}

impl<M: ManageConnection> Pooled<M> {
    pub(crate) fn new(shared: Arc<Shared<M>>, conn: M::Connection) -> Self {
        Self {
            shared,
            conn: Some(conn),
        }
    }

    /// Removes the connection from the pool for good.
    ///
    /// Use this for a connection that is known to be broken; the pool
    /// forgets it and may create a replacement.
    pub fn detach(mut self) -> M::Connection {
        let conn = self
            .conn
            .take()
            .expect("pooled connection is present until the handle is consumed");
        self.shared.forget();
        conn
    }
}

impl<M: ManageConnection> Deref for Pooled<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("pooled connection is present until the handle is consumed")
    }
}

impl<M: ManageConnection> DerefMut for Pooled<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("pooled connection is present until the handle is consumed")
    }
}

impl<M: ManageConnection> fmt::Debug for Pooled<M>
where
    M::Connection: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").field("conn", &self.conn).finish()
    }
}

impl<M: ManageConnection> Drop for Pooled<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn);
        }
    }
}

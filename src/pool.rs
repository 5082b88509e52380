//! Bounded-retention pool of backend transport sessions
//!
//! Acquisition never blocks: an idle session is reused when one exists,
//! otherwise a fresh one is opened. Retention is bounded instead: at most
//! `size` idle sessions are kept, surplus releases close the session.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backend::Backend;
use crate::error::Result;

pub struct ConnectionPool<B: Backend> {
    backend: Arc<B>,
    size: usize,
    idle: Mutex<Vec<B::Conn>>,
}

impl<B: Backend> ConnectionPool<B> {
    pub fn new(backend: Arc<B>, size: usize) -> Self {
        Self {
            backend,
            size,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Take an idle session or open a new one.
    ///
    /// The session is removed from the idle set before being returned, so it
    /// is never shared between concurrent operations.
    pub async fn acquire(&self) -> Result<B::Conn> {
        if let Some(conn) = self.idle.lock().await.pop() {
            return Ok(conn);
        }
        debug!(backend = self.backend.name(), "pool empty, opening new connection");
        self.backend.connect().await
    }

    /// Return a session; retained while under the size bound, closed otherwise.
    pub async fn release(&self, conn: B::Conn) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.size {
            idle.push(conn);
            return;
        }
        drop(idle);
        debug!(backend = self.backend.name(), "pool full, closing surplus connection");
        self.backend.close(conn).await;
    }

    /// Close every idle session. Used during shutdown.
    pub async fn drain(&self) {
        let idle = std::mem::take(&mut *self.idle.lock().await);
        for conn in idle {
            self.backend.close(conn).await;
        }
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }
}

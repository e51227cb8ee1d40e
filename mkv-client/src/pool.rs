//! # Connection Pool
//!
//! Purpose: Hand out exclusive use of one of several stateful connections so
//! concurrent callers never share a socket.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Entries are created up front and reused.
//! 2. **Atomic Scan-and-Lock**: Finding a free entry and locking it happen
//!    under one mutex guard, with no await in between.
//! 3. **RAII Release**: `PooledConnection` unlocks its entry on drop, so
//!    error and cancellation paths release too.
//! 4. **Explicit Growth**: `GrowthPolicy` decides between adding an entry and
//!    waiting for a release.
//!
//! ## Entry States
//!
//! ```text
//! Unlocked(conn) --acquire--> Locked --release(conn)--> Unlocked(conn)
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

use mkv_common::{GetOptions, MetaResponse, StoreStatus};

use crate::config::{ClientConfig, GrowthPolicy, PoolConfig, Transport};
use crate::connection::Connection;
use crate::error::ClientResult;

enum Entry {
    Unlocked(Connection),
    Locked,
}

impl Entry {
    fn is_unlocked(&self) -> bool {
        matches!(self, Entry::Unlocked(_))
    }

    fn lock(&mut self) -> Option<Connection> {
        match std::mem::replace(self, Entry::Locked) {
            Entry::Unlocked(conn) => Some(conn),
            Entry::Locked => None,
        }
    }
}

struct PoolInner {
    transport: Transport,
    client: ClientConfig,
    growth: GrowthPolicy,
    entries: Mutex<Vec<Entry>>,
    released: Notify,
}

impl PoolInner {
    fn entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        // Entry bookkeeping stays consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_connection(&self) -> Connection {
        Connection::with_transport(self.transport.clone(), &self.client)
    }

    fn release(&self, index: usize, conn: Connection) {
        self.entries()[index] = Entry::Unlocked(conn);
        self.released.notify_waiters();
    }
}

/// Pool of meta protocol connections.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Creates a pool with `pool_size` unconnected entries, or
    /// `DEFAULT_POOL_SIZE` when `pool_size` is zero.
    ///
    /// Transport conflicts fail here, before any socket is opened.
    pub fn new(config: PoolConfig) -> ClientResult<Self> {
        let transport = config.transport()?;
        let entries = (0..config.initial_size())
            .map(|_| Entry::Unlocked(Connection::with_transport(transport.clone(), &config.client)))
            .collect();
        Ok(Pool {
            inner: Arc::new(PoolInner {
                transport,
                client: config.client,
                growth: config.growth,
                entries: Mutex::new(entries),
                released: Notify::new(),
            }),
        })
    }

    /// Total number of entries, locked or not.
    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    /// True when the pool holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.inner.entries().is_empty()
    }

    /// Number of entries currently unlocked.
    pub fn idle(&self) -> usize {
        self.inner
            .entries()
            .iter()
            .filter(|entry| entry.is_unlocked())
            .count()
    }

    /// Locks the first free entry in insertion order.
    ///
    /// When none is free the pool grows, or under `GrowthPolicy::Bounded` at
    /// its limit, waits until an entry is released.
    pub async fn acquire(&self) -> PooledConnection {
        loop {
            // Registered before the scan so a release in between is not missed.
            let released = self.inner.released.notified();
            if let Some(conn) = self.try_acquire() {
                return conn;
            }
            released.await;
        }
    }

    /// Non-waiting variant of [`Pool::acquire`].
    pub fn try_acquire(&self) -> Option<PooledConnection> {
        let mut entries = self.inner.entries();
        let index = match entries.iter().position(Entry::is_unlocked) {
            Some(index) => index,
            None => {
                if !self.inner.growth.allows(entries.len()) {
                    return None;
                }
                entries.push(Entry::Unlocked(self.inner.new_connection()));
                debug!(size = entries.len(), "pool grew");
                entries.len() - 1
            }
        };
        let conn = entries[index].lock()?;
        Some(PooledConnection {
            pool: self.inner.clone(),
            index,
            conn: Some(conn),
        })
    }

    /// Stores `value` under `table ++ id`.
    pub async fn set(
        &self,
        table: &str,
        id: &str,
        value: impl AsRef<[u8]>,
    ) -> ClientResult<StoreStatus> {
        let mut conn = self.acquire().await;
        conn.set(table, id, value).await
    }

    /// Fetches the value under `table ++ id`; `None` on a miss.
    pub async fn get(&self, table: &str, id: &str) -> ClientResult<Option<Bytes>> {
        let mut conn = self.acquire().await;
        conn.get(table, id).await
    }

    /// Issues `mg` with explicit flags and returns the whole response.
    pub async fn get_with_options(
        &self,
        table: &str,
        id: &str,
        options: &GetOptions,
    ) -> ClientResult<MetaResponse> {
        let mut conn = self.acquire().await;
        conn.get_with_options(table, id, options).await
    }

    /// Stores `value` as JSON.
    pub async fn set_json<T>(&self, table: &str, id: &str, value: &T) -> ClientResult<StoreStatus>
    where
        T: Serialize + ?Sized,
    {
        let mut conn = self.acquire().await;
        conn.set_json(table, id, value).await
    }

    /// Fetches and deserializes a JSON value.
    pub async fn get_json<T>(&self, table: &str, id: &str) -> ClientResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.acquire().await;
        conn.get_json(table, id).await
    }

    /// Stores `values` as a JSON array under the list table.
    pub async fn set_list<T>(&self, list_id: &str, values: &[T]) -> ClientResult<StoreStatus>
    where
        T: Serialize,
    {
        let mut conn = self.acquire().await;
        conn.set_list(list_id, values).await
    }

    /// Fetches a JSON array stored with `set_list`.
    pub async fn get_list<T>(&self, list_id: &str) -> ClientResult<Option<Vec<T>>>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.acquire().await;
        conn.get_list(list_id).await
    }
}

/// RAII guard giving exclusive use of one pooled connection.
///
/// Dropping the guard, or calling [`PooledConnection::release`], unlocks the
/// entry.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    index: usize,
    conn: Option<Connection>,
}

impl PooledConnection {
    /// Position of the entry in the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the entry to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection exists")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection exists")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(self.index, conn);
        }
    }
}

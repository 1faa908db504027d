use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use chronodb_core::{CoreError, CoreResult, TransactionControl};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::util::storage_error;

#[derive(Default)]
struct SessionState {
    transaction: Option<Transaction<'static, Sqlite>>,
    snapshot_depth: usize,
}

/// A catalog session: a connection pool plus at most one open transaction.
///
/// Every repository built on the same session runs its statements inside
/// the session's transaction while one is open, and in autocommit mode
/// otherwise. This mirrors a backend session whose catalog reads and
/// writes follow whatever transaction block the caller is in.
pub struct SqliteSession {
    pool: SqlitePool,
    state: Mutex<SessionState>,
}

impl SqliteSession {
    /// Creates a session over the provided pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Returns the underlying pool (useful for composing with other services).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Borrows the connection statements should run on.
    pub(crate) async fn connection(&self) -> CoreResult<SessionConnection<'_>> {
        let state = self.state.lock().await;
        match MutexGuard::try_map(state, |state: &mut SessionState| {
            state.transaction.as_deref_mut()
        }) {
            Ok(conn) => Ok(SessionConnection::Transaction(conn)),
            Err(state) => {
                drop(state);
                let conn = self.pool.acquire().await.map_err(storage_error)?;
                Ok(SessionConnection::Pooled(conn))
            }
        }
    }
}

/// Connection handed to repositories for the duration of one statement.
pub(crate) enum SessionConnection<'a> {
    Transaction(MappedMutexGuard<'a, SqliteConnection>),
    Pooled(PoolConnection<Sqlite>),
}

impl Deref for SessionConnection<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self {
            Self::Transaction(conn) => &**conn,
            Self::Pooled(conn) => &**conn,
        }
    }
}

impl DerefMut for SessionConnection<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self {
            Self::Transaction(conn) => &mut **conn,
            Self::Pooled(conn) => &mut **conn,
        }
    }
}

#[async_trait]
impl TransactionControl for SqliteSession {
    async fn is_in_transaction(&self) -> bool {
        self.state.lock().await.transaction.is_some()
    }

    async fn start_transaction(&self) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.transaction.is_some() {
            return Err(CoreError::invalid_state(
                "there is already a transaction in progress",
            ));
        }
        let transaction = self.pool.begin().await.map_err(storage_error)?;
        state.transaction = Some(transaction);
        tracing::trace!("started catalog transaction");
        Ok(())
    }

    async fn commit_transaction(&self) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.snapshot_depth != 0 {
            return Err(CoreError::invalid_state(format!(
                "cannot commit with {} active snapshot(s)",
                state.snapshot_depth
            )));
        }
        let transaction = state
            .transaction
            .take()
            .ok_or_else(|| CoreError::invalid_state("there is no transaction in progress"))?;
        transaction.commit().await.map_err(storage_error)?;
        tracing::trace!("committed catalog transaction");
        Ok(())
    }

    async fn abort_transaction(&self) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        state.snapshot_depth = 0;
        match state.transaction.take() {
            Some(transaction) => {
                transaction.rollback().await.map_err(storage_error)?;
                tracing::trace!("rolled back catalog transaction");
            }
            None => tracing::debug!("abort requested with no transaction in progress"),
        }
        Ok(())
    }

    // SQLite statements inside one transaction already read from a single
    // snapshot; the depth only has to stay balanced.
    async fn push_active_snapshot(&self) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.transaction.is_none() {
            return Err(CoreError::invalid_state(
                "cannot push a snapshot outside of a transaction",
            ));
        }
        state.snapshot_depth += 1;
        Ok(())
    }

    async fn pop_active_snapshot(&self) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.snapshot_depth == 0 {
            return Err(CoreError::invalid_state("no active snapshot to pop"));
        }
        state.snapshot_depth -= 1;
        Ok(())
    }
}

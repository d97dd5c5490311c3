//! Session: lightweight, single-threaded unit of work

use crate::connection::{Connection, Endpoint};
use crate::cursor::{CancelHandle, RecordCursor};
use crate::pool::Pool;
use crate::protocol::{Request, Response};
use crate::summary::Bookmark;
use crate::transaction::Transaction;
use crate::value::{validate_params, Params, Value};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A sequential scope for queries and transactions against one endpoint.
///
/// Sessions are cheap: creating one performs no I/O. A connection is
/// borrowed from the pool on the first query and held until the session is
/// closed, so at most one pooled connection is tied up per session.
/// Sessions are not thread-safe by contract and take `&mut self` on every
/// operation.
///
/// Bookmarks accumulated from committed transactions are threaded into
/// every subsequent BEGIN and auto-commit RUN for causal ordering.
pub struct Session {
    pool: Arc<Pool>,
    endpoint: Endpoint,
    database: Option<String>,
    fetch_size: i64,
    conn: Option<Connection>,
    bookmarks: Vec<String>,
    pending_rollback: bool,
    closed: bool,
}

impl Session {
    pub(crate) fn new(
        pool: Arc<Pool>,
        endpoint: Endpoint,
        database: Option<String>,
        fetch_size: i64,
    ) -> Self {
        Self {
            pool,
            endpoint,
            database,
            fetch_size,
            conn: None,
            bookmarks: Vec::new(),
            pending_rollback: false,
            closed: false,
        }
    }

    /// Target database, or the server default when unset
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Records pulled per PULL batch
    pub fn fetch_size(&self) -> i64 {
        self.fetch_size
    }

    /// Bookmarks that will be threaded into the next transaction
    pub fn bookmarks(&self) -> &[String] {
        &self.bookmarks
    }

    /// The most recently recorded bookmark
    pub fn last_bookmark(&self) -> Option<&str> {
        self.bookmarks.last().map(String::as_str)
    }

    /// Record a bookmark for causal chaining.
    ///
    /// Called on transaction commit; also available to callers who want to
    /// thread an auto-commit summary's bookmark into later work.
    pub fn record_bookmark(&mut self, bookmark: Bookmark) {
        self.bookmarks = vec![bookmark.into()];
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.conn.as_mut()
    }

    pub(crate) fn flag_pending_rollback(&mut self) {
        self.pending_rollback = true;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    /// Make sure a usable connection is checked out, cleaning up whatever a
    /// previous operation left behind.
    ///
    /// An abandoned result stream is drained and discarded; a transaction
    /// dropped without commit gets its server state cleared by RESET. A
    /// connection that died in the meantime is handed back to the pool and
    /// the error surfaces instead of being retried transparently.
    pub(crate) async fn checkout(&mut self) -> Result<()> {
        self.ensure_open()?;

        if let Some(conn) = &mut self.conn {
            if !conn.is_live() {
                if let Some(dead) = self.conn.take() {
                    self.pool.release(dead);
                }
                self.pending_rollback = false;
                return Err(Error::ConnectionClosed);
            }
            if conn.is_streaming() {
                conn.drain_stream().await?;
            }
            if self.pending_rollback {
                // RESET aborts an open transaction and clears any failure
                // state, covering both ways a transaction can be abandoned
                conn.reset().await?;
                self.pending_rollback = false;
            }
            return Ok(());
        }

        let conn = self.pool.acquire(&self.endpoint).await?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Run a query in its own auto-commit transaction.
    ///
    /// Parameters are validated before anything is sent; an unsupported
    /// parameter type fails the call with no network traffic. The returned
    /// cursor streams lazily; its terminal summary carries the bookmark for
    /// the committed state.
    pub async fn run(&mut self, query: &str, parameters: Params) -> Result<RecordCursor<'_>> {
        self.ensure_open()?;
        validate_params(&parameters)?;
        self.checkout().await?;

        let mut extra = HashMap::new();
        if let Some(db) = &self.database {
            extra.insert("db".to_string(), Value::String(db.clone()));
        }
        if !self.bookmarks.is_empty() {
            extra.insert(
                "bookmarks".to_string(),
                Value::List(self.bookmarks.iter().cloned().map(Value::String).collect()),
            );
        }

        let fetch_size = self.fetch_size;
        let conn = self.conn.as_mut().ok_or(Error::ConnectionClosed)?;
        conn.send(&Request::Run {
            query: query.to_string(),
            parameters,
            extra,
        })
        .await?;

        match conn.receive().await? {
            Response::Success(meta) => {
                let fields = match meta.get("fields") {
                    Some(Value::List(items)) => items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    _ => Vec::new(),
                };
                conn.begin_stream()?;
                crate::metrics::counters::query_started();
                Ok(RecordCursor::new(
                    self.conn.as_mut().ok_or(Error::ConnectionClosed)?,
                    fields,
                    fetch_size,
                    None,
                    CancelHandle::default(),
                ))
            }
            Response::Failure(err) => {
                crate::metrics::counters::query_failed(&err.code);
                let conn = self.conn.as_mut().ok_or(Error::ConnectionClosed)?;
                // A failed RESET marks the connection defunct; the server
                // failure is still what surfaces
                let _ = conn.reset().await;
                Err(Error::Server(err))
            }
            other => {
                let conn = self.conn.as_mut().ok_or(Error::ConnectionClosed)?;
                conn.mark_defunct();
                Err(Error::Protocol(format!(
                    "unexpected {} in response to RUN",
                    other.name()
                )))
            }
        }
    }

    /// Begin an explicit transaction.
    ///
    /// No I/O happens here; BEGIN is deferred until the transaction's first
    /// query. The transaction borrows the session exclusively, so a session
    /// carries at most one transaction at a time.
    pub fn begin_transaction(&mut self) -> Result<Transaction<'_>> {
        self.ensure_open()?;
        Ok(Transaction::new(self))
    }

    /// Close the session, returning its connection to the pool.
    ///
    /// An unconsumed result stream is drained and discarded; an abandoned
    /// transaction is rolled back via RESET. Cleanup failures mark the
    /// connection defunct, and the pool discards it on release. Idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut conn) = self.conn.take() {
            if conn.is_streaming() {
                let _ = conn.drain_stream().await;
            }
            if self.pending_rollback && conn.is_live() {
                let _ = conn.reset().await;
            }
            self.pending_rollback = false;
            self.pool.release(conn);
        }
        tracing::debug!(endpoint = %self.endpoint, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Drop cannot run the orderly close; give the connection back so
        // the pool slot is not leaked. The pool discards it if a stream or
        // abandoned transaction left it dirty.
        if let Some(mut conn) = self.conn.take() {
            if self.pending_rollback || conn.is_streaming() {
                conn.mark_defunct();
            }
            self.pool.release(conn);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("connected", &self.conn.is_some())
            .field("closed", &self.closed)
            .finish()
    }
}

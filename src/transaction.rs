//! Explicit transaction state machine

use crate::cursor::{CancelHandle, RecordCursor};
use crate::protocol::{Request, Response};
use crate::session::Session;
use crate::summary::Bookmark;
use crate::value::{validate_params, Params};
use crate::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Transaction lifecycle state.
///
/// `Pending → Open → {Committed, RolledBack, Failed}`; `Failed` still
/// permits rollback, the other two are fully terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Created, no BEGIN sent yet
    Pending,
    /// BEGIN accepted by the server
    Open,
    /// Committed
    Committed,
    /// Rolled back
    RolledBack,
    /// A query drew a server FAILURE; only rollback is permitted
    Failed,
}

impl TxState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            TxState::Pending => 0,
            TxState::Open => 1,
            TxState::Committed => 2,
            TxState::RolledBack => 3,
            TxState::Failed => 4,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => TxState::Pending,
            1 => TxState::Open,
            2 => TxState::Committed,
            3 => TxState::RolledBack,
            _ => TxState::Failed,
        }
    }

    /// Whether the transaction can accept no further work
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TxState::Committed | TxState::RolledBack | TxState::Failed
        )
    }
}

impl std::fmt::Display for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Open => write!(f, "open"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A unit of work scoped within a session.
///
/// Created by [`Session::begin_transaction`]; the BEGIN message is deferred
/// until the first query so an untouched transaction never contacts the
/// server. Single-threaded use by contract, like its parent session.
///
/// Dropping an open transaction without committing flags the session to
/// roll back before the connection is reused or released; calling
/// [`rollback`](Self::rollback) or [`commit`](Self::commit) explicitly is
/// the clean path.
pub struct Transaction<'s> {
    session: &'s mut Session,
    status: Arc<AtomicU8>,
    cancel: CancelHandle,
    queries_issued: u64,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            status: Arc::new(AtomicU8::new(TxState::Pending.as_u8())),
            cancel: CancelHandle::default(),
            queries_issued: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TxState {
        TxState::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Number of queries accepted by the server in this transaction
    pub fn queries_issued(&self) -> u64 {
        self.queries_issued
    }

    /// Handle for cancelling this transaction's work from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn set_state(&self, state: TxState) {
        self.status.store(state.as_u8(), Ordering::Release);
    }

    /// Reject any operation on a failed or terminal transaction without
    /// contacting the server.
    fn check_runnable(&self) -> Result<()> {
        match self.state() {
            TxState::Pending | TxState::Open => Ok(()),
            TxState::Failed => Err(Error::State("transaction already failed".into())),
            state => Err(Error::State(format!("transaction already {}", state))),
        }
    }

    /// Submit a query within this transaction.
    ///
    /// The first query sends BEGIN ahead of RUN. Results are observed in
    /// submission order; a previous query's unconsumed stream is drained and
    /// discarded before the next RUN goes out.
    pub async fn run(&mut self, query: &str, parameters: Params) -> Result<RecordCursor<'_>> {
        self.check_runnable()?;
        if self.cancel.is_cancelled() {
            if let Some(conn) = self.session.connection_mut() {
                conn.mark_defunct();
            }
            return Err(Error::Cancelled);
        }
        // Parameter validation precedes all network I/O
        validate_params(&parameters)?;

        self.session.checkout().await?;

        if self.state() == TxState::Pending {
            self.begin().await?;
        }

        let fetch_size = self.session.fetch_size();
        let conn = self
            .session
            .connection_mut()
            .ok_or(Error::ConnectionClosed)?;
        if conn.is_streaming() {
            conn.drain_stream().await?;
        }

        conn.send(&Request::Run {
            query: query.to_string(),
            parameters,
            extra: Default::default(),
        })
        .await?;

        match conn.receive().await? {
            Response::Success(meta) => {
                let fields = extract_fields(&meta);
                conn.begin_stream()?;
                self.queries_issued += 1;
                crate::metrics::counters::query_started();
                tracing::debug!(queries = self.queries_issued, "query accepted in transaction");
                Ok(RecordCursor::new(
                    self.session
                        .connection_mut()
                        .ok_or(Error::ConnectionClosed)?,
                    fields,
                    fetch_size,
                    Some(self.status.clone()),
                    self.cancel.clone(),
                ))
            }
            Response::Failure(err) => {
                crate::metrics::counters::query_failed(&err.code);
                self.set_state(TxState::Failed);
                let conn = self
                    .session
                    .connection_mut()
                    .ok_or(Error::ConnectionClosed)?;
                // A failed RESET marks the connection defunct; the server
                // failure is still what surfaces
                let _ = conn.reset().await;
                Err(Error::Server(err))
            }
            other => {
                let conn = self
                    .session
                    .connection_mut()
                    .ok_or(Error::ConnectionClosed)?;
                conn.mark_defunct();
                Err(Error::Protocol(format!(
                    "unexpected {} in response to RUN",
                    other.name()
                )))
            }
        }
    }

    /// Send BEGIN with the session's database and accumulated bookmarks.
    async fn begin(&mut self) -> Result<()> {
        let begin = Request::Begin {
            database: self.session.database().map(str::to_string),
            bookmarks: self.session.bookmarks().to_vec(),
        };
        let conn = self
            .session
            .connection_mut()
            .ok_or(Error::ConnectionClosed)?;
        conn.send(&begin).await?;
        match conn.receive().await? {
            Response::Success(_) => {
                self.set_state(TxState::Open);
                tracing::debug!("transaction opened");
                Ok(())
            }
            Response::Failure(err) => {
                // `conn` still borrows the session, so store through the
                // status cell rather than calling a `&self` method
                self.status.store(TxState::Failed.as_u8(), Ordering::Release);
                let _ = conn.reset().await;
                Err(Error::Server(err))
            }
            other => {
                conn.mark_defunct();
                Err(Error::Protocol(format!(
                    "unexpected {} in response to BEGIN",
                    other.name()
                )))
            }
        }
    }

    /// Commit the transaction.
    ///
    /// Returns the bookmark representing the committed state, which is also
    /// threaded into the session for causal chaining. A transaction that
    /// never ran a query commits locally without contacting the server.
    pub async fn commit(&mut self) -> Result<Option<Bookmark>> {
        match self.state() {
            TxState::Pending => {
                self.set_state(TxState::Committed);
                return Ok(None);
            }
            TxState::Open => {}
            TxState::Failed => return Err(Error::State("transaction already failed".into())),
            state => return Err(Error::State(format!("transaction already {}", state))),
        }

        let conn = self
            .session
            .connection_mut()
            .ok_or(Error::ConnectionClosed)?;
        // An unconsumed stream must be drained so the COMMIT response lines
        // up with the request
        if conn.is_streaming() {
            conn.drain_stream().await?;
        }

        conn.send(&Request::Commit).await?;
        match conn.receive().await? {
            Response::Success(meta) => {
                self.set_state(TxState::Committed);
                let bookmark = match meta.get("bookmark") {
                    Some(crate::value::Value::String(token)) => Some(Bookmark::new(token.clone())),
                    _ => None,
                };
                if let Some(bm) = &bookmark {
                    self.session.record_bookmark(bm.clone());
                }
                tracing::debug!(queries = self.queries_issued, "transaction committed");
                Ok(bookmark)
            }
            Response::Failure(err) => {
                crate::metrics::counters::query_failed(&err.code);
                self.set_state(TxState::Failed);
                let conn = self
                    .session
                    .connection_mut()
                    .ok_or(Error::ConnectionClosed)?;
                let _ = conn.reset().await;
                Err(Error::Server(err))
            }
            other => {
                let conn = self
                    .session
                    .connection_mut()
                    .ok_or(Error::ConnectionClosed)?;
                conn.mark_defunct();
                Err(Error::Protocol(format!(
                    "unexpected {} in response to COMMIT",
                    other.name()
                )))
            }
        }
    }

    /// Roll back the transaction.
    ///
    /// Permitted from `Pending` (local no-op), `Open`, and `Failed`; fails
    /// with a state error once committed or already rolled back.
    pub async fn rollback(&mut self) -> Result<()> {
        match self.state() {
            TxState::Pending => {
                self.set_state(TxState::RolledBack);
                return Ok(());
            }
            TxState::Open => {}
            TxState::Failed => {
                // The server already abandoned the transaction at FAILURE;
                // RESET clears the failure state client- and server-side
                let conn = self
                    .session
                    .connection_mut()
                    .ok_or(Error::ConnectionClosed)?;
                if conn.is_streaming() {
                    let _ = conn.drain_stream().await;
                }
                if conn.is_live() {
                    conn.reset().await?;
                }
                self.set_state(TxState::RolledBack);
                return Ok(());
            }
            state => return Err(Error::State(format!("transaction already {}", state))),
        }

        let conn = self
            .session
            .connection_mut()
            .ok_or(Error::ConnectionClosed)?;
        if conn.is_streaming() {
            conn.drain_stream().await?;
        }
        conn.send(&Request::Rollback).await?;
        match conn.receive().await? {
            Response::Success(_) => {
                self.set_state(TxState::RolledBack);
                tracing::debug!("transaction rolled back");
                Ok(())
            }
            Response::Failure(err) => {
                self.set_state(TxState::RolledBack);
                let conn = self
                    .session
                    .connection_mut()
                    .ok_or(Error::ConnectionClosed)?;
                let _ = conn.reset().await;
                Err(Error::Server(err))
            }
            other => {
                let conn = self
                    .session
                    .connection_mut()
                    .ok_or(Error::ConnectionClosed)?;
                conn.mark_defunct();
                Err(Error::Protocol(format!(
                    "unexpected {} in response to ROLLBACK",
                    other.name()
                )))
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        // Rollback needs I/O, which Drop cannot do; flag the session so the
        // ROLLBACK goes out before the connection is reused or released
        match self.state() {
            TxState::Open | TxState::Failed => self.session.flag_pending_rollback(),
            _ => {}
        }
    }
}

fn extract_fields(meta: &std::collections::HashMap<String, crate::value::Value>) -> Vec<String> {
    match meta.get("fields") {
        Some(crate::value::Value::List(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [
            TxState::Pending,
            TxState::Open,
            TxState::Committed,
            TxState::RolledBack,
            TxState::Failed,
        ] {
            assert_eq!(TxState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TxState::Pending.is_terminal());
        assert!(!TxState::Open.is_terminal());
        assert!(TxState::Committed.is_terminal());
        assert!(TxState::RolledBack.is_terminal());
        assert!(TxState::Failed.is_terminal());
    }
}

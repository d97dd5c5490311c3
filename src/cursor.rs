//! Lazy result cursor

use crate::connection::Connection;
use crate::protocol::{Request, Response};
use crate::summary::Summary;
use crate::transaction::TxState;
use crate::value::Record;
use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cross-thread cancellation handle for an in-flight result stream.
///
/// Tripping the handle makes the waiting consumer observe `Cancelled` and
/// marks the underlying connection unusable, since mid-stream protocol state
/// cannot be rewound.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation. Safe to call from any thread, any number of
    /// times.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A lazy, forward-only sequence of records produced by one query.
///
/// Records are pulled from the server in batches of `fetch_size`; `next`
/// suspends only when the local buffer is empty and the server has more.
/// Once exhausted the terminal [`Summary`] is available and further `next`
/// calls return `Ok(None)`.
pub struct RecordCursor<'c> {
    conn: &'c mut Connection,
    fields: Arc<Vec<String>>,
    buffer: VecDeque<Record>,
    has_more: bool,
    summary: Option<Summary>,
    fetch_size: i64,
    tx_status: Option<Arc<AtomicU8>>,
    cancel: CancelHandle,
    started: Instant,
    streamed: u64,
}

impl<'c> RecordCursor<'c> {
    pub(crate) fn new(
        conn: &'c mut Connection,
        fields: Vec<String>,
        fetch_size: i64,
        tx_status: Option<Arc<AtomicU8>>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            conn,
            fields: Arc::new(fields),
            buffer: VecDeque::new(),
            has_more: true,
            summary: None,
            fetch_size,
            tx_status,
            cancel,
            started: Instant::now(),
            streamed: 0,
        }
    }

    /// Field names of the result, in record order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Handle for cancelling this stream from another thread
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Terminal summary; populated once the stream is exhausted
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Pull the next record.
    ///
    /// Returns `Ok(None)` once the stream is exhausted, on this and every
    /// later call. Fails with `CursorInvalidated` if the owning transaction
    /// reached a terminal state while records were unconsumed.
    pub async fn next(&mut self) -> Result<Option<Record>> {
        loop {
            if self.cancel.is_cancelled() {
                self.conn.mark_defunct();
                return Err(Error::Cancelled);
            }
            if let Some(status) = &self.tx_status {
                let state = TxState::from_u8(status.load(Ordering::Acquire));
                if state.is_terminal() {
                    return Err(Error::CursorInvalidated(state.to_string()));
                }
            }

            if let Some(record) = self.buffer.pop_front() {
                self.streamed += 1;
                return Ok(Some(record));
            }
            if self.summary.is_some() || !self.has_more {
                return Ok(None);
            }

            self.fetch_batch().await?;
        }
    }

    /// Drain the remainder of the stream and return the terminal summary.
    pub async fn consume(mut self) -> Result<Summary> {
        while self.next().await?.is_some() {}
        self.summary
            .take()
            .ok_or_else(|| Error::Protocol("stream ended without a summary".into()))
    }

    /// Collect all remaining records, leaving the summary available.
    pub async fn collect_records(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Request one PULL batch and buffer its records.
    async fn fetch_batch(&mut self) -> Result<()> {
        self.conn.send(&Request::Pull { n: self.fetch_size }).await?;
        loop {
            match self.conn.receive().await? {
                Response::Record(values) => {
                    self.buffer
                        .push_back(Record::new(self.fields.clone(), values));
                }
                Response::Success(meta) => {
                    let more = matches!(
                        meta.get("has_more"),
                        Some(crate::value::Value::Bool(true))
                    );
                    if more {
                        self.has_more = true;
                    } else {
                        self.has_more = false;
                        self.conn.end_stream()?;
                        let summary = Summary::from_metadata(meta);
                        crate::metrics::counters::records_streamed(
                            self.streamed + self.buffer.len() as u64,
                        );
                        crate::metrics::histograms::query_duration(
                            self.started.elapsed().as_millis() as u64,
                        );
                        self.summary = Some(summary);
                    }
                    return Ok(());
                }
                Response::Failure(err) => {
                    crate::metrics::counters::query_failed(&err.code);
                    if let Some(status) = &self.tx_status {
                        status.store(TxState::Failed.as_u8(), Ordering::Release);
                    }
                    // The server ignores everything after a FAILURE until a
                    // RESET clears it; a failed RESET marks the connection
                    // defunct and the server failure still surfaces
                    self.conn.end_stream()?;
                    let _ = self.conn.reset().await;
                    self.has_more = false;
                    return Err(Error::Server(err));
                }
                Response::Ignored => {
                    self.conn.end_stream()?;
                    let _ = self.conn.reset().await;
                    self.has_more = false;
                    return Err(Error::Protocol(
                        "server ignored PULL: connection was in a failed state".into(),
                    ));
                }
            }
        }
    }
}

impl std::fmt::Debug for RecordCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCursor")
            .field("fields", &self.fields)
            .field("buffered", &self.buffer.len())
            .field("has_more", &self.has_more)
            .field("exhausted", &self.summary.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle_is_sticky_and_cloneable() {
        let handle = CancelHandle::default();
        let other = handle.clone();
        assert!(!other.is_cancelled());
        handle.cancel();
        assert!(other.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_cancel_handle_crosses_threads() {
        let handle = CancelHandle::default();
        let moved = handle.clone();
        std::thread::spawn(move || moved.cancel()).join().unwrap();
        assert!(handle.is_cancelled());
    }
}

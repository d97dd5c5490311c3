//! Error types

use crate::protocol::ServerError;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Driver error taxonomy
///
/// Errors that imply the underlying connection can no longer be trusted
/// (`Network`, `ConnectionClosed`, `Timeout`, `Protocol`, `Cancelled`) are
/// never retried internally: the connection is discarded and the error is
/// surfaced to the caller. Only pool exhaustion is waited on, bounded by the
/// configured connection timeout.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level I/O failure. The connection is dead.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// The server closed the connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// A read or connect exceeded its configured timeout. The connection is
    /// treated as dead for disposal purposes but surfaced distinctly.
    #[error("operation timed out")]
    Timeout,

    /// The server rejected the handshake or credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The peer violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No connection became available within the acquisition timeout.
    /// Transient; the caller may retry after backoff.
    #[error("connection pool exhausted for {endpoint}")]
    PoolExhausted {
        /// Endpoint whose pool slot could not be obtained
        endpoint: String,
    },

    /// The driver was shut down while the operation was waiting.
    #[error("driver is closed")]
    DriverClosed,

    /// The server reported a query or transaction failure.
    #[error("server failure: {0}")]
    Server(#[from] ServerError),

    /// Operation on a session that was already closed.
    #[error("session is closed")]
    SessionClosed,

    /// Caller protocol misuse, e.g. operating on a terminal transaction.
    #[error("invalid state: {0}")]
    State(String),

    /// A parameter value outside the supported set. Never reaches the
    /// network.
    #[error("unsupported parameter type: {0}")]
    UnsupportedType(String),

    /// The owning transaction reached a terminal state while the cursor was
    /// unconsumed.
    #[error("result cursor invalidated: owning transaction is {0}")]
    CursorInvalidated(String),

    /// The operation was cancelled from another thread.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration or URI.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means the connection carrying the operation can no
    /// longer be trusted and must not be returned to the idle pool.
    pub fn poisons_connection(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::ConnectionClosed
                | Error::Timeout
                | Error::Protocol(_)
                | Error::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_poison() {
        let err = Error::Network(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        ));
        assert!(err.poisons_connection());
        assert!(Error::Timeout.poisons_connection());
        assert!(Error::ConnectionClosed.poisons_connection());
        assert!(Error::Cancelled.poisons_connection());
    }

    #[test]
    fn test_caller_errors_do_not_poison() {
        assert!(!Error::SessionClosed.poisons_connection());
        assert!(!Error::State("already committed".into()).poisons_connection());
        assert!(!Error::UnsupportedType("bytes".into()).poisons_connection());
        assert!(!Error::PoolExhausted {
            endpoint: "localhost:7687".into()
        }
        .poisons_connection());
    }

    #[test]
    fn test_server_error_display() {
        let err = Error::Server(ServerError {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "Invalid input".into(),
        });
        let text = err.to_string();
        assert!(text.contains("SyntaxError"));
        assert!(text.contains("Invalid input"));
    }
}

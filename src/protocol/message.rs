//! Protocol message types

use crate::value::{Params, Value};
use std::collections::HashMap;

/// Request message (client → server)
#[derive(Debug, Clone)]
pub enum Request {
    /// Identify the client and authenticate
    Hello {
        /// Client identification string, e.g. "bolt-driver/0.1"
        user_agent: String,
        /// Authentication scheme ("basic" or "none")
        scheme: String,
        /// Principal (username) for the basic scheme
        principal: Option<String>,
        /// Secret (password) for the basic scheme
        credentials: Option<String>,
        /// Optional authentication realm
        realm: Option<String>,
    },

    /// Orderly shutdown; no response is expected
    Goodbye,

    /// Return the server side of the connection to a clean state
    Reset,

    /// Open an explicit transaction
    Begin {
        /// Target database name
        database: Option<String>,
        /// Causal ordering tokens from previously committed work
        bookmarks: Vec<String>,
    },

    /// Submit a query
    Run {
        /// Query text
        query: String,
        /// Query parameters
        parameters: Params,
        /// Extra metadata (db name for auto-commit, bookmarks)
        extra: HashMap<String, Value>,
    },

    /// Request up to `n` records from the current result (-1 = all)
    Pull {
        /// Maximum number of records to stream
        n: i64,
    },

    /// Discard remaining records of the current result (-1 = all)
    Discard {
        /// Maximum number of records to drop
        n: i64,
    },

    /// Commit the open transaction
    Commit,

    /// Roll back the open transaction
    Rollback,
}

impl Request {
    /// Message name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "HELLO",
            Request::Goodbye => "GOODBYE",
            Request::Reset => "RESET",
            Request::Begin { .. } => "BEGIN",
            Request::Run { .. } => "RUN",
            Request::Pull { .. } => "PULL",
            Request::Discard { .. } => "DISCARD",
            Request::Commit => "COMMIT",
            Request::Rollback => "ROLLBACK",
        }
    }
}

/// Response message (server → client)
#[derive(Debug, Clone)]
pub enum Response {
    /// Request accepted; metadata varies by request kind
    Success(HashMap<String, Value>),

    /// One row of query output
    Record(Vec<Value>),

    /// Request skipped because the server is in a failed state
    Ignored,

    /// Request rejected
    Failure(ServerError),
}

impl Response {
    /// Message name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Response::Success(_) => "SUCCESS",
            Response::Record(_) => "RECORD",
            Response::Ignored => "IGNORED",
            Response::Failure(_) => "FAILURE",
        }
    }
}

/// Server-reported failure (code + message from a FAILURE response)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ServerError {
    /// Vendor status code, e.g. "Neo.ClientError.Statement.SyntaxError"
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ServerError {
    /// Build from FAILURE metadata; missing fields default to placeholders
    pub fn from_metadata(mut meta: HashMap<String, Value>) -> Self {
        let take_string = |meta: &mut HashMap<String, Value>, key: &str| match meta.remove(key) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let mut code = take_string(&mut meta, "code");
        let mut message = take_string(&mut meta, "message");
        if code.is_empty() {
            code = "Unknown".into();
        }
        if message.is_empty() {
            message = "no message provided".into();
        }
        Self { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_from_metadata() {
        let mut meta = HashMap::new();
        meta.insert(
            "code".to_string(),
            Value::String("Neo.ClientError.Security.Unauthorized".into()),
        );
        meta.insert(
            "message".to_string(),
            Value::String("invalid credentials".into()),
        );
        let err = ServerError::from_metadata(meta);
        assert_eq!(err.code, "Neo.ClientError.Security.Unauthorized");
        assert_eq!(err.to_string().contains("invalid credentials"), true);
    }

    #[test]
    fn test_server_error_defaults() {
        let err = ServerError::from_metadata(HashMap::new());
        assert_eq!(err.code, "Unknown");
    }

    #[test]
    fn test_request_names() {
        assert_eq!(Request::Goodbye.name(), "GOODBYE");
        assert_eq!(Request::Pull { n: -1 }.name(), "PULL");
    }
}

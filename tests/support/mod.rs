//! In-process scripted Bolt server for integration tests.
//!
//! Accepts real TCP connections, performs the version handshake, then
//! answers each decoded request through a test-supplied responder closure.
//! Every request name is recorded so tests can assert on the exact message
//! traffic a driver operation produced.

use bolt_driver::protocol::{self, Request, Response, ServerError};
use bolt_driver::value::Value;
use bytes::BytesMut;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Maps one incoming request to the responses the server sends back
pub type Responder = Arc<dyn Fn(&Request) -> Vec<Response> + Send + Sync>;

/// How the server answers the version-negotiation preamble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Select protocol 4.4
    Normal,
    /// Reply all-zeroes: no proposed version accepted
    RejectAll,
    /// Reply bytes that match no proposal
    Garbage,
}

pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
}

/// Route driver logs through the test harness; `RUST_LOG` controls verbosity.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl MockServer {
    pub async fn start(responder: Responder) -> Self {
        Self::start_with_handshake(Handshake::Normal, responder).await
    }

    pub async fn start_with_handshake(handshake: Handshake, responder: Responder) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let log = requests.clone();
        let count = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                count.fetch_add(1, Ordering::SeqCst);
                let responder = responder.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(socket, handshake, responder, log).await;
                });
            }
        });

        Self {
            addr,
            requests,
            connections,
        }
    }

    /// Bolt URI pointing at this server
    pub fn uri(&self) -> String {
        format!("bolt://{}", self.addr)
    }

    /// Names of every request received so far, across all connections
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("request log").clone()
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("request log").len()
    }

    /// Number of TCP connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    handshake: Handshake,
    responder: Responder,
    log: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    // Magic preamble + four version proposals
    let mut preamble = [0u8; 20];
    socket.read_exact(&mut preamble).await?;
    let reply = match handshake {
        Handshake::Normal => [0, 0, 4, 4],
        Handshake::RejectAll => [0, 0, 0, 0],
        Handshake::Garbage => [0xde, 0xad, 0xbe, 0xef],
    };
    socket.write_all(&reply).await?;
    if handshake != Handshake::Normal {
        return Ok(());
    }

    let mut buf = BytesMut::with_capacity(8192);
    loop {
        let body = loop {
            if let Some(body) = protocol::try_read_message(&mut buf) {
                break body;
            }
            if socket.read_buf(&mut buf).await? == 0 {
                return Ok(());
            }
        };

        let request = match protocol::decode_request(&body) {
            Ok(request) => request,
            Err(_) => return Ok(()),
        };
        log.lock().expect("request log").push(describe(&request));

        if matches!(request, Request::Goodbye) {
            return Ok(());
        }

        let mut out = BytesMut::new();
        for response in responder(&request) {
            let body = protocol::encode_response(&response);
            protocol::write_chunked(&mut out, &body);
        }
        socket.write_all(&out).await?;
        socket.flush().await?;
    }
}

/// Request name, with BEGIN carrying its bookmarks so tests can assert on
/// causal chaining without a second capture channel.
fn describe(request: &Request) -> String {
    match request {
        Request::Begin { bookmarks, .. } if !bookmarks.is_empty() => {
            format!("BEGIN {:?}", bookmarks)
        }
        other => other.name().to_string(),
    }
}

/// Success with no metadata
pub fn success() -> Response {
    Response::Success(HashMap::new())
}

/// Success carrying the given metadata entries
pub fn success_with(entries: &[(&str, Value)]) -> Response {
    Response::Success(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

/// Failure with the given vendor code
pub fn failure(code: &str, message: &str) -> Response {
    Response::Failure(ServerError {
        code: code.to_string(),
        message: message.to_string(),
    })
}

/// Responder that answers housekeeping messages (HELLO, RESET, DISCARD,
/// ROLLBACK) with plain SUCCESS and delegates everything else to `f`.
pub fn responder(f: impl Fn(&Request) -> Vec<Response> + Send + Sync + 'static) -> Responder {
    Arc::new(move |request| match request {
        Request::Hello { .. } => vec![success_with(&[(
            "server",
            Value::String("MockGraph/1.0".into()),
        )])],
        Request::Reset | Request::Discard { .. } | Request::Rollback => vec![success()],
        other => f(other),
    })
}

//! Async client driver for Bolt graph databases
//!
//! The driver speaks the Bolt protocol over TCP (optionally TLS) and exposes
//! the usual layering: a [`Driver`] owns a bounded connection pool, hands out
//! cheap single-threaded [`Session`]s, and each session runs auto-commit
//! queries or explicit [`Transaction`]s whose results stream lazily through a
//! [`RecordCursor`].
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> bolt_driver::Result<()> {
//! use bolt_driver::{Config, Credentials, Driver, Params};
//!
//! let driver = Driver::new(
//!     "bolt://localhost:7687",
//!     Credentials::basic("neo4j", "secret"),
//!     Config::default(),
//! )?;
//!
//! let mut session = driver.session()?;
//! let mut cursor = session.run("RETURN 1 AS n", Params::new()).await?;
//! while let Some(record) = cursor.next().await? {
//!     println!("{:?}", record.get(0));
//! }
//! session.close().await;
//! driver.close().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod protocol;
pub mod session;
pub mod summary;
pub mod transaction;
pub mod value;

pub use connection::{ConnectOptions, Connection, Credentials, Endpoint, TlsConfig};
pub use cursor::{CancelHandle, RecordCursor};
pub use driver::{BoltUri, Config, ConfigBuilder, Driver};
pub use error::{Error, Result};
pub use pool::{Pool, PoolConfig};
pub use session::Session;
pub use summary::{Bookmark, Summary};
pub use transaction::{Transaction, TxState};
pub use value::{Params, Record, Value};

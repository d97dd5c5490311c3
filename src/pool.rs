//! Bounded connection pool
//!
//! One pool serves all endpoints of a driver. Per endpoint it tracks a set
//! of idle connections and an in-use count; `in_use + idle` never exceeds
//! the configured maximum. The pool is the only internally synchronized
//! structure in the driver: the mutex is never held across an await point,
//! and waiters blocked on exhaustion are woken by `release` or failed fast
//! by `close`.

use crate::connection::{ConnectOptions, Connection, Credentials, Endpoint};
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Pool sizing and lifetime policy
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum connections per endpoint, idle and in-use combined
    pub max_size: usize,
    /// Bound on waiting for a free slot (and on opening a connection)
    pub acquire_timeout: Duration,
    /// Idle connections older than this are closed, not reused
    pub max_idle_time: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            acquire_timeout: Duration::from_secs(60),
            max_idle_time: Duration::from_secs(3600),
        }
    }
}

struct IdleConn {
    conn: Connection,
    since: Instant,
}

#[derive(Default)]
struct Slot {
    idle: VecDeque<IdleConn>,
    in_use: usize,
}

/// Connection pool shared by all sessions of one driver
pub struct Pool {
    credentials: Credentials,
    connect_opts: ConnectOptions,
    config: PoolConfig,
    slots: Mutex<HashMap<Endpoint, Slot>>,
    freed: Notify,
    closed: AtomicBool,
}

impl Pool {
    /// Create an empty pool
    pub fn new(credentials: Credentials, connect_opts: ConnectOptions, config: PoolConfig) -> Self {
        Self {
            credentials,
            connect_opts,
            config,
            slots: Mutex::new(HashMap::new()),
            freed: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Borrow a connection for the given endpoint.
    ///
    /// Reuses an idle live connection when one exists, opens a new one while
    /// under the per-endpoint maximum, and otherwise waits for a release,
    /// bounded by the acquire timeout. Stale idle connections are discarded
    /// on the way.
    pub async fn acquire(&self, endpoint: &Endpoint) -> Result<Connection> {
        let started = Instant::now();
        let deadline = started + self.config.acquire_timeout;

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::DriverClosed);
            }

            enum Plan {
                Reuse(Connection),
                Open,
                Wait,
            }

            let plan = {
                let mut slots = self.slots.lock().expect("pool lock");
                let slot = slots.entry(endpoint.clone()).or_default();

                // Staleness policy: idle entries past their lifetime are
                // dropped rather than handed out
                let max_idle = self.config.max_idle_time;
                while let Some(front) = slot.idle.front() {
                    if front.since.elapsed() > max_idle {
                        let stale = slot.idle.pop_front().expect("checked front");
                        drop(stale.conn);
                        crate::metrics::counters::pool_discarded_stale(endpoint);
                    } else {
                        break;
                    }
                }

                if let Some(idle) = slot.idle.pop_front() {
                    slot.in_use += 1;
                    Plan::Reuse(idle.conn)
                } else if slot.in_use + slot.idle.len() < self.config.max_size {
                    // Reserve the slot before the open so concurrent
                    // acquires cannot overshoot the maximum
                    slot.in_use += 1;
                    Plan::Open
                } else {
                    Plan::Wait
                }
            };

            match plan {
                Plan::Reuse(conn) => {
                    // Lazy liveness validation: a connection that died while
                    // idle is discarded and the loop retries
                    if !conn.is_live() {
                        drop(conn);
                        self.forfeit(endpoint);
                        continue;
                    }
                    tracing::debug!(endpoint = %endpoint, "reusing idle connection");
                    crate::metrics::counters::pool_acquired(endpoint, true);
                    crate::metrics::histograms::acquire_wait(
                        endpoint,
                        started.elapsed().as_millis() as u64,
                    );
                    return Ok(conn);
                }
                Plan::Open => {
                    let opened =
                        Connection::open(endpoint, &self.credentials, &self.connect_opts).await;
                    match opened {
                        Ok(conn) => {
                            crate::metrics::counters::pool_acquired(endpoint, false);
                            crate::metrics::histograms::acquire_wait(
                                endpoint,
                                started.elapsed().as_millis() as u64,
                            );
                            return Ok(conn);
                        }
                        Err(e) => {
                            // The reserved slot goes back so waiters can
                            // make progress
                            self.forfeit(endpoint);
                            return Err(e);
                        }
                    }
                }
                Plan::Wait => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        crate::metrics::counters::pool_exhausted(endpoint);
                        return Err(Error::PoolExhausted {
                            endpoint: endpoint.to_string(),
                        });
                    }
                    if tokio::time::timeout(remaining, self.freed.notified())
                        .await
                        .is_err()
                    {
                        crate::metrics::counters::pool_exhausted(endpoint);
                        return Err(Error::PoolExhausted {
                            endpoint: endpoint.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Return a connection after use.
    ///
    /// A live, stream-free connection goes back to the idle set; anything
    /// else is discarded. The in-use count is decremented either way and one
    /// waiter is woken.
    pub fn release(&self, conn: Connection) {
        let endpoint = conn.endpoint().clone();
        let repool = conn.is_live() && !conn.is_streaming() && !self.closed.load(Ordering::Acquire);

        {
            let mut slots = self.slots.lock().expect("pool lock");
            let slot = slots.entry(endpoint.clone()).or_default();
            slot.in_use = slot.in_use.saturating_sub(1);
            if repool {
                slot.idle.push_back(IdleConn {
                    conn,
                    since: Instant::now(),
                });
            } else {
                tracing::debug!(endpoint = %endpoint, "discarding connection on release");
                drop(conn);
            }
        }

        self.freed.notify_one();
    }

    /// Give back a reserved slot without a connection (open failed, or a
    /// stale reuse was discarded).
    fn forfeit(&self, endpoint: &Endpoint) {
        {
            let mut slots = self.slots.lock().expect("pool lock");
            if let Some(slot) = slots.get_mut(endpoint) {
                slot.in_use = slot.in_use.saturating_sub(1);
            }
        }
        self.freed.notify_one();
    }

    /// Whether the pool has been shut down
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut the pool down: no further acquires succeed, waiters fail fast
    /// with `DriverClosed`, and idle connections get an orderly GOODBYE.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.freed.notify_waiters();

        let idle: Vec<Connection> = {
            let mut slots = self.slots.lock().expect("pool lock");
            slots
                .values_mut()
                .flat_map(|slot| slot.idle.drain(..).map(|entry| entry.conn))
                .collect()
        };
        for conn in idle {
            conn.close().await;
        }
        tracing::info!("connection pool closed");
    }

    /// Idle + in-use counts for one endpoint (test and debug visibility)
    pub fn stats(&self, endpoint: &Endpoint) -> (usize, usize) {
        let slots = self.slots.lock().expect("pool lock");
        match slots.get(endpoint) {
            Some(slot) => (slot.idle.len(), slot.in_use),
            None => (0, 0),
        }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

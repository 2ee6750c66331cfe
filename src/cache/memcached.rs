//! Memcached backend over the ASCII protocol.
//!
//! Keys are hashed to fit memcached's key limits. Operations start at a rotating server. An I/O
//! error reopens that server's connection and retries once before failing over to the next one.

use super::{CacheStore, CachedResponse};
use crate::error::AppError;
use async_trait::async_trait;
use memcache_async::ascii::Protocol;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

type Connection = Protocol<Compat<TcpStream>>;

pub struct MemcachedCache {
    servers: Vec<(String, Mutex<Connection>)>,
    next: AtomicUsize,
}

fn storage_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

impl MemcachedCache {
    /// Connect to every reachable server in `addrs`; at least one must answer.
    pub async fn connect(addrs: &[String]) -> Result<Self, AppError> {
        let mut servers = Vec::new();
        for addr in addrs {
            match TcpStream::connect(addr.as_str()).await {
                Ok(stream) => {
                    tracing::info!(server = %addr, "memcached connected");
                    servers.push((addr.clone(), Mutex::new(Protocol::new(stream.compat()))));
                }
                Err(e) => {
                    tracing::warn!(server = %addr, error = %e, "memcached server unreachable")
                }
            }
        }
        if servers.is_empty() {
            return Err(AppError::Cache("no memcached server reachable".into()));
        }
        Ok(MemcachedCache {
            servers,
            next: AtomicUsize::new(0),
        })
    }

    fn start(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % self.servers.len()
    }
}

/// Replace a broken connection in place. Returns false when the server stays unreachable.
async fn reconnect(addr: &str, conn: &mut Connection) -> bool {
    match TcpStream::connect(addr).await {
        Ok(stream) => {
            *conn = Protocol::new(stream.compat());
            tracing::info!(server = %addr, "memcached reconnected");
            true
        }
        Err(e) => {
            tracing::warn!(server = %addr, error = %e, "memcached reconnect failed");
            false
        }
    }
}

fn all_failed(last: Option<std::io::Error>) -> AppError {
    AppError::Cache(format!(
        "all memcached servers failed: {}",
        last.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[async_trait]
impl CacheStore for MemcachedCache {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, AppError> {
        let key = storage_key(key);
        let start = self.start();
        let count = self.servers.len();
        let mut last = None;
        for attempt in 0..count {
            let (addr, server) = &self.servers[(start + attempt) % count];
            let mut conn = server.lock().await;
            for retry in 0..2 {
                match conn.get(&key).await {
                    Ok(bytes) if bytes.is_empty() => return Ok(None),
                    Ok(bytes) => {
                        return serde_json::from_slice(&bytes)
                            .map(Some)
                            .map_err(|e| AppError::Cache(format!("corrupt entry: {}", e)));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => {
                        tracing::warn!(server = %addr, error = %e, "memcached get failed");
                        last = Some(e);
                        if retry > 0 || !reconnect(addr, &mut conn).await {
                            break;
                        }
                    }
                }
            }
        }
        Err(all_failed(last))
    }

    async fn set(&self, key: &str, value: &CachedResponse, ttl: Duration) -> Result<(), AppError> {
        let key = storage_key(key);
        let bytes = serde_json::to_vec(value).map_err(|e| AppError::Cache(e.to_string()))?;
        let expiration = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX).max(1);
        let start = self.start();
        let count = self.servers.len();
        let mut last = None;
        for attempt in 0..count {
            let (addr, server) = &self.servers[(start + attempt) % count];
            let mut conn = server.lock().await;
            for retry in 0..2 {
                match conn.set(&key, &bytes, expiration).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::warn!(server = %addr, error = %e, "memcached set failed");
                        last = Some(e);
                        if retry > 0 || !reconnect(addr, &mut conn).await {
                            break;
                        }
                    }
                }
            }
        }
        Err(all_failed(last))
    }
}

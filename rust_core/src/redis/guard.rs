//! Health-checked Redis handle with transparent reconnection.
//!
//! One [`StoreGuard`] is built at process start and shared by every loop.
//! Each access checks the current connection with `PING` and re-establishes
//! it when the check fails, so a Redis restart mid-run costs at most the
//! command that observed it.

use super::store::MarketStore;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use redis::aio::Connection;
use redis::{Client, Cmd, ConnectionAddr, ConnectionInfo, FromRedisValue, RedisConnectionInfo};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Connection settings for the store
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Upper bound for connecting and for every single command
    pub socket_timeout: Duration,
    /// Retry a timed-out command once on a fresh connection
    pub retry_on_timeout: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            socket_timeout: Duration::from_secs(5),
            retry_on_timeout: true,
        }
    }
}

impl StoreConfig {
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                username: None,
                password: self.password.clone(),
            },
        }
    }

    /// `host:port/db` for logs; never includes the password
    pub fn describe(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Shared, self-healing Redis handle
pub struct StoreGuard {
    client: Client,
    config: StoreConfig,
    connection: Mutex<Option<Connection>>,
}

impl StoreGuard {
    /// Connect and verify the connection with `PING`.
    ///
    /// An error here means the store is unreachable; callers refuse to start
    /// background work in that case.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let client = Client::open(config.connection_info())
            .with_context(|| format!("Invalid Redis address {}", config.describe()))?;

        let guard = Self {
            client,
            config,
            connection: Mutex::new(None),
        };

        let mut slot = guard.connection.lock().await;
        let mut conn = guard.open().await?;
        if !guard.ping_ok(&mut conn).await {
            return Err(anyhow!(
                "Redis at {} did not answer PING",
                guard.config.describe()
            ));
        }
        *slot = Some(conn);
        drop(slot);

        info!("Connected to Redis at {}", guard.config.describe());
        Ok(guard)
    }

    /// Get the live connection, reconnecting first if `PING` fails
    pub async fn client(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        let mut slot = self.connection.lock().await;

        let healthy = match slot.as_mut() {
            Some(conn) => self.ping_ok(conn).await,
            None => false,
        };

        if !healthy {
            warn!(
                "Redis connection to {} lost, attempting to reconnect...",
                self.config.describe()
            );
            *slot = None;
            let conn = self.open().await?;
            *slot = Some(conn);
            info!("Reconnected to Redis at {}", self.config.describe());
        }

        Ok(slot)
    }

    /// Check the current connection without reconnecting.
    ///
    /// A failed check drops the connection so the next access reconnects.
    pub async fn check_connection(&self) -> bool {
        let mut slot = self.connection.lock().await;
        let healthy = match slot.as_mut() {
            Some(conn) => self.ping_ok(conn).await,
            None => false,
        };
        if !healthy {
            *slot = None;
        }
        healthy
    }

    async fn open(&self) -> Result<Connection> {
        match timeout(self.config.socket_timeout, self.client.get_async_connection()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                error!("Redis connection error ({}): {}", self.config.describe(), e);
                Err(e).context("Failed to connect to Redis")
            }
            Err(_) => {
                error!(
                    "Redis connection to {} timed out after {:?}",
                    self.config.describe(),
                    self.config.socket_timeout
                );
                Err(anyhow!("Redis connection timed out"))
            }
        }
    }

    async fn ping_ok(&self, conn: &mut Connection) -> bool {
        let ping = redis::cmd("PING");
        match timeout(self.config.socket_timeout, ping.query_async::<_, String>(conn)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                error!("Redis connection check failed: {}", e);
                false
            }
            Err(_) => {
                error!("Redis connection check timed out");
                false
            }
        }
    }

    async fn execute<T: FromRedisValue>(&self, cmd: &Cmd, what: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut slot = self.client().await?;
            let conn = slot
                .as_mut()
                .ok_or_else(|| anyhow!("Redis connection unavailable"))?;

            match timeout(self.config.socket_timeout, cmd.query_async::<_, T>(conn)).await {
                Ok(result) => return result.with_context(|| format!("Redis {} failed", what)),
                Err(_) => {
                    // The late reply would answer the next command on this
                    // connection, so it is never reused
                    *slot = None;
                    if self.config.retry_on_timeout && attempt < 2 {
                        warn!("Redis {} timed out, retrying on a fresh connection", what);
                        continue;
                    }
                    return Err(anyhow!(
                        "Redis {} timed out after {:?}",
                        what,
                        self.config.socket_timeout
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl MarketStore for StoreGuard {
    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(channel).arg(payload);
        self.execute::<i64>(&cmd, "PUBLISH").await?;
        Ok(())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        self.execute::<()>(&cmd, "SET").await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.execute::<Option<String>>(&cmd, "GET").await
    }

    async fn ping(&self) -> bool {
        self.check_connection().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRedis;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_connection_info_from_config() {
        let config = StoreConfig {
            host: "cache.internal".to_string(),
            port: 6380,
            password: Some("secret".to_string()),
            db: 2,
            ..StoreConfig::default()
        };
        let info = config.connection_info();
        match info.addr {
            ConnectionAddr::Tcp(host, port) => {
                assert_eq!(host, "cache.internal");
                assert_eq!(port, 6380);
            }
            other => panic!("unexpected address {:?}", other),
        }
        assert_eq!(info.redis.db, 2);
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
        assert_eq!(config.describe(), "cache.internal:6380/2");
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        let config = StoreConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            socket_timeout: Duration::from_millis(500),
            ..StoreConfig::default()
        };
        assert!(StoreGuard::connect(config).await.is_err());
    }

    #[tokio::test]
    async fn test_timed_out_command_does_not_leak_reply_into_next() {
        let redis = FakeRedis::start().await;
        redis.state.values.lock().insert("k".to_string(), "value".to_string());
        let guard = StoreGuard::connect(redis.store_config()).await.unwrap();

        redis.state.slow_sets.store(1, Ordering::SeqCst);
        assert!(guard.set("slow", "x").await.is_err());

        assert_eq!(guard.get("k").await.unwrap().as_deref(), Some("value"));
        assert_eq!(redis.state.connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_on_timeout_uses_fresh_connection() {
        let redis = FakeRedis::start().await;
        let config = StoreConfig {
            retry_on_timeout: true,
            ..redis.store_config()
        };
        let guard = StoreGuard::connect(config).await.unwrap();

        redis.state.slow_sets.store(1, Ordering::SeqCst);
        guard.set("slow", "x").await.unwrap();

        assert_eq!(guard.get("slow").await.unwrap().as_deref(), Some("x"));
        assert_eq!(redis.state.connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reconnects_after_server_hangs_up() {
        let redis = FakeRedis::start().await;
        let guard = StoreGuard::connect(redis.store_config()).await.unwrap();

        assert!(guard.get("hangup").await.is_err());

        guard.set("k2", "v2").await.unwrap();
        assert_eq!(guard.get("k2").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(redis.state.connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_check_drops_connection() {
        let redis = FakeRedis::start().await;
        redis.state.values.lock().insert("k".to_string(), "value".to_string());
        let guard = StoreGuard::connect(redis.store_config()).await.unwrap();

        redis.state.slow_ping.store(true, Ordering::SeqCst);
        assert!(!guard.check_connection().await);
        redis.state.slow_ping.store(false, Ordering::SeqCst);

        assert_eq!(guard.get("k").await.unwrap().as_deref(), Some("value"));
        assert!(guard.check_connection().await);
        assert_eq!(redis.state.connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[ignore] // Requires a local Redis
    async fn test_set_get_round_trip_against_redis() {
        let guard = StoreGuard::connect(StoreConfig::default()).await.unwrap();
        guard.set("ticker_core.test", "{\"ok\":true}").await.unwrap();
        let value = guard.get("ticker_core.test").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"ok\":true}"));
        assert!(guard.ping().await);
    }
}

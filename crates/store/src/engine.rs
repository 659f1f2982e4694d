use parking_lot::Mutex;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;
use turnloom_domain::config::StoreConfig;
use turnloom_domain::{Error, Result};

/// Owns the store's two connection surfaces: a single writer connection
/// behind a mutex (mutating operations are funneled through it so
/// contention is only ever with other processes, never within this one)
/// and a pooled set of read-only connections for `get`/`find`/search.
///
/// Both surfaces share the same on-disk WAL database, so a write committed
/// on the writer connection is immediately visible to new reads.
pub struct Engine {
    writer: Mutex<Connection>,
    readers: Pool<SqliteConnectionManager>,
    config: StoreConfig,
}

impl Engine {
    pub fn open(config: StoreConfig) -> Result<Self> {
        let writer = Connection::open(&config.db_path)?;
        configure_connection(&writer, &config)?;

        let manager = SqliteConnectionManager::file(&config.db_path);
        let readers = Pool::builder()
            .max_size(config.reader_pool_size)
            .build(manager)
            .map_err(|e| Error::Sqlite(e.to_string()))?;
        {
            let conn = readers.get().map_err(|e| Error::Sqlite(e.to_string()))?;
            configure_connection(&conn, &config)?;
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            config,
        })
    }

    /// Open an in-memory engine, for tests and fixtures. A named in-memory
    /// database is used (rather than `:memory:`) so the writer and each
    /// pooled reader connection see the same database.
    pub fn open_in_memory(name: &str) -> Result<Self> {
        let uri = format!("file:{name}?mode=memory&cache=shared");
        let writer = Connection::open(&uri)?;
        // Keep the shared in-memory database alive for the process lifetime
        // of this engine; SQLite drops a shared-cache memory db once its
        // last connection closes.
        writer.execute_batch("PRAGMA journal_mode=WAL;")?;

        let manager = SqliteConnectionManager::file(&uri);
        let readers = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| Error::Sqlite(e.to_string()))?;

        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            config: StoreConfig {
                db_path: uri,
                ..Default::default()
            },
        })
    }

    /// Run `f` against the writer connection inside an immediate
    /// transaction, retrying on `Busy` with exponential backoff and
    /// jitter up to `busy_max_retries` attempts.
    pub fn with_writer<T>(
        &self,
        f: impl Fn(&rusqlite::Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            let result = {
                let mut conn = self.writer.lock();
                let txn = conn
                    .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
                    .map_err(Error::from)?;
                match f(&txn) {
                    Ok(value) => txn.commit().map(|_| value).map_err(Error::from),
                    Err(e) => {
                        let _ = txn.rollback();
                        Err(e)
                    }
                }
            };

            match result {
                Err(Error::Busy(msg)) if attempt < self.config.busy_max_retries => {
                    let delay = backoff_delay(attempt, self.config.busy_base_delay_ms);
                    turnloom_domain::TraceEvent::BusyRetried {
                        store: "writer".to_string(),
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    }
                    .emit();
                    tracing::debug!(attempt, %msg, "retrying after Busy");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Borrow a pooled reader connection.
    pub fn reader(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.readers.get().map_err(|e| Error::Sqlite(e.to_string()))
    }
}

fn configure_connection(conn: &Connection, config: &StoreConfig) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout={};
         PRAGMA foreign_keys=ON;",
        config.busy_timeout_ms
    ))?;
    Ok(())
}

/// Exponential backoff with decorrelated jitter, capped at one second.
fn backoff_delay(attempt: u32, base_ms: u64) -> Duration {
    use rand::Rng;
    let cap_ms = 1_000u64;
    let exp = base_ms.saturating_mul(1u64 << attempt.min(10)).min(cap_ms);
    let jittered = rand::thread_rng().gen_range(base_ms..=exp.max(base_ms));
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_is_capped() {
        let d0 = backoff_delay(0, 20);
        let d5 = backoff_delay(5, 20);
        assert!(d0.as_millis() <= 1000);
        assert!(d5.as_millis() <= 1000);
    }
}

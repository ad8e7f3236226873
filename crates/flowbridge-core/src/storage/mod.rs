//! Table store access for readings.
//!
//! The ingest path only ever needs the [`ReadingStore`] trait, so the
//! handler can run against PostgreSQL in production and an in-memory store
//! in tests. All SQL lives in the repositories below this module.

use std::{future::Future, pin::Pin, sync::Arc};

use sqlx::PgPool;

pub mod readings;

pub use readings::TableName;

use crate::{
    error::Result,
    models::{Reading, ReadingKey},
};

/// Storage operations required by the ingest handler.
///
/// Implementations must be safe to share between concurrent invocations;
/// the handler holds a single instance for the life of the process.
pub trait ReadingStore: Send + Sync + 'static {
    /// Writes a reading, replacing any row with the same device and
    /// timestamp.
    fn put_reading(&self, reading: Reading)
        -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Looks up the reading stored under `key`.
    fn find_reading(
        &self,
        key: ReadingKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Reading>>> + Send + '_>>;

    /// Verifies the store is reachable.
    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Container for repository instances over one shared connection pool.
#[derive(Clone)]
pub struct Storage {
    /// Repository for flow readings.
    pub readings: Arc<readings::Repository>,
}

impl Storage {
    /// Creates a storage instance writing readings to `table`.
    pub fn new(pool: PgPool, table: TableName) -> Self {
        let pool = Arc::new(pool);

        Self { readings: Arc::new(readings::Repository::new(pool, table)) }
    }

    /// Performs a health check on the database connection.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.readings.pool()).await?;

        Ok(())
    }
}

impl ReadingStore for Storage {
    fn put_reading(
        &self,
        reading: Reading,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { self.readings.upsert(&reading).await })
    }

    fn find_reading(
        &self,
        key: ReadingKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Reading>>> + Send + '_>> {
        Box::pin(async move { self.readings.find(&key).await })
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(Storage::health_check(self))
    }
}

pub mod mock {
    //! In-memory store for exercising the ingest path without a database.
    //!
    //! Mirrors the upsert semantics of the PostgreSQL repository and records
    //! how many writes were attempted so tests can assert that rejected
    //! payloads never reach the store.

    use std::{
        collections::HashMap,
        future::Future,
        pin::Pin,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use tokio::sync::RwLock;

    use super::{Reading, ReadingKey, ReadingStore};
    use crate::error::{CoreError, Result};

    /// Mock store keyed by device and timestamp.
    #[derive(Clone, Default)]
    pub struct MockReadingStore {
        readings: Arc<RwLock<HashMap<ReadingKey, Reading>>>,
        writes: Arc<AtomicUsize>,
        write_error: Arc<RwLock<Option<String>>>,
        health_error: Arc<RwLock<Option<String>>>,
    }

    impl MockReadingStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next write fail with `message`.
        pub async fn inject_write_error(&self, message: impl Into<String>) {
            *self.write_error.write().await = Some(message.into());
        }

        /// Makes health checks fail with `message` until cleared.
        pub async fn set_unhealthy(&self, message: impl Into<String>) {
            *self.health_error.write().await = Some(message.into());
        }

        /// Restores passing health checks.
        pub async fn set_healthy(&self) {
            *self.health_error.write().await = None;
        }

        /// Number of write attempts, failed ones included.
        pub fn write_count(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        /// Snapshot of all stored readings.
        pub async fn readings(&self) -> Vec<Reading> {
            self.readings.read().await.values().cloned().collect()
        }
    }

    impl ReadingStore for MockReadingStore {
        fn put_reading(
            &self,
            reading: Reading,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                self.writes.fetch_add(1, Ordering::SeqCst);

                if let Some(message) = self.write_error.write().await.take() {
                    return Err(CoreError::Database(message));
                }

                self.readings.write().await.insert(reading.key(), reading);
                Ok(())
            })
        }

        fn find_reading(
            &self,
            key: ReadingKey,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Reading>>> + Send + '_>> {
            Box::pin(async move { Ok(self.readings.read().await.get(&key).cloned()) })
        }

        fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                match self.health_error.read().await.clone() {
                    Some(message) => Err(CoreError::Database(message)),
                    None => Ok(()),
                }
            })
        }
    }
}

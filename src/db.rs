use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::object_id::ObjectId;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL CHECK (json_valid(body)),
        PRIMARY KEY (collection, id)
    );
";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("document encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("datastore did not respond within {0:?}")]
    Timeout(Duration),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Shared handle to the document store.
///
/// Cloning is cheap; every clone talks to the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A document together with the identifier it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub id: ObjectId,
    pub body: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl Database {
    /// Opens the store at `uri`, prepares the schema and checks it answers,
    /// giving up after `timeout`.
    pub async fn connect(uri: &str, timeout: Duration) -> Result<Self, StorageError> {
        let uri = uri.to_owned();
        let connect = async move {
            let conn = tokio::task::spawn_blocking(move || open(&uri, timeout)).await??;
            let db = Database {
                conn: Arc::new(Mutex::new(conn)),
            };
            db.ping().await?;
            Ok::<_, StorageError>(db)
        };

        tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| StorageError::Timeout(timeout))?
    }

    /// Lightweight health probe.
    pub async fn ping(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    pub fn collection<T>(&self, name: &'static str) -> Collection<T> {
        Collection {
            db: self.clone(),
            name,
            _marker: PhantomData,
        }
    }

    /// Releases the connection. If in-flight work still holds a handle the
    /// connection is dropped with the last one instead.
    pub async fn close(self) -> Result<(), StorageError> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().map_err(|_| StorageError::Poisoned)?;
                tokio::task::spawn_blocking(move || conn.close().map_err(|(_, err)| err))
                    .await??;
                debug!("Database connection closed");
                Ok(())
            }
            Err(conn) => {
                warn!(
                    handles = Arc::strong_count(&conn),
                    "Database still in use, leaving it to close on drop"
                );
                Ok(())
            }
        }
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&Connection) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::Poisoned)?;
            f(&conn)
        })
        .await?
    }
}

fn open(uri: &str, timeout: Duration) -> Result<Connection, StorageError> {
    let conn = Connection::open(uri)?;
    conn.busy_timeout(timeout)?;
    conn.execute_batch(SCHEMA).map_err(|err| {
        // Another connection held its lock for the whole busy timeout.
        if err.sqlite_error_code() == Some(rusqlite::ErrorCode::DatabaseBusy) {
            StorageError::Timeout(timeout)
        } else {
            StorageError::Sqlite(err)
        }
    })?;
    Ok(conn)
}

/// Typed view over the documents of one named collection.
pub struct Collection<T> {
    db: Database,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Collection {
            db: self.db.clone(),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All documents in the collection, in storage order.
    pub async fn find_all(&self) -> Result<Vec<Document<T>>, StorageError> {
        let name = self.name;
        let rows = self
            .db
            .with_conn(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, body FROM documents WHERE collection = ?1")?;
                let rows = stmt
                    .query_map([name], |row| {
                        Ok((row.get::<_, ObjectId>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, body)| {
                Ok::<_, StorageError>(Document {
                    id,
                    body: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }

    /// Stores `doc` under a freshly generated id and returns that id.
    pub async fn insert_one(&self, doc: &T) -> Result<ObjectId, StorageError> {
        let name = self.name;
        let body = serde_json::to_string(doc)?;
        let id = ObjectId::new();

        self.db
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, json(?3))",
                    (name, id, body),
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// Merges the fields of `patch` into the document stored under `id`.
    ///
    /// A document whose fields already hold the patched values is matched
    /// but not counted as modified.
    pub async fn update_one<P>(&self, id: ObjectId, patch: &P) -> Result<UpdateResult, StorageError>
    where
        P: Serialize,
    {
        let name = self.name;
        let patch = serde_json::to_string(patch)?;

        self.db
            .with_conn(move |conn| {
                let modified = conn.execute(
                    "UPDATE documents SET body = json_patch(body, ?3)
                     WHERE collection = ?1 AND id = ?2 AND body <> json_patch(body, ?3)",
                    (name, id, &patch),
                )? as u64;

                let matched = if modified > 0 {
                    modified
                } else {
                    conn.query_row(
                        "SELECT COUNT(*) FROM documents WHERE collection = ?1 AND id = ?2",
                        (name, id),
                        |row| row.get::<_, i64>(0),
                    )? as u64
                };

                Ok(UpdateResult {
                    matched_count: matched,
                    modified_count: modified,
                })
            })
            .await
    }

    /// Removes the document stored under `id`, returning how many were removed.
    pub async fn delete_one(&self, id: ObjectId) -> Result<u64, StorageError> {
        let name = self.name;
        self.db
            .with_conn(move |conn| {
                let rows = conn.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    (name, id),
                )?;
                Ok(rows as u64)
            })
            .await
    }
}

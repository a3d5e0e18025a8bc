//! Named store management.
//!
//! Mirrors the browser cache-storage surface: stores are opened by name
//! (created on first open), enumerated, and deleted as a whole.

use super::connection::CacheDb;
use super::entries::{EntryMeta, ResponseSnapshot, decode_row, now_timestamp};
use super::hash::CacheKey;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Handle to one named store.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    name: String,
}

impl CacheDb {
    /// Open the named store, creating it if it doesn't exist yet.
    pub async fn open_store(&self, name: &str) -> Result<CacheStore, Error> {
        let store_name = name.to_string();
        let created_at = now_timestamp();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
                    params![store_name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheStore { db: self.clone(), name: name.to_string() })
    }

    /// Names of all existing stores, in creation order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no store with that name existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a response under `key`, replacing any previous entry.
    pub async fn put(&self, key: &CacheKey, response: &ResponseSnapshot) -> Result<(), Error> {
        self.put_all(vec![(key.clone(), response.clone())]).await
    }

    /// Store several responses in one transaction: either all are written or none.
    pub async fn put_all(&self, entries: Vec<(CacheKey, ResponseSnapshot)>) -> Result<(), Error> {
        let cache_name = self.name.clone();
        let stored_at = now_timestamp();
        let rows = entries
            .into_iter()
            .map(|(key, response)| {
                let headers_json = serde_json::to_string(&response.headers)
                    .map_err(|e| Error::CorruptEntry(format!("headers for {}: {e}", key.url)))?;
                Ok((key, response, headers_json))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (key, response, headers_json) in &rows {
                    tx.execute(
                        "INSERT INTO entries (cache_name, key_hash, method, url, status, headers_json, body, stored_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                        params![
                            &cache_name,
                            key.hash(),
                            &key.method,
                            &key.url,
                            response.status,
                            headers_json,
                            &response.body,
                            &stored_at,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up in this store only.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<ResponseSnapshot>, Error> {
        let cache_name = self.name.clone();
        let key_hash = key.hash();
        self.db
            .conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let result = conn.query_row(
                    "SELECT url, status, headers_json, body FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                    params![cache_name, key_hash],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, u16>(1)?, row.get::<_, String>(2)?, row.get(3)?)),
                );

                match result {
                    Ok((url, status, headers_json, body)) => decode_row(url, status, &headers_json, body).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this store.
    pub async fn len(&self) -> Result<u64, Error> {
        let cache_name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![cache_name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn entries(&self) -> Result<Vec<EntryMeta>, Error> {
        let cache_name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT cache_name, method, url, status, stored_at, length(body) FROM entries
                     WHERE cache_name = ?1 ORDER BY stored_at",
                )?;
                let entries = stmt
                    .query_map(params![cache_name], |row| {
                        Ok(EntryMeta {
                            store: row.get(0)?,
                            method: row.get(1)?,
                            url: row.get(2)?,
                            status: row.get(3)?,
                            stored_at: row.get(4)?,
                            size: row.get::<_, i64>(5)? as usize,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}

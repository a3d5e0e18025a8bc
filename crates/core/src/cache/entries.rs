//! Cached response snapshots.
//!
//! An entry maps a normalized request to the full response that was returned
//! for it: status, headers and body. Entries carry no expiry; they are only
//! replaced by a newer successful fetch or removed with their store.

use super::connection::CacheDb;
use super::hash::CacheKey;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Body of the synthetic response returned when neither network nor cache can answer.
pub const OFFLINE_BODY: &str = "Offline";

/// Status of the synthetic offline response (Service Unavailable).
pub const OFFLINE_STATUS: u16 = 503;

/// A response as returned to the page and as persisted in a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseSnapshot {
    pub fn new(url: impl Into<String>, status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self { url: url.into(), status, headers, body: body.into() }
    }

    /// The plain-text `Offline` response with status 503.
    pub fn offline(url: impl Into<String>) -> Self {
        Self::new(
            url,
            OFFLINE_STATUS,
            vec![("content-type".to_string(), "text/plain; charset=utf-8".to_string())],
            OFFLINE_BODY,
        )
    }

    /// Whether the status is in the 2xx range. Only such responses are ever cached.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Listing metadata for a stored entry.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub store: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub stored_at: String,
    pub size: usize,
}

pub(crate) fn decode_row(
    url: String, status: u16, headers_json: &str, body: Vec<u8>,
) -> Result<ResponseSnapshot, Error> {
    let headers: Vec<(String, String)> = serde_json::from_str(headers_json)
        .map_err(|e| Error::CorruptEntry(format!("headers for {url}: {e}")))?;
    Ok(ResponseSnapshot { url, status, headers, body })
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

impl CacheDb {
    /// Look a request up across every store.
    ///
    /// When several stores hold the key, the most recently written entry wins.
    pub async fn match_any(&self, key: &CacheKey) -> Result<Option<ResponseSnapshot>, Error> {
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, body FROM entries
                     WHERE key_hash = ?1
                     ORDER BY stored_at DESC, rowid DESC
                     LIMIT 1",
                )?;

                let result = stmt.query_row(params![key_hash], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, u16>(1)?, row.get::<_, String>(2)?, row.get(3)?))
                });

                match result {
                    Ok((url, status, headers_json, body)) => decode_row(url, status, &headers_json, body).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(url: &str, body: &str) -> ResponseSnapshot {
        ResponseSnapshot::new(url, 200, vec![("Content-Type".into(), "text/html".into())], body)
    }

    #[test]
    fn test_offline_response() {
        let offline = ResponseSnapshot::offline("https://example.com/");
        assert_eq!(offline.status, 503);
        assert_eq!(offline.text(), "Offline");
        assert!(!offline.is_ok());
        assert_eq!(offline.content_type(), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_is_ok_range() {
        assert!(html("u", "").is_ok());
        assert!(ResponseSnapshot::new("u", 204, vec![], "").is_ok());
        assert!(!ResponseSnapshot::new("u", 304, vec![], "").is_ok());
        assert!(!ResponseSnapshot::new("u", 404, vec![], "").is_ok());
        assert!(!ResponseSnapshot::new("u", 500, vec![], "").is_ok());
    }

    #[test]
    fn test_header_case_insensitive() {
        let response = html("u", "");
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert_eq!(response.header("etag"), None);
    }

    #[tokio::test]
    async fn test_match_any_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let found = db.match_any(&CacheKey::get("https://example.com/")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_match_any_searches_all_stores() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("iafy-images-v3").await.unwrap();
        let key = CacheKey::get("https://example.com/logo.png");
        store.put(&key, &html(&key.url, "png")).await.unwrap();

        let found = db.match_any(&key).await.unwrap().unwrap();
        assert_eq!(found.body, b"png");
        assert_eq!(found.content_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_match_any_prefers_newest_write() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let critical = db.open_store("iafy-critical-v3").await.unwrap();
        let dynamic = db.open_store("iafy-dynamic-v3").await.unwrap();
        let key = CacheKey::get("https://example.com/");

        critical.put(&key, &html(&key.url, "old")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        dynamic.put(&key, &html(&key.url, "new")).await.unwrap();

        let found = db.match_any(&key).await.unwrap().unwrap();
        assert_eq!(found.text(), "new");
    }
}

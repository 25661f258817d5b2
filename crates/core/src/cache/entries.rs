//! `CacheStore` implementation for the SQLite database.
//!
//! Entries are addressed by the SHA-256 of their canonical key. The
//! autoincrement `seq` column records insertion order, so an overwrite
//! (delete + insert) moves an entry to the back of the eviction queue.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};
use url::Url;

use super::connection::CacheDb;
use super::hash::CacheKey;
use super::store::{CacheStore, CachedResponse, MatchOptions, Partition};
use crate::Error;
use crate::http::{Headers, Response, ResponseType};

/// Row shape shared by every entry SELECT.
const ENTRY_COLUMNS: &str =
    "method, url, status, status_text, headers_json, body, response_type, response_url, stored_at";

struct RawEntry {
    method: String,
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_type: String,
    response_url: Option<String>,
    stored_at: String,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            method: row.get(0)?,
            url: row.get(1)?,
            status: row.get(2)?,
            status_text: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
            response_type: row.get(6)?,
            response_url: row.get(7)?,
            stored_at: row.get(8)?,
        })
    }
}

impl TryFrom<RawEntry> for CachedResponse {
    type Error = Error;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let key_url = Url::parse(&raw.url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let headers: Headers = serde_json::from_str(&raw.headers_json)?;
        let response_type = ResponseType::parse(&raw.response_type)
            .ok_or_else(|| Error::CorruptEntry(format!("unknown response type: {}", raw.response_type)))?;
        let url = raw
            .response_url
            .map(|u| Url::parse(&u))
            .transpose()
            .map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let stored_at = DateTime::parse_from_rfc3339(&raw.stored_at)
            .map_err(|e| Error::CorruptEntry(e.to_string()))?
            .with_timezone(&Utc);

        Ok(CachedResponse {
            key: CacheKey::new(&raw.method, key_url),
            response: Response {
                status: raw.status,
                status_text: raw.status_text,
                headers,
                body: Bytes::from(raw.body),
                response_type,
                url,
            },
            stored_at,
        })
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str) -> Result<Partition, Error> {
        let name = name.to_string();
        let created_at = Utc::now().to_rfc3339();
        let partition_name = name.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition_name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;
        Ok(Partition::new(name))
    }

    async fn lookup(
        &self, partition: &Partition, key: &CacheKey, options: MatchOptions,
    ) -> Result<Option<CachedResponse>, Error> {
        let partition = partition.name().to_string();
        let (column, hash) =
            if options.ignore_query { ("loose_hash", key.loose_hash()) } else { ("key_hash", key.hash()) };

        let raw = self
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries
                     WHERE partition = ?1 AND {column} = ?2
                     ORDER BY seq ASC LIMIT 1"
                );
                let mut stmt = conn.prepare(&sql)?;
                let raw = stmt
                    .query_row(params![partition, hash], RawEntry::from_row)
                    .optional()?;
                Ok(raw)
            })
            .await
            .map_err(Error::from)?;

        raw.map(CachedResponse::try_from).transpose()
    }

    async fn put(&self, partition: &Partition, key: &CacheKey, response: &Response) -> Result<(), Error> {
        let partition = partition.name().to_string();
        let key_hash = key.hash();
        let loose_hash = key.loose_hash();
        let method = key.method().to_string();
        let url = key.url().to_string();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, now],
                )?;
                tx.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        partition, key_hash, loose_hash, method, url,
                        status, status_text, headers_json, body, response_type, response_url, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        partition,
                        key_hash,
                        loose_hash,
                        method,
                        url,
                        response.status,
                        response.status_text,
                        headers_json,
                        response.body.as_ref(),
                        response.response_type.as_str(),
                        response.url.as_ref().map(Url::as_str),
                        now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, partition: &Partition, key: &CacheKey) -> Result<bool, Error> {
        let partition = partition.name().to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE partition = ?1 AND key_hash = ?2",
                    params![partition, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, partition: &Partition) -> Result<Vec<CacheKey>, Error> {
        let partition = partition.name().to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE partition = ?1 ORDER BY seq ASC")?;
                let rows = stmt
                    .query_map(params![partition], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(method, url)| {
                let url = Url::parse(&url).map_err(|e| Error::CorruptEntry(e.to_string()))?;
                Ok(CacheKey::new(&method, url))
            })
            .collect()
    }

    async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::new("GET", Url::parse(s).unwrap())
    }

    fn sample_response() -> Response {
        Response::new(200, "<!doctype html><title>shell</title>")
            .with_status_text("OK")
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_url(Url::parse("https://example.com/index.html").unwrap())
    }

    #[tokio::test]
    async fn test_put_and_lookup_roundtrip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let p = db.open("app-shell-v1").await.unwrap();
        let response = sample_response();

        db.put(&p, &key("https://example.com/index.html"), &response).await.unwrap();

        let hit = db
            .lookup(&p, &key("https://example.com/index.html"), MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.response, response);
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let p = db.open("p").await.unwrap();
        let result = db.lookup(&p, &key("https://example.com/nope"), MatchOptions::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_lookup_ignoring_query() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let p = db.open("p").await.unwrap();
        db.put(&p, &key("https://example.com/app.css?v=3"), &Response::new(200, "css")).await.unwrap();

        let hit = db
            .lookup(&p, &key("https://example.com/app.css"), MatchOptions::ignoring_query())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.key, key("https://example.com/app.css?v=3"));

        let miss = db.lookup(&p, &key("https://example.com/app.css"), MatchOptions::default()).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order_after_overwrite() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let p = db.open("p").await.unwrap();
        db.put(&p, &key("https://example.com/a"), &Response::new(200, "1")).await.unwrap();
        db.put(&p, &key("https://example.com/b"), &Response::new(200, "2")).await.unwrap();
        db.put(&p, &key("https://example.com/a"), &Response::new(200, "3")).await.unwrap();

        let keys = db.keys(&p).await.unwrap();
        assert_eq!(keys, vec![key("https://example.com/b"), key("https://example.com/a")]);
    }

    #[tokio::test]
    async fn test_delete_partition_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open("app-shell-v1").await.unwrap();
        db.open("app-shell-v2").await.unwrap();
        db.put(&old, &key("https://example.com/a"), &Response::new(200, "1")).await.unwrap();

        assert!(db.delete_partition("app-shell-v1").await.unwrap());
        assert_eq!(db.partition_names().await.unwrap(), vec!["app-shell-v2".to_string()]);

        // reopening starts empty
        let reopened = db.open("app-shell-v1").await.unwrap();
        assert!(db.keys(&reopened).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let p = db.open("p").await.unwrap();
        db.put(&p, &key("https://example.com/a"), &Response::new(200, "1")).await.unwrap();

        assert!(db.delete(&p, &key("https://example.com/a")).await.unwrap());
        assert!(!db.delete(&p, &key("https://example.com/a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_into_unopened_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let p = Partition::new("app-media-v1");
        db.put(&p, &key("https://example.com/a.png"), &Response::new(200, "png")).await.unwrap();
        assert_eq!(db.partition_names().await.unwrap(), vec!["app-media-v1".to_string()]);
    }
}

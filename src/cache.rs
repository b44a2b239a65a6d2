use crate::verdict::{DetectionSource, Evidence};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One row per distinct normalized URL that crossed the block threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedUrlRecord {
    pub url: String,
    pub normalized_url: String,
    pub risk_score: i32,
    pub detection_source: DetectionSource,
    pub reasons: Vec<String>,
    pub categories: Vec<String>,
    pub blocked_count: i64,
    pub first_detected: DateTime<Utc>,
    pub last_detected: DateTime<Utc>,
    pub is_active: bool,
    pub evidence: Vec<Evidence>,
}

/// Payload for a create-or-update of a blocked URL.
#[derive(Debug, Clone)]
pub struct NewBlockedUrl {
    pub url: String,
    pub normalized_url: String,
    pub risk_score: i32,
    pub detection_source: DetectionSource,
    pub reasons: Vec<String>,
    pub categories: Vec<String>,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_blocked: i64,
    pub total_block_count: i64,
    pub avg_risk_score: f64,
    pub max_risk_score: i64,
    pub sources: Vec<String>,
}

/// Persistent store of previously-scored malicious URLs, consulted before
/// any external lookup. A single connection behind a mutex keeps the
/// increment-on-rematch safe under concurrent callers.
#[derive(Clone)]
pub struct BlockedUrlStore {
    conn: Arc<Mutex<Connection>>,
}

impl BlockedUrlStore {
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create cache directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open blocked-URL database: {db_path}"))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocked_urls (
                normalized_url TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                risk_score INTEGER NOT NULL,
                detection_source TEXT NOT NULL,
                reasons TEXT NOT NULL DEFAULT '[]',
                categories TEXT NOT NULL DEFAULT '[]',
                blocked_count INTEGER NOT NULL DEFAULT 1,
                first_detected TEXT NOT NULL,
                last_detected TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                evidence TEXT NOT NULL DEFAULT '[]'
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_blocked_urls_active
             ON blocked_urls (is_active, risk_score DESC)",
            [],
        )?;
        Ok(())
    }

    /// Active-record lookup. A hit counts as a rematch: the block counter is
    /// incremented and `last_detected` refreshed in the same transaction.
    pub fn lookup(&self, normalized_url: &str) -> Result<Option<BlockedUrlRecord>> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        let updated = tx.execute(
            "UPDATE blocked_urls
             SET blocked_count = blocked_count + 1, last_detected = ?
             WHERE normalized_url = ? AND is_active = 1",
            params![Utc::now().to_rfc3339(), normalized_url],
        )?;
        if updated == 0 {
            return Ok(None);
        }

        let record = tx
            .query_row(
                "SELECT url, normalized_url, risk_score, detection_source, reasons,
                        categories, blocked_count, first_detected, last_detected,
                        is_active, evidence
                 FROM blocked_urls WHERE normalized_url = ?",
                params![normalized_url],
                Self::row_to_record,
            )
            .optional()?;

        tx.commit()?;
        Ok(record)
    }

    /// Atomic find-or-create keyed by the normalized URL. A rematch merges
    /// the latest score data, bumps the counter and reactivates the record;
    /// `first_detected` is only set on create.
    pub fn upsert(&self, entry: &NewBlockedUrl) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO blocked_urls
                (normalized_url, url, risk_score, detection_source, reasons,
                 categories, blocked_count, first_detected, last_detected,
                 is_active, evidence)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?, 1, ?)
             ON CONFLICT(normalized_url) DO UPDATE SET
                url = excluded.url,
                risk_score = excluded.risk_score,
                detection_source = excluded.detection_source,
                reasons = excluded.reasons,
                categories = excluded.categories,
                evidence = excluded.evidence,
                last_detected = excluded.last_detected,
                is_active = 1,
                blocked_count = blocked_count + 1",
            params![
                entry.normalized_url,
                entry.url,
                entry.risk_score,
                entry.detection_source.as_str(),
                serde_json::to_string(&entry.reasons)?,
                serde_json::to_string(&entry.categories)?,
                now,
                now,
                serde_json::to_string(&entry.evidence)?,
            ],
        )?;
        Ok(())
    }

    /// Fetches a record without touching its counters.
    pub fn get(&self, normalized_url: &str) -> Result<Option<BlockedUrlRecord>> {
        let conn = self.conn.lock().unwrap();
        let record = conn
            .query_row(
                "SELECT url, normalized_url, risk_score, detection_source, reasons,
                        categories, blocked_count, first_detected, last_detected,
                        is_active, evidence
                 FROM blocked_urls WHERE normalized_url = ?",
                params![normalized_url],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Admin soft delete. History is kept; the record just stops matching.
    pub fn deactivate(&self, normalized_url: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE blocked_urls SET is_active = 0 WHERE normalized_url = ?",
            params![normalized_url],
        )?;
        Ok(updated > 0)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.conn.lock().unwrap();
        let (total_blocked, total_block_count, avg_risk_score, max_risk_score) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(blocked_count), 0),
                    COALESCE(AVG(risk_score), 0.0),
                    COALESCE(MAX(risk_score), 0)
             FROM blocked_urls WHERE is_active = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        let mut stmt = conn.prepare(
            "SELECT DISTINCT detection_source FROM blocked_urls WHERE is_active = 1",
        )?;
        let sources = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CacheStats {
            total_blocked,
            total_block_count,
            avg_risk_score,
            max_risk_score,
            sources,
        })
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<BlockedUrlRecord> {
        let reasons: String = row.get(4)?;
        let categories: String = row.get(5)?;
        let evidence: String = row.get(10)?;
        let source: String = row.get(3)?;
        Ok(BlockedUrlRecord {
            url: row.get(0)?,
            normalized_url: row.get(1)?,
            risk_score: row.get(2)?,
            detection_source: DetectionSource::parse(&source),
            reasons: serde_json::from_str(&reasons).unwrap_or_default(),
            categories: serde_json::from_str(&categories).unwrap_or_default(),
            blocked_count: row.get(6)?,
            first_detected: parse_timestamp(&row.get::<_, String>(7)?),
            last_detected: parse_timestamp(&row.get::<_, String>(8)?),
            is_active: row.get::<_, i64>(9)? != 0,
            evidence: serde_json::from_str(&evidence).unwrap_or_default(),
        })
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

enum WriterMessage {
    Entry(NewBlockedUrl),
    Flush(tokio::sync::oneshot::Sender<()>),
}

/// Detached writer for newly-detected malicious URLs. The chat path hands
/// the entry off and moves on; persistence failures only reach the log.
/// Short-lived callers drain pending writes with `flush` before exiting.
pub struct CacheWriter {
    sender: mpsc::UnboundedSender<WriterMessage>,
    _handle: tokio::task::JoinHandle<()>,
}

impl CacheWriter {
    pub fn new(store: BlockedUrlStore) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WriterMessage>();
        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    WriterMessage::Entry(entry) => match store.upsert(&entry) {
                        Ok(()) => log::info!(
                            "Saved blocked URL {} (score {})",
                            entry.normalized_url,
                            entry.risk_score
                        ),
                        Err(e) => log::error!(
                            "Failed to persist blocked URL {}: {e:#}",
                            entry.normalized_url
                        ),
                    },
                    WriterMessage::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
        });
        Self {
            sender,
            _handle: handle,
        }
    }

    pub fn record(&self, entry: NewBlockedUrl) {
        if self.sender.send(WriterMessage::Entry(entry)).is_err() {
            log::warn!("Blocked-URL writer is gone, dropping cache entry");
        }
    }

    /// Waits until every entry recorded so far has been written. The channel
    /// is FIFO, so an acknowledged marker means all prior entries landed.
    pub async fn flush(&self) {
        let (ack, done) = tokio::sync::oneshot::channel();
        if self.sender.send(WriterMessage::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

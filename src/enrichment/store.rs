//! SQLite-backed persistent store for enrichment records.
//!
//! Holds the three record families (EPSS entries, KEV entries, call-audit
//! entries) plus a metadata register. All access goes through
//! [`super::cache::EnrichmentCache`]; nothing outside the enrichment module
//! touches the connection.
//!
//! Timestamps are stored as RFC 3339 UTC text with fixed microsecond
//! precision, so lexicographic comparison inside SQL equals chronological
//! comparison. The sweep, stats and KEV-refresh queries rely on that.

use crate::error::{Result, TriageError};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Current schema version, recorded in the metadata register.
const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS epss_entries (
    cve_id        TEXT PRIMARY KEY,
    epss_score    REAL NOT NULL,
    percentile    REAL NOT NULL,
    model_version TEXT NOT NULL,
    score_date    TEXT NOT NULL,
    cached_at     TEXT NOT NULL,
    last_accessed TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kev_entries (
    cve_id             TEXT PRIMARY KEY,
    vendor_project     TEXT NOT NULL,
    product            TEXT NOT NULL,
    vulnerability_name TEXT NOT NULL,
    date_added         TEXT NOT NULL,
    short_description  TEXT NOT NULL,
    required_action    TEXT NOT NULL,
    due_date           TEXT NOT NULL,
    cached_at          TEXT NOT NULL,
    last_accessed      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS call_log (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    source            TEXT NOT NULL,
    endpoint          TEXT NOT NULL,
    parameters        TEXT NOT NULL,
    status_code       INTEGER NOT NULL,
    latency_ms        REAL NOT NULL,
    served_from_cache INTEGER NOT NULL,
    timestamp         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metadata (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Stored EPSS entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EpssRow {
    pub cve_id: String,
    /// Exploitation probability, 0.0-1.0
    pub epss_score: f64,
    /// Percentile among all scored CVEs, 0.0-100.0
    pub percentile: f64,
    /// EPSS model version (may be empty)
    pub model_version: String,
    /// Score date as reported by the source
    pub score_date: String,
    pub cached_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Stored KEV entry.
#[derive(Debug, Clone, PartialEq)]
pub struct KevRow {
    pub cve_id: String,
    pub vendor_project: String,
    pub product: String,
    pub vulnerability_name: String,
    pub date_added: String,
    pub short_description: String,
    pub required_action: String,
    pub due_date: String,
    pub cached_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// One call-audit ledger entry (append-only).
#[derive(Debug, Clone)]
pub struct CallRow {
    pub source: String,
    pub endpoint: String,
    /// Request parameters, serialized as JSON
    pub parameters: String,
    pub status_code: u16,
    pub latency_ms: f64,
    pub served_from_cache: bool,
    pub timestamp: DateTime<Utc>,
}

/// Serialize a timestamp for storage.
///
/// Fixed microsecond precision keeps every stored timestamp the same length,
/// which makes SQL string comparison chronological.
fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp back into a `DateTime<Utc>`.
fn decode_ts(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Transactional store handle.
///
/// Cheap to share behind an `Arc`; every operation serializes on the inner
/// connection mutex, which gives per-identifier upsert atomicity for free.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a store at the given path and initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| TriageError::store(format!("opening {}", path.display()), e))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store. Used by tests and `--no-cache` runs, where
    /// the cache machinery still runs but nothing persists.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TriageError::store("opening in-memory store", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| TriageError::store("setting busy timeout", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| TriageError::store("initializing schema", e))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.set_metadata("schema_version", SCHEMA_VERSION)?;
        if store.get_metadata("created_at")?.is_none() {
            store.set_metadata("created_at", &encode_ts(Utc::now()))?;
        }
        Ok(store)
    }

    /// A poisoned lock only means another thread panicked mid-operation;
    /// the SQLite connection itself is still consistent, so recover it.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Metadata register
    // ------------------------------------------------------------------

    /// Set a metadata key (last-write-wins).
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, encode_ts(Utc::now())],
            )
            .map_err(|e| TriageError::store(format!("writing metadata key {key}"), e))?;
        Ok(())
    }

    /// Read a metadata value.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| TriageError::store(format!("reading metadata key {key}"), e))
    }

    // ------------------------------------------------------------------
    // EPSS entries
    // ------------------------------------------------------------------

    /// Upsert an EPSS entry (full overwrite, not a merge).
    pub fn upsert_epss(&self, row: &EpssRow) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO epss_entries
                 (cve_id, epss_score, percentile, model_version, score_date, cached_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.cve_id,
                    row.epss_score,
                    row.percentile,
                    row.model_version,
                    row.score_date,
                    encode_ts(row.cached_at),
                    encode_ts(row.last_accessed),
                ],
            )
            .map_err(|e| TriageError::store(format!("upserting EPSS entry {}", row.cve_id), e))?;
        Ok(())
    }

    /// Read an EPSS entry without touching its access time.
    pub fn get_epss(&self, cve_id: &str) -> Result<Option<EpssRow>> {
        self.conn()
            .query_row(
                "SELECT cve_id, epss_score, percentile, model_version, score_date,
                        cached_at, last_accessed
                 FROM epss_entries WHERE cve_id = ?1",
                params![cve_id],
                |row| {
                    Ok(EpssRow {
                        cve_id: row.get(0)?,
                        epss_score: row.get(1)?,
                        percentile: row.get(2)?,
                        model_version: row.get(3)?,
                        score_date: row.get(4)?,
                        cached_at: decode_ts(5, &row.get::<_, String>(5)?)?,
                        last_accessed: decode_ts(6, &row.get::<_, String>(6)?)?,
                    })
                },
            )
            .optional()
            .map_err(|e| TriageError::store(format!("reading EPSS entry {cve_id}"), e))
    }

    /// Update an EPSS entry's last-accessed time. Leaves `cached_at` alone.
    pub fn touch_epss_access(&self, cve_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE epss_entries SET last_accessed = ?1 WHERE cve_id = ?2",
                params![encode_ts(now), cve_id],
            )
            .map_err(|e| TriageError::store(format!("touching EPSS entry {cve_id}"), e))?;
        Ok(())
    }

    /// Delete EPSS entries cached before the cutoff. Returns the count.
    pub fn delete_epss_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.conn()
            .execute(
                "DELETE FROM epss_entries WHERE cached_at < ?1",
                params![encode_ts(cutoff)],
            )
            .map_err(|e| TriageError::store("sweeping EPSS entries", e))
    }

    pub fn count_epss(&self) -> Result<u64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM epss_entries", [], |row| row.get(0))
            .map_err(|e| TriageError::store("counting EPSS entries", e))
    }

    // ------------------------------------------------------------------
    // KEV entries
    // ------------------------------------------------------------------

    /// Upsert a KEV entry (full overwrite, not a merge).
    pub fn upsert_kev(&self, row: &KevRow) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO kev_entries
                 (cve_id, vendor_project, product, vulnerability_name, date_added,
                  short_description, required_action, due_date, cached_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.cve_id,
                    row.vendor_project,
                    row.product,
                    row.vulnerability_name,
                    row.date_added,
                    row.short_description,
                    row.required_action,
                    row.due_date,
                    encode_ts(row.cached_at),
                    encode_ts(row.last_accessed),
                ],
            )
            .map_err(|e| TriageError::store(format!("upserting KEV entry {}", row.cve_id), e))?;
        Ok(())
    }

    /// Upsert a whole catalog snapshot in one transaction, so a concurrent
    /// reader sees either the old membership set or the new one, never a
    /// half-written mix.
    pub fn upsert_kev_batch(&self, rows: &[KevRow]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| TriageError::store("starting KEV batch transaction", e))?;
        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO kev_entries
                 (cve_id, vendor_project, product, vulnerability_name, date_added,
                  short_description, required_action, due_date, cached_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    row.cve_id,
                    row.vendor_project,
                    row.product,
                    row.vulnerability_name,
                    row.date_added,
                    row.short_description,
                    row.required_action,
                    row.due_date,
                    encode_ts(row.cached_at),
                    encode_ts(row.last_accessed),
                ],
            )
            .map_err(|e| {
                TriageError::store(format!("upserting KEV entry {}", row.cve_id), e)
            })?;
        }
        tx.commit()
            .map_err(|e| TriageError::store("committing KEV batch", e))?;
        Ok(())
    }

    /// Read a KEV entry without touching its access time.
    pub fn get_kev(&self, cve_id: &str) -> Result<Option<KevRow>> {
        self.conn()
            .query_row(
                "SELECT cve_id, vendor_project, product, vulnerability_name, date_added,
                        short_description, required_action, due_date, cached_at, last_accessed
                 FROM kev_entries WHERE cve_id = ?1",
                params![cve_id],
                |row| {
                    Ok(KevRow {
                        cve_id: row.get(0)?,
                        vendor_project: row.get(1)?,
                        product: row.get(2)?,
                        vulnerability_name: row.get(3)?,
                        date_added: row.get(4)?,
                        short_description: row.get(5)?,
                        required_action: row.get(6)?,
                        due_date: row.get(7)?,
                        cached_at: decode_ts(8, &row.get::<_, String>(8)?)?,
                        last_accessed: decode_ts(9, &row.get::<_, String>(9)?)?,
                    })
                },
            )
            .optional()
            .map_err(|e| TriageError::store(format!("reading KEV entry {cve_id}"), e))
    }

    /// Update a KEV entry's last-accessed time. Leaves `cached_at` alone.
    pub fn touch_kev_access(&self, cve_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE kev_entries SET last_accessed = ?1 WHERE cve_id = ?2",
                params![encode_ts(now), cve_id],
            )
            .map_err(|e| TriageError::store(format!("touching KEV entry {cve_id}"), e))?;
        Ok(())
    }

    /// Identifiers of all KEV entries cached at or after the cutoff.
    pub fn kev_ids_cached_since(&self, cutoff: DateTime<Utc>) -> Result<HashSet<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT cve_id FROM kev_entries WHERE cached_at >= ?1")
            .map_err(|e| TriageError::store("listing fresh KEV entries", e))?;
        let rows = stmt
            .query_map(params![encode_ts(cutoff)], |row| row.get::<_, String>(0))
            .map_err(|e| TriageError::store("listing fresh KEV entries", e))?;
        let mut ids = HashSet::new();
        for id in rows {
            ids.insert(id.map_err(|e| TriageError::store("listing fresh KEV entries", e))?);
        }
        Ok(ids)
    }

    /// The most recent `cached_at` over all KEV entries.
    ///
    /// A successful catalog refresh rewrites every entry, so this is the
    /// instant of the last full refresh; `None` means never refreshed.
    pub fn latest_kev_cached_at(&self) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn()
            .query_row("SELECT MAX(cached_at) FROM kev_entries", [], |row| {
                row.get(0)
            })
            .map_err(|e| TriageError::store("reading latest KEV refresh", e))?;
        match raw {
            Some(s) => decode_ts(0, &s)
                .map(Some)
                .map_err(|e| TriageError::store("reading latest KEV refresh", e)),
            None => Ok(None),
        }
    }

    /// Delete KEV entries cached before the cutoff. Returns the count.
    pub fn delete_kev_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.conn()
            .execute(
                "DELETE FROM kev_entries WHERE cached_at < ?1",
                params![encode_ts(cutoff)],
            )
            .map_err(|e| TriageError::store("sweeping KEV entries", e))
    }

    pub fn count_kev(&self) -> Result<u64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM kev_entries", [], |row| row.get(0))
            .map_err(|e| TriageError::store("counting KEV entries", e))
    }

    // ------------------------------------------------------------------
    // Call-audit ledger
    // ------------------------------------------------------------------

    /// Append one entry to the call ledger. Never updates existing rows.
    pub fn append_call(&self, row: &CallRow) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO call_log
                 (source, endpoint, parameters, status_code, latency_ms, served_from_cache, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.source,
                    row.endpoint,
                    row.parameters,
                    row.status_code,
                    row.latency_ms,
                    row.served_from_cache,
                    encode_ts(row.timestamp),
                ],
            )
            .map_err(|e| TriageError::store("appending call-log entry", e))?;
        Ok(())
    }

    pub fn count_calls(&self) -> Result<u64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM call_log", [], |row| row.get(0))
            .map_err(|e| TriageError::store("counting call-log entries", e))
    }

    pub fn count_cached_calls(&self) -> Result<u64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM call_log WHERE served_from_cache = 1",
                [],
                |row| row.get(0),
            )
            .map_err(|e| TriageError::store("counting cached call-log entries", e))
    }

    /// Calls per source with an entry timestamp at or after the cutoff.
    ///
    /// Keyed on the recorded timestamp, not the autoincrement id, so clock
    /// skew between write and report time cannot shift the window boundary.
    pub fn calls_by_source_since(&self, cutoff: DateTime<Utc>) -> Result<HashMap<String, u64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT source, COUNT(*) FROM call_log WHERE timestamp >= ?1 GROUP BY source",
            )
            .map_err(|e| TriageError::store("aggregating call log", e))?;
        let rows = stmt
            .query_map(params![encode_ts(cutoff)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
            })
            .map_err(|e| TriageError::store("aggregating call log", e))?;
        let mut counts = HashMap::new();
        for entry in rows {
            let (source, count) =
                entry.map_err(|e| TriageError::store("aggregating call log", e))?;
            counts.insert(source, count);
        }
        Ok(counts)
    }
}

//! Streaming reader over one backup log.
//!
//! Rows are fetched in keyset-paginated batches: each batch is one fresh
//! statement execution, keyed past the last row already delivered. A busy
//! signal therefore discards only the in-flight batch; the cursor retries
//! the same batch on the next step and no row is ever delivered twice or
//! lost.

use std::collections::VecDeque;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, Row};

use super::entry::{LogEntry, LogOp};
use super::errors::LogError;

/// Closed checkpoints only, newest mutation first. The vbucket id breaks
/// ties so the scan order is total and the keyset can resume exactly.
const FIRST_BATCH_SQL: &str = "SELECT cpoint_op.cpoint_id, cpoint_op.seq, cpoint_op.vbucket_id, \
            op, key, flg, exp, cas, val \
     FROM cpoint_state \
     JOIN cpoint_op ON (cpoint_op.vbucket_id = cpoint_state.vbucket_id AND \
                        cpoint_op.cpoint_id = cpoint_state.cpoint_id) \
     WHERE cpoint_state.state = 'closed' \
     ORDER BY cpoint_op.cpoint_id DESC, cpoint_op.seq DESC, cpoint_op.vbucket_id DESC \
     LIMIT ?1";

const NEXT_BATCH_SQL: &str = "SELECT cpoint_op.cpoint_id, cpoint_op.seq, cpoint_op.vbucket_id, \
            op, key, flg, exp, cas, val \
     FROM cpoint_state \
     JOIN cpoint_op ON (cpoint_op.vbucket_id = cpoint_state.vbucket_id AND \
                        cpoint_op.cpoint_id = cpoint_state.cpoint_id) \
     WHERE cpoint_state.state = 'closed' AND \
           (cpoint_op.cpoint_id < ?1 OR (cpoint_op.cpoint_id = ?1 AND \
            (cpoint_op.seq < ?2 OR (cpoint_op.seq = ?2 AND cpoint_op.vbucket_id < ?3)))) \
     ORDER BY cpoint_op.cpoint_id DESC, cpoint_op.seq DESC, cpoint_op.vbucket_id DESC \
     LIMIT ?4";

const BATCH_ROWS: usize = 256;

/// One advance of a replay cursor.
#[derive(Debug)]
pub enum LogStep {
    /// The next row in replay order.
    Entry(LogEntry),
    /// Transient contention in the log store; no row was consumed.
    Busy,
    /// No rows remain.
    End,
}

/// The seam between a backup log and the replay engine.
pub trait EntrySource {
    fn next_step(&mut self) -> Result<LogStep, LogError>;
}

/// A backup log opened read-only.
pub struct BackupLog {
    conn: Connection,
}

impl BackupLog {
    /// Open the file and verify the replay query can be planned against
    /// it, so schema problems surface before any row is read.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| LogError::open(path, e))?;
        conn.prepare(FIRST_BATCH_SQL).map_err(LogError::query)?;
        Ok(Self { conn })
    }

    pub fn cursor(&self) -> ReplayCursor<'_> {
        self.cursor_with_batch_size(BATCH_ROWS)
    }

    /// Test hook: smaller batches force the keyset-resume path.
    pub fn cursor_with_batch_size(&self, batch_rows: usize) -> ReplayCursor<'_> {
        ReplayCursor {
            conn: &self.conn,
            batch_rows,
            pending: VecDeque::new(),
            resume_after: None,
            exhausted: false,
        }
    }
}

/// Scan position: the (checkpoint, sequence, vbucket) of the last row
/// delivered, in raw column width.
type ScanKey = (i64, i64, i64);

pub struct ReplayCursor<'log> {
    conn: &'log Connection,
    batch_rows: usize,
    pending: VecDeque<(ScanKey, LogEntry)>,
    resume_after: Option<ScanKey>,
    exhausted: bool,
}

impl ReplayCursor<'_> {
    fn fetch_batch(&self) -> Result<Vec<(ScanKey, LogEntry)>, rusqlite::Error> {
        match self.resume_after {
            None => {
                let mut stmt = self.conn.prepare(FIRST_BATCH_SQL)?;
                let rows = stmt.query_map(
                    rusqlite::params![self.batch_rows as i64],
                    decode_row,
                )?;
                rows.collect()
            }
            Some((cpoint, seq, vbucket)) => {
                let mut stmt = self.conn.prepare(NEXT_BATCH_SQL)?;
                let rows = stmt.query_map(
                    rusqlite::params![cpoint, seq, vbucket, self.batch_rows as i64],
                    decode_row,
                )?;
                rows.collect()
            }
        }
    }

    fn deliver(&mut self, keyed: (ScanKey, LogEntry)) -> LogStep {
        self.resume_after = Some(keyed.0);
        LogStep::Entry(keyed.1)
    }
}

impl EntrySource for ReplayCursor<'_> {
    fn next_step(&mut self) -> Result<LogStep, LogError> {
        if let Some(keyed) = self.pending.pop_front() {
            return Ok(self.deliver(keyed));
        }
        if self.exhausted {
            return Ok(LogStep::End);
        }

        match self.fetch_batch() {
            Ok(batch) if batch.is_empty() => {
                self.exhausted = true;
                Ok(LogStep::End)
            }
            Ok(batch) => {
                self.pending = batch.into();
                // Cannot be empty here.
                match self.pending.pop_front() {
                    Some(keyed) => Ok(self.deliver(keyed)),
                    None => Ok(LogStep::End),
                }
            }
            // The failed batch was discarded whole; the resume key still
            // points at the last delivered row, so retrying is safe.
            Err(e) if is_busy(&e) => Ok(LogStep::Busy),
            Err(e) => Err(LogError::query(e)),
        }
    }
}

fn decode_row(row: &Row<'_>) -> Result<(ScanKey, LogEntry), rusqlite::Error> {
    let cpoint: i64 = row.get(0)?;
    let seq: i64 = row.get(1)?;
    let raw_vbucket: i64 = row.get(2)?;
    let code: Option<String> = row.get(3)?;
    let key: Vec<u8> = row.get(4)?;
    let flags = row.get::<_, i64>(5)? as u32;
    let expiry = row.get::<_, i64>(6)? as u32;
    let cas = row.get::<_, i64>(7)? as u64;
    let value: Option<Vec<u8>> = row.get(8)?;

    let entry = LogEntry {
        vbucket: raw_vbucket as u16,
        op: code.as_deref().map_or(LogOp::Set, LogOp::from_code),
        key,
        value: value.unwrap_or_default(),
        flags,
        expiry,
        cas,
    };
    Ok(((cpoint, seq, raw_vbucket), entry))
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _)
        if e.code == rusqlite::ErrorCode::DatabaseBusy
            || e.code == rusqlite::ErrorCode::DatabaseLocked)
}

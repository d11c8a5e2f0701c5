use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use crate::models::{JobApplication, JobInput, JobStats, JobStatus, StatusTransition};
use crate::query::JobQuery;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("database not initialized, run `jobtrack init` first")]
    NotInitialized,

    #[error("database lock poisoned")]
    Poisoned,

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

const JOB_COLUMNS: &str = "id, company, position, location, status, applied_date, tags, notes, url, created_at, updated_at";
const TRANSITION_COLUMNS: &str = "id, job_id, from_status, to_status, changed_at";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::configure(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        // Cascade deletes of transitions rely on this.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        // Built-in LOWER() only folds ASCII.
        conn.create_scalar_function(
            "unicode_lower",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: Option<String> = ctx.get(0)?;
                Ok(value.map(|s| s.to_lowercase()))
            },
        )?;
        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL CHECK (length(trim(company)) > 0),
                position TEXT NOT NULL CHECK (length(trim(position)) > 0),
                location TEXT NOT NULL CHECK (length(trim(location)) > 0),
                status TEXT NOT NULL DEFAULT 'APPLIED' CHECK (status IN ('APPLIED', 'INTERVIEW', 'REJECTED', 'OFFER')),
                applied_date TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                notes TEXT,
                url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS status_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES job_applications(id) ON DELETE CASCADE,
                from_status TEXT NOT NULL,
                to_status TEXT NOT NULL,
                changed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON job_applications(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_applied_date ON job_applications(applied_date);
            CREATE INDEX IF NOT EXISTS idx_transitions_job ON status_transitions(job_id);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='job_applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    // --- Job operations ---

    /// Insert a job and read it back. Nothing is kept if either step fails.
    pub fn create_job(&mut self, input: &JobInput) -> Result<JobApplication> {
        let tx = self.conn.transaction()?;
        let now = timestamp(Utc::now());
        tx.execute(
            "INSERT INTO job_applications
                (company, position, location, status, applied_date, tags, notes, url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                input.company,
                input.position,
                input.location,
                input.status,
                timestamp(input.applied_date),
                tags_json(&input.tags),
                input.notes,
                input.url,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        let job = fetch_job(&tx, id)?.ok_or(Error::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
        tx.commit()?;
        Ok(job)
    }

    pub fn get_job(&self, id: i64) -> Result<Option<JobApplication>> {
        fetch_job(&self.conn, id)
    }

    /// One page of matching jobs and the total match count.
    pub fn list_jobs(&self, query: &JobQuery) -> Result<(Vec<JobApplication>, u64)> {
        let filter = query.filter();

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM job_applications {}", filter.sql),
            params_from_iter(filter.params.iter()),
            |row| row.get(0),
        )?;

        let n = filter.params.len();
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM job_applications {} {} LIMIT ?{} OFFSET ?{}",
            filter.sql,
            query.order_by(),
            n + 1,
            n + 2,
        );
        let mut values = filter.params;
        values.push(i64::from(query.limit).into());
        values.push(i64::try_from(query.offset()).unwrap_or(i64::MAX).into());

        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params_from_iter(values.iter()), row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((jobs, u64::try_from(total).unwrap_or(0)))
    }

    /// Replace a job, recording a transition when its status changes.
    ///
    /// The read, the transition insert and the row update share one IMMEDIATE
    /// transaction, so concurrent updates to a job are serialised and a failure
    /// leaves neither write behind. Returns `None` when the job does not exist.
    pub fn update_job(
        &mut self,
        id: i64,
        input: &JobInput,
    ) -> Result<Option<(JobApplication, Option<StatusTransition>)>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(existing) = fetch_job(&tx, id)? else {
            return Ok(None);
        };

        let now = timestamp(Utc::now());

        let transition = if existing.status != input.status {
            tx.execute(
                "INSERT INTO status_transitions (job_id, from_status, to_status, changed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, existing.status, input.status, now],
            )?;
            let transition_id = tx.last_insert_rowid();
            Some(tx.query_row(
                &format!("SELECT {TRANSITION_COLUMNS} FROM status_transitions WHERE id = ?1"),
                [transition_id],
                row_to_transition,
            )?)
        } else {
            None
        };

        tx.execute(
            "UPDATE job_applications
             SET company = ?1, position = ?2, location = ?3, status = ?4, applied_date = ?5,
                 tags = ?6, notes = ?7, url = ?8, updated_at = ?9
             WHERE id = ?10",
            params![
                input.company,
                input.position,
                input.location,
                input.status,
                timestamp(input.applied_date),
                tags_json(&input.tags),
                input.notes,
                input.url,
                now,
                id,
            ],
        )?;

        let updated = fetch_job(&tx, id)?.ok_or(Error::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
        tx.commit()?;

        Ok(Some((updated, transition)))
    }

    /// Hard delete. Transitions of the job go with it. Returns false if no such job.
    pub fn delete_job(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM job_applications WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    pub fn count_jobs(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM job_applications", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    // --- Transition log ---

    pub fn list_transitions(&self) -> Result<Vec<StatusTransition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM status_transitions ORDER BY changed_at, id"
        ))?;
        let rows = stmt.query_map([], row_to_transition)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_transitions_for_job(&self, job_id: i64) -> Result<Vec<StatusTransition>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM status_transitions WHERE job_id = ?1 ORDER BY changed_at, id"
        ))?;
        let rows = stmt.query_map([job_id], row_to_transition)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // --- Stats ---

    /// Totals per status, plus applications dated on or after midnight UTC a week before `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> Result<JobStats> {
        let mut stats = JobStats::default();

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM job_applications GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, JobStatus>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            let count = u64::try_from(count).unwrap_or(0);
            stats.by_status.add(status, count);
            stats.total += count;
        }

        let since = (now - Duration::days(7))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        let recent: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM job_applications WHERE applied_date >= ?1",
            [timestamp(since)],
            |row| row.get(0),
        )?;
        stats.applied_this_week = u64::try_from(recent).unwrap_or(0);

        Ok(stats)
    }
}

/// Shared handle used by the HTTP server.
///
/// The connection sits behind a mutex and blocking SQLite work runs on the
/// tokio blocking pool.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
}

impl Store {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|_| Error::Poisoned)?;
            f(&mut *guard)
        })
        .await?
    }
}

// Fixed-width UTC text sorts in time order, which ORDER BY and the stats window rely on.
// Nanosecond digits keep every instant a `DateTime<Utc>` can hold.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn tags_json(tags: &[String]) -> String {
    serde_json::Value::from(tags.to_vec()).to_string()
}

fn fetch_job(conn: &Connection, id: i64) -> Result<Option<JobApplication>> {
    Ok(conn
        .query_row(
            &format!("SELECT {JOB_COLUMNS} FROM job_applications WHERE id = ?1"),
            [id],
            row_to_job,
        )
        .optional()?)
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn get_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobApplication> {
    let tags: String = row.get(6)?;
    Ok(JobApplication {
        id: row.get(0)?,
        company: row.get(1)?,
        position: row.get(2)?,
        location: row.get(3)?,
        status: row.get(4)?,
        applied_date: get_timestamp(row, 5)?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_error(6, e))?,
        notes: row.get(7)?,
        url: row.get(8)?,
        created_at: get_timestamp(row, 9)?,
        updated_at: get_timestamp(row, 10)?,
    })
}

fn row_to_transition(row: &rusqlite::Row) -> rusqlite::Result<StatusTransition> {
    Ok(StatusTransition {
        id: row.get(0)?,
        job_id: row.get(1)?,
        from: row.get(2)?,
        to: row.get(3)?,
        changed_at: get_timestamp(row, 4)?,
    })
}

//! Audit trail of research actions.
//!
//! Every search, navigation, fetch or download made during a job is appended
//! to `scraper_audit_trail`. Entries are never deleted or rewritten; the only
//! later mutation is promoting an entry to a knowledge source (and appending
//! notes while doing so).

use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::artifacts::{hash_file, resolve_path};
use crate::config::Config;
use crate::db;
use crate::error::{Entity, LedgerError, Result};
use crate::jobs::{self, Counter};
use crate::models::{now_rfc3339, ActionType, Rating, SourceType, TrailStatus};
use crate::progress::{ProgressReporter, WriteEvent};
use crate::sources::{self, NewSource};

/// One recorded action, as supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewTrailEntry {
    pub job_id: i64,
    pub action: ActionType,
    pub tool_name: Option<String>,
    pub url: Option<String>,
    pub search_query: Option<String>,
    pub http_status: Option<i64>,
    pub page_title: Option<String>,
    pub page_language: Option<String>,
    pub artifact_path: Option<PathBuf>,
    pub parent_trail_id: Option<i64>,
    pub session_id: Option<String>,
    pub status: TrailStatus,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub notes: Option<String>,
}

impl NewTrailEntry {
    pub fn new(job_id: i64, action: ActionType) -> Self {
        Self {
            job_id,
            action,
            tool_name: None,
            url: None,
            search_query: None,
            http_status: None,
            page_title: None,
            page_language: None,
            artifact_path: None,
            parent_trail_id: None,
            session_id: None,
            status: TrailStatus::Success,
            error_message: None,
            duration_ms: None,
            notes: None,
        }
    }
}

/// Promote a trail entry to a knowledge source.
#[derive(Debug, Clone)]
pub struct MarkSource {
    pub trail_id: i64,
    /// When set, a `sources` row is resolved or created from the entry's URL.
    pub create_source: Option<(SourceType, Rating)>,
    pub notes: Option<String>,
}

/// A stored trail entry, as listed by `query audit-trail`.
#[derive(Debug, Clone, Serialize)]
pub struct TrailRecord {
    pub id: i64,
    pub job_run_id: i64,
    pub action_type: ActionType,
    pub tool_name: Option<String>,
    pub url: Option<String>,
    pub search_query: Option<String>,
    pub page_title: Option<String>,
    pub artifact_path: Option<String>,
    pub artifact_hash: Option<String>,
    pub parent_trail_id: Option<i64>,
    pub timestamp: String,
    pub status: TrailStatus,
    pub is_source: bool,
    pub source_id: Option<i64>,
}

/// Insert a trail row. `is_source`/`source_id` are set by the pathway writer,
/// which records the fetch and its source in one go.
pub(crate) async fn insert_trail_row(
    conn: &mut SqliteConnection,
    entry: &NewTrailEntry,
    artifact_hash: Option<&str>,
    source_id: Option<i64>,
) -> Result<i64> {
    let artifact_path = entry.artifact_path.as_ref().map(|p| p.display().to_string());
    let result = sqlx::query(
        r#"
        INSERT INTO scraper_audit_trail (
            job_run_id, action_type, tool_name, url, search_query, http_status,
            page_title, page_language, artifact_path, artifact_hash, parent_trail_id,
            session_id, timestamp, status, error_message, duration_ms, notes,
            is_source, source_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.job_id)
    .bind(entry.action.as_str())
    .bind(&entry.tool_name)
    .bind(&entry.url)
    .bind(&entry.search_query)
    .bind(entry.http_status)
    .bind(&entry.page_title)
    .bind(&entry.page_language)
    .bind(artifact_path)
    .bind(artifact_hash)
    .bind(entry.parent_trail_id)
    .bind(&entry.session_id)
    .bind(now_rfc3339())
    .bind(entry.status.as_str())
    .bind(&entry.error_message)
    .bind(entry.duration_ms)
    .bind(&entry.notes)
    .bind(i64::from(source_id.is_some()))
    .bind(source_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn ensure_trail(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM scraper_audit_trail WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match exists {
        Some(_) => Ok(()),
        None => Err(LedgerError::not_found(Entity::TrailEntry, id)),
    }
}

/// Append one action to the trail and bump the job's `pages_visited`.
///
/// If `artifact_path` names an existing file its SHA-256 is stored alongside;
/// a path with nothing behind it is recorded with no hash.
pub async fn log_action(pool: &SqlitePool, root: &Path, entry: &NewTrailEntry) -> Result<i64> {
    let artifact_hash = match &entry.artifact_path {
        Some(path) => {
            let full = resolve_path(path, root);
            if full.is_file() {
                Some(hash_file(&full)?)
            } else {
                tracing::warn!(path = %full.display(), "artifact not found, logging without hash");
                None
            }
        }
        None => None,
    };

    let mut tx = pool.begin().await?;

    jobs::ensure_job(&mut tx, entry.job_id).await?;
    if let Some(parent) = entry.parent_trail_id {
        ensure_trail(&mut tx, parent).await?;
    }

    let trail_id = insert_trail_row(&mut tx, entry, artifact_hash.as_deref(), None).await?;
    jobs::increment(&mut tx, entry.job_id, Counter::PagesVisited).await?;

    tx.commit().await?;
    Ok(trail_id)
}

/// Mark a trail entry as a knowledge source.
///
/// Returns the linked source id when one was resolved. The job's
/// `sources_found` counter moves only on the entry's first promotion.
pub async fn mark_source(pool: &SqlitePool, mark: &MarkSource) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        "SELECT job_run_id, url, page_title, is_source FROM scraper_audit_trail WHERE id = ?",
    )
    .bind(mark.trail_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| LedgerError::not_found(Entity::TrailEntry, mark.trail_id))?;

    let job_id: i64 = row.get("job_run_id");
    let url: Option<String> = row.get("url");
    let page_title: Option<String> = row.get("page_title");
    let already_source = row.get::<i64, _>("is_source") != 0;

    if already_source {
        tracing::warn!(trail_id = mark.trail_id, "trail entry is already marked as a source");
    }

    let source_id = match mark.create_source {
        Some((source_type, credibility)) => {
            let url = url.ok_or_else(|| {
                LedgerError::InvalidInput(format!(
                    "trail entry {} has no URL to create a source from",
                    mark.trail_id
                ))
            })?;
            let title = page_title.unwrap_or_else(|| url.clone());
            let source = NewSource::new(&url, &title, source_type, credibility);
            Some(sources::resolve_or_create_source(&mut tx, &source, None).await?.id)
        }
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE scraper_audit_trail
        SET is_source = 1,
            source_id = COALESCE(?1, source_id),
            notes = CASE
                WHEN ?2 IS NULL THEN notes
                WHEN notes IS NULL THEN ?2
                ELSE notes || char(10) || ?2
            END
        WHERE id = ?3
        "#,
    )
    .bind(source_id)
    .bind(&mark.notes)
    .bind(mark.trail_id)
    .execute(&mut *tx)
    .await?;

    if !already_source {
        jobs::increment(&mut tx, job_id, Counter::SourcesFound).await?;
    }

    tx.commit().await?;
    Ok(source_id)
}

fn trail_from_row(row: &SqliteRow) -> Result<TrailRecord> {
    let action: String = row.get("action_type");
    let status: String = row.get("status");
    let is_source: i64 = row.get("is_source");
    Ok(TrailRecord {
        id: row.get("id"),
        job_run_id: row.get("job_run_id"),
        action_type: action.parse()?,
        tool_name: row.get("tool_name"),
        url: row.get("url"),
        search_query: row.get("search_query"),
        page_title: row.get("page_title"),
        artifact_path: row.get("artifact_path"),
        artifact_hash: row.get("artifact_hash"),
        parent_trail_id: row.get("parent_trail_id"),
        timestamp: row.get("timestamp"),
        status: status.parse()?,
        is_source: is_source != 0,
        source_id: row.get("source_id"),
    })
}

/// All trail entries of a job, in the order they were logged.
pub async fn list_trail(pool: &SqlitePool, job_id: i64) -> Result<Vec<TrailRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, job_run_id, action_type, tool_name, url, search_query, page_title,
               artifact_path, artifact_hash, parent_trail_id, timestamp, status,
               is_source, source_id
        FROM scraper_audit_trail
        WHERE job_run_id = ?
        ORDER BY id
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(trail_from_row).collect()
}

/// CLI entry point for `audit log`: prints the trail id on stdout.
pub async fn run_log(
    config: &Config,
    entry: &NewTrailEntry,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = log_action(&pool, &config.project.root, entry).await;
    pool.close().await;
    let trail_id = result?;

    let mut message = format!(
        "Action logged\n   Trail ID: {}\n   Job ID: {}\n   Action: {}",
        trail_id, entry.job_id, entry.action
    );
    if let Some(url) = &entry.url {
        message.push_str(&format!("\n   URL: {}", url));
    }
    if let Some(query) = &entry.search_query {
        message.push_str(&format!("\n   Search: {}", query));
    }
    if let Some(title) = &entry.page_title {
        message.push_str(&format!("\n   Title: {}", title));
    }
    progress.report(WriteEvent::Done { message });

    println!("{}", trail_id);
    Ok(())
}

/// CLI entry point for `audit mark-source`: prints the source id on stdout
/// when one was resolved.
pub async fn run_mark_source(
    config: &Config,
    mark: &MarkSource,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = mark_source(&pool, mark).await;
    pool.close().await;
    let source_id = result?;

    let mut message = format!("Trail entry {} marked as source", mark.trail_id);
    if let Some(id) = source_id {
        message.push_str(&format!("\n   Source ID: {}", id));
    }
    progress.report(WriteEvent::Done { message });

    if let Some(id) = source_id {
        println!("{}", id);
    }
    Ok(())
}

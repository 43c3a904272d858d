//! Job tracking.
//!
//! A job is one research session. It is opened with status `running`,
//! accumulates counters as actions are logged against it, and is closed
//! exactly once with a terminal [`JobOutcome`].

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::{Entity, LedgerError, Result};
use crate::models::{now_rfc3339, Job, JobOutcome, JobStatus};
use crate::progress::{ProgressReporter, WriteEvent};

/// Parameters for opening a job.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub task: String,
    pub country: Option<String>,
    pub pathway_type: Option<String>,
    pub llm_model: Option<String>,
}

/// The per-job counters that logging operations bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    PagesVisited,
    SourcesFound,
    ArtifactsDownloaded,
}

impl Counter {
    fn column(self) -> &'static str {
        match self {
            Counter::PagesVisited => "pages_visited",
            Counter::SourcesFound => "sources_found",
            Counter::ArtifactsDownloaded => "artifacts_downloaded",
        }
    }
}

/// A closed job and how long it ran.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub job: Job,
    pub duration: Option<chrono::Duration>,
}

const JOB_COLUMNS: &str = "id, task_description, country, pathway_type, llm_model, status, \
     started_at, completed_at, pages_visited, sources_found, artifacts_downloaded, \
     error_count, session_notes, error_summary";

fn job_from_row(row: &SqliteRow) -> Result<Job> {
    let status: String = row.get("status");
    Ok(Job {
        id: row.get("id"),
        task_description: row.get("task_description"),
        country: row.get("country"),
        pathway_type: row.get("pathway_type"),
        llm_model: row.get("llm_model"),
        status: status.parse()?,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        pages_visited: row.get("pages_visited"),
        sources_found: row.get("sources_found"),
        artifacts_downloaded: row.get("artifacts_downloaded"),
        error_count: row.get("error_count"),
        session_notes: row.get("session_notes"),
        error_summary: row.get("error_summary"),
    })
}

/// Open a new job with status `running` and zeroed counters.
pub async fn start_job(pool: &SqlitePool, job: &NewJob) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO job_run (task_description, country, pathway_type, status, started_at, llm_model)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&job.task)
    .bind(&job.country)
    .bind(&job.pathway_type)
    .bind(JobStatus::Running.as_str())
    .bind(now_rfc3339())
    .bind(job.llm_model.as_deref().unwrap_or("unknown"))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub(crate) async fn fetch_job(conn: &mut SqliteConnection, id: i64) -> Result<Option<Job>> {
    let row = sqlx::query(&format!("SELECT {} FROM job_run WHERE id = ?", JOB_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Fail with [`LedgerError::NotFound`] unless the job exists.
pub(crate) async fn ensure_job(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM job_run WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match exists {
        Some(_) => Ok(()),
        None => Err(LedgerError::not_found(Entity::Job, id)),
    }
}

/// Add one to a job counter.
pub(crate) async fn increment(
    conn: &mut SqliteConnection,
    job_id: i64,
    counter: Counter,
) -> Result<()> {
    let column = counter.column();
    let result = sqlx::query(&format!(
        "UPDATE job_run SET {col} = {col} + 1 WHERE id = ?",
        col = column
    ))
    .bind(job_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(Entity::Job, job_id));
    }
    Ok(())
}

pub async fn get_job(pool: &SqlitePool, id: i64) -> Result<Job> {
    let mut conn = pool.acquire().await?;
    fetch_job(&mut conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Job, id))
}

/// Most recently started jobs first.
pub async fn list_jobs(pool: &SqlitePool, limit: i64) -> Result<Vec<Job>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM job_run ORDER BY started_at DESC, id DESC LIMIT ?",
        JOB_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.iter().map(job_from_row).collect()
}

/// Close a running job.
///
/// Sets the terminal status and completion time, recounts `error_count` from
/// the job's trail entries with status `error`, and appends `notes` to the
/// session notes on a new line.
pub async fn finish_job(
    pool: &SqlitePool,
    id: i64,
    outcome: JobOutcome,
    error_summary: Option<&str>,
    notes: Option<&str>,
) -> Result<JobSummary> {
    let mut tx = pool.begin().await?;

    let job = fetch_job(&mut tx, id)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Job, id))?;

    if job.status != JobStatus::Running {
        return Err(LedgerError::JobClosed {
            id,
            status: job.status.to_string(),
        });
    }

    let error_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scraper_audit_trail WHERE job_run_id = ? AND status = 'error'",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE job_run
        SET status = ?1,
            completed_at = ?2,
            error_count = ?3,
            error_summary = ?4,
            session_notes = CASE
                WHEN ?5 IS NULL THEN session_notes
                WHEN session_notes IS NULL THEN ?5
                ELSE session_notes || char(10) || ?5
            END
        WHERE id = ?6
        "#,
    )
    .bind(JobStatus::from(outcome).as_str())
    .bind(now_rfc3339())
    .bind(error_count)
    .bind(error_summary)
    .bind(notes)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let job = fetch_job(&mut tx, id)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Job, id))?;
    tx.commit().await?;

    let duration = job
        .completed_at
        .as_deref()
        .and_then(|done| elapsed(&job.started_at, done));

    Ok(JobSummary { job, duration })
}

fn elapsed(start: &str, end: &str) -> Option<chrono::Duration> {
    let start: DateTime<Utc> = DateTime::parse_from_rfc3339(start).ok()?.into();
    let end: DateTime<Utc> = DateTime::parse_from_rfc3339(end).ok()?.into();
    Some(end - start)
}

/// Format a duration as `1h 02m 03s` / `4m 05s` / `6s`.
pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// CLI entry point for `job start`: prints the new job id on stdout.
pub async fn run_start(
    config: &Config,
    job: &NewJob,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = start_job(&pool, job).await;
    pool.close().await;
    let id = result?;

    let mut message = format!("Job started (ID: {})\n   Task: {}", id, job.task);
    if let Some(country) = &job.country {
        message.push_str(&format!("\n   Country: {}", country));
    }
    if let Some(pathway) = &job.pathway_type {
        message.push_str(&format!("\n   Pathway: {}", pathway));
    }
    progress.report(WriteEvent::Done { message });

    println!("{}", id);
    Ok(())
}

/// CLI entry point for `job finish`: prints the job id on stdout.
pub async fn run_finish(
    config: &Config,
    id: i64,
    outcome: JobOutcome,
    error_summary: Option<&str>,
    notes: Option<&str>,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = finish_job(&pool, id, outcome, error_summary, notes).await;
    pool.close().await;
    let summary = result?;

    let job = &summary.job;
    let mut message = format!(
        "Job {} marked as {}\n   Task: {}",
        job.id, job.status, job.task_description
    );
    if let Some(duration) = summary.duration {
        message.push_str(&format!("\n   Duration: {}", format_duration(duration)));
    }
    message.push_str(&format!(
        "\n   Pages visited: {}\n   Sources found: {}\n   Artifacts: {}\n   Errors: {}",
        job.pages_visited, job.sources_found, job.artifacts_downloaded, job.error_count
    ));
    if let Some(error) = &job.error_summary {
        message.push_str(&format!("\n   Error: {}", error));
    }
    progress.report(WriteEvent::Done { message });

    println!("{}", job.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(chrono::Duration::seconds(6)), "6s");
        assert_eq!(format_duration(chrono::Duration::seconds(245)), "4m 05s");
        assert_eq!(format_duration(chrono::Duration::seconds(3723)), "1h 02m 03s");
        assert_eq!(format_duration(chrono::Duration::seconds(-3)), "0s");
    }

    #[test]
    fn elapsed_between_rfc3339_instants() {
        let d = elapsed("2025-10-25T10:00:00Z", "2025-10-25T10:01:30Z").unwrap();
        assert_eq!(d.num_seconds(), 90);
        assert!(elapsed("not a time", "2025-10-25T10:01:30Z").is_none());
    }
}

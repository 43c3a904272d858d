//! Database statistics overview.
//!
//! A quick summary of what has been recorded: row counts per table,
//! pathways per country, and how research jobs ended. Used by
//! `rledger stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Tables reported by `stats`, in display order.
pub const TABLES: &[&str] = &[
    "countries",
    "residency_pathways",
    "sources",
    "pathway_sources",
    "legal_references",
    "job_run",
    "scraper_audit_trail",
    "artifacts",
];

#[derive(Debug, Clone)]
pub struct LedgerStats {
    pub schema_version: Option<i64>,
    pub table_counts: Vec<(&'static str, i64)>,
    pub pathways_by_country: Vec<(String, i64)>,
    pub jobs_by_status: Vec<(String, i64)>,
    pub last_job_started: Option<String>,
}

impl LedgerStats {
    pub fn count(&self, table: &str) -> Option<i64> {
        self.table_counts
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, n)| *n)
    }
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<LedgerStats> {
    let mut table_counts = Vec::with_capacity(TABLES.len());
    for &table in TABLES {
        // Table names come from the fixed list above.
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await?;
        table_counts.push((table, n));
    }

    let schema_version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;

    let pathways_by_country: Vec<(String, i64)> = sqlx::query(
        r#"
        SELECT c.name AS country, COUNT(p.id) AS n
        FROM residency_pathways p
        JOIN countries c ON c.id = p.country_id
        GROUP BY c.name
        ORDER BY n DESC, c.name
        "#,
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| (row.get("country"), row.get("n")))
    .collect();

    let jobs_by_status: Vec<(String, i64)> = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM job_run GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| (row.get("status"), row.get("n")))
    .collect();

    let last_job_started: Option<String> = sqlx::query_scalar("SELECT MAX(started_at) FROM job_run")
        .fetch_one(pool)
        .await?;

    Ok(LedgerStats {
        schema_version,
        table_counts,
        pathways_by_country,
        jobs_by_status,
        last_job_started,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::open(config).await?;
    let result = collect_stats(&pool).await;
    pool.close().await;
    let stats = result?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Residency Ledger: Database Stats");
    println!("=================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!(
        "  Schema:      v{}",
        stats
            .schema_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".to_string())
    );
    if let Some(started) = &stats.last_job_started {
        println!("  Last job:    {}", format_ts_relative(started));
    }
    println!();
    println!("  {:<24} {:>8}", "TABLE", "ROWS");
    println!("  {}", "-".repeat(33));
    for (table, n) in &stats.table_counts {
        println!("  {:<24} {:>8}", table, n);
    }

    if !stats.pathways_by_country.is_empty() {
        println!();
        println!("  Pathways by country:");
        for (country, n) in &stats.pathways_by_country {
            println!("  {:<24} {:>8}", country, n);
        }
    }

    if !stats.jobs_by_status.is_empty() {
        println!();
        println!("  Jobs by status:");
        for (status, n) in &stats.jobs_by_status {
            println!("  {:<24} {:>8}", status, n);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format an RFC 3339 timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: &str) -> String {
    let Ok(then) = chrono::DateTime::parse_from_rfc3339(ts) else {
        return ts.to_string();
    };
    let delta = chrono::Utc::now().timestamp() - then.timestamp();

    if delta < 0 {
        ts.to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        then.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanised() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn old_timestamps_fall_back_to_date() {
        assert_eq!(format_ts_relative("2020-01-02T03:04:05Z"), "2020-01-02 03:04");
        assert_eq!(format_ts_relative("garbage"), "garbage");
    }
}

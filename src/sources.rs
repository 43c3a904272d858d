//! Source registry.
//!
//! A source is a citable page or document, keyed by its exact URL string.
//! The first write for a URL wins: later references reuse the row without
//! touching any of its fields. No URL normalisation is done, so
//! `https://a/x` and `https://a/x/` are two sources.

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::{map_unique, Result};
use crate::models::{today, Rating, SourceType};
use crate::progress::{ProgressReporter, WriteEvent};

/// Fields of a source as supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub url: String,
    pub title: String,
    pub source_type: SourceType,
    pub credibility: Rating,
    pub description: Option<String>,
    pub language: Option<String>,
    /// Country name or ISO code; resolved by [`insert_source`].
    pub country: Option<String>,
    pub pathway_type: Option<String>,
    pub notes: Option<String>,
    pub last_verified_date: Option<String>,
}

impl NewSource {
    pub fn new(url: &str, title: &str, source_type: SourceType, credibility: Rating) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            source_type,
            credibility,
            description: None,
            language: None,
            country: None,
            pathway_type: None,
            notes: None,
            last_verified_date: None,
        }
    }
}

/// Outcome of a lookup-or-create against a dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: i64,
    pub created: bool,
}

/// A stored source, as listed by `query sources`.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub source_type: SourceType,
    pub credibility: Rating,
    pub country: Option<String>,
    pub pathway_type: Option<String>,
    pub is_active: bool,
    pub last_verified_date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub country: Option<String>,
    pub credibility: Option<Rating>,
    pub source_type: Option<SourceType>,
    pub active_only: bool,
}

pub(crate) async fn find_source(conn: &mut SqliteConnection, url: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM sources WHERE url = ?")
        .bind(url)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

async fn insert_source_row(
    conn: &mut SqliteConnection,
    source: &NewSource,
    country_id: Option<i64>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO sources (
            url, title, source_type, credibility, description, language,
            country_id, pathway_type, notes, last_accessed_date, last_verified_date
        ) VALUES (?, ?, ?, ?, ?, COALESCE(?, 'en'), ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&source.url)
    .bind(&source.title)
    .bind(source.source_type.as_str())
    .bind(i64::from(source.credibility))
    .bind(&source.description)
    .bind(&source.language)
    .bind(country_id)
    .bind(&source.pathway_type)
    .bind(&source.notes)
    .bind(today())
    .bind(&source.last_verified_date)
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique(e, || format!("source '{}'", source.url)))?;

    Ok(result.last_insert_rowid())
}

/// Look a source up by URL, inserting it when absent.
///
/// Runs on the caller's connection so it joins whatever transaction is open
/// there. An existing row is returned as-is.
pub async fn resolve_or_create_source(
    conn: &mut SqliteConnection,
    source: &NewSource,
    country_id: Option<i64>,
) -> Result<Resolution> {
    if let Some(id) = find_source(conn, &source.url).await? {
        return Ok(Resolution { id, created: false });
    }
    let id = insert_source_row(conn, source, country_id).await?;
    Ok(Resolution { id, created: true })
}

/// Insert a source, failing with `AlreadyExists` if the URL is taken.
pub async fn insert_source(pool: &SqlitePool, source: &NewSource) -> Result<i64> {
    let mut conn = pool.acquire().await?;
    let country_id = match &source.country {
        Some(name) => Some(db::country_id(&mut conn, name).await?),
        None => None,
    };
    insert_source_row(&mut conn, source, country_id).await
}

fn source_from_row(row: &SqliteRow) -> Result<SourceRecord> {
    let source_type: String = row.get("source_type");
    let credibility: i64 = row.get("credibility");
    let is_active: i64 = row.get("is_active");
    Ok(SourceRecord {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        source_type: source_type.parse()?,
        credibility: Rating::new(credibility)?,
        country: row.get("country"),
        pathway_type: row.get("pathway_type"),
        is_active: is_active != 0,
        last_verified_date: row.get("last_verified_date"),
    })
}

/// Sources ordered by credibility (highest first), then title.
pub async fn list_sources(pool: &SqlitePool, filter: &SourceFilter) -> Result<Vec<SourceRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.url, s.title, s.source_type, s.credibility, c.name AS country,
               s.pathway_type, s.is_active, s.last_verified_date
        FROM sources s
        LEFT JOIN countries c ON c.id = s.country_id
        WHERE (?1 IS NULL OR c.name = ?1 COLLATE NOCASE OR c.code = ?1 COLLATE NOCASE)
          AND (?2 IS NULL OR s.credibility = ?2)
          AND (?3 IS NULL OR s.source_type = ?3)
          AND (?4 = 0 OR s.is_active = 1)
        ORDER BY s.credibility DESC, s.title
        "#,
    )
    .bind(filter.country.as_deref())
    .bind(filter.credibility.map(i64::from))
    .bind(filter.source_type.map(|t| t.as_str()))
    .bind(i64::from(filter.active_only))
    .fetch_all(pool)
    .await?;

    rows.iter().map(source_from_row).collect()
}

/// CLI entry point for `insert source`: prints the new source id on stdout.
pub async fn run_insert_source(
    config: &Config,
    source: &NewSource,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = insert_source(&pool, source).await;
    pool.close().await;
    let id = result?;

    progress.report(WriteEvent::Done {
        message: format!(
            "Inserted source (ID: {})\n   {} [{}] {}",
            id,
            source.title,
            source.source_type,
            source.credibility.stars()
        ),
    });
    println!("{}", id);
    Ok(())
}

//! Legal references: the laws, decrees and regulations a pathway rests on.

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::{map_unique, Result};
use crate::progress::{ProgressReporter, WriteEvent};

#[derive(Debug, Clone, Default)]
pub struct NewLegalRef {
    pub country: String,
    pub reference_number: String,
    pub title: String,
    pub official_url: Option<String>,
    pub reference_type: Option<String>,
    pub enactment_date: Option<String>,
    pub effective_date: Option<String>,
    pub expiry_date: Option<String>,
    pub summary: Option<String>,
    pub full_text_path: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegalRef {
    pub id: i64,
    pub country: String,
    pub reference_number: String,
    pub title: String,
    pub reference_type: Option<String>,
    pub effective_date: Option<String>,
    pub official_url: Option<String>,
}

/// Insert a legal reference. `(country, reference_number)` is unique.
pub async fn insert_legal_ref(pool: &SqlitePool, legal: &NewLegalRef) -> Result<i64> {
    let mut conn = pool.acquire().await?;
    let country_id = db::country_id(&mut conn, &legal.country).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO legal_references (
            country_id, reference_number, title, official_url, reference_type,
            enactment_date, effective_date, expiry_date, summary, full_text_path, language
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, COALESCE(?, 'en'))
        "#,
    )
    .bind(country_id)
    .bind(&legal.reference_number)
    .bind(&legal.title)
    .bind(&legal.official_url)
    .bind(&legal.reference_type)
    .bind(&legal.enactment_date)
    .bind(&legal.effective_date)
    .bind(&legal.expiry_date)
    .bind(&legal.summary)
    .bind(&legal.full_text_path)
    .bind(&legal.language)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        map_unique(e, || {
            format!("legal reference '{}' for {}", legal.reference_number, legal.country)
        })
    })?;

    Ok(result.last_insert_rowid())
}

pub async fn list_legal_refs(pool: &SqlitePool, country: Option<&str>) -> Result<Vec<LegalRef>> {
    let rows = sqlx::query(
        r#"
        SELECT l.id, c.name AS country, l.reference_number, l.title, l.reference_type,
               l.effective_date, l.official_url
        FROM legal_references l
        JOIN countries c ON c.id = l.country_id
        WHERE (?1 IS NULL OR c.name = ?1 COLLATE NOCASE OR c.code = ?1 COLLATE NOCASE)
        ORDER BY c.name, l.reference_number
        "#,
    )
    .bind(country)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| LegalRef {
            id: row.get("id"),
            country: row.get("country"),
            reference_number: row.get("reference_number"),
            title: row.get("title"),
            reference_type: row.get("reference_type"),
            effective_date: row.get("effective_date"),
            official_url: row.get("official_url"),
        })
        .collect())
}

/// CLI entry point for `insert legal-ref`.
pub async fn run_insert_legal_ref(
    config: &Config,
    legal: &NewLegalRef,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = insert_legal_ref(&pool, legal).await;
    pool.close().await;
    let id = result?;

    progress.report(WriteEvent::Done {
        message: format!(
            "Inserted legal reference (ID: {})\n   {}: {} - {}",
            id, legal.country, legal.reference_number, legal.title
        ),
    });
    println!("{}", id);
    Ok(())
}

//! Pathway writer.
//!
//! [`record_pathway`] records a researched pathway together with its
//! provenance in one SQLite transaction:
//!
//! 1. resolve or create the cited source (by URL)
//! 2. append a `fetch` entry to the audit trail
//! 3. resolve or register the artifact file (by SHA-256), if one was given
//! 4. insert the pathway row
//! 5. link the pathway to the source
//! 6. commit
//!
//! Job counters move only for rows the call actually created. If any step
//! fails the whole transaction is rolled back and the caller gets
//! [`LedgerError::TransactionFailed`] wrapping the cause; the job's own status
//! is left alone.
//!
//! The module also holds the plain single-row writes (`insert pathway`,
//! `insert link`) and the pathway reads used by query and export.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::artifacts::{self, ArtifactFile, NewArtifact};
use crate::audit::{self, NewTrailEntry};
use crate::config::Config;
use crate::db;
use crate::error::{map_unique, Entity, LedgerError, Result};
use crate::jobs::{self, Counter};
use crate::models::{
    now_rfc3339, today, ActionType, ArtifactType, CitedSource, Pathway, PathwayFields, Rating,
    SourceType,
};
use crate::progress::{ProgressReporter, WriteEvent};
use crate::sources::{self, NewSource};

/// Tool name recorded on the trail entries this writer creates.
pub const WRITER_TOOL: &str = "record_pathway";

/// The source a pathway is being recorded from.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub url: String,
    pub title: String,
    pub source_type: SourceType,
    pub credibility: Rating,
    pub description: Option<String>,
}

/// Everything [`record_pathway`] writes.
#[derive(Debug, Clone)]
pub struct PathwayRecord {
    pub job_id: i64,
    pub country: String,
    pub pathway_type: String,
    pub name: String,
    pub source: SourceSpec,
    pub fields: PathwayFields,
    pub artifact_path: Option<PathBuf>,
    pub artifact_type: ArtifactType,
    pub relevance: Rating,
    pub excerpt: Option<String>,
}

/// Ids of the rows a [`record_pathway`] call produced or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub pathway_id: i64,
    pub source_id: i64,
    pub artifact_id: Option<i64>,
    pub trail_id: i64,
}

/// A pathway written outside the bundled transaction.
#[derive(Debug, Clone)]
pub struct NewPathway {
    pub country: String,
    pub pathway_type: String,
    pub name: String,
    pub fields: PathwayFields,
    pub is_active: bool,
    pub last_verified_date: Option<String>,
}

/// A pathway ↔ source association.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub pathway_id: i64,
    pub source_id: i64,
    pub relevance: Rating,
    pub excerpt: Option<String>,
    pub page_number: Option<i64>,
    pub notes: Option<String>,
}

impl NewLink {
    pub fn new(pathway_id: i64, source_id: i64) -> Self {
        Self {
            pathway_id,
            source_id,
            relevance: Rating::default(),
            excerpt: None,
            page_number: None,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathwayFilter {
    pub country: Option<String>,
    pub pathway_type: Option<String>,
    pub active_only: bool,
}

/// Record a pathway and its provenance atomically.
///
/// The job and the country are checked before anything is written; a miss
/// is reported as a plain [`LedgerError::NotFound`].
pub async fn record_pathway(
    pool: &SqlitePool,
    root: &Path,
    record: &PathwayRecord,
    progress: &dyn ProgressReporter,
) -> Result<RecordOutcome> {
    let mut tx = pool.begin().await?;

    let country = match check_preconditions(&mut tx, record).await {
        Ok(country) => country,
        Err(e) => {
            tx.rollback().await?;
            return Err(e);
        }
    };

    progress.report(WriteEvent::Begin);

    match write_steps(&mut tx, root, &country, record, progress).await {
        Ok(outcome) => {
            if let Err(e) = tx.commit().await {
                let cause = LedgerError::from(e);
                progress.report(WriteEvent::RolledBack {
                    error: cause.to_string(),
                });
                return Err(LedgerError::TransactionFailed(Box::new(cause)));
            }
            progress.report(WriteEvent::Committed);
            Ok(outcome)
        }
        Err(cause) => {
            if let Err(e) = tx.rollback().await {
                tracing::warn!(error = %e, "explicit rollback failed");
            }
            tracing::debug!(error = %cause, "pathway transaction rolled back");
            progress.report(WriteEvent::RolledBack {
                error: cause.to_string(),
            });
            Err(LedgerError::TransactionFailed(Box::new(cause)))
        }
    }
}

/// The job must exist and the country must resolve; yields `(id, canonical name)`.
async fn check_preconditions(
    conn: &mut SqliteConnection,
    record: &PathwayRecord,
) -> Result<(i64, String)> {
    jobs::ensure_job(conn, record.job_id).await?;
    db::resolve_country(conn, &record.country).await
}

async fn write_steps(
    conn: &mut SqliteConnection,
    root: &Path,
    country: &(i64, String),
    record: &PathwayRecord,
    progress: &dyn ProgressReporter,
) -> Result<RecordOutcome> {
    let job_id = record.job_id;
    let (country_id, country_name) = (country.0, country.1.as_str());

    // 1. source
    let source = NewSource {
        description: record.source.description.clone(),
        pathway_type: Some(record.pathway_type.clone()),
        last_verified_date: Some(today()),
        ..NewSource::new(
            &record.source.url,
            &record.source.title,
            record.source.source_type,
            record.source.credibility,
        )
    };
    let source = sources::resolve_or_create_source(conn, &source, Some(country_id)).await?;
    if source.created {
        jobs::increment(conn, job_id, Counter::SourcesFound).await?;
    }
    tracing::debug!(source_id = source.id, created = source.created, "source resolved");
    progress.report(WriteEvent::Source {
        id: source.id,
        created: source.created,
    });

    // 2. audit trail
    let entry = NewTrailEntry {
        tool_name: Some(WRITER_TOOL.to_string()),
        url: Some(record.source.url.clone()),
        page_title: Some(record.source.title.clone()),
        artifact_path: record.artifact_path.clone(),
        ..NewTrailEntry::new(job_id, ActionType::Fetch)
    };
    let trail_id = audit::insert_trail_row(conn, &entry, None, Some(source.id)).await?;
    jobs::increment(conn, job_id, Counter::PagesVisited).await?;
    tracing::debug!(trail_id, "trail entry appended");
    progress.report(WriteEvent::Trail { id: trail_id });

    // 3. artifact
    let mut artifact_id = None;
    if let Some(path) = &record.artifact_path {
        match ArtifactFile::inspect(path, root)? {
            Some(file) => {
                let artifact = NewArtifact {
                    title: Some(record.name.clone()),
                    trail_id: Some(trail_id),
                    source_id: Some(source.id),
                    source_url: Some(record.source.url.clone()),
                    country: Some(country_name.to_string()),
                    pathway_type: Some(record.pathway_type.clone()),
                    ..NewArtifact::new(path.clone(), record.artifact_type)
                };
                let resolved = artifacts::resolve_or_create_artifact(conn, &file, &artifact).await?;
                if resolved.created {
                    jobs::increment(conn, job_id, Counter::ArtifactsDownloaded).await?;
                }
                tracing::debug!(artifact_id = resolved.id, created = resolved.created, "artifact resolved");
                progress.report(WriteEvent::Artifact {
                    id: resolved.id,
                    created: resolved.created,
                });
                artifact_id = Some(resolved.id);
            }
            None => {
                tracing::warn!(path = %path.display(), "artifact file not found, continuing without it");
                progress.report(WriteEvent::ArtifactMissing {
                    path: path.display().to_string(),
                });
            }
        }
    }

    // 4. pathway
    let pathway_id = insert_pathway_row(
        conn,
        country_id,
        &record.pathway_type,
        &record.name,
        &record.fields,
        true,
        Some(&today()),
    )
    .await?;
    tracing::debug!(pathway_id, "pathway inserted");
    progress.report(WriteEvent::Pathway { id: pathway_id });

    // 5. link
    let link = NewLink {
        relevance: record.relevance,
        excerpt: record.excerpt.clone(),
        ..NewLink::new(pathway_id, source.id)
    };
    insert_link_row(conn, &link).await?;
    progress.report(WriteEvent::Link {
        pathway_id,
        source_id: source.id,
    });

    Ok(RecordOutcome {
        pathway_id,
        source_id: source.id,
        artifact_id,
        trail_id,
    })
}

/// Insert one pathway row. Every unset field is bound as NULL.
pub(crate) async fn insert_pathway_row(
    conn: &mut SqliteConnection,
    country_id: i64,
    pathway_type: &str,
    name: &str,
    fields: &PathwayFields,
    is_active: bool,
    last_verified_date: Option<&str>,
) -> Result<i64> {
    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO residency_pathways (
            country_id, pathway_type, name, official_name, description, legal_basis,
            min_income_eur, min_investment_eur, education_requirement, language_requirement,
            age_restrictions, required_documents, application_process, processing_time_days,
            application_fee_eur, initial_duration_months, renewable, max_renewals,
            total_max_duration_months, path_to_permanent_residency, path_to_citizenship,
            min_years_to_citizenship, work_rights, family_inclusion, travel_rights,
            restrictions, tax_implications, policy_changes, is_active, last_verified_date,
            created_at, updated_at
        ) VALUES (
            ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
        )
        "#,
    )
    .bind(country_id)
    .bind(pathway_type)
    .bind(name)
    .bind(&fields.official_name)
    .bind(&fields.description)
    .bind(&fields.legal_basis)
    .bind(fields.min_income_eur)
    .bind(fields.min_investment_eur)
    .bind(&fields.education_requirement)
    .bind(&fields.language_requirement)
    .bind(&fields.age_restrictions)
    .bind(&fields.required_documents)
    .bind(&fields.application_process)
    .bind(fields.processing_time_days)
    .bind(fields.application_fee_eur)
    .bind(fields.initial_duration_months)
    .bind(i64::from(fields.renewable))
    .bind(fields.max_renewals)
    .bind(fields.total_max_duration_months)
    .bind(&fields.path_to_permanent_residency)
    .bind(&fields.path_to_citizenship)
    .bind(fields.min_years_to_citizenship)
    .bind(&fields.work_rights)
    .bind(&fields.family_inclusion)
    .bind(&fields.travel_rights)
    .bind(&fields.restrictions)
    .bind(&fields.tax_implications)
    .bind(&fields.policy_changes)
    .bind(i64::from(is_active))
    .bind(last_verified_date)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn insert_link_row(conn: &mut SqliteConnection, link: &NewLink) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO pathway_sources (pathway_id, source_id, relevance_score, excerpt, page_number, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(link.pathway_id)
    .bind(link.source_id)
    .bind(i64::from(link.relevance))
    .bind(&link.excerpt)
    .bind(link.page_number)
    .bind(&link.notes)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        map_unique(e, || {
            format!("link between pathway {} and source {}", link.pathway_id, link.source_id)
        })
    })?;

    Ok(result.last_insert_rowid())
}

/// Insert a single pathway, resolving the country by name.
pub async fn insert_pathway(pool: &SqlitePool, pathway: &NewPathway) -> Result<i64> {
    if pathway.name.trim().is_empty() {
        return Err(LedgerError::InvalidInput("pathway name must not be empty".into()));
    }
    let mut conn = pool.acquire().await?;
    let country_id = db::country_id(&mut conn, &pathway.country).await?;
    insert_pathway_row(
        &mut conn,
        country_id,
        &pathway.pathway_type,
        &pathway.name,
        &pathway.fields,
        pathway.is_active,
        pathway.last_verified_date.as_deref(),
    )
    .await
}

/// Link an existing pathway to an existing source.
pub async fn link_pathway_source(pool: &SqlitePool, link: &NewLink) -> Result<i64> {
    let mut conn = pool.acquire().await?;

    let pathway: Option<i64> = sqlx::query_scalar("SELECT id FROM residency_pathways WHERE id = ?")
        .bind(link.pathway_id)
        .fetch_optional(&mut *conn)
        .await?;
    if pathway.is_none() {
        return Err(LedgerError::not_found(Entity::Pathway, link.pathway_id));
    }

    let source: Option<i64> = sqlx::query_scalar("SELECT id FROM sources WHERE id = ?")
        .bind(link.source_id)
        .fetch_optional(&mut *conn)
        .await?;
    if source.is_none() {
        return Err(LedgerError::not_found(Entity::Source, link.source_id));
    }

    insert_link_row(&mut conn, link).await
}

// ============ Reads ============

const PATHWAY_SELECT: &str = "SELECT p.*, c.name AS country_name, c.code AS country_code \
     FROM residency_pathways p JOIN countries c ON c.id = p.country_id";

fn pathway_from_row(row: &SqliteRow) -> Pathway {
    let renewable: i64 = row.get("renewable");
    let is_active: i64 = row.get("is_active");
    Pathway {
        id: row.get("id"),
        country_id: row.get("country_id"),
        country_name: row.get("country_name"),
        country_code: row.get("country_code"),
        pathway_type: row.get("pathway_type"),
        name: row.get("name"),
        fields: PathwayFields {
            official_name: row.get("official_name"),
            description: row.get("description"),
            legal_basis: row.get("legal_basis"),
            min_income_eur: row.get("min_income_eur"),
            min_investment_eur: row.get("min_investment_eur"),
            education_requirement: row.get("education_requirement"),
            language_requirement: row.get("language_requirement"),
            age_restrictions: row.get("age_restrictions"),
            required_documents: row.get("required_documents"),
            application_process: row.get("application_process"),
            processing_time_days: row.get("processing_time_days"),
            application_fee_eur: row.get("application_fee_eur"),
            initial_duration_months: row.get("initial_duration_months"),
            renewable: renewable != 0,
            max_renewals: row.get("max_renewals"),
            total_max_duration_months: row.get("total_max_duration_months"),
            path_to_permanent_residency: row.get("path_to_permanent_residency"),
            path_to_citizenship: row.get("path_to_citizenship"),
            min_years_to_citizenship: row.get("min_years_to_citizenship"),
            work_rights: row.get("work_rights"),
            family_inclusion: row.get("family_inclusion"),
            travel_rights: row.get("travel_rights"),
            restrictions: row.get("restrictions"),
            tax_implications: row.get("tax_implications"),
            policy_changes: row.get("policy_changes"),
        },
        is_active: is_active != 0,
        last_verified_date: row.get("last_verified_date"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get_pathway(pool: &SqlitePool, id: i64) -> Result<Pathway> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", PATHWAY_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Pathway, id))?;
    Ok(pathway_from_row(&row))
}

/// The most recently recorded pathway of a type for a country.
pub async fn latest_pathway(pool: &SqlitePool, country: &str, pathway_type: &str) -> Result<Pathway> {
    let row = sqlx::query(&format!(
        "{} WHERE (c.name = ?1 COLLATE NOCASE OR c.code = ?1 COLLATE NOCASE) \
         AND p.pathway_type = ?2 ORDER BY p.id DESC LIMIT 1",
        PATHWAY_SELECT
    ))
    .bind(country)
    .bind(pathway_type)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| LedgerError::not_found(Entity::Pathway, format!("{} / {}", country, pathway_type)))?;
    Ok(pathway_from_row(&row))
}

/// Pathways ordered by country, type, then newest first.
pub async fn list_pathways(pool: &SqlitePool, filter: &PathwayFilter) -> Result<Vec<Pathway>> {
    let rows = sqlx::query(&format!(
        "{} WHERE (?1 IS NULL OR c.name = ?1 COLLATE NOCASE OR c.code = ?1 COLLATE NOCASE) \
         AND (?2 IS NULL OR p.pathway_type = ?2) \
         AND (?3 = 0 OR p.is_active = 1) \
         ORDER BY c.name, p.pathway_type, p.id DESC",
        PATHWAY_SELECT
    ))
    .bind(filter.country.as_deref())
    .bind(filter.pathway_type.as_deref())
    .bind(i64::from(filter.active_only))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(pathway_from_row).collect())
}

/// Sources linked to a pathway, most credible then most relevant first.
pub async fn cited_sources(pool: &SqlitePool, pathway_id: i64) -> Result<Vec<CitedSource>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.url, s.title, s.source_type, s.credibility, s.last_verified_date,
               ps.relevance_score, ps.excerpt
        FROM pathway_sources ps
        JOIN sources s ON s.id = ps.source_id
        WHERE ps.pathway_id = ?
        ORDER BY s.credibility DESC, ps.relevance_score DESC, s.id
        "#,
    )
    .bind(pathway_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<CitedSource> {
            let source_type: String = row.get("source_type");
            Ok(CitedSource {
                id: row.get("id"),
                url: row.get("url"),
                title: row.get("title"),
                source_type: source_type.parse()?,
                credibility: Rating::new(row.get("credibility"))?,
                relevance_score: Rating::new(row.get("relevance_score"))?,
                excerpt: row.get("excerpt"),
                last_verified_date: row.get("last_verified_date"),
            })
        })
        .collect()
}

// ============ CLI ============

/// CLI entry point for `pathway add`: prints the pathway id on stdout.
pub async fn run_record(
    config: &Config,
    record: &PathwayRecord,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = record_pathway(&pool, &config.project.root, record, progress).await;
    pool.close().await;
    let outcome = result?;

    let mut message = format!(
        "Recorded {} ({})\n   Pathway ID: {}\n   Source ID: {}\n   Trail ID: {}",
        record.name, record.country, outcome.pathway_id, outcome.source_id, outcome.trail_id
    );
    if let Some(id) = outcome.artifact_id {
        message.push_str(&format!("\n   Artifact ID: {}", id));
    }
    progress.report(WriteEvent::Done { message });

    println!("{}", outcome.pathway_id);
    Ok(())
}

/// CLI entry point for `insert pathway`.
pub async fn run_insert_pathway(
    config: &Config,
    pathway: &NewPathway,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = insert_pathway(&pool, pathway).await;
    pool.close().await;
    let id = result?;

    progress.report(WriteEvent::Done {
        message: format!(
            "Inserted pathway (ID: {})\n   {} - {} ({})",
            id, pathway.country, pathway.name, pathway.pathway_type
        ),
    });
    println!("{}", id);
    Ok(())
}

/// CLI entry point for `insert link`.
pub async fn run_link(
    config: &Config,
    link: &NewLink,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = link_pathway_source(&pool, link).await;
    pool.close().await;
    let id = result?;

    progress.report(WriteEvent::Done {
        message: format!(
            "Linked pathway {} to source {} (relevance {})",
            link.pathway_id, link.source_id, link.relevance
        ),
    });
    println!("{}", id);
    Ok(())
}

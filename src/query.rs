//! Read-only tabular listings for `rledger query …`.
//!
//! Every listing prints a short heading and a padded table on stdout:
//!
//! ```text
//! name    | code | EU
//! --------+------+---
//! Austria | AT   | ✓
//! ```

use std::fmt::Display;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::artifacts::{self, ArtifactFilter};
use crate::audit;
use crate::config::Config;
use crate::db;
use crate::error::{Entity, LedgerError, Result};
use crate::jobs;
use crate::legal;
use crate::models::Country;
use crate::pathway::{self, PathwayFilter};
use crate::sources::{self, SourceFilter};

/// Render rows as a table with ` | ` column separators and a `-+-` rule.
///
/// Widths are measured in characters so that `✓` and `⭐` line up.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "No results found.".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let pad = |text: &str, width: usize| {
        let len = text.chars().count();
        format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(
        headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| pad(h, *w))
            .collect::<Vec<_>>()
            .join(" | "),
    );
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in rows {
        lines.push(
            widths
                .iter()
                .enumerate()
                .map(|(i, w)| pad(row.get(i).map(String::as_str).unwrap_or(""), *w))
                .collect::<Vec<_>>()
                .join(" | "),
        );
    }

    lines
        .into_iter()
        .map(|l| l.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn cell<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

fn tick(flag: bool) -> String {
    if flag { "✓" } else { "✗" }.to_string()
}

fn filter_suffix(parts: &[(&str, Option<String>)]) -> String {
    let active: Vec<String> = parts
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{}={}", k, v)))
        .collect();
    if active.is_empty() {
        String::new()
    } else {
        format!(" ({})", active.join(", "))
    }
}

const COUNTRY_SELECT: &str = "SELECT id, name, code, is_eu_member, is_schengen, capital, \
     official_language, currency, immigration_website FROM countries";

fn country_from_row(row: &SqliteRow) -> Country {
    let is_eu: i64 = row.get("is_eu_member");
    let is_schengen: i64 = row.get("is_schengen");
    Country {
        id: row.get("id"),
        name: row.get("name"),
        code: row.get("code"),
        is_eu_member: is_eu != 0,
        is_schengen: is_schengen != 0,
        capital: row.get("capital"),
        official_language: row.get("official_language"),
        currency: row.get("currency"),
        immigration_website: row.get("immigration_website"),
    }
}

pub async fn list_countries(pool: &SqlitePool) -> Result<Vec<Country>> {
    let rows = sqlx::query(&format!("{} ORDER BY name", COUNTRY_SELECT))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(country_from_row).collect())
}

/// Look a country up by name or ISO code, ignoring case.
pub async fn get_country(pool: &SqlitePool, name: &str) -> Result<Country> {
    let row = sqlx::query(&format!(
        "{} WHERE name = ?1 COLLATE NOCASE OR code = ?1 COLLATE NOCASE",
        COUNTRY_SELECT
    ))
    .bind(name.trim())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| LedgerError::not_found(Entity::Country, name))?;
    Ok(country_from_row(&row))
}

pub async fn run_countries(config: &Config) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = list_countries(&pool).await;
    pool.close().await;
    let countries = result?;

    let rows: Vec<Vec<String>> = countries
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.code.clone(),
                tick(c.is_eu_member),
                tick(c.is_schengen),
                cell(&c.capital),
                cell(&c.official_language),
                cell(&c.currency),
            ]
        })
        .collect();

    println!("\n📍 Countries ({} total)\n", countries.len());
    println!(
        "{}",
        format_table(
            &["name", "code", "EU", "Schengen", "capital", "language", "currency"],
            &rows
        )
    );
    println!();
    Ok(())
}

pub async fn run_pathways(config: &Config, filter: &PathwayFilter) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = pathway::list_pathways(&pool, filter).await;
    pool.close().await;
    let pathways = result?;

    let rows: Vec<Vec<String>> = pathways
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.country_name.clone(),
                p.pathway_type.clone(),
                p.name.clone(),
                cell(&p.fields.min_income_eur),
                cell(&p.fields.initial_duration_months),
                tick(p.fields.renewable),
                cell(&p.fields.application_fee_eur),
                tick(p.is_active),
            ]
        })
        .collect();

    let suffix = filter_suffix(&[
        ("country", filter.country.clone()),
        ("type", filter.pathway_type.clone()),
    ]);
    println!("\n🛂 Residency Pathways{} ({} found)\n", suffix, pathways.len());
    println!(
        "{}",
        format_table(
            &["id", "country", "type", "name", "income", "duration", "renewable", "fee", "active"],
            &rows
        )
    );
    println!();
    Ok(())
}

pub async fn run_sources(config: &Config, filter: &SourceFilter) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = sources::list_sources(&pool, filter).await;
    pool.close().await;
    let sources = result?;

    let rows: Vec<Vec<String>> = sources
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.title.clone(),
                s.source_type.to_string(),
                s.credibility.to_string(),
                cell(&s.country),
                cell(&s.last_verified_date),
            ]
        })
        .collect();

    let suffix = filter_suffix(&[
        ("country", filter.country.clone()),
        ("credibility", filter.credibility.map(|c| c.to_string())),
        ("type", filter.source_type.map(|t| t.to_string())),
    ]);
    println!("\n📚 Sources{} ({} found)\n", suffix, sources.len());
    println!(
        "{}",
        format_table(
            &["id", "title", "type", "credibility", "country", "verified"],
            &rows
        )
    );
    println!();
    Ok(())
}

pub async fn run_audit_trail(config: &Config, job_id: Option<i64>) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = print_audit_trail(&pool, job_id).await;
    pool.close().await;
    result
}

async fn print_audit_trail(pool: &SqlitePool, job_id: Option<i64>) -> anyhow::Result<()> {
    let Some(job_id) = job_id else {
        let jobs = jobs::list_jobs(pool, 20).await?;
        let rows: Vec<Vec<String>> = jobs
            .iter()
            .map(|j| {
                vec![
                    j.id.to_string(),
                    j.task_description.clone(),
                    cell(&j.country),
                    j.status.to_string(),
                    j.started_at.clone(),
                    j.pages_visited.to_string(),
                    j.sources_found.to_string(),
                ]
            })
            .collect();
        println!("\n📋 Recent Jobs ({} shown)\n", jobs.len());
        println!(
            "{}",
            format_table(
                &["id", "task", "country", "status", "started_at", "pages", "sources"],
                &rows
            )
        );
        println!("\nUse --job-id N to see the detailed audit trail\n");
        return Ok(());
    };

    let job = jobs::get_job(pool, job_id).await?;
    let trail = audit::list_trail(pool, job_id).await?;

    println!("\n📋 Job #{}: {}\n", job.id, job.task_description);
    println!("Country: {}", cell(&job.country));
    println!("Status: {}", job.status);
    println!("Started: {}", job.started_at);
    println!("Completed: {}", cell(&job.completed_at));
    println!("Pages visited: {}", job.pages_visited);
    println!("Sources found: {}", job.sources_found);
    println!("Artifacts: {}", job.artifacts_downloaded);
    println!("Errors: {}", job.error_count);

    if trail.is_empty() {
        println!("\nNo audit trail entries found.\n");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = trail
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.action_type.to_string(),
                cell(&t.tool_name),
                t.page_title
                    .clone()
                    .or_else(|| t.url.clone())
                    .or_else(|| t.search_query.clone())
                    .unwrap_or_default(),
                if t.is_source { "★" } else { "" }.to_string(),
                t.status.to_string(),
            ]
        })
        .collect();
    println!("\n📜 Audit Trail ({} actions)\n", trail.len());
    println!(
        "{}",
        format_table(
            &["id", "action", "tool", "target", "source", "status"],
            &rows
        )
    );
    println!();
    Ok(())
}

pub async fn run_artifacts(config: &Config, filter: &ArtifactFilter) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = artifacts::list_artifacts(&pool, filter).await;
    pool.close().await;
    let artifacts = result?;

    let rows: Vec<Vec<String>> = artifacts
        .iter()
        .map(|a| {
            vec![
                a.id.to_string(),
                a.artifact_type.to_string(),
                cell(&a.title),
                cell(&a.country),
                (a.file_size_bytes / 1024).to_string(),
                a.extraction_status.to_string(),
            ]
        })
        .collect();

    let suffix = filter_suffix(&[
        ("country", filter.country.clone()),
        ("type", filter.artifact_type.map(|t| t.to_string())),
    ]);
    println!("\n📦 Artifacts{} ({} found)\n", suffix, artifacts.len());
    println!(
        "{}",
        format_table(
            &["id", "type", "title", "country", "size_kb", "extracted"],
            &rows
        )
    );
    println!();
    Ok(())
}

pub async fn run_legal_refs(config: &Config, country: Option<&str>) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = legal::list_legal_refs(&pool, country).await;
    pool.close().await;
    let refs = result?;

    let rows: Vec<Vec<String>> = refs
        .iter()
        .map(|l| {
            vec![
                l.id.to_string(),
                l.country.clone(),
                l.reference_number.clone(),
                l.title.clone(),
                cell(&l.reference_type),
                cell(&l.effective_date),
            ]
        })
        .collect();

    let suffix = filter_suffix(&[("country", country.map(str::to_string))]);
    println!("\n⚖️  Legal References{} ({} found)\n", suffix, refs.len());
    println!(
        "{}",
        format_table(
            &["id", "country", "reference", "title", "type", "effective"],
            &rows
        )
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table() {
        assert_eq!(format_table(&["a"], &[]), "No results found.");
    }

    #[test]
    fn columns_are_padded_to_widest_cell() {
        let rows = vec![
            vec!["Italy".to_string(), "IT".to_string()],
            vec!["Czech Republic".to_string(), "CZ".to_string()],
        ];
        let table = format_table(&["name", "code"], &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "name           | code");
        assert_eq!(lines[1], "---------------+-----");
        assert_eq!(lines[2], "Italy          | IT");
        assert_eq!(lines[3], "Czech Republic | CZ");
    }

    #[test]
    fn width_counts_characters_not_bytes() {
        let rows = vec![vec!["✓".to_string(), "x".to_string()]];
        let table = format_table(&["EU", "b"], &rows);
        assert_eq!(table.lines().nth(2), Some("✓  | x"));
    }

    #[test]
    fn filter_suffix_lists_only_set_filters() {
        assert_eq!(filter_suffix(&[("country", None)]), "");
        assert_eq!(
            filter_suffix(&[("country", Some("Italy".into())), ("type", None)]),
            " (country=Italy)"
        );
    }
}

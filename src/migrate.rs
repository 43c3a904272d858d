//! Database schema creation and seed data.
//!
//! Every statement is idempotent (`IF NOT EXISTS` / `INSERT OR IGNORE`), so
//! running `rledger init` twice is safe. `--force` deletes the database file
//! first via [`reset_database`].

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS countries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        code TEXT NOT NULL UNIQUE,
        is_eu_member INTEGER NOT NULL DEFAULT 0 CHECK (is_eu_member IN (0, 1)),
        is_schengen INTEGER NOT NULL DEFAULT 0 CHECK (is_schengen IN (0, 1)),
        capital TEXT,
        official_language TEXT,
        currency TEXT,
        immigration_website TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS residency_pathways (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        country_id INTEGER NOT NULL REFERENCES countries(id),
        pathway_type TEXT NOT NULL,
        name TEXT NOT NULL CHECK (length(name) > 0),
        official_name TEXT,
        description TEXT,
        legal_basis TEXT,
        min_income_eur INTEGER CHECK (min_income_eur IS NULL OR min_income_eur >= 0),
        min_investment_eur INTEGER CHECK (min_investment_eur IS NULL OR min_investment_eur >= 0),
        education_requirement TEXT,
        language_requirement TEXT,
        age_restrictions TEXT,
        required_documents TEXT,
        application_process TEXT,
        processing_time_days INTEGER CHECK (processing_time_days IS NULL OR processing_time_days >= 0),
        application_fee_eur REAL CHECK (application_fee_eur IS NULL OR application_fee_eur >= 0),
        initial_duration_months INTEGER CHECK (initial_duration_months IS NULL OR initial_duration_months >= 0),
        renewable INTEGER NOT NULL DEFAULT 0 CHECK (renewable IN (0, 1)),
        max_renewals INTEGER CHECK (max_renewals IS NULL OR max_renewals >= 0),
        total_max_duration_months INTEGER CHECK (total_max_duration_months IS NULL OR total_max_duration_months >= 0),
        path_to_permanent_residency TEXT,
        path_to_citizenship TEXT,
        min_years_to_citizenship INTEGER CHECK (min_years_to_citizenship IS NULL OR min_years_to_citizenship >= 0),
        work_rights TEXT,
        family_inclusion TEXT,
        travel_rights TEXT,
        restrictions TEXT,
        tax_implications TEXT,
        policy_changes TEXT,
        is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
        last_verified_date TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        source_type TEXT NOT NULL CHECK (source_type IN (
            'official_government', 'embassy', 'legal_database', 'licensed_lawyer',
            'news', 'community', 'other')),
        credibility INTEGER NOT NULL CHECK (credibility BETWEEN 1 AND 5),
        description TEXT,
        language TEXT DEFAULT 'en',
        country_id INTEGER REFERENCES countries(id),
        pathway_type TEXT,
        is_active INTEGER NOT NULL DEFAULT 1 CHECK (is_active IN (0, 1)),
        last_accessed_date TEXT,
        last_verified_date TEXT,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pathway_sources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pathway_id INTEGER NOT NULL REFERENCES residency_pathways(id),
        source_id INTEGER NOT NULL REFERENCES sources(id),
        relevance_score INTEGER NOT NULL DEFAULT 3 CHECK (relevance_score BETWEEN 1 AND 5),
        excerpt TEXT,
        page_number INTEGER,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(pathway_id, source_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS legal_references (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        country_id INTEGER NOT NULL REFERENCES countries(id),
        reference_number TEXT NOT NULL,
        title TEXT NOT NULL,
        official_url TEXT,
        reference_type TEXT,
        enactment_date TEXT,
        effective_date TEXT,
        expiry_date TEXT,
        summary TEXT,
        full_text_path TEXT,
        language TEXT DEFAULT 'en',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(country_id, reference_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS job_run (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_description TEXT NOT NULL,
        country TEXT,
        pathway_type TEXT,
        llm_model TEXT,
        status TEXT NOT NULL DEFAULT 'running' CHECK (status IN (
            'running', 'completed', 'failed', 'aborted')),
        started_at TEXT NOT NULL,
        completed_at TEXT,
        pages_visited INTEGER NOT NULL DEFAULT 0,
        sources_found INTEGER NOT NULL DEFAULT 0,
        artifacts_downloaded INTEGER NOT NULL DEFAULT 0,
        error_count INTEGER NOT NULL DEFAULT 0,
        session_notes TEXT,
        error_summary TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scraper_audit_trail (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_run_id INTEGER NOT NULL REFERENCES job_run(id),
        action_type TEXT NOT NULL CHECK (action_type IN (
            'search', 'fetch', 'navigate', 'click', 'extract', 'screenshot', 'download')),
        tool_name TEXT,
        url TEXT,
        search_query TEXT,
        http_status INTEGER,
        page_title TEXT,
        page_language TEXT,
        artifact_path TEXT,
        artifact_hash TEXT,
        parent_trail_id INTEGER REFERENCES scraper_audit_trail(id),
        session_id TEXT,
        timestamp TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'success' CHECK (status IN (
            'success', 'error', 'timeout', 'skipped')),
        error_message TEXT,
        duration_ms INTEGER,
        notes TEXT,
        is_source INTEGER NOT NULL DEFAULT 0 CHECK (is_source IN (0, 1)),
        source_id INTEGER REFERENCES sources(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS artifacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        trail_id INTEGER REFERENCES scraper_audit_trail(id),
        source_id INTEGER REFERENCES sources(id),
        artifact_type TEXT NOT NULL CHECK (artifact_type IN (
            'pdf', 'html', 'screenshot', 'zip', 'doc', 'docx',
            'extracted_text', 'extracted_table', 'extracted_list')),
        file_path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        file_size_bytes INTEGER NOT NULL,
        mime_type TEXT,
        sha256 TEXT NOT NULL UNIQUE,
        title TEXT,
        description TEXT,
        source_url TEXT,
        language TEXT,
        country TEXT,
        pathway_type TEXT,
        extraction_status TEXT NOT NULL DEFAULT 'pending' CHECK (extraction_status IN (
            'pending', 'extracted', 'failed', 'skipped')),
        downloaded_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY,
        description TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_pathways_country_type ON residency_pathways(country_id, pathway_type)",
    "CREATE INDEX IF NOT EXISTS idx_sources_country ON sources(country_id)",
    "CREATE INDEX IF NOT EXISTS idx_trail_job ON scraper_audit_trail(job_run_id)",
    "CREATE INDEX IF NOT EXISTS idx_artifacts_country ON artifacts(country)",
    "CREATE INDEX IF NOT EXISTS idx_legal_country ON legal_references(country_id)",
];

/// (name, code, EU member, Schengen, capital, language, currency, immigration portal)
type CountrySeed = (
    &'static str,
    &'static str,
    bool,
    bool,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
);

pub const SEED_COUNTRIES: &[CountrySeed] = &[
    ("Italy", "IT", true, true, "Rome", "Italian", "EUR", "https://vistoperitalia.esteri.it"),
    ("Denmark", "DK", true, true, "Copenhagen", "Danish", "DKK", "https://www.nyidanmark.dk"),
    ("Netherlands", "NL", true, true, "Amsterdam", "Dutch", "EUR", "https://ind.nl"),
    ("Greece", "GR", true, true, "Athens", "Greek", "EUR", "https://www.migrationsystem.gr"),
    ("Norway", "NO", false, true, "Oslo", "Norwegian", "NOK", "https://www.udi.no"),
    ("Sweden", "SE", true, true, "Stockholm", "Swedish", "SEK", "https://www.migrationsverket.se"),
    ("Switzerland", "CH", false, true, "Bern", "German/French/Italian", "CHF", "https://www.sem.admin.ch"),
    ("France", "FR", true, true, "Paris", "French", "EUR", "https://www.service-public.fr"),
    ("Spain", "ES", true, true, "Madrid", "Spanish", "EUR", "https://www.inclusion.gob.es"),
    ("Portugal", "PT", true, true, "Lisbon", "Portuguese", "EUR", "https://www.sef.pt"),
    ("Germany", "DE", true, true, "Berlin", "German", "EUR", "https://www.bamf.de"),
    ("Belgium", "BE", true, true, "Brussels", "Dutch/French/German", "EUR", "https://dofi.ibz.be"),
    ("Ireland", "IE", true, false, "Dublin", "English/Irish", "EUR", "https://www.irishimmigration.ie"),
    ("Austria", "AT", true, true, "Vienna", "German", "EUR", "https://www.migration.gv.at"),
    ("Czech Republic", "CZ", true, true, "Prague", "Czech", "CZK", "https://www.mvcr.cz"),
];

/// Create the database file, all tables and indexes, and seed reference data.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = apply_schema(&pool).await;
    pool.close().await;
    result
}

/// Apply the schema and seed rows inside a single transaction.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query("INSERT OR IGNORE INTO schema_version (version, description) VALUES (?, ?)")
        .bind(SCHEMA_VERSION)
        .bind("Pathways, provenance, audit trail and artifacts")
        .execute(&mut *tx)
        .await?;

    for &(name, code, is_eu, is_schengen, capital, language, currency, website) in SEED_COUNTRIES {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO countries (
                name, code, is_eu_member, is_schengen, capital,
                official_language, currency, immigration_website
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(code)
        .bind(i64::from(is_eu))
        .bind(i64::from(is_schengen))
        .bind(capital)
        .bind(language)
        .bind(currency)
        .bind(website)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Delete the database file and its WAL side files.
pub fn reset_database(config: &Config) -> Result<bool> {
    let path = &config.db.path;
    let existed = path.exists();
    for suffix in ["", "-wal", "-shm"] {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(suffix);
        let candidate = std::path::PathBuf::from(candidate);
        if candidate.exists() {
            std::fs::remove_file(&candidate)?;
        }
    }
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seed_countries_are_unique() {
        assert_eq!(SEED_COUNTRIES.len(), 15);
        let codes: HashSet<_> = SEED_COUNTRIES.iter().map(|c| c.1).collect();
        let names: HashSet<_> = SEED_COUNTRIES.iter().map(|c| c.0).collect();
        assert_eq!(codes.len(), SEED_COUNTRIES.len());
        assert_eq!(names.len(), SEED_COUNTRIES.len());
        assert!(SEED_COUNTRIES.iter().all(|c| c.1.len() == 2));
    }

    #[test]
    fn reset_removes_wal_side_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db.path = dir.path().join("ledger.db");
        std::fs::write(&config.db.path, b"").unwrap();
        std::fs::write(dir.path().join("ledger.db-wal"), b"").unwrap();

        assert!(reset_database(&config).unwrap());
        assert!(!config.db.path.exists());
        assert!(!dir.path().join("ledger.db-wal").exists());
        assert!(!reset_database(&config).unwrap());
    }
}

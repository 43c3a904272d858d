//! Library-level tests against a temporary database.
//!
//! Each test gets its own directory holding the database, the project root
//! for artifact files and the export vault.

use std::path::{Path, PathBuf};

use residency_ledger::artifacts::{self, ArtifactFilter, NewArtifact};
use residency_ledger::audit::{self, MarkSource, NewTrailEntry};
use residency_ledger::config::Config;
use residency_ledger::db;
use residency_ledger::error::{Entity, LedgerError};
use residency_ledger::export;
use residency_ledger::jobs::{self, NewJob};
use residency_ledger::legal::{self, NewLegalRef};
use residency_ledger::migrate;
use residency_ledger::models::{
    ActionType, ArtifactType, JobOutcome, JobStatus, PathwayFields, Rating, SourceType,
    TrailStatus,
};
use residency_ledger::pathway::{self, NewLink, NewPathway, PathwayRecord, SourceSpec};
use residency_ledger::progress::{NoProgress, RecordingProgress, WriteEvent};
use residency_ledger::sources::{self, NewSource, SourceFilter};
use residency_ledger::stats;
use sqlx::SqlitePool;
use tempfile::TempDir;

struct Ledger {
    _tmp: TempDir,
    root: PathBuf,
    config: Config,
    pool: SqlitePool,
}

async fn setup() -> Ledger {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    let config: Config = toml::from_str(&format!(
        r#"
[db]
path = "{root}/data/ledger.db"

[project]
root = "{root}"

[export]
vault_dir = "{root}/vault"
"#,
        root = root.display()
    ))
    .unwrap();

    migrate::run_migrations(&config).await.unwrap();
    let pool = db::open(&config).await.unwrap();

    Ledger {
        _tmp: tmp,
        root,
        config,
        pool,
    }
}

async fn italy_job(pool: &SqlitePool) -> i64 {
    let job = NewJob {
        task: "Research Italy digital nomad visa".to_string(),
        country: Some("Italy".to_string()),
        pathway_type: Some("digital_nomad".to_string()),
        llm_model: None,
    };
    jobs::start_job(pool, &job).await.unwrap()
}

fn write_file(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    PathBuf::from(rel)
}

fn italy_record(job_id: i64) -> PathwayRecord {
    PathwayRecord {
        job_id,
        country: "Italy".to_string(),
        pathway_type: "digital_nomad".to_string(),
        name: "Digital Nomad Visa".to_string(),
        source: SourceSpec {
            url: "https://example.it/visa".to_string(),
            title: "Italian digital nomad visa".to_string(),
            source_type: SourceType::OfficialGovernment,
            credibility: Rating::MAX,
            description: None,
        },
        fields: PathwayFields {
            min_income_eur: Some(24789),
            ..PathwayFields::default()
        },
        artifact_path: None,
        artifact_type: ArtifactType::ExtractedText,
        relevance: Rating::default(),
        excerpt: None,
    }
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

// ─── Schema ─────────────────────────────────────────────────────────

#[tokio::test]
async fn init_is_idempotent_and_seeds_countries() {
    let ledger = setup().await;
    assert_eq!(count(&ledger.pool, "countries").await, 15);

    migrate::apply_schema(&ledger.pool).await.unwrap();
    assert_eq!(count(&ledger.pool, "countries").await, 15);
    assert_eq!(count(&ledger.pool, "schema_version").await, 1);
}

// ─── Pathway writer ─────────────────────────────────────────────────

#[tokio::test]
async fn italy_end_to_end() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;

    let outcome = pathway::record_pathway(pool, &ledger.root, &italy_record(job_id), &NoProgress)
        .await
        .unwrap();
    assert!(outcome.artifact_id.is_none());

    let p = pathway::get_pathway(pool, outcome.pathway_id).await.unwrap();
    let italy_id: i64 = sqlx::query_scalar("SELECT id FROM countries WHERE name = 'Italy'")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(p.country_id, italy_id);
    assert_eq!(p.fields.min_income_eur, Some(24789));
    assert_eq!(p.fields.min_investment_eur, None);
    assert!(p.is_active);

    assert_eq!(count(pool, "residency_pathways").await, 1);
    assert_eq!(count(pool, "sources").await, 1);
    assert_eq!(count(pool, "pathway_sources").await, 1);

    let trail = audit::list_trail(pool, job_id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action_type, ActionType::Fetch);
    assert_eq!(trail[0].source_id, Some(outcome.source_id));
    assert!(trail[0].is_source);

    let cited = pathway::cited_sources(pool, outcome.pathway_id).await.unwrap();
    assert_eq!(cited.len(), 1);
    assert_eq!(cited[0].credibility, Rating::MAX);
    assert_eq!(cited[0].relevance_score, Rating::MID);

    let job = jobs::get_job(pool, job_id).await.unwrap();
    assert_eq!(job.sources_found, 1);
    assert_eq!(job.pages_visited, 1);
    assert_eq!(job.artifacts_downloaded, 0);

    let summary = jobs::finish_job(pool, job_id, JobOutcome::Completed, None, None)
        .await
        .unwrap();
    assert_eq!(summary.job.status, JobStatus::Completed);
    assert!(summary.job.completed_at.is_some());
    assert_eq!(summary.job.error_count, 0);
}

#[tokio::test]
async fn failed_pathway_insert_rolls_back_every_step() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;
    let artifact = write_file(&ledger.root, "data/raw/visa.html", b"<html>visa</html>");

    let mut record = italy_record(job_id);
    record.artifact_path = Some(artifact);
    record.fields.min_income_eur = Some(-1);

    let progress = RecordingProgress::default();
    let err = pathway::record_pathway(pool, &ledger.root, &record, &progress)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TransactionFailed(_)));
    assert!(matches!(err.root_cause(), LedgerError::Database(_)));

    for table in [
        "sources",
        "scraper_audit_trail",
        "artifacts",
        "residency_pathways",
        "pathway_sources",
    ] {
        assert_eq!(count(pool, table).await, 0, "{} should be empty", table);
    }

    let job = jobs::get_job(pool, job_id).await.unwrap();
    assert_eq!(job.sources_found, 0);
    assert_eq!(job.pages_visited, 0);
    assert_eq!(job.artifacts_downloaded, 0);
    assert_eq!(job.status, JobStatus::Running);

    let events = progress.events();
    assert!(matches!(events.first(), Some(WriteEvent::Begin)));
    assert!(matches!(events.last(), Some(WriteEvent::RolledBack { .. })));
    assert!(!events.iter().any(|e| matches!(e, WriteEvent::Committed)));
}

#[tokio::test]
async fn counters_count_only_new_rows() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;

    let mut record = italy_record(job_id);
    record.artifact_path = Some(write_file(&ledger.root, "data/raw/a.pdf", b"%PDF-1.7 visa"));
    let first = pathway::record_pathway(pool, &ledger.root, &record, &NoProgress)
        .await
        .unwrap();

    let job = jobs::get_job(pool, job_id).await.unwrap();
    assert_eq!(
        (job.sources_found, job.pages_visited, job.artifacts_downloaded),
        (1, 1, 1)
    );

    // Same URL, same content under another name.
    record.artifact_path = Some(write_file(&ledger.root, "data/raw/b.pdf", b"%PDF-1.7 visa"));
    let second = pathway::record_pathway(pool, &ledger.root, &record, &NoProgress)
        .await
        .unwrap();

    let job = jobs::get_job(pool, job_id).await.unwrap();
    assert_eq!(
        (job.sources_found, job.pages_visited, job.artifacts_downloaded),
        (1, 2, 1)
    );

    assert_eq!(first.source_id, second.source_id);
    assert_eq!(first.artifact_id, second.artifact_id);
    assert!(first.artifact_id.is_some());
    assert_ne!(first.pathway_id, second.pathway_id);
    assert_eq!(count(pool, "sources").await, 1);
    assert_eq!(count(pool, "artifacts").await, 1);
    assert_eq!(count(pool, "residency_pathways").await, 2);
    assert_eq!(count(pool, "pathway_sources").await, 2);
}

#[tokio::test]
async fn missing_artifact_file_is_not_fatal() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;

    let mut record = italy_record(job_id);
    record.artifact_path = Some(PathBuf::from("data/raw/never-downloaded.pdf"));

    let progress = RecordingProgress::default();
    let outcome = pathway::record_pathway(pool, &ledger.root, &record, &progress)
        .await
        .unwrap();

    assert!(outcome.artifact_id.is_none());
    assert_eq!(count(pool, "artifacts").await, 0);
    assert_eq!(count(pool, "residency_pathways").await, 1);
    assert_eq!(count(pool, "scraper_audit_trail").await, 1);
    assert_eq!(jobs::get_job(pool, job_id).await.unwrap().artifacts_downloaded, 0);
    assert!(progress
        .events()
        .iter()
        .any(|e| matches!(e, WriteEvent::ArtifactMissing { .. })));
}

#[tokio::test]
async fn writer_checks_job_and_country_first() {
    let ledger = setup().await;
    let pool = &ledger.pool;

    let err = pathway::record_pathway(pool, &ledger.root, &italy_record(999), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::Job,
            ..
        }
    ));

    let job_id = italy_job(pool).await;
    let mut record = italy_record(job_id);
    record.country = "Atlantis".to_string();
    let err = pathway::record_pathway(pool, &ledger.root, &record, &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::Country,
            ..
        }
    ));
    assert_eq!(count(pool, "sources").await, 0);
}

#[tokio::test]
async fn country_resolves_by_iso_code() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;

    let mut record = italy_record(job_id);
    record.country = "it".to_string();
    record.artifact_path = Some(write_file(&ledger.root, "data/raw/a.pdf", b"%PDF-it"));
    record.artifact_type = ArtifactType::Pdf;
    let outcome = pathway::record_pathway(pool, &ledger.root, &record, &NoProgress)
        .await
        .unwrap();
    let p = pathway::get_pathway(pool, outcome.pathway_id).await.unwrap();
    assert_eq!(p.country_name, "Italy");

    let filter = ArtifactFilter {
        country: Some("Italy".to_string()),
        ..ArtifactFilter::default()
    };
    let listed = artifacts::list_artifacts(pool, &filter).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].country.as_deref(), Some("Italy"));
    assert_eq!(Some(listed[0].id), outcome.artifact_id);
}

#[tokio::test]
async fn registered_artifact_country_is_canonical() {
    let ledger = setup().await;
    let path = write_file(&ledger.root, "data/raw/dk.html", b"<html>dk</html>");

    let artifact = NewArtifact {
        country: Some("dk".to_string()),
        ..NewArtifact::new(path, ArtifactType::Html)
    };
    artifacts::register_artifact(&ledger.pool, &ledger.root, &artifact)
        .await
        .unwrap();

    let listed = artifacts::list_artifacts(&ledger.pool, &ArtifactFilter::default())
        .await
        .unwrap();
    assert_eq!(listed[0].country.as_deref(), Some("Denmark"));

    let other = write_file(&ledger.root, "data/raw/x.html", b"<html>x</html>");
    let unknown = NewArtifact {
        country: Some("Atlantis".to_string()),
        ..NewArtifact::new(other, ArtifactType::Html)
    };
    let err = artifacts::register_artifact(&ledger.pool, &ledger.root, &unknown)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::Country,
            ..
        }
    ));
}

// ─── Registries ─────────────────────────────────────────────────────

#[tokio::test]
async fn source_resolution_reuses_url() {
    let ledger = setup().await;
    let mut conn = ledger.pool.acquire().await.unwrap();

    let source = NewSource::new(
        "https://example.dk/work-permit",
        "Work permit",
        SourceType::OfficialGovernment,
        Rating::new(4).unwrap(),
    );
    let first = sources::resolve_or_create_source(&mut conn, &source, None)
        .await
        .unwrap();
    let renamed = NewSource::new(
        "https://example.dk/work-permit",
        "A different title",
        SourceType::News,
        Rating::MIN,
    );
    let second = sources::resolve_or_create_source(&mut conn, &renamed, None)
        .await
        .unwrap();
    drop(conn);

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(count(&ledger.pool, "sources").await, 1);

    let listed = sources::list_sources(&ledger.pool, &SourceFilter::default())
        .await
        .unwrap();
    assert_eq!(listed[0].title, "Work permit");
    assert_eq!(listed[0].credibility.get(), 4);
}

#[tokio::test]
async fn strict_source_insert_rejects_duplicates() {
    let ledger = setup().await;
    let source = NewSource {
        country: Some("Denmark".to_string()),
        ..NewSource::new(
            "https://nyidanmark.dk",
            "New to Denmark",
            SourceType::OfficialGovernment,
            Rating::MAX,
        )
    };
    sources::insert_source(&ledger.pool, &source).await.unwrap();
    let err = sources::insert_source(&ledger.pool, &source)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let filter = SourceFilter {
        country: Some("DK".to_string()),
        ..SourceFilter::default()
    };
    assert_eq!(sources::list_sources(&ledger.pool, &filter).await.unwrap().len(), 1);
}

#[tokio::test]
async fn artifact_dedup_by_content() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;
    let trail_id = audit::log_action(
        pool,
        &ledger.root,
        &NewTrailEntry::new(job_id, ActionType::Download),
    )
    .await
    .unwrap();

    let a = write_file(&ledger.root, "data/raw/first.pdf", b"same bytes");
    let b = write_file(&ledger.root, "elsewhere/second.pdf", b"same bytes");

    let register = |path: PathBuf| NewArtifact {
        trail_id: Some(trail_id),
        ..NewArtifact::new(path, ArtifactType::Pdf)
    };
    let (first, file) = artifacts::register_artifact(pool, &ledger.root, &register(a))
        .await
        .unwrap();
    let (second, _) = artifacts::register_artifact(pool, &ledger.root, &register(b))
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(count(pool, "artifacts").await, 1);
    assert_eq!(file.stored_path, Path::new("data/raw/first.pdf").display().to_string());
    assert_eq!(jobs::get_job(pool, job_id).await.unwrap().artifacts_downloaded, 1);

    let listed = artifacts::list_artifacts(pool, &ArtifactFilter::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].sha256, file.sha256);
}

#[tokio::test]
async fn registering_a_missing_file_fails() {
    let ledger = setup().await;
    let err = artifacts::register_artifact(
        &ledger.pool,
        &ledger.root,
        &NewArtifact::new("missing.pdf", ArtifactType::Pdf),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::ArtifactFile,
            ..
        }
    ));
}

// ─── Jobs and audit trail ───────────────────────────────────────────

#[tokio::test]
async fn finishing_twice_is_rejected() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;

    let failed = NewTrailEntry {
        status: TrailStatus::Error,
        error_message: Some("HTTP 503".to_string()),
        ..NewTrailEntry::new(job_id, ActionType::Fetch)
    };
    audit::log_action(pool, &ledger.root, &failed).await.unwrap();

    let summary = jobs::finish_job(
        pool,
        job_id,
        JobOutcome::Failed,
        Some("portal down"),
        Some("retry tomorrow"),
    )
    .await
    .unwrap();
    assert_eq!(summary.job.status, JobStatus::Failed);
    assert_eq!(summary.job.error_count, 1);
    assert_eq!(summary.job.error_summary.as_deref(), Some("portal down"));
    assert_eq!(summary.job.session_notes.as_deref(), Some("retry tomorrow"));

    let err = jobs::finish_job(pool, job_id, JobOutcome::Completed, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::JobClosed { id, .. } if id == job_id));

    let err = jobs::finish_job(pool, 4242, JobOutcome::Completed, None, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::Job,
            ..
        }
    ));
}

#[tokio::test]
async fn log_action_hashes_existing_artifacts() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;

    let saved = NewTrailEntry {
        artifact_path: Some(write_file(&ledger.root, "data/raw/page.html", b"abc")),
        ..NewTrailEntry::new(job_id, ActionType::Screenshot)
    };
    let missing = NewTrailEntry {
        artifact_path: Some(PathBuf::from("data/raw/gone.html")),
        ..NewTrailEntry::new(job_id, ActionType::Screenshot)
    };
    audit::log_action(pool, &ledger.root, &saved).await.unwrap();
    audit::log_action(pool, &ledger.root, &missing).await.unwrap();

    let trail = audit::list_trail(pool, job_id).await.unwrap();
    assert_eq!(
        trail[0].artifact_hash.as_deref(),
        Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );
    assert_eq!(trail[1].artifact_hash, None);
    assert_eq!(jobs::get_job(pool, job_id).await.unwrap().pages_visited, 2);
}

#[tokio::test]
async fn log_action_requires_job_and_parent() {
    let ledger = setup().await;
    let pool = &ledger.pool;

    let err = audit::log_action(pool, &ledger.root, &NewTrailEntry::new(77, ActionType::Search))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::Job,
            ..
        }
    ));

    let job_id = italy_job(pool).await;
    let orphan = NewTrailEntry {
        parent_trail_id: Some(12345),
        ..NewTrailEntry::new(job_id, ActionType::Click)
    };
    let err = audit::log_action(pool, &ledger.root, &orphan)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::TrailEntry,
            ..
        }
    ));
    assert_eq!(count(pool, "scraper_audit_trail").await, 0);
    assert_eq!(jobs::get_job(pool, job_id).await.unwrap().pages_visited, 0);
}

#[tokio::test]
async fn mark_source_counts_first_promotion_only() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;

    let entry = NewTrailEntry {
        url: Some("https://example.it/decree".to_string()),
        page_title: Some("Decree".to_string()),
        ..NewTrailEntry::new(job_id, ActionType::Navigate)
    };
    let trail_id = audit::log_action(pool, &ledger.root, &entry).await.unwrap();

    let mark = MarkSource {
        trail_id,
        create_source: Some((SourceType::LegalDatabase, Rating::new(4).unwrap())),
        notes: Some("primary text".to_string()),
    };
    let first = audit::mark_source(pool, &mark).await.unwrap();
    let second = audit::mark_source(pool, &mark).await.unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(count(pool, "sources").await, 1);
    assert_eq!(jobs::get_job(pool, job_id).await.unwrap().sources_found, 1);

    let trail = audit::list_trail(pool, job_id).await.unwrap();
    assert!(trail[0].is_source);
    assert_eq!(trail[0].source_id, first);
}

#[tokio::test]
async fn mark_source_without_url_is_invalid() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;
    let trail_id = audit::log_action(
        pool,
        &ledger.root,
        &NewTrailEntry::new(job_id, ActionType::Search),
    )
    .await
    .unwrap();

    let mark = MarkSource {
        trail_id,
        create_source: Some((SourceType::Other, Rating::MIN)),
        notes: None,
    };
    let err = audit::mark_source(pool, &mark).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_eq!(jobs::get_job(pool, job_id).await.unwrap().sources_found, 0);
}

// ─── Plain inserts ──────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_link_already_exists() {
    let ledger = setup().await;
    let pool = &ledger.pool;

    let pathway_id = pathway::insert_pathway(
        pool,
        &NewPathway {
            country: "Portugal".to_string(),
            pathway_type: "passive_income".to_string(),
            name: "D7 Visa".to_string(),
            fields: PathwayFields::default(),
            is_active: true,
            last_verified_date: None,
        },
    )
    .await
    .unwrap();
    let source_id = sources::insert_source(
        pool,
        &NewSource::new("https://vistos.mne.gov.pt", "Vistos", SourceType::Embassy, Rating::MAX),
    )
    .await
    .unwrap();

    let link = NewLink::new(pathway_id, source_id);
    pathway::link_pathway_source(pool, &link).await.unwrap();
    let err = pathway::link_pathway_source(pool, &link).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let err = pathway::link_pathway_source(pool, &NewLink::new(pathway_id, 999))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::NotFound {
            entity: Entity::Source,
            ..
        }
    ));
}

#[tokio::test]
async fn legal_reference_number_is_unique_per_country() {
    let ledger = setup().await;
    let decree = NewLegalRef {
        country: "Italy".to_string(),
        reference_number: "DL 4/2019".to_string(),
        title: "Decreto-legge".to_string(),
        ..NewLegalRef::default()
    };
    legal::insert_legal_ref(&ledger.pool, &decree).await.unwrap();
    let err = legal::insert_legal_ref(&ledger.pool, &decree)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyExists(_)));

    let refs = legal::list_legal_refs(&ledger.pool, Some("italy")).await.unwrap();
    assert_eq!(refs.len(), 1);
    assert!(legal::list_legal_refs(&ledger.pool, Some("Spain"))
        .await
        .unwrap()
        .is_empty());
}

// ─── Export and stats ───────────────────────────────────────────────

#[tokio::test]
async fn export_country_never_overwrites_by_default() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;
    pathway::record_pathway(pool, &ledger.root, &italy_record(job_id), &NoProgress)
        .await
        .unwrap();

    let vault = &ledger.config.export.vault_dir;
    let report = export::export_country(pool, vault, "Italy", false).await.unwrap();
    assert_eq!(report.written.len(), 2);
    assert!(report.skipped.is_empty());

    let page = vault.join("Countries/Italy/Digital_Nomad_Visa.md");
    let rendered = std::fs::read_to_string(&page).unwrap();
    assert!(rendered.contains("Digital Nomad Visa"));
    assert!(rendered.contains("https://example.it/visa"));
    assert!(vault.join("Countries/Italy/README.md").exists());

    let again = export::export_country(pool, vault, "Italy", false).await.unwrap();
    assert!(again.written.is_empty());
    assert_eq!(again.skipped.len(), 2);

    let forced = export::export_country(pool, vault, "Italy", true).await.unwrap();
    assert_eq!(forced.written.len(), 2);
    assert_eq!(std::fs::read_to_string(&page).unwrap(), rendered);
}

#[tokio::test]
async fn export_country_keeps_pathways_sharing_a_name() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;
    pathway::record_pathway(pool, &ledger.root, &italy_record(job_id), &NoProgress)
        .await
        .unwrap();
    let mut remote = italy_record(job_id);
    remote.pathway_type = "remote_work".to_string();
    pathway::record_pathway(pool, &ledger.root, &remote, &NoProgress)
        .await
        .unwrap();

    let vault = &ledger.config.export.vault_dir;
    let report = export::export_country(pool, vault, "Italy", false).await.unwrap();
    assert_eq!(report.written.len(), 3);
    assert!(report.skipped.is_empty());

    let dir = vault.join("Countries/Italy");
    assert!(dir.join("Digital_Nomad_Visa_digital_nomad.md").exists());
    assert!(dir.join("Digital_Nomad_Visa_remote_work.md").exists());
    let index = std::fs::read_to_string(dir.join("README.md")).unwrap();
    assert!(index.contains("(Digital_Nomad_Visa_remote_work.md)"));
}

#[tokio::test]
async fn stats_reflect_recorded_rows() {
    let ledger = setup().await;
    let pool = &ledger.pool;
    let job_id = italy_job(pool).await;
    pathway::record_pathway(pool, &ledger.root, &italy_record(job_id), &NoProgress)
        .await
        .unwrap();

    let stats = stats::collect_stats(pool).await.unwrap();
    assert_eq!(stats.schema_version, Some(1));
    assert_eq!(stats.count("countries"), Some(15));
    assert_eq!(stats.count("residency_pathways"), Some(1));
    assert_eq!(stats.count("job_run"), Some(1));
    assert_eq!(stats.pathways_by_country, vec![("Italy".to_string(), 1)]);
    assert_eq!(stats.jobs_by_status, vec![("running".to_string(), 1)]);
}

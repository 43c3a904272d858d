//! Artifact registry.
//!
//! Downloaded files are content-addressed: the SHA-256 of the full file is
//! the dedup key, independent of path or name. Registering byte-identical
//! content a second time returns the original row's id and writes nothing.
//!
//! Files are hashed in fixed 64 KiB chunks, so arbitrarily large files are
//! never loaded whole.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::{map_unique, Entity, LedgerError, Result};
use crate::jobs::{self, Counter};
use crate::models::{now_rfc3339, ArtifactType, ExtractionStatus};
use crate::progress::{format_number, ProgressReporter, WriteEvent};
use crate::sources::Resolution;

const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 of a file's contents as lowercase hex.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// MIME type guessed from the file extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Resolve `path` against the project root: absolute paths pass through.
pub fn resolve_path(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// `path` made absolute against the working directory, left as is when
/// the working directory cannot be read.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// What we know about a file on disk, ready to be stored.
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    /// Path as stored: relative to the project root when underneath it.
    pub stored_path: String,
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
    pub mime_type: &'static str,
}

impl ArtifactFile {
    /// Stat and hash a file. `Ok(None)` when nothing exists at the path.
    pub fn inspect(path: &Path, root: &Path) -> Result<Option<ArtifactFile>> {
        let full = resolve_path(path, root);
        if !full.is_file() {
            return Ok(None);
        }

        let size = std::fs::metadata(&full)?.len();
        let sha256 = hash_file(&full)?;
        let absolute_full = absolute(&full);
        let absolute_root = absolute(root);
        let stored = absolute_full
            .strip_prefix(&absolute_root)
            .unwrap_or(&full);
        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| stored.display().to_string());

        Ok(Some(ArtifactFile {
            stored_path: stored.display().to_string(),
            file_name,
            size,
            sha256,
            mime_type: mime_for(&full),
        }))
    }
}

/// Descriptive fields of an artifact registration.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub path: PathBuf,
    pub artifact_type: ArtifactType,
    pub title: Option<String>,
    pub description: Option<String>,
    pub trail_id: Option<i64>,
    pub source_id: Option<i64>,
    pub source_url: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub pathway_type: Option<String>,
}

impl NewArtifact {
    pub fn new(path: impl Into<PathBuf>, artifact_type: ArtifactType) -> Self {
        Self {
            path: path.into(),
            artifact_type,
            title: None,
            description: None,
            trail_id: None,
            source_id: None,
            source_url: None,
            language: None,
            country: None,
            pathway_type: None,
        }
    }
}

/// A stored artifact, as listed by `query artifacts`.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactRecord {
    pub id: i64,
    pub artifact_type: ArtifactType,
    pub title: Option<String>,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub sha256: String,
    pub country: Option<String>,
    pub pathway_type: Option<String>,
    pub extraction_status: ExtractionStatus,
    pub downloaded_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter {
    pub country: Option<String>,
    pub artifact_type: Option<ArtifactType>,
    pub extraction_status: Option<ExtractionStatus>,
}

pub(crate) async fn find_artifact(
    conn: &mut SqliteConnection,
    sha256: &str,
) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM artifacts WHERE sha256 = ?")
        .bind(sha256)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id)
}

/// Look an artifact up by content hash, inserting it when absent.
///
/// Runs on the caller's connection. A hash match is taken as identity.
pub async fn resolve_or_create_artifact(
    conn: &mut SqliteConnection,
    file: &ArtifactFile,
    artifact: &NewArtifact,
) -> Result<Resolution> {
    if let Some(id) = find_artifact(conn, &file.sha256).await? {
        return Ok(Resolution { id, created: false });
    }

    let result = sqlx::query(
        r#"
        INSERT INTO artifacts (
            trail_id, source_id, artifact_type, file_path, file_name, file_size_bytes,
            mime_type, sha256, title, description, source_url, language,
            country, pathway_type, extraction_status, downloaded_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, COALESCE(?, 'en'), ?, ?, ?, ?)
        "#,
    )
    .bind(artifact.trail_id)
    .bind(artifact.source_id)
    .bind(artifact.artifact_type.as_str())
    .bind(&file.stored_path)
    .bind(&file.file_name)
    .bind(file.size as i64)
    .bind(file.mime_type)
    .bind(&file.sha256)
    .bind(&artifact.title)
    .bind(&artifact.description)
    .bind(&artifact.source_url)
    .bind(&artifact.language)
    .bind(&artifact.country)
    .bind(&artifact.pathway_type)
    .bind(ExtractionStatus::Pending.as_str())
    .bind(now_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_unique(e, || format!("artifact {}", file.sha256)))?;

    Ok(Resolution {
        id: result.last_insert_rowid(),
        created: true,
    })
}

/// The job that owns a trail entry.
pub(crate) async fn trail_job(conn: &mut SqliteConnection, trail_id: i64) -> Result<i64> {
    let job: Option<i64> =
        sqlx::query_scalar("SELECT job_run_id FROM scraper_audit_trail WHERE id = ?")
            .bind(trail_id)
            .fetch_optional(&mut *conn)
            .await?;
    job.ok_or_else(|| LedgerError::not_found(Entity::TrailEntry, trail_id))
}

/// Register a file that must exist on disk.
///
/// A country given by ISO code or in any casing is stored under its
/// canonical name. When the artifact is tied to a trail entry, that entry's job gets its
/// `artifacts_downloaded` counter bumped, but only for a newly created row.
pub async fn register_artifact(
    pool: &SqlitePool,
    root: &Path,
    artifact: &NewArtifact,
) -> Result<(Resolution, ArtifactFile)> {
    let file = ArtifactFile::inspect(&artifact.path, root)?.ok_or_else(|| {
        LedgerError::not_found(
            Entity::ArtifactFile,
            resolve_path(&artifact.path, root).display(),
        )
    })?;

    let mut tx = pool.begin().await?;

    let job_id = match artifact.trail_id {
        Some(trail_id) => Some(trail_job(&mut tx, trail_id).await?),
        None => None,
    };

    let canonical;
    let artifact = match &artifact.country {
        Some(country) => {
            let (_, name) = db::resolve_country(&mut tx, country).await?;
            canonical = NewArtifact {
                country: Some(name),
                ..artifact.clone()
            };
            &canonical
        }
        None => artifact,
    };

    let resolution = resolve_or_create_artifact(&mut tx, &file, artifact).await?;
    if resolution.created {
        if let Some(job_id) = job_id {
            jobs::increment(&mut tx, job_id, Counter::ArtifactsDownloaded).await?;
        }
    }

    tx.commit().await?;
    Ok((resolution, file))
}

fn artifact_from_row(row: &SqliteRow) -> Result<ArtifactRecord> {
    let artifact_type: String = row.get("artifact_type");
    let extraction_status: String = row.get("extraction_status");
    Ok(ArtifactRecord {
        id: row.get("id"),
        artifact_type: artifact_type.parse()?,
        title: row.get("title"),
        file_path: row.get("file_path"),
        file_size_bytes: row.get("file_size_bytes"),
        sha256: row.get("sha256"),
        country: row.get("country"),
        pathway_type: row.get("pathway_type"),
        extraction_status: extraction_status.parse()?,
        downloaded_at: row.get("downloaded_at"),
    })
}

/// Artifacts, most recently downloaded first.
pub async fn list_artifacts(
    pool: &SqlitePool,
    filter: &ArtifactFilter,
) -> Result<Vec<ArtifactRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, artifact_type, title, file_path, file_size_bytes, sha256,
               country, pathway_type, extraction_status, downloaded_at
        FROM artifacts
        WHERE (?1 IS NULL OR country = ?1 COLLATE NOCASE)
          AND (?2 IS NULL OR artifact_type = ?2)
          AND (?3 IS NULL OR extraction_status = ?3)
        ORDER BY downloaded_at DESC, id DESC
        "#,
    )
    .bind(filter.country.as_deref())
    .bind(filter.artifact_type.map(|t| t.as_str()))
    .bind(filter.extraction_status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    rows.iter().map(artifact_from_row).collect()
}

/// CLI entry point for `artifact register`: prints the artifact id on stdout.
pub async fn run_register(
    config: &Config,
    artifact: &NewArtifact,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<()> {
    let pool = db::open(config).await?;
    let result = register_artifact(&pool, &config.project.root, artifact).await;
    pool.close().await;
    let (resolution, file) = result?;

    let message = if resolution.created {
        format!(
            "Artifact registered (ID: {})\n   Type: {}\n   Path: {}\n   Size: {} bytes ({:.1} KB)\n   Hash: {}...",
            resolution.id,
            artifact.artifact_type,
            file.stored_path,
            format_number(file.size as i64),
            file.size as f64 / 1024.0,
            &file.sha256[..16]
        )
    } else {
        format!(
            "Artifact already registered (ID: {})\n   Duplicate detected via SHA256: {}...",
            resolution.id,
            &file.sha256[..16]
        )
    };
    progress.report(WriteEvent::Done { message });

    println!("{}", resolution.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_spans_multiple_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let expected = format!("{:x}", Sha256::digest(&data));
        assert_eq!(hash_file(&path).unwrap(), expected);
    }

    #[test]
    fn mime_guess_by_extension() {
        assert_eq!(mime_for(Path::new("a/visa.PDF")), "application/pdf");
        assert_eq!(mime_for(Path::new("page.htm")), "text/html");
        assert_eq!(mime_for(Path::new("notes.md")), "text/markdown");
        assert_eq!(mime_for(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn inspect_stores_path_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/raw")).unwrap();
        std::fs::write(dir.path().join("data/raw/visa.pdf"), b"%PDF").unwrap();

        let file = ArtifactFile::inspect(Path::new("data/raw/visa.pdf"), dir.path())
            .unwrap()
            .unwrap();
        assert_eq!(file.stored_path, Path::new("data/raw/visa.pdf").display().to_string());
        assert_eq!(file.file_name, "visa.pdf");
        assert_eq!(file.size, 4);
        assert_eq!(file.mime_type, "application/pdf");
    }

    #[test]
    fn inspect_relativizes_absolute_path_under_relative_root() {
        // A relative root, as with the default `project.root = "."`.
        let dir = tempfile::tempdir_in(".").unwrap();
        let root = dir.path();
        assert!(root.is_relative());
        std::fs::create_dir_all(root.join("data/raw")).unwrap();
        std::fs::write(root.join("data/raw/b.pdf"), b"%PDF-b").unwrap();

        let full = std::path::absolute(root.join("data/raw/b.pdf")).unwrap();
        let file = ArtifactFile::inspect(&full, root).unwrap().unwrap();
        assert_eq!(file.stored_path, Path::new("data/raw/b.pdf").display().to_string());
    }

    #[test]
    fn inspect_keeps_paths_outside_root_absolute() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let outside = elsewhere.path().join("c.pdf");
        std::fs::write(&outside, b"%PDF-c").unwrap();

        let file = ArtifactFile::inspect(&outside, root.path()).unwrap().unwrap();
        assert_eq!(file.stored_path, outside.display().to_string());
    }

    #[test]
    fn inspect_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ArtifactFile::inspect(Path::new("nope.pdf"), dir.path())
            .unwrap()
            .is_none());
    }
}

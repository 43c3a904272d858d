//! # Residency Ledger CLI (`rledger`)
//!
//! The `rledger` binary records immigration-pathway research in SQLite:
//! research jobs and their audit trail, deduplicated sources and artifacts,
//! pathways with their citations, and markdown exports of the result.
//!
//! ## Usage
//!
//! ```bash
//! rledger --config ./config/ledger.toml <command>
//! ```
//!
//! Progress lines go to stderr. Write commands print the new row id, and
//! nothing else, on stdout so they can be chained from a shell:
//!
//! ```bash
//! job=$(rledger job start --task "Italy digital nomad visa" --country Italy)
//! trail=$(rledger audit log --job-id "$job" --action fetch --url https://example.it/visa)
//! rledger pathway add --job-id "$job" --country Italy --pathway-type digital_nomad \
//!     --name "Digital Nomad Visa" --source-url https://example.it/visa \
//!     --source-title "Official visa page" --source-type official_government \
//!     --credibility 5 --min-income 24789
//! rledger job finish "$job"
//! rledger export country Italy
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rledger init` | Create the database, tables and seed countries |
//! | `rledger job start\|finish` | Open or close a research job |
//! | `rledger audit log\|mark-source` | Record a research action, promote it to a source |
//! | `rledger artifact register` | Register a downloaded file (dedup by SHA-256) |
//! | `rledger pathway add` | Record a pathway, its source and artifact atomically |
//! | `rledger insert …` | Plain inserts: pathway, source, legal-ref, link |
//! | `rledger query …` | Tabular listings |
//! | `rledger export …` | Markdown / JSON export |
//! | `rledger stats` | Database overview |
//! | `rledger completions <shell>` | Shell completion script |

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use residency_ledger::artifacts::{self, ArtifactFilter, NewArtifact};
use residency_ledger::audit::{self, MarkSource, NewTrailEntry};
use residency_ledger::config::{self, Config};
use residency_ledger::error::LedgerError;
use residency_ledger::export::{self, ExportFormat};
use residency_ledger::jobs::{self, NewJob};
use residency_ledger::legal::{self, NewLegalRef};
use residency_ledger::migrate;
use residency_ledger::models::{
    ActionType, ArtifactType, ExtractionStatus, JobOutcome, PathwayFields, Rating, SourceType,
    TrailStatus,
};
use residency_ledger::pathway::{self, NewLink, NewPathway, PathwayFilter, PathwayRecord, SourceSpec};
use residency_ledger::progress::{ProgressMode, ProgressReporter, WriteEvent};
use residency_ledger::query;
use residency_ledger::sources::{self, NewSource, SourceFilter};
use residency_ledger::stats;

/// Residency Ledger: a research ledger for immigration pathways.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the file is absent the defaults are used.
#[derive(Parser)]
#[command(
    name = "rledger",
    about = "Residency Ledger: record and export immigration pathway research",
    version,
    long_about = "Residency Ledger keeps a SQLite record of research jobs, their audit trail, \
    deduplicated sources and artifacts, and the residency pathways they support. \
    Pathways can be exported to a markdown vault."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ledger.toml")]
    config: PathBuf,

    /// Progress output on stderr.
    #[arg(long, global = true, value_enum, default_value_t = ProgressMode::Human)]
    progress: ProgressMode,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and seed the country table.
    ///
    /// Idempotent: tables are created only when missing and seed rows are
    /// inserted only once.
    Init {
        /// Delete the existing database file first.
        #[arg(long)]
        force: bool,
    },

    /// Start or finish a research job.
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Record research actions in the audit trail.
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Register downloaded files.
    Artifact {
        #[command(subcommand)]
        action: ArtifactAction,
    },

    /// Record pathways through the bundled transaction.
    Pathway {
        #[command(subcommand)]
        action: PathwayAction,
    },

    /// Insert single rows outside the bundled transaction.
    Insert {
        #[command(subcommand)]
        target: InsertTarget,
    },

    /// List stored data as tables.
    Query {
        #[command(subcommand)]
        target: QueryTarget,
    },

    /// Export pathways to markdown or JSON.
    Export {
        #[command(subcommand)]
        target: ExportTarget,
    },

    /// Show row counts and a summary of the database.
    Stats,

    /// Generate a shell completion script on stdout.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Start a job. Prints the job id.
    Start {
        /// What this research session is about.
        #[arg(long)]
        task: String,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        pathway_type: Option<String>,
        /// Model driving the session (defaults to `unknown`).
        #[arg(long)]
        llm_model: Option<String>,
    },

    /// Finish a running job and print its statistics.
    Finish {
        /// Job id.
        id: i64,
        #[arg(long, value_enum, default_value_t = JobOutcome::Completed)]
        status: JobOutcome,
        #[arg(long)]
        error_summary: Option<String>,
        /// Appended to the job's session notes.
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum AuditAction {
    /// Log one research action. Prints the trail id.
    Log(LogArgs),

    /// Mark a trail entry as a knowledge source.
    ///
    /// With `--create-source`, a source row is resolved or created from the
    /// entry's URL and its id is printed.
    MarkSource {
        /// Trail entry id.
        trail_id: i64,
        #[arg(long)]
        create_source: bool,
        #[arg(long, value_enum)]
        source_type: Option<SourceType>,
        /// Credibility 1-5.
        #[arg(long)]
        credibility: Option<Rating>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Args)]
struct LogArgs {
    #[arg(long)]
    job_id: i64,
    #[arg(long, value_enum)]
    action: ActionType,
    #[arg(long)]
    tool: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    http_status: Option<i64>,
    #[arg(long)]
    page_title: Option<String>,
    #[arg(long)]
    page_language: Option<String>,
    /// File saved by this action; hashed when it exists.
    #[arg(long)]
    artifact_path: Option<PathBuf>,
    #[arg(long)]
    parent_trail_id: Option<i64>,
    #[arg(long)]
    session_id: Option<String>,
    #[arg(long, value_enum, default_value_t = TrailStatus::Success)]
    status: TrailStatus,
    #[arg(long)]
    error_message: Option<String>,
    #[arg(long)]
    duration_ms: Option<i64>,
    #[arg(long)]
    notes: Option<String>,
}

impl LogArgs {
    fn into_entry(self) -> NewTrailEntry {
        NewTrailEntry {
            tool_name: self.tool,
            url: self.url,
            search_query: self.query,
            http_status: self.http_status,
            page_title: self.page_title,
            page_language: self.page_language,
            artifact_path: self.artifact_path,
            parent_trail_id: self.parent_trail_id,
            session_id: self.session_id,
            status: self.status,
            error_message: self.error_message,
            duration_ms: self.duration_ms,
            notes: self.notes,
            ..NewTrailEntry::new(self.job_id, self.action)
        }
    }
}

#[derive(Subcommand)]
enum ArtifactAction {
    /// Register a file. Prints the artifact id (existing id for known content).
    Register {
        /// File to register.
        path: PathBuf,
        #[arg(long = "type", value_enum)]
        artifact_type: ArtifactType,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        trail_id: Option<i64>,
        #[arg(long)]
        source_id: Option<i64>,
        #[arg(long)]
        source_url: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        pathway_type: Option<String>,
    },
}

#[derive(Subcommand)]
enum PathwayAction {
    /// Record a pathway with its source, audit entry, artifact and link in
    /// one transaction. Prints the pathway id.
    Add(AddPathwayArgs),
}

#[derive(Args)]
struct AddPathwayArgs {
    #[arg(long)]
    job_id: i64,
    /// Country name or ISO code.
    #[arg(long)]
    country: String,
    #[arg(long)]
    pathway_type: String,
    #[arg(long)]
    name: String,

    #[arg(long)]
    source_url: String,
    #[arg(long)]
    source_title: String,
    #[arg(long, value_enum)]
    source_type: SourceType,
    /// Source credibility 1-5.
    #[arg(long)]
    credibility: Rating,
    #[arg(long)]
    source_description: Option<String>,

    /// Downloaded file backing the source.
    #[arg(long)]
    artifact_path: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ArtifactType::ExtractedText)]
    artifact_type: ArtifactType,

    /// Relevance of the source for this pathway, 1-5.
    #[arg(long, default_value_t = Rating::MID)]
    relevance: Rating,
    #[arg(long)]
    excerpt: Option<String>,

    #[command(flatten)]
    fields: PathwayFieldArgs,
}

/// Descriptive pathway fields shared by `pathway add` and `insert pathway`.
#[derive(Args)]
struct PathwayFieldArgs {
    #[arg(long)]
    official_name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    legal_basis: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    min_income: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    min_investment: Option<i64>,
    #[arg(long)]
    education_requirement: Option<String>,
    #[arg(long)]
    language_requirement: Option<String>,
    #[arg(long)]
    age_restrictions: Option<String>,
    #[arg(long)]
    required_documents: Option<String>,
    #[arg(long)]
    application_process: Option<String>,
    #[arg(long)]
    processing_time_days: Option<i64>,
    #[arg(long)]
    application_fee: Option<f64>,
    #[arg(long)]
    initial_duration_months: Option<i64>,
    #[arg(long)]
    renewable: bool,
    #[arg(long)]
    max_renewals: Option<i64>,
    #[arg(long)]
    total_max_duration_months: Option<i64>,
    #[arg(long)]
    path_to_pr: Option<String>,
    #[arg(long)]
    path_to_citizenship: Option<String>,
    #[arg(long)]
    min_years_to_citizenship: Option<i64>,
    #[arg(long)]
    work_rights: Option<String>,
    #[arg(long)]
    family_inclusion: Option<String>,
    #[arg(long)]
    travel_rights: Option<String>,
    #[arg(long)]
    restrictions: Option<String>,
    #[arg(long)]
    tax_implications: Option<String>,
    #[arg(long)]
    policy_changes: Option<String>,
}

impl From<PathwayFieldArgs> for PathwayFields {
    fn from(a: PathwayFieldArgs) -> Self {
        PathwayFields {
            official_name: a.official_name,
            description: a.description,
            legal_basis: a.legal_basis,
            min_income_eur: a.min_income,
            min_investment_eur: a.min_investment,
            education_requirement: a.education_requirement,
            language_requirement: a.language_requirement,
            age_restrictions: a.age_restrictions,
            required_documents: a.required_documents,
            application_process: a.application_process,
            processing_time_days: a.processing_time_days,
            application_fee_eur: a.application_fee,
            initial_duration_months: a.initial_duration_months,
            renewable: a.renewable,
            max_renewals: a.max_renewals,
            total_max_duration_months: a.total_max_duration_months,
            path_to_permanent_residency: a.path_to_pr,
            path_to_citizenship: a.path_to_citizenship,
            min_years_to_citizenship: a.min_years_to_citizenship,
            work_rights: a.work_rights,
            family_inclusion: a.family_inclusion,
            travel_rights: a.travel_rights,
            restrictions: a.restrictions,
            tax_implications: a.tax_implications,
            policy_changes: a.policy_changes,
        }
    }
}

#[derive(Subcommand)]
enum InsertTarget {
    /// Insert a pathway row. Prints the pathway id.
    Pathway {
        #[arg(long)]
        country: String,
        #[arg(long)]
        pathway_type: String,
        #[arg(long)]
        name: String,
        /// Store the pathway as no longer available.
        #[arg(long)]
        inactive: bool,
        /// Verification date (YYYY-MM-DD).
        #[arg(long)]
        verified_date: Option<String>,
        #[command(flatten)]
        fields: PathwayFieldArgs,
    },

    /// Insert a source. Fails if the URL is already recorded.
    Source {
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: String,
        #[arg(long = "type", value_enum)]
        source_type: SourceType,
        #[arg(long)]
        credibility: Rating,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        pathway_type: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        verified_date: Option<String>,
    },

    /// Insert a legal reference.
    LegalRef {
        #[arg(long)]
        country: String,
        #[arg(long)]
        reference_number: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long = "type")]
        reference_type: Option<String>,
        #[arg(long)]
        enactment_date: Option<String>,
        #[arg(long)]
        effective_date: Option<String>,
        #[arg(long)]
        expiry_date: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        full_text_path: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },

    /// Link a pathway to a source.
    Link {
        #[arg(long)]
        pathway_id: i64,
        #[arg(long)]
        source_id: i64,
        #[arg(long, default_value_t = Rating::MID)]
        relevance: Rating,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        page_number: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum QueryTarget {
    /// Seeded countries.
    Countries,
    Pathways {
        #[arg(long)]
        country: Option<String>,
        #[arg(long = "type")]
        pathway_type: Option<String>,
        #[arg(long)]
        active_only: bool,
    },
    Sources {
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        credibility: Option<Rating>,
        #[arg(long, value_enum)]
        source_type: Option<SourceType>,
        #[arg(long)]
        active_only: bool,
    },
    /// Recent jobs, or one job's trail with `--job-id`.
    AuditTrail {
        #[arg(long)]
        job_id: Option<i64>,
    },
    Artifacts {
        #[arg(long)]
        country: Option<String>,
        #[arg(long, value_enum)]
        artifact_type: Option<ArtifactType>,
        #[arg(long, value_enum)]
        extraction_status: Option<ExtractionStatus>,
    },
    LegalRefs {
        #[arg(long)]
        country: Option<String>,
    },
}

#[derive(Subcommand)]
enum ExportTarget {
    /// Export the latest pathway for a country and type.
    Pathway {
        country: String,
        pathway_type: String,
        /// Output file (defaults to the vault layout; JSON goes to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        overwrite: bool,
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
    },
    /// Export every pathway of a country plus its README index.
    Country {
        country: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Export every country that has pathways.
    All {
        #[arg(long)]
        overwrite: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "rledger", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.reporter();

    dispatch(cli.command, &cfg, progress.as_ref()).await
}

async fn dispatch(command: Commands, cfg: &Config, progress: &dyn ProgressReporter) -> Result<()> {
    match command {
        Commands::Init { force } => {
            if force && migrate::reset_database(cfg)? {
                tracing::info!(path = %cfg.db.path.display(), "removed existing database");
            }
            migrate::run_migrations(cfg).await?;
            progress.report(WriteEvent::Done {
                message: format!("Database initialized: {}", cfg.db.path.display()),
            });
        }
        Commands::Job { action } => match action {
            JobAction::Start {
                task,
                country,
                pathway_type,
                llm_model,
            } => {
                let job = NewJob {
                    task,
                    country,
                    pathway_type,
                    llm_model,
                };
                jobs::run_start(cfg, &job, progress).await?;
            }
            JobAction::Finish {
                id,
                status,
                error_summary,
                notes,
            } => {
                jobs::run_finish(
                    cfg,
                    id,
                    status,
                    error_summary.as_deref(),
                    notes.as_deref(),
                    progress,
                )
                .await?;
            }
        },
        Commands::Audit { action } => match action {
            AuditAction::Log(args) => {
                audit::run_log(cfg, &args.into_entry(), progress).await?;
            }
            AuditAction::MarkSource {
                trail_id,
                create_source,
                source_type,
                credibility,
                notes,
            } => {
                let create_source = if create_source {
                    match (source_type, credibility) {
                        (Some(t), Some(c)) => Some((t, c)),
                        _ => {
                            return Err(LedgerError::InvalidInput(
                                "--create-source requires --source-type and --credibility"
                                    .to_string(),
                            )
                            .into())
                        }
                    }
                } else {
                    None
                };
                let mark = MarkSource {
                    trail_id,
                    create_source,
                    notes,
                };
                audit::run_mark_source(cfg, &mark, progress).await?;
            }
        },
        Commands::Artifact { action } => match action {
            ArtifactAction::Register {
                path,
                artifact_type,
                title,
                description,
                trail_id,
                source_id,
                source_url,
                language,
                country,
                pathway_type,
            } => {
                let artifact = NewArtifact {
                    title,
                    description,
                    trail_id,
                    source_id,
                    source_url,
                    language,
                    country,
                    pathway_type,
                    ..NewArtifact::new(path, artifact_type)
                };
                artifacts::run_register(cfg, &artifact, progress).await?;
            }
        },
        Commands::Pathway {
            action: PathwayAction::Add(args),
        } => {
            let record = PathwayRecord {
                job_id: args.job_id,
                country: args.country,
                pathway_type: args.pathway_type,
                name: args.name,
                source: SourceSpec {
                    url: args.source_url,
                    title: args.source_title,
                    source_type: args.source_type,
                    credibility: args.credibility,
                    description: args.source_description,
                },
                fields: args.fields.into(),
                artifact_path: args.artifact_path,
                artifact_type: args.artifact_type,
                relevance: args.relevance,
                excerpt: args.excerpt,
            };
            pathway::run_record(cfg, &record, progress).await?;
        }
        Commands::Insert { target } => match target {
            InsertTarget::Pathway {
                country,
                pathway_type,
                name,
                inactive,
                verified_date,
                fields,
            } => {
                let new = NewPathway {
                    country,
                    pathway_type,
                    name,
                    fields: fields.into(),
                    is_active: !inactive,
                    last_verified_date: verified_date,
                };
                pathway::run_insert_pathway(cfg, &new, progress).await?;
            }
            InsertTarget::Source {
                url,
                title,
                source_type,
                credibility,
                description,
                language,
                country,
                pathway_type,
                notes,
                verified_date,
            } => {
                let source = NewSource {
                    description,
                    language,
                    country,
                    pathway_type,
                    notes,
                    last_verified_date: verified_date,
                    ..NewSource::new(&url, &title, source_type, credibility)
                };
                sources::run_insert_source(cfg, &source, progress).await?;
            }
            InsertTarget::LegalRef {
                country,
                reference_number,
                title,
                url,
                reference_type,
                enactment_date,
                effective_date,
                expiry_date,
                summary,
                full_text_path,
                language,
            } => {
                let legal_ref = NewLegalRef {
                    country,
                    reference_number,
                    title,
                    official_url: url,
                    reference_type,
                    enactment_date,
                    effective_date,
                    expiry_date,
                    summary,
                    full_text_path,
                    language,
                };
                legal::run_insert_legal_ref(cfg, &legal_ref, progress).await?;
            }
            InsertTarget::Link {
                pathway_id,
                source_id,
                relevance,
                excerpt,
                page_number,
                notes,
            } => {
                let link = NewLink {
                    relevance,
                    excerpt,
                    page_number,
                    notes,
                    ..NewLink::new(pathway_id, source_id)
                };
                pathway::run_link(cfg, &link, progress).await?;
            }
        },
        Commands::Query { target } => match target {
            QueryTarget::Countries => query::run_countries(cfg).await?,
            QueryTarget::Pathways {
                country,
                pathway_type,
                active_only,
            } => {
                let filter = PathwayFilter {
                    country,
                    pathway_type,
                    active_only,
                };
                query::run_pathways(cfg, &filter).await?;
            }
            QueryTarget::Sources {
                country,
                credibility,
                source_type,
                active_only,
            } => {
                let filter = SourceFilter {
                    country,
                    credibility,
                    source_type,
                    active_only,
                };
                query::run_sources(cfg, &filter).await?;
            }
            QueryTarget::AuditTrail { job_id } => query::run_audit_trail(cfg, job_id).await?,
            QueryTarget::Artifacts {
                country,
                artifact_type,
                extraction_status,
            } => {
                let filter = ArtifactFilter {
                    country,
                    artifact_type,
                    extraction_status,
                };
                query::run_artifacts(cfg, &filter).await?;
            }
            QueryTarget::LegalRefs { country } => {
                query::run_legal_refs(cfg, country.as_deref()).await?
            }
        },
        Commands::Export { target } => match target {
            ExportTarget::Pathway {
                country,
                pathway_type,
                output,
                overwrite,
                format,
            } => {
                export::run_export_pathway(
                    cfg,
                    &country,
                    &pathway_type,
                    output.as_deref(),
                    overwrite,
                    format,
                    progress,
                )
                .await?;
            }
            ExportTarget::Country { country, overwrite } => {
                export::run_export_country(cfg, &country, overwrite, progress).await?;
            }
            ExportTarget::All { overwrite } => {
                export::run_export_all(cfg, overwrite, progress).await?;
            }
        },
        Commands::Stats => stats::run_stats(cfg).await?,
        Commands::Completions { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}

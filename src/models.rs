//! Core data models used throughout the ledger.
//!
//! Every string-keyed column with a closed value set (statuses, action
//! types, source and artifact types) is represented by an enum here. The
//! enums are parsed at the CLI boundary through `clap::ValueEnum` and when
//! decoding rows through [`FromStr`], so an unknown value is rejected
//! rather than stored.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{LedgerError, Result};

/// Declare a closed enum whose variants map one-to-one to the text stored
/// in SQLite.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                #[value(name = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Accepted values, comma separated.
            pub fn expected() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(LedgerError::InvalidInput(format!(
                        "unknown {} '{}' (expected one of: {})",
                        stringify!($name),
                        other,
                        $name::expected()
                    ))),
                }
            }
        }
    };
}

text_enum! {
    /// Lifecycle state of a research job.
    JobStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Aborted => "aborted",
    }
}

text_enum! {
    /// Terminal states a running job can be closed with.
    JobOutcome {
        Completed => "completed",
        Failed => "failed",
        Aborted => "aborted",
    }
}

impl From<JobOutcome> for JobStatus {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed => JobStatus::Completed,
            JobOutcome::Failed => JobStatus::Failed,
            JobOutcome::Aborted => JobStatus::Aborted,
        }
    }
}

text_enum! {
    /// A recorded web action.
    ActionType {
        Search => "search",
        Fetch => "fetch",
        Navigate => "navigate",
        Click => "click",
        Extract => "extract",
        Screenshot => "screenshot",
        Download => "download",
    }
}

text_enum! {
    /// Outcome of a recorded web action.
    TrailStatus {
        Success => "success",
        Error => "error",
        Timeout => "timeout",
        Skipped => "skipped",
    }
}

text_enum! {
    SourceType {
        OfficialGovernment => "official_government",
        Embassy => "embassy",
        LegalDatabase => "legal_database",
        LicensedLawyer => "licensed_lawyer",
        News => "news",
        Community => "community",
        Other => "other",
    }
}

text_enum! {
    ArtifactType {
        Pdf => "pdf",
        Html => "html",
        Screenshot => "screenshot",
        Zip => "zip",
        Doc => "doc",
        Docx => "docx",
        ExtractedText => "extracted_text",
        ExtractedTable => "extracted_table",
        ExtractedList => "extracted_list",
    }
}

text_enum! {
    ExtractionStatus {
        Pending => "pending",
        Extracted => "extracted",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// A 1–5 score, used for source credibility and link relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: Rating = Rating(1);
    pub const MID: Rating = Rating(3);
    pub const MAX: Rating = Rating(5);

    pub fn new(value: i64) -> Result<Self> {
        if (1..=5).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(LedgerError::InvalidInput(format!(
                "rating must be between 1 and 5, got {}",
                value
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// `⭐` repeated once per point.
    pub fn stars(self) -> String {
        "⭐".repeat(self.0 as usize)
    }
}

impl Default for Rating {
    fn default() -> Self {
        Rating::MID
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Rating {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| LedgerError::InvalidInput(format!("rating must be a number, got '{}'", s)))?;
        Rating::new(value)
    }
}

impl From<Rating> for i64 {
    fn from(rating: Rating) -> Self {
        rating.0 as i64
    }
}

/// Seeded reference row for a country.
#[derive(Debug, Clone, Serialize)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub is_eu_member: bool,
    pub is_schengen: bool,
    pub capital: Option<String>,
    pub official_language: Option<String>,
    pub currency: Option<String>,
    pub immigration_website: Option<String>,
}

/// One research session and its running counters.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub task_description: String,
    pub country: Option<String>,
    pub pathway_type: Option<String>,
    pub llm_model: Option<String>,
    pub status: JobStatus,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub pages_visited: i64,
    pub sources_found: i64,
    pub artifacts_downloaded: i64,
    pub error_count: i64,
    pub session_notes: Option<String>,
    pub error_summary: Option<String>,
}

/// The descriptive part of a pathway. Every field the caller leaves unset
/// is stored as NULL; nothing is defaulted to zero or an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathwayFields {
    pub official_name: Option<String>,
    pub description: Option<String>,
    pub legal_basis: Option<String>,
    pub min_income_eur: Option<i64>,
    pub min_investment_eur: Option<i64>,
    pub education_requirement: Option<String>,
    pub language_requirement: Option<String>,
    pub age_restrictions: Option<String>,
    pub required_documents: Option<String>,
    pub application_process: Option<String>,
    pub processing_time_days: Option<i64>,
    pub application_fee_eur: Option<f64>,
    pub initial_duration_months: Option<i64>,
    pub renewable: bool,
    pub max_renewals: Option<i64>,
    pub total_max_duration_months: Option<i64>,
    pub path_to_permanent_residency: Option<String>,
    pub path_to_citizenship: Option<String>,
    pub min_years_to_citizenship: Option<i64>,
    pub work_rights: Option<String>,
    pub family_inclusion: Option<String>,
    pub travel_rights: Option<String>,
    pub restrictions: Option<String>,
    pub tax_implications: Option<String>,
    pub policy_changes: Option<String>,
}

/// A stored pathway joined with its country name.
#[derive(Debug, Clone, Serialize)]
pub struct Pathway {
    pub id: i64,
    pub country_id: i64,
    pub country_name: String,
    pub country_code: String,
    pub pathway_type: String,
    pub name: String,
    #[serde(flatten)]
    pub fields: PathwayFields,
    pub is_active: bool,
    pub last_verified_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A source as cited by a pathway, with the link's relevance and excerpt.
#[derive(Debug, Clone, Serialize)]
pub struct CitedSource {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub source_type: SourceType,
    pub credibility: Rating,
    pub relevance_score: Rating,
    pub excerpt: Option<String>,
    pub last_verified_date: Option<String>,
}

/// Current time as an RFC 3339 UTC timestamp.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Today's UTC date as `YYYY-MM-DD`.
pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(1).unwrap(), Rating::MIN);
        assert_eq!(Rating::new(5).unwrap(), Rating::MAX);
        assert_eq!("4".parse::<Rating>().unwrap().get(), 4);
        assert!("four".parse::<Rating>().is_err());
    }

    #[test]
    fn rating_defaults_to_mid_scale() {
        assert_eq!(Rating::default().get(), 3);
        assert_eq!(Rating::MAX.stars(), "⭐⭐⭐⭐⭐");
    }

    #[test]
    fn enum_text_is_stable() {
        for source_type in SourceType::ALL {
            let parsed: SourceType = source_type.as_str().parse().unwrap();
            assert_eq!(parsed, *source_type);
        }
        assert_eq!(SourceType::OfficialGovernment.as_str(), "official_government");
        assert_eq!(ArtifactType::ExtractedText.to_string(), "extracted_text");
    }

    #[test]
    fn unknown_enum_text_is_rejected() {
        let err = "crawl".parse::<ActionType>().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        let message = err.to_string();
        assert!(message.contains("'crawl'"));
        assert!(message.contains("search, fetch"));
        assert!("RUNNING".parse::<JobStatus>().is_err());
    }

    #[test]
    fn outcome_maps_to_terminal_status() {
        assert_eq!(JobStatus::from(JobOutcome::Completed), JobStatus::Completed);
        assert_eq!(JobStatus::from(JobOutcome::Aborted), JobStatus::Aborted);
    }
}

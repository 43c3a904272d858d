//! Export pathways as markdown (or JSON) files.
//!
//! The database is authoritative; exported files are a derived view and can
//! be regenerated at any time. Rendering only depends on stored rows (the
//! "Last Updated" line is the row's `updated_at`, not the wall clock), so the
//! same database state always produces byte-identical files.
//!
//! Layout under the vault directory:
//!
//! ```text
//! Countries/<Country>/README.md
//! Countries/<Country>/<Pathway_Name>.md
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::models::{CitedSource, Country, Pathway, Rating};
use crate::pathway::{self, PathwayFilter};
use crate::progress::{format_number, ProgressReporter, WriteEvent};
use crate::query;
use crate::sources::{self, SourceFilter, SourceRecord};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Markdown,
    Json,
}

/// Files written (and left alone) by a country export.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

#[derive(Serialize)]
struct PathwayExport<'a> {
    pathway: &'a Pathway,
    sources: &'a [CitedSource],
}

/// Emoji flag for a two-letter ISO code: `IT` → 🇮🇹.
pub fn flag(code: &str) -> String {
    let code = code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return String::new();
    }
    code.to_ascii_uppercase()
        .chars()
        .filter_map(|c| char::from_u32(0x1F1E6 + (c as u32 - 'A' as u32)))
        .collect()
}

fn flagged(code: &str, name: &str) -> String {
    match flag(code) {
        f if f.is_empty() => name.to_string(),
        f => format!("{} {}", f, name),
    }
}

/// `Digital Nomad Visa` → `Digital_Nomad_Visa.md`.
pub fn pathway_file_name(name: &str) -> String {
    format!("{}.md", name.replace(['/', ' '], "_"))
}

/// File names for the pathways of one country, in order. Pathways whose
/// names map to the same file get their type appended.
pub fn pathway_file_names(pathways: &[Pathway]) -> Vec<String> {
    let base: Vec<String> = pathways.iter().map(|p| pathway_file_name(&p.name)).collect();
    pathways
        .iter()
        .zip(&base)
        .map(|(p, name)| {
            if base.iter().filter(|b| *b == name).count() > 1 {
                pathway_file_name(&format!("{} {}", p.name, p.pathway_type))
            } else {
                name.clone()
            }
        })
        .collect()
}

fn tag(text: &str, sep: char) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '_' { sep } else { c })
        .collect()
}

fn euros(amount: i64) -> String {
    format!("€{}", format_number(amount))
}

fn euros_f(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("€{}", format_number(amount as i64))
    } else {
        format!("€{:.2}", amount)
    }
}

/// Accumulates markdown lines.
#[derive(Default)]
struct Doc {
    lines: Vec<String>,
}

impl Doc {
    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn rule(&mut self) {
        self.line("---");
        self.blank();
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Render one pathway and the sources it cites.
pub fn render_pathway(p: &Pathway, sources: &[CitedSource]) -> String {
    let f = &p.fields;
    let mut md = Doc::default();

    md.line(format!("# {}", p.name));
    md.blank();
    md.line(format!("**Country**: {}", flagged(&p.country_code, &p.country_name)));
    md.line(format!("**Type**: {}", p.pathway_type));
    md.line(format!(
        "**Status**: {}",
        if p.is_active { "✅ Active" } else { "❌ Inactive" }
    ));
    if let Some(official) = &f.official_name {
        md.line(format!("**Official Name**: {}", official));
    }
    md.line(format!("**Last Updated**: {}", date_part(&p.updated_at)));
    md.line(format!("**Generated from Database**: Pathway ID {}", p.id));
    md.blank();
    md.rule();

    md.line("## Overview");
    md.blank();
    if let Some(description) = &f.description {
        md.line(description.as_str());
        md.blank();
    }
    if let Some(basis) = &f.legal_basis {
        md.line(format!("**Legal Basis**: {}", basis));
        md.blank();
    }
    md.rule();

    md.line("## Requirements");
    md.blank();
    if let Some(income) = f.min_income_eur {
        md.line("### Financial");
        md.line(format!("- **Minimum Income**: {}/year", euros(income)));
        md.blank();
    }
    if let Some(investment) = f.min_investment_eur {
        md.line("### Investment");
        md.line(format!("- **Minimum Investment**: {}", euros(investment)));
        md.blank();
    }
    for (heading, value) in [
        ("Education", &f.education_requirement),
        ("Language", &f.language_requirement),
        ("Age", &f.age_restrictions),
    ] {
        if let Some(value) = value {
            md.line(format!("### {}", heading));
            md.line(format!("- {}", value));
            md.blank();
        }
    }
    if let Some(documents) = &f.required_documents {
        md.line("### Required Documents");
        md.line(documents.as_str());
        md.blank();
    }
    md.rule();

    if f.application_process.is_some()
        || f.processing_time_days.is_some()
        || f.application_fee_eur.is_some()
    {
        md.line("## Application Process");
        md.blank();
        if let Some(process) = &f.application_process {
            md.line(process.as_str());
            md.blank();
        }
        if let Some(days) = f.processing_time_days {
            md.line(format!("**Processing Time**: {} days", days));
            md.blank();
        }
        if let Some(fee) = f.application_fee_eur {
            md.line(format!("**Application Fee**: {}", euros_f(fee)));
            md.blank();
        }
        md.rule();
    }

    md.line("## Duration & Renewal");
    md.blank();
    if let Some(months) = f.initial_duration_months {
        let years = months / 12;
        md.line(format!(
            "- **Initial Duration**: {} months ({} year{})",
            months,
            years,
            if years == 1 { "" } else { "s" }
        ));
    }
    if f.renewable {
        md.line("- **Renewable**: Yes");
        if let Some(max) = f.max_renewals {
            md.line(format!("- **Max Renewals**: {}", max));
        }
        if let Some(total) = f.total_max_duration_months {
            md.line(format!("- **Total Max Duration**: {} months", total));
        }
    } else {
        md.line("- **Renewable**: No");
    }
    md.blank();
    if let Some(pr) = &f.path_to_permanent_residency {
        md.line(format!("**Path to Permanent Residency**: {}", pr));
        md.blank();
    }
    if let Some(citizenship) = &f.path_to_citizenship {
        md.line(format!("**Path to Citizenship**: {}", citizenship));
        if let Some(years) = f.min_years_to_citizenship {
            md.line(format!("- Typically {} years", years));
        }
        md.blank();
    }
    md.rule();

    md.line("## Rights & Restrictions");
    md.blank();
    for (heading, value) in [
        ("Work Rights", &f.work_rights),
        ("Family", &f.family_inclusion),
        ("Travel", &f.travel_rights),
        ("Restrictions", &f.restrictions),
    ] {
        if let Some(value) = value {
            md.line(format!("### {}", heading));
            md.line(value.as_str());
            md.blank();
        }
    }
    md.rule();

    if let Some(tax) = &f.tax_implications {
        md.line("## Tax Implications");
        md.blank();
        md.line(tax.as_str());
        md.blank();
        md.rule();
    }

    if let Some(changes) = &f.policy_changes {
        md.line("## Policy Changes");
        md.blank();
        md.line(changes.as_str());
        md.blank();
        md.rule();
    }

    if !sources.is_empty() {
        md.line("## Sources");
        md.blank();
        for (i, s) in sources.iter().enumerate() {
            md.line(format!("{}. **{}**", i + 1, s.title));
            md.line(format!("   - URL: {}", s.url));
            md.line(format!("   - Type: {}", s.source_type));
            md.line(format!(
                "   - Credibility: {} ({}/5)",
                s.credibility.stars(),
                s.credibility
            ));
            md.line(format!("   - Relevance: {}/5", s.relevance_score));
            if let Some(excerpt) = &s.excerpt {
                md.line(format!("   - Excerpt: \"{}\"", excerpt));
            }
            md.blank();
        }
        md.rule();
    }

    md.line("## Metadata");
    md.blank();
    md.line(format!("- **Database ID**: {}", p.id));
    md.line(format!(
        "- **Last Verified**: {}",
        p.last_verified_date.as_deref().unwrap_or("N/A")
    ));
    md.line(format!("- **Created**: {}", p.created_at));
    md.line(format!("- **Updated**: {}", p.updated_at));
    md.blank();
    md.rule();

    md.line(format!(
        "**Tags**: #{} #{} #residency #visa",
        tag(&p.country_name, '-'),
        tag(&p.pathway_type, '-')
    ));

    md.finish()
}

fn date_part(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

/// Render a country's README: facts, pathway list, comparison table and
/// every source tagged with the country, grouped by credibility.
pub fn render_country_index(
    country: &Country,
    pathways: &[Pathway],
    sources: &[SourceRecord],
) -> String {
    let mut md = Doc::default();
    let yes_no = |b: bool| if b { "✅ Yes" } else { "❌ No" };
    let last_updated = pathways
        .iter()
        .map(|p| date_part(&p.updated_at))
        .max()
        .unwrap_or("N/A");

    md.line(format!(
        "# {} - Residency & Citizenship Pathways",
        flagged(&country.code, &country.name)
    ));
    md.blank();
    md.line(format!("**EU Member**: {}", yes_no(country.is_eu_member)));
    md.line(format!("**Schengen**: {}", yes_no(country.is_schengen)));
    md.line(format!("**Capital**: {}", country.capital.as_deref().unwrap_or("N/A")));
    md.line(format!(
        "**Language**: {}",
        country.official_language.as_deref().unwrap_or("N/A")
    ));
    md.line(format!("**Currency**: {}", country.currency.as_deref().unwrap_or("N/A")));
    if let Some(site) = &country.immigration_website {
        md.line(format!("**Immigration Portal**: {}", site));
    }
    md.line(format!("**Last Updated**: {}", last_updated));
    md.blank();
    md.rule();

    md.line(format!("## Residency Pathways ({} documented)", pathways.len()));
    md.blank();
    for (p, file_name) in pathways.iter().zip(pathway_file_names(pathways)) {
        md.line(format!("### [{}]({})", p.name, file_name));
        md.line(format!("- **Type**: {}", p.pathway_type));
        md.line(format!(
            "- **Status**: {}",
            if p.is_active { "✅ Active" } else { "❌ Inactive" }
        ));
        if let Some(income) = p.fields.min_income_eur {
            md.line(format!("- **Min Income**: {}/year", euros(income)));
        }
        if let Some(investment) = p.fields.min_investment_eur {
            md.line(format!("- **Min Investment**: {}", euros(investment)));
        }
        if let Some(months) = p.fields.initial_duration_months {
            md.line(format!("- **Duration**: {} months", months));
        }
        md.blank();
    }
    md.rule();

    md.line("## Quick Comparison");
    md.blank();
    md.line("| Pathway | Min Income/Investment | Duration | Renewable |");
    md.line("|---------|----------------------|----------|-----------|");
    for p in pathways {
        let amount = match (p.fields.min_income_eur, p.fields.min_investment_eur) {
            (Some(income), _) => format!("{}/yr", euros(income)),
            (None, Some(investment)) => euros(investment),
            (None, None) => String::new(),
        };
        let duration = p
            .fields
            .initial_duration_months
            .map(|m| format!("{} mo", m))
            .unwrap_or_else(|| "N/A".to_string());
        md.line(format!(
            "| {} | {} | {} | {} |",
            p.name,
            amount,
            duration,
            if p.fields.renewable { "✅" } else { "❌" }
        ));
    }
    md.blank();
    md.rule();

    if !sources.is_empty() {
        let mut by_credibility: BTreeMap<Rating, Vec<&SourceRecord>> = BTreeMap::new();
        for s in sources {
            by_credibility.entry(s.credibility).or_default().push(s);
        }

        md.line("## All Sources");
        md.blank();
        for (credibility, group) in by_credibility.iter().rev() {
            md.line(format!(
                "### {} ({}/5) - {} source(s)",
                credibility.stars(),
                credibility,
                group.len()
            ));
            md.blank();
            for s in group {
                md.line(format!("- **{}**", s.title));
                md.line(format!("  - URL: {}", s.url));
                md.line(format!("  - Type: {}", s.source_type));
                if let Some(verified) = &s.last_verified_date {
                    md.line(format!("  - Last Verified: {}", verified));
                }
                md.blank();
            }
        }
        md.rule();
    }

    md.line(format!("**Generated from Database** - Country ID: {}", country.id));
    md.line(format!("**Tags**: #{} #overview #index", tag(&country.name, '-')));

    md.finish()
}

/// Render a pathway in the requested format.
pub fn render(format: ExportFormat, p: &Pathway, sources: &[CitedSource]) -> Result<String> {
    match format {
        ExportFormat::Markdown => Ok(render_pathway(p, sources)),
        ExportFormat::Json => {
            let mut json = serde_json::to_string_pretty(&PathwayExport { pathway: p, sources })?;
            json.push('\n');
            Ok(json)
        }
    }
}

fn country_dir(vault_dir: &Path, country: &str) -> PathBuf {
    vault_dir.join("Countries").join(country)
}

/// Write `content` to `path`, creating parent directories. An existing file
/// is only replaced with `overwrite`.
fn write_file(path: &Path, content: &str, overwrite: bool) -> Result<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Most recent row per pathway type, ordered by type.
async fn latest_per_type(pool: &SqlitePool, country: &str) -> Result<Vec<Pathway>> {
    let filter = PathwayFilter {
        country: Some(country.to_string()),
        ..PathwayFilter::default()
    };
    let mut latest: Vec<Pathway> = Vec::new();
    for p in pathway::list_pathways(pool, &filter).await? {
        if latest.last().map(|l| l.pathway_type != p.pathway_type).unwrap_or(true) {
            latest.push(p);
        }
    }
    Ok(latest)
}

/// Export every pathway of a country plus its README index.
pub async fn export_country(
    pool: &SqlitePool,
    vault_dir: &Path,
    country: &str,
    overwrite: bool,
) -> Result<ExportReport> {
    let country = query::get_country(pool, country).await?;
    let pathways = latest_per_type(pool, &country.name).await?;
    if pathways.is_empty() {
        bail!("No pathways found for {}", country.name);
    }

    let dir = country_dir(vault_dir, &country.name);
    let mut report = ExportReport::default();

    for (p, file_name) in pathways.iter().zip(pathway_file_names(&pathways)) {
        let cited = pathway::cited_sources(pool, p.id).await?;
        let path = dir.join(file_name);
        if write_file(&path, &render_pathway(p, &cited), overwrite)? {
            report.written.push(path);
        } else {
            tracing::warn!(path = %path.display(), "file exists, use --overwrite to replace");
            report.skipped.push(path);
        }
    }

    let filter = SourceFilter {
        country: Some(country.name.clone()),
        ..SourceFilter::default()
    };
    let country_sources = sources::list_sources(pool, &filter).await?;
    let index = render_country_index(&country, &pathways, &country_sources);
    let index_path = dir.join("README.md");
    if write_file(&index_path, &index, overwrite)? {
        report.written.push(index_path);
    } else {
        tracing::warn!(path = %index_path.display(), "index exists, use --overwrite to replace");
        report.skipped.push(index_path);
    }

    Ok(report)
}

/// Countries with at least one recorded pathway.
async fn countries_with_pathways(pool: &SqlitePool) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT c.name FROM countries c \
         JOIN residency_pathways p ON p.country_id = c.id ORDER BY c.name",
    )
    .fetch_all(pool)
    .await?;
    Ok(names)
}

// ============ CLI ============

/// `export pathway`: prints the written path on stdout, or the JSON document
/// itself when `--format json` is given without `--output`.
pub async fn run_export_pathway(
    config: &Config,
    country: &str,
    pathway_type: &str,
    output: Option<&Path>,
    overwrite: bool,
    format: ExportFormat,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let pool = db::open(config).await?;
    let result = load_pathway(&pool, country, pathway_type).await;
    pool.close().await;
    let (p, cited, file_name) = result?;

    let content = render(format, &p, &cited)?;

    let path = match (output, format) {
        (Some(path), _) => path.to_path_buf(),
        (None, ExportFormat::Json) => {
            print!("{}", content);
            return Ok(());
        }
        (None, ExportFormat::Markdown) => {
            country_dir(&config.export.vault_dir, &p.country_name).join(file_name)
        }
    };

    if !write_file(&path, &content, overwrite)? {
        bail!("File exists: {} (use --overwrite to replace)", path.display());
    }

    progress.report(WriteEvent::Done {
        message: format!(
            "Exported {} ({})\n   Path: {}\n   Size: {} bytes\n   Sources: {}",
            p.name,
            p.country_name,
            path.display(),
            format_number(content.len() as i64),
            cited.len()
        ),
    });
    println!("{}", path.display());
    Ok(())
}

/// The latest pathway of a type, its sources, and the vault file name it
/// shares with the country export.
async fn load_pathway(
    pool: &SqlitePool,
    country: &str,
    pathway_type: &str,
) -> Result<(Pathway, Vec<CitedSource>, String)> {
    let p = pathway::latest_pathway(pool, country, pathway_type).await?;
    let cited = pathway::cited_sources(pool, p.id).await?;
    let siblings = latest_per_type(pool, &p.country_name).await?;
    let file_name = siblings
        .iter()
        .zip(pathway_file_names(&siblings))
        .find(|(s, _)| s.id == p.id)
        .map(|(_, name)| name)
        .unwrap_or_else(|| pathway_file_name(&p.name));
    Ok((p, cited, file_name))
}

/// `export country`: prints every written path on stdout.
pub async fn run_export_country(
    config: &Config,
    country: &str,
    overwrite: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let pool = db::open(config).await?;
    let result = export_country(&pool, &config.export.vault_dir, country, overwrite).await;
    pool.close().await;
    let report = result?;

    print_report(country, &report, progress);
    Ok(())
}

/// `export all`: country export for every country with pathways.
pub async fn run_export_all(
    config: &Config,
    overwrite: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let pool = db::open(config).await?;
    let result = export_all(&pool, &config.export.vault_dir, overwrite, progress).await;
    pool.close().await;
    result
}

async fn export_all(
    pool: &SqlitePool,
    vault_dir: &Path,
    overwrite: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let countries = countries_with_pathways(pool).await?;
    for country in &countries {
        let report = export_country(pool, vault_dir, country, overwrite).await?;
        print_report(country, &report, progress);
    }
    progress.report(WriteEvent::Done {
        message: format!("Export complete ({} countries)", countries.len()),
    });
    Ok(())
}

fn print_report(country: &str, report: &ExportReport, progress: &dyn ProgressReporter) {
    for path in &report.written {
        println!("{}", path.display());
    }
    let mut message = format!("Exported {} file(s) for {}", report.written.len(), country);
    if !report.skipped.is_empty() {
        message.push_str(&format!(
            "\n   Skipped {} existing file(s), use --overwrite to replace",
            report.skipped.len()
        ));
    }
    progress.report(WriteEvent::Done { message });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PathwayFields, SourceType};

    fn italy_nomad() -> Pathway {
        Pathway {
            id: 7,
            country_id: 1,
            country_name: "Italy".into(),
            country_code: "IT".into(),
            pathway_type: "digital_nomad".into(),
            name: "Digital Nomad Visa".into(),
            fields: PathwayFields {
                min_income_eur: Some(24789),
                initial_duration_months: Some(12),
                renewable: true,
                application_fee_eur: Some(116.5),
                ..PathwayFields::default()
            },
            is_active: true,
            last_verified_date: Some("2025-10-25".into()),
            created_at: "2025-10-25T09:00:00Z".into(),
            updated_at: "2025-10-25T09:00:00Z".into(),
        }
    }

    fn consulate() -> CitedSource {
        CitedSource {
            id: 3,
            url: "https://example.it/visa".into(),
            title: "Italian Consulate".into(),
            source_type: SourceType::OfficialGovernment,
            credibility: Rating::MAX,
            relevance_score: Rating::MID,
            excerpt: Some("EUR 24,789".into()),
            last_verified_date: None,
        }
    }

    #[test]
    fn flag_from_iso_code() {
        assert_eq!(flag("IT"), "🇮🇹");
        assert_eq!(flag("cz"), "🇨🇿");
        assert_eq!(flag("ITA"), "");
    }

    #[test]
    fn file_name_replaces_spaces_and_slashes() {
        assert_eq!(pathway_file_name("Digital Nomad Visa"), "Digital_Nomad_Visa.md");
        assert_eq!(pathway_file_name("EU Blue Card/Highly Skilled"), "EU_Blue_Card_Highly_Skilled.md");
    }

    #[test]
    fn shared_names_get_the_type_appended() {
        let nomad = italy_nomad();
        let mut remote = italy_nomad();
        remote.id = 8;
        remote.pathway_type = "remote_work".into();
        let mut elective = italy_nomad();
        elective.id = 9;
        elective.name = "Elective Residence".into();
        elective.pathway_type = "passive_income".into();

        assert_eq!(
            pathway_file_names(&[nomad, remote, elective]),
            vec![
                "Digital_Nomad_Visa_digital_nomad.md",
                "Digital_Nomad_Visa_remote_work.md",
                "Elective_Residence.md",
            ]
        );
    }

    #[test]
    fn pathway_markdown_sections() {
        let md = render_pathway(&italy_nomad(), &[consulate()]);
        assert!(md.starts_with("# Digital Nomad Visa\n"));
        assert!(md.contains("**Country**: 🇮🇹 Italy"));
        assert!(md.contains("**Last Updated**: 2025-10-25"));
        assert!(md.contains("- **Minimum Income**: €24,789/year"));
        assert!(md.contains("**Application Fee**: €116.50"));
        assert!(md.contains("- **Initial Duration**: 12 months (1 year)"));
        assert!(md.contains("- **Renewable**: Yes"));
        assert!(md.contains("1. **Italian Consulate**"));
        assert!(md.contains("   - Credibility: ⭐⭐⭐⭐⭐ (5/5)"));
        assert!(md.contains("#italy #digital-nomad #residency #visa"));
        assert!(!md.contains("## Tax Implications"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let p = italy_nomad();
        let sources = [consulate()];
        assert_eq!(render_pathway(&p, &sources), render_pathway(&p, &sources));
    }

    #[test]
    fn json_export_flattens_fields() {
        let json = render(ExportFormat::Json, &italy_nomad(), &[consulate()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["pathway"]["min_income_eur"], 24789);
        assert_eq!(value["sources"][0]["source_type"], "official_government");
        assert_eq!(value["sources"][0]["credibility"], 5);
    }

    #[test]
    fn country_index_groups_sources_by_credibility() {
        let country = Country {
            id: 1,
            name: "Italy".into(),
            code: "IT".into(),
            is_eu_member: true,
            is_schengen: true,
            capital: Some("Rome".into()),
            official_language: Some("Italian".into()),
            currency: Some("EUR".into()),
            immigration_website: None,
        };
        let source = |id: i64, credibility: Rating| SourceRecord {
            id,
            url: format!("https://example.it/{}", id),
            title: format!("Source {}", id),
            source_type: SourceType::News,
            credibility,
            country: Some("Italy".into()),
            pathway_type: None,
            is_active: true,
            last_verified_date: None,
        };
        let md = render_country_index(
            &country,
            &[italy_nomad()],
            &[source(1, Rating::MID), source(2, Rating::MAX)],
        );
        let five = md.find("### ⭐⭐⭐⭐⭐ (5/5) - 1 source(s)").unwrap();
        let three = md.find("### ⭐⭐⭐ (3/5) - 1 source(s)").unwrap();
        assert!(five < three);
        assert!(md.contains("| Digital Nomad Visa | €24,789/yr | 12 mo | ✅ |"));
        assert!(md.contains("### [Digital Nomad Visa](Digital_Nomad_Visa.md)"));
    }
}

//! # Residency Ledger
//!
//! A SQLite ledger for immigration-pathway research.
//!
//! A research session (a *job*) records every action it takes in an
//! append-only audit trail. Pages worth citing become *sources*, which are
//! deduplicated by URL, and downloaded files become *artifacts*, which are
//! deduplicated by SHA-256. The researched *pathways* link back to their
//! sources and can be exported to a markdown vault at any time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────┐
//! │ rledger CLI  │──▶│ jobs / audit /   │──▶│  SQLite  │
//! │ (one process │   │ sources /        │   │  (WAL)   │
//! │  per action) │   │ artifacts /      │   └────┬─────┘
//! └──────────────┘   │ pathway writer   │        │
//!                    └──────────────────┘        ▼
//!                                        ┌──────────────┐
//!                                        │ query/export │
//!                                        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rledger init
//! job=$(rledger job start --task "Italy digital nomad visa" --country Italy)
//! rledger pathway add --job-id "$job" --country Italy ...
//! rledger job finish "$job"
//! rledger export all
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and seed countries |
//! | [`error`] | Typed error taxonomy |
//! | [`models`] | Core data types and closed enums |
//! | [`jobs`] | Job tracker |
//! | [`audit`] | Audit trail logging |
//! | [`sources`] | Source registry (dedup by URL) |
//! | [`artifacts`] | Artifact registry (dedup by SHA-256) |
//! | [`pathway`] | Atomic pathway writer, plain inserts and links |
//! | [`legal`] | Legal references |
//! | [`query`] | Tabular listings |
//! | [`export`] | Markdown and JSON export |
//! | [`stats`] | Database overview |
//! | [`progress`] | Progress reporting on stderr |

pub mod artifacts;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod jobs;
pub mod legal;
pub mod migrate;
pub mod models;
pub mod pathway;
pub mod progress;
pub mod query;
pub mod sources;
pub mod stats;

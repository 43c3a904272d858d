//! Progress reporting for write commands.
//!
//! Every write command reports what it did, step by step, on **stderr** so
//! that stdout carries nothing but the id of the row it produced
//! (`id=$(rledger job start …)`).

use std::io::Write;

use serde_json::json;

/// A single step of a write command.
#[derive(Clone, Debug)]
pub enum WriteEvent {
    /// A transaction has been opened.
    Begin,
    /// A source was looked up by URL; `created` is false when an existing
    /// row was reused.
    Source { id: i64, created: bool },
    /// An audit trail entry was appended.
    Trail { id: i64 },
    /// An artifact was looked up by content hash.
    Artifact { id: i64, created: bool },
    /// An artifact path was supplied but nothing exists there.
    ArtifactMissing { path: String },
    /// A pathway row was inserted.
    Pathway { id: i64 },
    /// A pathway was linked to a source.
    Link { pathway_id: i64, source_id: i64 },
    /// The transaction committed.
    Committed,
    /// The transaction was rolled back.
    RolledBack { error: String },
    /// A one-line summary for commands that are not multi-step.
    Done { message: String },
}

/// Reports write progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: WriteEvent);
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: WriteEvent) {
        let line = match &event {
            WriteEvent::Begin => "🔄 Starting transaction...".to_string(),
            WriteEvent::Source { id, created: true } => {
                format!("📚 Created new source (ID: {})", id)
            }
            WriteEvent::Source { id, created: false } => {
                format!("📚 Found existing source (ID: {})", id)
            }
            WriteEvent::Trail { id } => format!("📝 Logged to audit trail (ID: {})", id),
            WriteEvent::Artifact { id, created: true } => {
                format!("📦 Registered artifact (ID: {})", id)
            }
            WriteEvent::Artifact { id, created: false } => {
                format!("📦 Found existing artifact (ID: {})", id)
            }
            WriteEvent::ArtifactMissing { path } => {
                format!("⚠️  Artifact file not found, skipped: {}", path)
            }
            WriteEvent::Pathway { id } => format!("🛂 Inserted pathway (ID: {})", id),
            WriteEvent::Link {
                pathway_id,
                source_id,
            } => format!("🔗 Linked pathway {} to source {}", pathway_id, source_id),
            WriteEvent::Committed => "✅ Transaction complete".to_string(),
            WriteEvent::RolledBack { error } => {
                format!("❌ Transaction failed, rolled back\n   Error: {}", error)
            }
            WriteEvent::Done { message } => format!("✅ {}", message),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", line);
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: WriteEvent) {
        let obj = match &event {
            WriteEvent::Begin => json!({ "event": "begin" }),
            WriteEvent::Source { id, created } => {
                json!({ "event": "source", "id": id, "created": created })
            }
            WriteEvent::Trail { id } => json!({ "event": "trail", "id": id }),
            WriteEvent::Artifact { id, created } => {
                json!({ "event": "artifact", "id": id, "created": created })
            }
            WriteEvent::ArtifactMissing { path } => {
                json!({ "event": "artifact_missing", "path": path })
            }
            WriteEvent::Pathway { id } => json!({ "event": "pathway", "id": id }),
            WriteEvent::Link {
                pathway_id,
                source_id,
            } => json!({ "event": "link", "pathway_id": pathway_id, "source_id": source_id }),
            WriteEvent::Committed => json!({ "event": "commit" }),
            WriteEvent::RolledBack { error } => json!({ "event": "rollback", "error": error }),
            WriteEvent::Done { message } => json!({ "event": "done", "message": message }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: WriteEvent) {}
}

/// Collects events in memory; used by tests to assert on the step order.
#[derive(Default)]
pub struct RecordingProgress {
    events: std::sync::Mutex<Vec<WriteEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<WriteEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: WriteEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    #[default]
    Human,
    Json,
}

impl ProgressMode {
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

/// Group digits in thousands: `24789` → `24,789`.
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    if n < 0 {
        result.insert(0, '-');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(24789), "24,789");
        assert_eq!(format_number(1_234_567), "1,234,567");
        assert_eq!(format_number(-4500), "-4,500");
    }

    #[test]
    fn recording_progress_keeps_order() {
        let progress = RecordingProgress::default();
        progress.report(WriteEvent::Begin);
        progress.report(WriteEvent::Trail { id: 7 });
        progress.report(WriteEvent::Committed);
        let events = progress.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], WriteEvent::Trail { id: 7 }));
    }
}

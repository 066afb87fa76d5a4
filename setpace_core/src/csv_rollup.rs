//! Roll the session log into a CSV summary and archive it.
//!
//! The CSV is synced to disk before the log is renamed to
//! `*.wal.processed`, so a crash in between leaves both intact rather than
//! losing sessions.

use crate::session::SessionAggregator;
use crate::{Result, SessionRecord};
use std::fs::OpenOptions;
use std::path::Path;

/// One summary row per session
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    program_id: String,
    day_name: String,
    week_number: u32,
    phase_name: String,
    started_at: String,
    completed_at: Option<String>,
    duration: Option<u32>,
    xp_earned: u32,
    status: &'static str,
    sets_completed: u32,
    sets_planned: u32,
}

impl From<&SessionRecord> for CsvRow {
    fn from(session: &SessionRecord) -> Self {
        let totals = SessionAggregator::totals(&session.exercises);
        CsvRow {
            id: session.id.to_string(),
            program_id: session.program_id.clone(),
            day_name: session.day_name.clone(),
            week_number: session.week_number,
            phase_name: session.phase_name.clone(),
            started_at: session.started_at.to_rfc3339(),
            completed_at: session.completed_at.map(|t| t.to_rfc3339()),
            duration: session.total_duration_seconds,
            xp_earned: session.xp_earned,
            status: session.status.as_str(),
            sets_completed: totals.sets_completed,
            sets_planned: totals.sets_planned,
        }
    }
}

/// Append every logged session to `csv_path`, then archive the log.
///
/// Returns the number of sessions written. An empty or missing log is left
/// alone.
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let sessions = crate::wal::read_sessions(wal_path)?;
    if sessions.is_empty() {
        tracing::info!("No sessions in {:?} to roll up", wal_path);
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    // Header row only for a fresh file
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);
    for session in &sessions {
        writer.serialize(CsvRow::from(session))?;
    }
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;
    tracing::info!("Wrote {} sessions to {:?}", sessions.len(), csv_path);

    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;
    tracing::info!("Archived session log to {:?}", processed_path);

    Ok(sessions.len())
}

/// Delete archived `*.processed` logs in `dir`
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed logs", count);
    }
    Ok(count)
}

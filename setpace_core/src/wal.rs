//! Append-only session log.
//!
//! Finished sessions are appended as JSON Lines under an exclusive lock.
//! Readers skip lines they cannot parse instead of failing.

use crate::{Result, SessionRecord};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Where finished sessions are handed off to
pub trait SessionSink {
    fn append(&mut self, session: &SessionRecord) -> Result<()>;
}

/// JSONL file sink
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionSink for JsonlSink {
    fn append(&mut self, session: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        serde_json::to_writer(&mut writer, session)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;
        tracing::debug!(
            "Appended {} session {} to {:?}",
            session.status.as_str(),
            session.id,
            self.path
        );
        Ok(())
    }
}

/// Read every parseable session from a log file
pub fn read_sessions(path: &Path) -> Result<Vec<SessionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut sessions = Vec::new();
    for (line_num, line) in BufReader::new(&file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SessionRecord>(&line) {
            Ok(session) => sessions.push(session),
            Err(e) => tracing::warn!("Skipping bad session at line {}: {}", line_num + 1, e),
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from {:?}", sessions.len(), path);
    Ok(sessions)
}

//! User training state persistence with file locking.
//!
//! Personal bests and lifetime totals live in a small JSON file next to the
//! session log. Reads take a shared lock, writes go through a locked temp
//! file that is renamed over the original.

use crate::{Error, Result, SessionRecord, SessionStatus, UserTrainingState};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

impl UserTrainingState {
    /// Load state with a shared lock.
    ///
    /// A missing file yields the default state. So does a corrupted one,
    /// after logging a warning.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No training state at {:?}, starting fresh", path);
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open state file {:?}: {}. Using defaults.", path, e);
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock state file {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        if let Err(e) = read {
            tracing::warn!("Failed to read state file {:?}: {}. Using defaults.", path, e);
            return Ok(Self::default());
        }

        match serde_json::from_str::<UserTrainingState>(&contents) {
            Ok(state) => {
                tracing::debug!(
                    "Loaded training state from {:?} ({} personal bests)",
                    path,
                    state.personal_bests.len()
                );
                Ok(state)
            }
            Err(e) => {
                tracing::warn!("Failed to parse state file {:?}: {}. Using defaults.", path, e);
                Ok(Self::default())
            }
        }
    }

    /// Atomically replace the state file
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Other(format!("state path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved training state to {:?}", path);
        Ok(())
    }

    /// Load, modify and save back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut UserTrainingState) -> Result<()>,
    {
        let mut state = Self::load(path)?;
        f(&mut state)?;
        state.save(path)?;
        Ok(state)
    }

    /// Fold a finished session into the totals and personal bests.
    ///
    /// Personal bests come from completed sets whatever the session status;
    /// XP only counts for completed and abandoned sessions.
    pub fn absorb(&mut self, session: &SessionRecord) {
        for exercise in &session.exercises {
            if let Some(weight) = exercise.best_completed_weight().filter(|w| *w > 0.0) {
                let best = self
                    .personal_bests
                    .entry(exercise.exercise_id.clone())
                    .or_insert(weight);
                if weight > *best {
                    *best = weight;
                }
            }
        }

        match session.status {
            SessionStatus::Completed => self.sessions_completed += 1,
            SessionStatus::Abandoned => self.sessions_abandoned += 1,
            SessionStatus::InProgress | SessionStatus::Paused => return,
        }
        self.lifetime_xp += u64::from(session.xp_earned);
        self.last_session_at = session.completed_at.or(Some(session.started_at));
    }
}

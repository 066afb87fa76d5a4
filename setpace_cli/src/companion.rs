//! Secondary surfaces available from a terminal.
//!
//! The detached surface is a JSON file that another program (a watch
//! bridge, a status bar widget) can follow. It receives input through a
//! sibling `.actions` file holding one JSON action per line. Deleting the
//! snapshot file closes the surface.

use setpace_core::surface::{RenderSurface, SurfaceAction, SurfaceFactory};
use setpace_core::{EnginePhase, EngineSnapshot, Error, Result};
use std::path::{Path, PathBuf};

use crate::console::format_seconds;

pub struct FileSurface {
    path: PathBuf,
    actions_path: PathBuf,
    last: Option<String>,
}

impl FileSurface {
    pub fn new(path: PathBuf) -> Self {
        let actions_path = path.with_extension("actions");
        Self {
            path,
            actions_path,
            last: None,
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        let written = match self.path.parent() {
            Some(parent) => std::fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| std::fs::write(&self.path, contents));

        written.map_err(|e| Error::Surface(format!("cannot write {:?}: {}", self.path, e)))
    }
}

impl RenderSurface for FileSurface {
    fn render(&mut self, snapshot: &EngineSnapshot) -> Result<()> {
        let contents = serde_json::to_string_pretty(snapshot)?;
        self.write(&contents)?;
        self.last = Some(contents);
        Ok(())
    }

    fn focus(&mut self) -> Result<()> {
        // Rewriting bumps the mtime that followers poll on
        match &self.last {
            Some(contents) if !self.is_closed() => self.write(contents),
            _ => Ok(()),
        }
    }

    fn take_actions(&mut self) -> Vec<SurfaceAction> {
        read_actions(&self.actions_path)
    }

    fn is_closed(&self) -> bool {
        self.last.is_some() && !self.path.exists()
    }

    fn release(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!("Companion file {:?} not removed: {}", self.path, e);
        }
        let _ = std::fs::remove_file(&self.actions_path);
    }
}

fn read_actions(path: &Path) -> Vec<SurfaceAction> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!("Could not consume {:?}: {}", path, e);
    }

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(action) => Some(action),
            Err(e) => {
                tracing::warn!("Ignoring companion action {:?}: {}", line, e);
                None
            }
        })
        .collect()
}

/// One status line per phase or set change
#[derive(Default)]
pub struct InlineOverlay {
    last_key: Option<(EnginePhase, usize, u32)>,
}

impl RenderSurface for InlineOverlay {
    fn render(&mut self, snapshot: &EngineSnapshot) -> Result<()> {
        let key = (
            snapshot.phase,
            snapshot.exercise_index,
            snapshot.timer.current_set,
        );
        if self.last_key == Some(key) {
            return Ok(());
        }
        self.last_key = Some(key);
        println!("{}", status_line(snapshot));
        Ok(())
    }
}

pub fn status_line(snapshot: &EngineSnapshot) -> String {
    let phase = match snapshot.phase {
        EnginePhase::Idle => "ready".to_string(),
        EnginePhase::SetActive => "lifting".to_string(),
        EnginePhase::Resting => format!(
            "resting {}",
            format_seconds(snapshot.timer.countdown_remaining)
        ),
        EnginePhase::Paused { .. } => "paused".to_string(),
        EnginePhase::Complete => "done".to_string(),
        EnginePhase::Abandoned => "stopped".to_string(),
    };
    format!(
        "[{} {}/{} | {} @ {} | {} | {} XP | {}/{} sets]",
        snapshot.exercise_name,
        snapshot.timer.current_set,
        snapshot.timer.total_sets,
        snapshot.target_reps,
        snapshot.weight,
        phase,
        snapshot.xp_earned,
        snapshot.sets_completed,
        snapshot.sets_planned
    )
}

/// File companion when a path was given, inline overlay otherwise
pub struct CompanionFactory {
    path: Option<PathBuf>,
}

impl CompanionFactory {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl SurfaceFactory for CompanionFactory {
    fn create_detached(&mut self) -> Option<Box<dyn RenderSurface>> {
        let path = self.path.clone()?;
        Some(Box::new(FileSurface::new(path)))
    }

    fn create_inline(&mut self) -> Box<dyn RenderSurface> {
        Box::new(InlineOverlay::default())
    }
}

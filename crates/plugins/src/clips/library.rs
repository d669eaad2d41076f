use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Local};
use shared::domain::{ActionMap, Clip, GameState};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CLIP_PATH: &str = "clips.json";
pub const DEFAULT_LEGEND_PATH: &str = "clips.txt";
pub const DEFAULT_STEPS_SAVED: usize = 100;

#[derive(Debug, Error)]
pub enum ClipStoreError {
    #[error("clip file io failed for '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("clip file '{path}' is not valid clip json")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ClipStoreError + '_ {
    move |source| ClipStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `Clip_<year><day><month><hour><minute><second><micros>`.
pub fn clip_name(now: DateTime<Local>) -> String {
    format!("Clip_{}", now.format("%Y%d%m%H%M%S%6f"))
}

/// Reads a clip file. An empty file holds no clips.
pub fn read_clips(path: &Path) -> Result<Vec<Clip>, ClipStoreError> {
    let raw = fs::read_to_string(path).map_err(io_error(path))?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|source| ClipStoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the clips as JSON and the legend as one `<index> - <name>` line per
/// clip.
pub fn write_clips(path: &Path, legend_path: &Path, clips: &[Clip]) -> Result<(), ClipStoreError> {
    let encoded = serde_json::to_string_pretty(clips).map_err(|source| ClipStoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, encoded).map_err(io_error(path))?;

    let legend: String = clips
        .iter()
        .enumerate()
        .map(|(index, clip)| format!("{index} - {}\n", clip.name))
        .collect();
    fs::write(legend_path, legend).map_err(io_error(legend_path))?;
    debug!(path = %path.display(), clips = clips.len(), "clips written");
    Ok(())
}

/// The clip set shared by the clip plugins, mirrored to disk.
pub struct ClipLibrary {
    clip_path: PathBuf,
    legend_path: PathBuf,
    clips: Mutex<Vec<Clip>>,
}

impl ClipLibrary {
    /// Opens the library, creating empty clip and legend files when missing.
    pub fn open(
        clip_path: impl Into<PathBuf>,
        legend_path: impl Into<PathBuf>,
    ) -> Result<Self, ClipStoreError> {
        let clip_path = clip_path.into();
        let legend_path = legend_path.into();
        for path in [&clip_path, &legend_path] {
            if !path.exists() {
                if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(io_error(parent))?;
                }
                fs::write(path, "").map_err(io_error(path))?;
            }
        }

        let clips = read_clips(&clip_path)?;
        info!(path = %clip_path.display(), clips = clips.len(), "clip library opened");
        Ok(Self {
            clip_path,
            legend_path,
            clips: Mutex::new(clips),
        })
    }

    pub fn clip_path(&self) -> &Path {
        &self.clip_path
    }

    pub fn legend_path(&self) -> &Path {
        &self.legend_path
    }

    pub fn clips(&self) -> Vec<Clip> {
        self.lock().clone()
    }

    pub fn get(&self, index: usize) -> Option<Clip> {
        self.lock().get(index).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().iter().map(|clip| clip.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Names and appends a new clip, then saves the whole library.
    pub fn register(
        &self,
        starting_state: GameState,
        actions: Vec<ActionMap>,
    ) -> Result<String, ClipStoreError> {
        let name = clip_name(Local::now());
        let mut clips = self.lock();
        clips.push(Clip {
            name: name.clone(),
            starting_state,
            actions,
        });
        write_clips(&self.clip_path, &self.legend_path, &clips)?;
        info!(clip = %name, "clip saved");
        Ok(name)
    }

    pub fn save(&self) -> Result<(), ClipStoreError> {
        let clips = self.lock();
        write_clips(&self.clip_path, &self.legend_path, &clips)
    }

    /// Replaces the in-memory clips with the file contents.
    pub fn reload(&self) -> Result<usize, ClipStoreError> {
        let loaded = read_clips(&self.clip_path)?;
        let count = loaded.len();
        *self.lock() = loaded;
        info!(clips = count, "clips loaded");
        Ok(count)
    }

    /// Drops the in-memory clips. The files are untouched until the next save.
    pub fn unload(&self) {
        self.lock().clear();
        info!("clips unloaded");
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Clip>> {
        self.clips.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/library_tests.rs"]
mod tests;

//! Clip capture, storage and replay.
//!
//! A clip is a starting state plus the per-step actions that followed it.
//! `StateActionClipper` saves the last few steps on demand, `ClipRecorder`
//! records between two presses, and `StateActionReplayer` restarts the
//! environment from a clip and plays its actions back. `ClipManager` owns all
//! three over one shared `ClipLibrary`.

mod clipper;
mod library;
mod manager;
mod recorder;
mod replayer;

pub use clipper::StateActionClipper;
pub use library::{
    clip_name, read_clips, write_clips, ClipLibrary, ClipStoreError, DEFAULT_CLIP_PATH,
    DEFAULT_LEGEND_PATH, DEFAULT_STEPS_SAVED,
};
pub use manager::{ClipManager, ClipManagerConfig};
pub use recorder::ClipRecorder;
pub use replayer::{ClipSelector, FixedClip, LatestClip, StateActionReplayer};

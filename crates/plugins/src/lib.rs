//! Stock plugins for the experimentation harness.
//!
//! - `force_instructor`: operator reset/close/pause overrides
//! - `harvesters`: per-episode reward, state and action logs
//! - `clips`: clip storage, capture, recording and replay
//! - `live_playing`: human input override for one agent
//! - `reward_logger`: periodic per-agent reward summaries

pub mod clips;
mod force_instructor;
pub mod harvesters;
pub mod live_playing;
mod reward_logger;

pub use clips::{
    ClipLibrary, ClipManager, ClipManagerConfig, ClipRecorder, ClipSelector, ClipStoreError,
    FixedClip, LatestClip, StateActionClipper, StateActionReplayer,
};
pub use force_instructor::{ForceInstructor, ForceSignals};
pub use harvesters::{ActionHarvester, EpisodeLog, RewardHarvester, StateHarvester};
pub use live_playing::{apply_deadzone, HumanControls, KeyboardControls, LivePlaying};
pub use reward_logger::{AgentRewards, RewardLogger, RewardReport, DEFAULT_PRINT_FREQUENCY};

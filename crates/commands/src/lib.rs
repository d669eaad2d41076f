//! Bindable, edge-triggered commands and the background poller that fires them.
//!
//! - `command`: a single trigger with priority and mutual exclusion
//! - `group`: the `Hittable` contract for named, nested command bundles
//! - `bundles`: the command bundles owned by the stock plugins
//! - `input`: the physical input seam
//! - `orchestrator`: the polling thread

pub mod bundles;
mod command;
mod group;
pub mod input;
pub mod keys;
mod orchestrator;

pub use command::{Command, Target};
pub use group::Hittable;
pub use input::{InputSource, KeyState, NoInput};
pub use orchestrator::{poll_once, sort_by_priority, Orchestrator, DEFAULT_POLL_INTERVAL};

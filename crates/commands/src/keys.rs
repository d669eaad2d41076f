//! Default key bindings and priorities for the stock command bundles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PRIORITY: i32 = -1;
/// Held modifier that suppresses every stock command, so editor shortcuts
/// like ctrl+s do not double as harness commands.
pub const MODIFIER_KEY: &str = "ctrl";

pub const RESET_KEY: &str = "r";
pub const CLOSE_KEY: &str = "q";
pub const PAUSE_KEY: &str = "p";
pub const CLIP_KEY: &str = "k";
pub const PLAY_CLIP_KEY: &str = "l";
pub const STOP_CLIP_KEY: &str = "m";
pub const RECORD_KEY: &str = "t";
pub const UNLOAD_KEY: &str = "u";
pub const LOAD_KEY: &str = "o";
pub const SAVE_KEY: &str = "s";
pub const ACTIVATE_KEY: &str = "n";

const DEFAULTS: &[(&str, &str)] = &[
    ("reset", RESET_KEY),
    ("close", CLOSE_KEY),
    ("pause", PAUSE_KEY),
    ("clip", CLIP_KEY),
    ("play_clip", PLAY_CLIP_KEY),
    ("stop_clip", STOP_CLIP_KEY),
    ("toggle_recording", RECORD_KEY),
    ("unload_clips", UNLOAD_KEY),
    ("load_clips", LOAD_KEY),
    ("save_clips", SAVE_KEY),
    ("activate", ACTIVATE_KEY),
];

/// Command-name to key table. Names missing from `overrides` fall back to
/// the defaults above.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyBindings {
    overrides: BTreeMap<String, String>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, command: impl Into<String>, key: impl Into<String>) -> Self {
        self.overrides.insert(command.into(), key.into());
        self
    }

    pub fn key(&self, command: &str) -> String {
        if let Some(key) = self.overrides.get(command) {
            return key.clone();
        }
        DEFAULTS
            .iter()
            .find(|(name, _)| *name == command)
            .map(|(_, key)| (*key).to_string())
            .unwrap_or_else(|| command.to_string())
    }

    pub fn overrides(&self) -> &BTreeMap<String, String> {
        &self.overrides
    }

    /// Every stock command plus any extra overridden name, with its key.
    pub fn resolved(&self) -> BTreeMap<String, String> {
        let mut table: BTreeMap<String, String> = DEFAULTS
            .iter()
            .map(|(name, key)| (name.to_string(), key.to_string()))
            .collect();
        table.extend(self.overrides.clone());
        table
    }
}

#[cfg(test)]
#[path = "tests/keys_tests.rs"]
mod tests;

//! Scripted key presses, so the command path can be driven from the command
//! line without a keyboard hook.

use std::{
    collections::BTreeMap,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use commands::input::KeyState;
use harness_core::{Callback, Component};
use serde_json::{json, Value};
use shared::domain::Transition;
use tracing::debug;

/// `STEP:KEY`, e.g. `40:k` presses the clip key after the fortieth step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub step: u64,
    pub key: String,
}

impl FromStr for KeyPress {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let (step, key) = raw
            .split_once(':')
            .ok_or_else(|| anyhow!("expected STEP:KEY, got `{raw}`"))?;
        let step = step
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid step `{step}` in `{raw}`"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("missing key in `{raw}`"));
        }
        Ok(Self {
            step,
            key: key.to_string(),
        })
    }
}

/// Presses keys on a [`KeyState`] at fixed step counts and releases each one
/// after `hold` has elapsed, giving the orchestrator time to see the press.
pub struct KeyScript {
    keys: Arc<KeyState>,
    presses: Vec<KeyPress>,
    hold: Duration,
    held: BTreeMap<String, Instant>,
    steps: u64,
}

impl KeyScript {
    pub fn new(keys: Arc<KeyState>, mut presses: Vec<KeyPress>, hold: Duration) -> Self {
        presses.sort_by_key(|press| press.step);
        Self {
            keys,
            presses,
            hold,
            held: BTreeMap::new(),
            steps: 0,
        }
    }

    fn release_expired(&mut self, now: Instant) {
        let hold = self.hold;
        let keys = &self.keys;
        self.held.retain(|key, pressed| {
            let expired = now.duration_since(*pressed) >= hold;
            if expired {
                keys.release(key);
            }
            !expired
        });
    }
}

impl Component for KeyScript {}

impl Callback for KeyScript {
    fn on_step(&mut self, _transition: &Transition<'_>) -> Result<()> {
        self.steps += 1;
        let now = Instant::now();
        self.release_expired(now);
        for press in self.presses.iter().filter(|press| press.step == self.steps) {
            debug!(step = press.step, key = %press.key, "scripted key press");
            self.keys.press(&press.key);
            self.held.insert(press.key.clone(), now);
        }
        Ok(())
    }

    fn on_close(&mut self) -> Result<()> {
        for key in std::mem::take(&mut self.held).into_keys() {
            self.keys.release(&key);
        }
        Ok(())
    }

    fn state_view(&self) -> Value {
        json!({
            "steps": self.steps,
            "held": self.held.keys().collect::<Vec<_>>(),
            "remaining": self.presses.iter().filter(|press| press.step > self.steps).count(),
        })
    }
}

#[cfg(test)]
#[path = "tests/key_script_tests.rs"]
mod tests;

//! Human takeover of one agent's actions.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use commands::{bundles::LivePlayingCommands, keys::KeyBindings, Hittable, InputSource, KeyState};
use harness_core::{Callback, Component};
use shared::domain::{Action, ActionMap, AgentId};
use tracing::info;

/// Source of a human player's current controls.
pub trait HumanControls: Send {
    fn controls(&mut self) -> Action;
}

/// Zeroes every axis whose magnitude is below `deadzone`.
pub fn apply_deadzone(mut action: Action, deadzone: f32) -> Action {
    for value in &mut action {
        if value.abs() < deadzone {
            *value = 0.0;
        }
    }
    action
}

/// `[throttle, steer]` from the arrow keys, each in -1..=1. The arrows are
/// free of stock command bindings.
pub struct KeyboardControls {
    keys: Arc<KeyState>,
    forward: String,
    back: String,
    left: String,
    right: String,
}

impl KeyboardControls {
    pub fn new(keys: Arc<KeyState>) -> Self {
        Self {
            keys,
            forward: "up".into(),
            back: "down".into(),
            left: "left".into(),
            right: "right".into(),
        }
    }

    fn axis(&self, positive: &str, negative: &str) -> f32 {
        let mut value = 0.0;
        if self.keys.is_active(positive) {
            value += 1.0;
        }
        if self.keys.is_active(negative) {
            value -= 1.0;
        }
        value
    }
}

impl HumanControls for KeyboardControls {
    fn controls(&mut self) -> Action {
        vec![
            self.axis(&self.forward, &self.back),
            self.axis(&self.right, &self.left),
        ]
    }
}

/// While active, replaces one agent's action with human input. Without an
/// explicit agent the first agent in the action map is taken over.
pub struct LivePlaying {
    commands: Arc<LivePlayingCommands>,
    controls: Box<dyn HumanControls>,
    deadzone: f32,
    agent: Option<AgentId>,
    active: Arc<AtomicBool>,
}

impl LivePlaying {
    pub fn new(controls: Box<dyn HumanControls>, deadzone: f32, bindings: &KeyBindings) -> Self {
        Self {
            commands: Arc::new(LivePlayingCommands::new(bindings)),
            controls,
            deadzone,
            agent: None,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn for_agent(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Component for LivePlaying {}

impl Callback for LivePlaying {
    fn on_start(&mut self) -> Result<()> {
        let active = self.active.clone();
        self.commands.activate.set_target(move || {
            let playing = !active.fetch_xor(true, Ordering::AcqRel);
            info!(playing, "live playing toggled");
            Ok(())
        });
        Ok(())
    }

    fn on_pre_step(&mut self, mut actions: ActionMap) -> Result<ActionMap> {
        if !self.is_active() {
            return Ok(actions);
        }
        let target = match &self.agent {
            Some(agent) => Some(agent.clone()),
            None => actions.keys().next().cloned(),
        };
        if let Some(agent) = target {
            let human = apply_deadzone(self.controls.controls(), self.deadzone);
            actions.insert(agent, human);
        }
        Ok(actions)
    }

    fn on_close(&mut self) -> Result<()> {
        self.commands.activate.set_target(|| Ok(()));
        self.active.store(false, Ordering::Release);
        Ok(())
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        Some(self.commands.clone())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "active": self.is_active(),
            "agent": self.agent,
            "deadzone": self.deadzone,
        })
    }
}

#[cfg(test)]
#[path = "tests/live_playing_tests.rs"]
mod tests;

use std::sync::Arc;

use anyhow::Result;
use commands::{bundles::MultiCallbackCommands, Hittable};
use shared::domain::{ActionMap, GameState, ObsMap, StepOutcome, Transition};

use crate::{
    callback::{Callback, Handle},
    component::Component,
};

/// Ordered composite over child callbacks.
///
/// Children run strictly in registration order. A child that fails or panics
/// is logged by its handle and skipped; the rest still run. Pipeline hooks
/// feed each child the previous child's output.
pub struct MultiCallback {
    callbacks: Vec<Handle>,
    commands: Arc<MultiCallbackCommands>,
}

impl MultiCallback {
    pub fn new(callbacks: Vec<Handle>) -> Self {
        let mut commands = MultiCallbackCommands::new();
        for callback in &callbacks {
            if let Some(group) = callback.commands() {
                commands.append_commands(format!("{}_commands", callback.name()), group);
            }
        }
        Self {
            callbacks,
            commands: Arc::new(commands),
        }
    }

    pub fn callbacks(&self) -> &[Handle] {
        &self.callbacks
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl Component for MultiCallback {
    fn children(&self) -> Vec<Handle> {
        self.callbacks.clone()
    }
}

impl Callback for MultiCallback {
    fn on_pre_reset(&mut self) -> Result<()> {
        for callback in &self.callbacks {
            callback.on_pre_reset();
        }
        Ok(())
    }

    fn on_reset(&mut self, obs: &ObsMap, state: &GameState) -> Result<()> {
        for callback in &self.callbacks {
            callback.on_reset(obs, state);
        }
        Ok(())
    }

    fn on_pre_step(&mut self, actions: ActionMap) -> Result<ActionMap> {
        Ok(self
            .callbacks
            .iter()
            .fold(actions, |actions, callback| callback.on_pre_step(actions)))
    }

    fn on_step(&mut self, step: &Transition<'_>) -> Result<()> {
        for callback in &self.callbacks {
            callback.on_step(step);
        }
        Ok(())
    }

    fn on_post_step(&mut self, actions: &ActionMap, outcome: StepOutcome) -> Result<StepOutcome> {
        Ok(self
            .callbacks
            .iter()
            .fold(outcome, |outcome, callback| callback.on_post_step(actions, outcome)))
    }

    fn on_close(&mut self) -> Result<()> {
        for callback in &self.callbacks {
            callback.on_close();
        }
        Ok(())
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        Some(self.commands.clone())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "children": self.callbacks.iter().map(Handle::name).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
#[path = "tests/multi_tests.rs"]
mod tests;

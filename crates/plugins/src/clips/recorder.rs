use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Result;
use commands::{bundles::ClipRecorderCommands, Hittable};
use harness_core::{Callback, Component};
use shared::domain::{ActionMap, GameState, Transition};
use tracing::{error, info};

use super::library::ClipLibrary;

/// Records every step between two presses of `toggle_recording` and saves
/// the recording as a clip. The first recorded step supplies the starting
/// state; actions are taken from the steps after it.
pub struct ClipRecorder {
    library: Arc<ClipLibrary>,
    commands: Arc<ClipRecorderCommands>,
    active: Arc<AtomicBool>,
    starting_state: Option<GameState>,
    actions: Vec<ActionMap>,
}

impl ClipRecorder {
    pub fn new(library: Arc<ClipLibrary>, commands: Arc<ClipRecorderCommands>) -> Self {
        Self {
            library,
            commands,
            active: Arc::new(AtomicBool::new(false)),
            starting_state: None,
            actions: Vec::new(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn finish(&mut self) {
        let Some(starting_state) = self.starting_state.take() else {
            return;
        };
        let actions = std::mem::take(&mut self.actions);
        if let Err(error) = self.library.register(starting_state, actions) {
            error!(error = %error, "failed to save recording");
        }
    }
}

impl Component for ClipRecorder {}

impl Callback for ClipRecorder {
    fn on_start(&mut self) -> Result<()> {
        let active = self.active.clone();
        self.commands.toggle_recording.set_target(move || {
            let recording = !active.fetch_xor(true, Ordering::AcqRel);
            info!("{}", if recording { "started recording" } else { "stopped recording" });
            Ok(())
        });
        Ok(())
    }

    fn on_step(&mut self, step: &Transition<'_>) -> Result<()> {
        if !self.is_recording() {
            self.finish();
            return Ok(());
        }
        if self.starting_state.is_none() {
            self.starting_state = Some(step.state.clone());
        } else {
            self.actions.push(step.actions.clone());
        }
        Ok(())
    }

    fn on_close(&mut self) -> Result<()> {
        self.commands.toggle_recording.set_target(|| Ok(()));
        self.active.store(false, Ordering::Release);
        self.finish();
        Ok(())
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        Some(self.commands.clone())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "recording": self.is_recording(),
            "recorded_steps": self.actions.len(),
        })
    }
}

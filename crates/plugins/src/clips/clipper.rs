use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Result;
use commands::{bundles::StateActionClipperCommands, Hittable};
use harness_core::{Callback, Component};
use shared::domain::{ActionMap, GameState, Transition};
use tracing::{error, warn};

use super::library::ClipLibrary;

/// Keeps a rolling window of the last `n_steps_saved` steps and saves it as a
/// clip when the `clip` command fires.
pub struct StateActionClipper {
    library: Arc<ClipLibrary>,
    commands: Arc<StateActionClipperCommands>,
    n_steps_saved: usize,
    window: VecDeque<(GameState, ActionMap)>,
    clipping: Arc<AtomicBool>,
}

impl StateActionClipper {
    pub fn new(
        library: Arc<ClipLibrary>,
        commands: Arc<StateActionClipperCommands>,
        n_steps_saved: usize,
    ) -> Self {
        Self {
            library,
            commands,
            n_steps_saved: n_steps_saved.max(1),
            window: VecDeque::new(),
            clipping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    fn save_window(&mut self) {
        let Some((starting_state, _)) = self.window.front() else {
            warn!("nothing to clip yet");
            return;
        };
        let starting_state = starting_state.clone();
        let actions = self.window.iter().map(|(_, actions)| actions.clone()).collect();
        if let Err(error) = self.library.register(starting_state, actions) {
            error!(error = %error, "failed to save clip");
        }
    }
}

impl Component for StateActionClipper {}

impl Callback for StateActionClipper {
    fn on_start(&mut self) -> Result<()> {
        let clipping = self.clipping.clone();
        self.commands.clip.set_target(move || {
            clipping.store(true, Ordering::Release);
            Ok(())
        });
        Ok(())
    }

    fn on_step(&mut self, step: &Transition<'_>) -> Result<()> {
        if self.clipping.swap(false, Ordering::AcqRel) {
            self.save_window();
            self.commands.clip.unblock_all();
        }

        if self.window.len() == self.n_steps_saved {
            self.window.pop_front();
        }
        self.window.push_back((step.state.clone(), step.actions.clone()));
        Ok(())
    }

    fn on_close(&mut self) -> Result<()> {
        self.commands.clip.set_target(|| Ok(()));
        Ok(())
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        Some(self.commands.clone())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "window": self.window.len(),
            "n_steps_saved": self.n_steps_saved,
            "clipping": self.clipping.load(Ordering::Acquire),
        })
    }
}

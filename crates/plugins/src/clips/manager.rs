use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Result;
use commands::{bundles::ClipManagerCommands, keys::KeyBindings, Hittable};
use harness_core::{Callback, Component, Handle, MultiCallback, Shared};
use serde::{Deserialize, Serialize};
use shared::domain::{ActionMap, GameState, ObsMap, StepOutcome, Transition};
use tracing::info;

use super::{
    clipper::StateActionClipper,
    library::{
        ClipLibrary, ClipStoreError, DEFAULT_CLIP_PATH, DEFAULT_LEGEND_PATH, DEFAULT_STEPS_SAVED,
    },
    recorder::ClipRecorder,
    replayer::{ClipSelector, StateActionReplayer},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipManagerConfig {
    pub clip_path: PathBuf,
    pub legend_path: PathBuf,
    pub n_steps_saved: usize,
    pub wait_for_selection: bool,
}

impl Default for ClipManagerConfig {
    fn default() -> Self {
        Self {
            clip_path: DEFAULT_CLIP_PATH.into(),
            legend_path: DEFAULT_LEGEND_PATH.into(),
            n_steps_saved: DEFAULT_STEPS_SAVED,
            wait_for_selection: false,
        }
    }
}

/// Owns the clipper, replayer and recorder over one clip library.
///
/// The three are registered as children, so they are tracked individually
/// and the replayer's dependencies get wired. Their hooks run through the
/// manager in the order clipper, replayer, recorder.
pub struct ClipManager {
    library: Arc<ClipLibrary>,
    commands: Arc<ClipManagerCommands>,
    children: MultiCallback,
    clipper: Shared<StateActionClipper>,
    replayer: Shared<StateActionReplayer>,
    unload_requested: Arc<AtomicBool>,
}

impl ClipManager {
    pub fn new(
        config: &ClipManagerConfig,
        bindings: &KeyBindings,
        selector: Box<dyn ClipSelector>,
    ) -> Result<Self, ClipStoreError> {
        let library = Arc::new(ClipLibrary::open(&config.clip_path, &config.legend_path)?);
        Ok(Self::with_library(library, config, bindings, selector))
    }

    pub fn with_library(
        library: Arc<ClipLibrary>,
        config: &ClipManagerConfig,
        bindings: &KeyBindings,
        selector: Box<dyn ClipSelector>,
    ) -> Self {
        let commands = Arc::new(ClipManagerCommands::new(bindings));

        let clipper = harness_core::shared(StateActionClipper::new(
            library.clone(),
            commands.clipper_commands.clone(),
            config.n_steps_saved,
        ));
        let replayer = harness_core::shared(
            StateActionReplayer::new(
                library.clone(),
                commands.replayer_commands.clone(),
                selector,
            )
            .wait_for_selection(config.wait_for_selection),
        );
        let recorder = harness_core::shared(ClipRecorder::new(
            library.clone(),
            commands.recorder_commands.clone(),
        ));

        let children = MultiCallback::new(vec![
            Handle::callback(clipper.clone()),
            Handle::callback(replayer.clone()),
            Handle::callback(recorder),
        ]);

        Self {
            library,
            commands,
            children,
            clipper,
            replayer,
            unload_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn library(&self) -> &Arc<ClipLibrary> {
        &self.library
    }

    pub fn clip_commands(&self) -> &Arc<ClipManagerCommands> {
        &self.commands
    }

    fn unload(&self) {
        self.library.unload();
        lock(&self.clipper).clear_window();
        lock(&self.replayer).reset();
    }
}

fn lock<T>(value: &Shared<T>) -> std::sync::MutexGuard<'_, T> {
    value
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Component for ClipManager {
    fn children(&self) -> Vec<Handle> {
        self.children.callbacks().to_vec()
    }
}

impl Callback for ClipManager {
    fn on_start(&mut self) -> Result<()> {
        let unload = self.unload_requested.clone();
        self.commands.unload_clips.set_target(move || {
            unload.store(true, Ordering::Release);
            Ok(())
        });

        let library = self.library.clone();
        self.commands.load_clips.set_target(move || {
            library.reload()?;
            Ok(())
        });

        let library = self.library.clone();
        self.commands.save_clips.set_target(move || {
            library.save()?;
            info!(clips = library.len(), "clips saved");
            Ok(())
        });
        Ok(())
    }

    fn on_pre_reset(&mut self) -> Result<()> {
        self.children.on_pre_reset()
    }

    fn on_reset(&mut self, obs: &ObsMap, state: &GameState) -> Result<()> {
        self.children.on_reset(obs, state)
    }

    fn on_pre_step(&mut self, actions: ActionMap) -> Result<ActionMap> {
        self.children.on_pre_step(actions)
    }

    fn on_step(&mut self, step: &Transition<'_>) -> Result<()> {
        self.children.on_step(step)?;
        if self.unload_requested.swap(false, Ordering::AcqRel) {
            self.unload();
        }
        Ok(())
    }

    fn on_post_step(&mut self, actions: &ActionMap, outcome: StepOutcome) -> Result<StepOutcome> {
        self.children.on_post_step(actions, outcome)
    }

    fn on_close(&mut self) -> Result<()> {
        for command in [
            &self.commands.unload_clips,
            &self.commands.load_clips,
            &self.commands.save_clips,
        ] {
            command.set_target(|| Ok(()));
        }
        self.children.on_close()
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        Some(self.commands.clone())
    }

    fn state_view(&self) -> serde_json::Value {
        let children: serde_json::Map<String, serde_json::Value> = self
            .children
            .callbacks()
            .iter()
            .map(|child| (child.name(), child.view().state))
            .collect();
        serde_json::json!({
            "clips": self.library.names(),
            "children": children,
        })
    }
}

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod tests;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::Result;
use commands::{bundles::StateActionReplayerCommands, Hittable};
use harness_core::{
    Callback, Capabilities, Component, Dependency, Observer, ObserverRequest, CLIP_SETTER,
};
use shared::domain::{ActionMap, Clip, Transition};
use tracing::{info, warn};

use super::library::ClipLibrary;
use crate::force_instructor::{ForceInstructor, ForceSignals};

const FOCUS_SPIN: Duration = Duration::from_millis(100);

/// Chooses which clip to replay. `None` cancels the replay.
pub trait ClipSelector: Send {
    fn select(&mut self, clips: &[Clip]) -> Option<usize>;
}

/// Always replays the most recently saved clip.
#[derive(Debug, Default, Clone, Copy)]
pub struct LatestClip;

impl ClipSelector for LatestClip {
    fn select(&mut self, clips: &[Clip]) -> Option<usize> {
        clips.len().checked_sub(1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClip(pub usize);

impl ClipSelector for FixedClip {
    fn select(&mut self, _clips: &[Clip]) -> Option<usize> {
        Some(self.0)
    }
}

#[derive(Default)]
struct ReplaySignals {
    requested: AtomicBool,
    stop: AtomicBool,
    focus: AtomicBool,
}

/// Restarts the environment from a saved clip and substitutes the clip's
/// actions step by step.
///
/// `play_clip` forces the current episode to end. On the following pre-reset
/// the selector picks a clip, the environment is switched to the clip setter
/// and the clip is queued as the next initial state. Replay stops at the end
/// of the clip or on `stop_clip`, and `play_clip` is unblocked again.
pub struct StateActionReplayer {
    capabilities: Capabilities,
    commands: Arc<StateActionReplayerCommands>,
    library: Arc<ClipLibrary>,
    selector: Box<dyn ClipSelector>,
    signals: Arc<ReplaySignals>,
    wait_for_selection: bool,
    current: Option<Clip>,
    count: usize,
}

impl StateActionReplayer {
    pub fn new(
        library: Arc<ClipLibrary>,
        commands: Arc<StateActionReplayerCommands>,
        selector: Box<dyn ClipSelector>,
    ) -> Self {
        Self {
            capabilities: Capabilities::new(),
            commands,
            library,
            selector,
            signals: Arc::new(ReplaySignals::default()),
            wait_for_selection: false,
            current: None,
            count: 0,
        }
    }

    /// Makes the `play_clip` target wait until a clip has been picked, so an
    /// interactive selector does not compete with further key presses.
    pub fn wait_for_selection(mut self, wait: bool) -> Self {
        self.wait_for_selection = wait;
        self
    }

    pub fn is_replaying(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_clip(&self) -> Option<&Clip> {
        self.current.as_ref()
    }

    /// Abandons any replay in progress.
    pub fn reset(&mut self) {
        self.end_replay();
    }

    fn force(&self) -> Result<ForceSignals> {
        let instructor = self.capabilities.require::<ForceInstructor>()?;
        let instructor = instructor
            .lock()
            .map_err(|_| anyhow::anyhow!("force instructor lock poisoned"))?;
        Ok(instructor.signals())
    }

    fn observe(&self, request: ObserverRequest) -> Result<()> {
        let observer = self.capabilities.require::<Observer>()?;
        let observer = observer
            .lock()
            .map_err(|_| anyhow::anyhow!("observer lock poisoned"))?;
        observer.update(request)?;
        Ok(())
    }

    fn end_replay(&mut self) {
        self.current = None;
        self.count = 0;
        self.signals.requested.store(false, Ordering::Release);
        self.signals.focus.store(false, Ordering::Release);
        self.commands.play_clip.unblock_all();
    }

    fn select_clip(&mut self) -> Result<()> {
        let clips = self.library.clips();
        if clips.is_empty() {
            warn!("no clip saved");
            self.end_replay();
            return Ok(());
        }

        let choice = self.selector.select(&clips);
        let Some(clip) = choice.and_then(|index| clips.get(index).cloned()) else {
            if let Some(index) = choice {
                warn!(index, available = clips.len(), "selected clip does not exist");
            }
            info!("replay cancelled");
            self.end_replay();
            return Ok(());
        };

        info!(clip = %clip.name, steps = clip.len(), "replaying");
        self.observe(ObserverRequest::ChangeStateSetter {
            name: CLIP_SETTER.to_string(),
            index: 0,
        })?;
        self.observe(ObserverRequest::AddClip(clip.clone()))?;
        self.current = Some(clip);
        self.count = 0;
        self.signals.focus.store(false, Ordering::Release);
        Ok(())
    }
}

impl Component for StateActionReplayer {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::on::<ForceInstructor>(),
            Dependency::on::<Observer>(),
        ]
    }

    fn capabilities_mut(&mut self) -> Option<&mut Capabilities> {
        Some(&mut self.capabilities)
    }
}

impl Callback for StateActionReplayer {
    fn on_start(&mut self) -> Result<()> {
        let force = self.force()?;
        let signals = self.signals.clone();
        let wait = self.wait_for_selection;
        self.commands.play_clip.set_target(move || {
            // A stop pressed while idle must not cancel this request.
            signals.stop.store(false, Ordering::Release);
            signals.focus.store(true, Ordering::Release);
            signals.requested.store(true, Ordering::Release);
            force.request_reset();
            while wait && signals.focus.load(Ordering::Acquire) {
                thread::sleep(FOCUS_SPIN);
            }
            Ok(())
        });

        let signals = self.signals.clone();
        self.commands.stop_clip.set_target(move || {
            signals.stop.store(true, Ordering::Release);
            Ok(())
        });
        Ok(())
    }

    /// A reset always ends a replay in progress; the clip only makes sense
    /// from its own starting state.
    fn on_pre_reset(&mut self) -> Result<()> {
        let requested = self.signals.requested.swap(false, Ordering::AcqRel);
        let stopped = self.signals.stop.swap(false, Ordering::AcqRel);
        if self.is_replaying() {
            info!("replay interrupted by reset");
            self.end_replay();
        }
        if stopped {
            if requested {
                info!("replay cancelled");
                self.end_replay();
            }
            return Ok(());
        }
        if requested {
            if let Err(error) = self.select_clip() {
                self.end_replay();
                return Err(error);
            }
        }
        Ok(())
    }

    fn on_pre_step(&mut self, actions: ActionMap) -> Result<ActionMap> {
        let replayed = self
            .current
            .as_ref()
            .and_then(|clip| clip.actions.get(self.count))
            .cloned();
        Ok(replayed.unwrap_or(actions))
    }

    fn on_step(&mut self, _step: &Transition<'_>) -> Result<()> {
        let Some(clip) = &self.current else {
            return Ok(());
        };
        let clip_len = clip.len();
        if self.signals.stop.swap(false, Ordering::AcqRel) {
            info!("replay stopped");
            self.end_replay();
        } else if self.count + 1 >= clip_len {
            info!("end of clip");
            self.end_replay();
        } else {
            self.count += 1;
        }
        Ok(())
    }

    fn on_close(&mut self) -> Result<()> {
        self.end_replay();
        self.commands.play_clip.set_target(|| Ok(()));
        self.commands.stop_clip.set_target(|| Ok(()));
        Ok(())
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        Some(self.commands.clone())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "clips": self.library.len(),
            "active": self.is_replaying(),
            "current": self.current.as_ref().map(|clip| clip.name.clone()),
            "step": self.count,
        })
    }
}

#[cfg(test)]
#[path = "tests/replayer_tests.rs"]
mod tests;

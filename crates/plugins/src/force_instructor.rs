use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::Result;
use commands::{bundles::ForceCommands, keys::KeyBindings, Hittable};
use harness_core::{
    Callback, Capabilities, Component, Dependency, Handle, Injectable, Observer, ObserverRequest,
    Shared, WiringContext,
};
use shared::domain::{ActionMap, StepOutcome, Transition};
use tracing::{info, warn};

const PAUSE_SPIN: Duration = Duration::from_millis(100);

#[derive(Default)]
struct Flags {
    reset: AtomicBool,
    close: AtomicBool,
    pause: AtomicBool,
}

/// Cloneable handle to a force instructor's request flags. Other plugins and
/// command targets use it without locking the instructor, which may be
/// parked in a pause.
#[derive(Clone, Default)]
pub struct ForceSignals {
    flags: Arc<Flags>,
}

impl ForceSignals {
    pub fn request_reset(&self) {
        self.flags.reset.store(true, Ordering::Release);
    }

    pub fn request_close(&self) {
        self.flags.close.store(true, Ordering::Release);
    }

    /// Returns whether stepping is now paused.
    pub fn toggle_pause(&self) -> bool {
        let paused = !self.flags.pause.fetch_xor(true, Ordering::AcqRel);
        info!("{}", if paused { "pausing" } else { "unpausing" });
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.flags.pause.load(Ordering::Acquire)
    }

    pub fn is_reset_pending(&self) -> bool {
        self.flags.reset.load(Ordering::Acquire)
    }

    pub fn is_close_pending(&self) -> bool {
        self.flags.close.load(Ordering::Acquire)
    }

    fn take_reset(&self) -> bool {
        self.flags.reset.swap(false, Ordering::AcqRel)
    }

    fn take_close(&self) -> bool {
        self.flags.close.swap(false, Ordering::AcqRel)
    }
}

/// Operator overrides: end the episode, close the environment, or hold the
/// step loop until unpaused.
pub struct ForceInstructor {
    capabilities: Capabilities,
    commands: Arc<ForceCommands>,
    signals: ForceSignals,
}

impl ForceInstructor {
    pub fn new(commands: Arc<ForceCommands>) -> Self {
        let signals = ForceSignals::default();

        let reset = signals.clone();
        commands.reset.set_target(move || {
            reset.request_reset();
            Ok(())
        });
        let close = signals.clone();
        commands.close.set_target(move || {
            close.request_close();
            Ok(())
        });
        let pause = signals.clone();
        commands.pause.set_target(move || {
            pause.toggle_pause();
            Ok(())
        });

        Self {
            capabilities: Capabilities::new(),
            commands,
            signals,
        }
    }

    pub fn with_bindings(bindings: &KeyBindings) -> Self {
        Self::new(Arc::new(ForceCommands::new(bindings)))
    }

    pub fn signals(&self) -> ForceSignals {
        self.signals.clone()
    }
}

impl Default for ForceInstructor {
    fn default() -> Self {
        Self::with_bindings(&KeyBindings::default())
    }
}

impl Component for ForceInstructor {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::on::<Observer>()]
    }

    fn capabilities_mut(&mut self) -> Option<&mut Capabilities> {
        Some(&mut self.capabilities)
    }
}

impl Injectable for ForceInstructor {
    fn construct(context: &WiringContext) -> Result<Self> {
        Ok(Self::with_bindings(context.bindings()))
    }

    fn into_handle(value: Shared<Self>) -> Handle {
        Handle::callback(value)
    }
}

impl Callback for ForceInstructor {
    fn on_step(&mut self, _step: &Transition<'_>) -> Result<()> {
        if self.signals.take_close() {
            let observer = self.capabilities.require::<Observer>()?;
            let observer = observer
                .lock()
                .map_err(|_| anyhow::anyhow!("observer lock poisoned"))?;
            if let Err(error) = observer.update(ObserverRequest::Close) {
                warn!(%error, "close request not delivered");
            }
        }
        while self.signals.is_paused() {
            thread::sleep(PAUSE_SPIN);
        }
        Ok(())
    }

    fn on_post_step(&mut self, _actions: &ActionMap, mut outcome: StepOutcome) -> Result<StepOutcome> {
        if self.signals.take_reset() {
            info!("forcing episode end");
            outcome.force_terminate();
        }
        Ok(outcome)
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        Some(self.commands.clone())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "paused": self.signals.is_paused(),
            "reset_pending": self.signals.is_reset_pending(),
            "close_pending": self.signals.is_close_pending(),
        })
    }
}

#[cfg(test)]
#[path = "tests/force_instructor_tests.rs"]
mod tests;

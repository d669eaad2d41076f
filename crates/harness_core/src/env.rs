//! `HarvestableEnv`: drives the plugin pipeline around an external
//! simulation and owns the command polling thread.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
    time::Duration,
};

use anyhow::Result;
use commands::{keys::KeyBindings, InputSource, NoInput, Orchestrator, DEFAULT_POLL_INTERVAL};
use shared::domain::{ActionMap, Clip, GameState, ObsMap, StepOutcome, Transition};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    callback::Handle,
    distributor::{Distributor, WiringContext, WiringError},
    multi::MultiCallback,
    observer::EnvironmentControl,
    runner::Policy,
};

/// Setter name that makes the next reset start from a queued replay clip.
pub const CLIP_SETTER: &str = "clip";

const PAUSE_POLL: Duration = Duration::from_millis(20);

/// The simulation the harness wraps. Implementations own physics, rewards,
/// observation building and state randomization.
pub trait Simulation: Send {
    fn reset(&mut self, initial: &InitialState) -> Result<(ObsMap, GameState)>;
    fn step(&mut self, actions: &ActionMap) -> Result<(StepOutcome, GameState)>;
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Where the next episode starts.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InitialState {
    #[default]
    Default,
    /// A named state setter and an index the simulation interprets.
    Setter { name: String, index: usize },
    /// The starting state of a replay clip.
    Clip(GameState),
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Wiring(#[from] WiringError),
    #[error("environment is closed")]
    Closed,
    #[error("simulation failed")]
    Simulation(#[source] anyhow::Error),
    #[error("failed to start command detection")]
    Orchestrator(#[source] std::io::Error),
    #[error("policy failed")]
    Policy(#[source] anyhow::Error),
}

#[derive(Default)]
struct SetterSelection {
    current: Option<(String, usize)>,
    last: Option<(String, usize)>,
    clips: VecDeque<Clip>,
}

/// Control block shared between the environment and the plugins' observer.
#[derive(Default)]
pub struct EnvControls {
    paused: AtomicBool,
    reset_requested: AtomicBool,
    close_requested: AtomicBool,
    setter: Mutex<SetterSelection>,
    agent: Mutex<Option<Arc<dyn Policy>>>,
}

impl EnvControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_agent(&self, agent: Option<Arc<dyn Policy>>) {
        *self.agent.lock().unwrap_or_else(PoisonError::into_inner) = agent;
    }

    pub fn is_reset_requested(&self) -> bool {
        self.reset_requested.load(Ordering::Acquire)
    }

    pub fn is_close_requested(&self) -> bool {
        self.close_requested.load(Ordering::Acquire)
    }

    pub fn pending_clips(&self) -> usize {
        self.lock_setter().clips.len()
    }

    pub fn current_setter(&self) -> Option<(String, usize)> {
        self.lock_setter().current.clone()
    }

    /// Picks the initial state for the next reset. The clip setter is one-shot:
    /// after consuming a clip, or finding none, selection reverts to the last
    /// regular setter.
    pub fn take_initial_state(&self) -> InitialState {
        let mut setter = self.lock_setter();
        let on_clip = setter
            .current
            .as_ref()
            .is_some_and(|(name, _)| name == CLIP_SETTER);
        if on_clip {
            setter.current = setter.last.clone();
            match setter.clips.pop_front() {
                Some(clip) => return InitialState::Clip(clip.starting_state),
                None => warn!("clip setter selected with no clip queued"),
            }
        }
        match &setter.current {
            Some((name, index)) => InitialState::Setter {
                name: name.clone(),
                index: *index,
            },
            None => InitialState::Default,
        }
    }

    fn take_reset_request(&self) -> bool {
        self.reset_requested.swap(false, Ordering::AcqRel)
    }

    fn lock_setter(&self) -> std::sync::MutexGuard<'_, SetterSelection> {
        self.setter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EnvironmentControl for EnvControls {
    fn toggle_pause(&self) -> bool {
        let paused = !self.paused.fetch_xor(true, Ordering::AcqRel);
        info!(paused, "pause toggled");
        paused
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn force_reset(&self) {
        self.reset_requested.store(true, Ordering::Release);
    }

    fn close(&self) {
        self.close_requested.store(true, Ordering::Release);
    }

    fn update_state_setter(&self, name: &str, index: usize) {
        let mut setter = self.lock_setter();
        let previous = setter.current.replace((name.to_string(), index));
        if name == CLIP_SETTER {
            if let Some(previous) = previous.filter(|(name, _)| name != CLIP_SETTER) {
                setter.last = Some(previous);
            }
        } else {
            setter.last = setter.current.clone();
        }
        debug!(setter = name, index, "state setter updated");
    }

    fn add_replay_clip(&self, clip: Clip) {
        debug!(clip = %clip.name, steps = clip.len(), "replay clip queued");
        self.lock_setter().clips.push_back(clip);
    }

    fn agent(&self) -> Option<Arc<dyn Policy>> {
        self.agent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub struct EnvBuilder<S: Simulation> {
    simulation: S,
    callbacks: Vec<Handle>,
    others: Vec<Handle>,
    input: Arc<dyn InputSource>,
    poll_interval: Duration,
    bindings: KeyBindings,
    agent: Option<Arc<dyn Policy>>,
}

impl<S: Simulation> EnvBuilder<S> {
    pub fn new(simulation: S) -> Self {
        Self {
            simulation,
            callbacks: Vec::new(),
            others: Vec::new(),
            input: Arc::new(NoInput),
            poll_interval: DEFAULT_POLL_INTERVAL,
            bindings: KeyBindings::default(),
            agent: None,
        }
    }

    pub fn callback(mut self, callback: Handle) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn callbacks(mut self, callbacks: impl IntoIterator<Item = Handle>) -> Self {
        self.callbacks.extend(callbacks);
        self
    }

    pub fn other(mut self, other: Handle) -> Self {
        self.others.push(other);
        self
    }

    pub fn input(mut self, input: Arc<dyn InputSource>) -> Self {
        self.input = input;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Bindings used for plugins the distributor has to build itself.
    pub fn bindings(mut self, bindings: KeyBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn agent(mut self, agent: Arc<dyn Policy>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Wires and starts every plugin, then starts command detection over the
    /// union of their commands.
    pub fn build(self) -> Result<HarvestableEnv<S>, EnvError> {
        let controls = Arc::new(EnvControls::new());
        controls.set_agent(self.agent);

        let control: Arc<dyn EnvironmentControl> = controls.clone();
        let context = WiringContext::new(Arc::downgrade(&control), self.bindings);
        let distributor = Distributor::distribute(self.callbacks, self.others, &context)?;

        let root = Handle::new(MultiCallback::new(distributor.pipeline().to_vec()));
        root.start();

        let orchestrator = Orchestrator::start(distributor.commands(), self.input, self.poll_interval)
            .map_err(EnvError::Orchestrator)?;

        Ok(HarvestableEnv {
            simulation: self.simulation,
            controls,
            root,
            distributor,
            orchestrator: Some(orchestrator),
            state: GameState::default(),
            closed: false,
        })
    }
}

pub struct HarvestableEnv<S: Simulation> {
    simulation: S,
    controls: Arc<EnvControls>,
    root: Handle,
    distributor: Distributor,
    orchestrator: Option<Orchestrator>,
    state: GameState,
    closed: bool,
}

impl<S: Simulation> HarvestableEnv<S> {
    pub fn builder(simulation: S) -> EnvBuilder<S> {
        EnvBuilder::new(simulation)
    }

    pub fn reset(&mut self) -> Result<ObsMap, EnvError> {
        self.ensure_open()?;
        self.root.on_pre_reset();

        let initial = self.controls.take_initial_state();
        self.controls.take_reset_request();
        let (obs, state) = self
            .simulation
            .reset(&initial)
            .map_err(EnvError::Simulation)?;
        debug!(?initial, tick = state.tick, "episode reset");

        self.root.on_reset(&obs, &state);
        self.state = state;
        Ok(obs)
    }

    /// Steps the simulation with whatever the pre-step pipeline returns. A
    /// pending close request is honoured after the step completes; the step's
    /// outcome is still returned.
    pub fn step(&mut self, actions: ActionMap) -> Result<StepOutcome, EnvError> {
        self.ensure_open()?;
        self.wait_while_paused();

        let actions = self.root.on_pre_step(actions);
        let (outcome, state) = self
            .simulation
            .step(&actions)
            .map_err(EnvError::Simulation)?;
        self.root.on_step(&Transition {
            obs: &outcome.obs,
            actions: &actions,
            rewards: &outcome.rewards,
            terminated: &outcome.terminated,
            truncated: &outcome.truncated,
            state: &state,
        });
        let mut outcome = self.root.on_post_step(&actions, outcome);
        if self.controls.take_reset_request() {
            outcome.force_terminate();
        }
        self.state = state;

        if self.controls.is_close_requested() {
            info!("close requested, closing environment");
            self.close()?;
        }
        Ok(outcome)
    }

    pub fn close(&mut self) -> Result<(), EnvError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // Dropping the orchestrator stops it without joining; a target may
        // still be blocked waiting on input.
        drop(self.orchestrator.take());
        self.root.on_close();
        self.simulation.close().map_err(EnvError::Simulation)?;
        info!("environment closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn controls(&self) -> &Arc<EnvControls> {
        &self.controls
    }

    pub fn control(&self) -> Arc<dyn EnvironmentControl> {
        self.controls.clone()
    }

    pub fn distributor(&self) -> &Distributor {
        &self.distributor
    }

    /// Every tracked callback.
    pub fn callbacks(&self) -> &[Handle] {
        self.distributor.callbacks()
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    pub fn simulation(&self) -> &S {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut S {
        &mut self.simulation
    }

    fn ensure_open(&self) -> Result<(), EnvError> {
        if self.closed {
            return Err(EnvError::Closed);
        }
        Ok(())
    }

    fn wait_while_paused(&self) {
        if !self.controls.is_paused() {
            return;
        }
        info!("stepping paused");
        while self.controls.is_paused() && !self.controls.is_close_requested() {
            thread::sleep(PAUSE_POLL);
        }
        info!("stepping resumed");
    }
}

impl<S: Simulation> Drop for HarvestableEnv<S> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            error!(error = %error, "failed to close environment");
        }
    }
}

#[cfg(test)]
#[path = "tests/env_tests.rs"]
mod tests;

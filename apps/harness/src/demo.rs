//! A small one-dimensional chase game for exercising the harness without an
//! external simulator. Two cars drive along a line toward a ball; touching it
//! ends the episode.

use std::{collections::BTreeMap, thread, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use harness_core::{InitialState, Policy, Simulation};
use serde::{Deserialize, Serialize};
use shared::domain::{ActionMap, AgentId, GameState, ObsMap, StepOutcome};

const SPEED: f32 = 0.05;
const TOUCH_DISTANCE: f32 = 0.02;
const KICKOFF_SPREAD: f32 = 0.1;

pub const KICKOFF_SETTER: &str = "kickoff";
pub const SCATTER_SETTER: &str = "scatter";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaseState {
    pub ball: f32,
    pub cars: BTreeMap<AgentId, f32>,
    pub episode_tick: u64,
}

impl ChaseState {
    fn kickoff(index: usize) -> Self {
        let offset = 0.5 + KICKOFF_SPREAD * index as f32;
        Self {
            ball: 0.0,
            cars: BTreeMap::from([(blue(), -offset.min(1.0)), (orange(), offset.min(1.0))]),
            episode_tick: 0,
        }
    }

    /// Deterministic pseudo-random layout; the same index always gives the
    /// same positions.
    fn scatter(index: usize) -> Self {
        let mut seed = index as u64;
        let mut next = || {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((seed >> 33) as f32 / (1u64 << 31) as f32) * 2.0 - 1.0
        };
        Self {
            ball: next(),
            cars: BTreeMap::from([(blue(), next()), (orange(), next())]),
            episode_tick: 0,
        }
    }

    fn observations(&self) -> ObsMap {
        self.cars
            .iter()
            .map(|(agent, position)| {
                let others = self
                    .cars
                    .iter()
                    .filter(|(other, _)| *other != agent)
                    .map(|(_, other)| *other);
                let obs = [*position, self.ball].into_iter().chain(others).collect();
                (agent.clone(), obs)
            })
            .collect()
    }
}

pub fn blue() -> AgentId {
    AgentId::new("blue")
}

pub fn orange() -> AgentId {
    AgentId::new("orange")
}

pub struct ChaseSimulation {
    state: ChaseState,
    tick: u64,
    episode_steps: u64,
    step_delay: Duration,
}

impl ChaseSimulation {
    pub fn new(episode_steps: u64) -> Self {
        Self {
            state: ChaseState::kickoff(0),
            tick: 0,
            episode_steps: episode_steps.max(1),
            step_delay: Duration::ZERO,
        }
    }

    /// Sleeps this long in every step, roughly pacing the game like a live
    /// match so key presses land on the intended steps.
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn state(&self) -> &ChaseState {
        &self.state
    }

    fn snapshot(&self) -> Result<GameState> {
        Ok(GameState {
            tick: self.tick,
            data: serde_json::to_value(&self.state).context("failed to encode chase state")?,
        })
    }
}

impl Simulation for ChaseSimulation {
    fn reset(&mut self, initial: &InitialState) -> Result<(ObsMap, GameState)> {
        self.state = match initial {
            InitialState::Default => ChaseState::kickoff(0),
            InitialState::Setter { name, index } => match name.as_str() {
                KICKOFF_SETTER => ChaseState::kickoff(*index),
                SCATTER_SETTER => ChaseState::scatter(*index),
                other => bail!("unknown state setter `{other}`"),
            },
            InitialState::Clip(state) => {
                self.tick = state.tick;
                let mut restored: ChaseState = serde_json::from_value(state.data.clone())
                    .context("clip does not hold a chase state")?;
                restored.episode_tick = 0;
                restored
            }
        };
        Ok((self.state.observations(), self.snapshot()?))
    }

    fn step(&mut self, actions: &ActionMap) -> Result<(StepOutcome, GameState)> {
        if !self.step_delay.is_zero() {
            thread::sleep(self.step_delay);
        }
        for (agent, action) in actions {
            let position = self
                .state
                .cars
                .get_mut(agent)
                .ok_or_else(|| anyhow!("no car for agent `{agent}`"))?;
            let throttle = action.first().copied().unwrap_or_default().clamp(-1.0, 1.0);
            *position = (*position + throttle * SPEED).clamp(-1.0, 1.0);
        }
        self.tick += 1;
        self.state.episode_tick += 1;

        let mut outcome = StepOutcome {
            obs: self.state.observations(),
            ..StepOutcome::default()
        };
        let truncated = self.state.episode_tick >= self.episode_steps;
        for (agent, position) in &self.state.cars {
            let distance = (position - self.state.ball).abs();
            outcome.rewards.insert(agent.clone(), -distance);
            outcome
                .terminated
                .insert(agent.clone(), distance <= TOUCH_DISTANCE);
            outcome.truncated.insert(agent.clone(), truncated);
        }
        Ok((outcome, self.snapshot()?))
    }
}

/// Drives straight at the ball.
pub struct ChaseBall;

impl Policy for ChaseBall {
    fn act(&self, obs: &ObsMap) -> Result<ActionMap> {
        obs.iter()
            .map(|(agent, obs)| match obs.as_slice() {
                [position, ball, ..] => {
                    let throttle = ((ball - position) / SPEED).clamp(-1.0, 1.0);
                    Ok((agent.clone(), vec![throttle, 0.0]))
                }
                _ => Err(anyhow!("observation for `{agent}` is too short")),
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/demo_tests.rs"]
mod tests;

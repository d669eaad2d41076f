//! A policy-driven step loop over a [`HarvestableEnv`].

use anyhow::Result;
use shared::domain::{ActionMap, ObsMap};
use tracing::info;

use crate::env::{EnvError, HarvestableEnv, Simulation};

/// Maps observations to actions. Shared with plugins through the observer,
/// so it must be usable from any thread.
pub trait Policy: Send + Sync {
    fn act(&self, obs: &ObsMap) -> Result<ActionMap>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after this many steps. `None` runs until the environment closes.
    pub n_steps: Option<u64>,
    /// The policy is queried every `agent_tick_skip` steps and its actions
    /// are repeated in between.
    pub agent_tick_skip: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            n_steps: None,
            agent_tick_skip: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub steps: u64,
    pub episodes: u64,
}

pub fn run<S: Simulation>(
    env: &mut HarvestableEnv<S>,
    policy: &dyn Policy,
    options: &RunOptions,
) -> Result<RunSummary, EnvError> {
    let skip = u64::from(options.agent_tick_skip.max(1));
    let mut summary = RunSummary::default();
    let mut obs = env.reset()?;
    summary.episodes = 1;

    let mut actions = ActionMap::new();
    let mut tick = 0u64;
    while options.n_steps.map_or(true, |limit| summary.steps < limit) {
        if tick % skip == 0 {
            actions = policy.act(&obs).map_err(EnvError::Policy)?;
        }
        let outcome = env.step(actions.clone())?;
        summary.steps += 1;
        tick += 1;

        if env.is_closed() {
            break;
        }
        if outcome.is_done() {
            obs = env.reset()?;
            summary.episodes += 1;
            tick = 0;
        } else {
            obs = outcome.obs;
        }
    }

    info!(steps = summary.steps, episodes = summary.episodes, "run finished");
    Ok(summary)
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;

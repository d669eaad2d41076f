//! Callbacks that log what happened in each episode.

use std::collections::BTreeMap;

use anyhow::Result;
use harness_core::{Callback, Component, Handle, Injectable, Shared, WiringContext};
use shared::domain::{ActionMap, AgentId, GameState, ObsMap, RewardMap, Transition};

/// Per-episode log of one kind of step data.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeLog<T> {
    episodes: Vec<Vec<T>>,
}

impl<T> Default for EpisodeLog<T> {
    fn default() -> Self {
        Self {
            episodes: Vec::new(),
        }
    }
}

impl<T> EpisodeLog<T> {
    pub fn start_episode(&mut self) {
        self.episodes.push(Vec::new());
    }

    /// Records into the current episode, opening one if none was started.
    pub fn record(&mut self, entry: T) {
        if self.episodes.is_empty() {
            self.start_episode();
        }
        if let Some(current) = self.episodes.last_mut() {
            current.push(entry);
        }
    }

    pub fn episodes(&self) -> &[Vec<T>] {
        &self.episodes
    }

    pub fn episode(&self, index: usize) -> Option<&[T]> {
        self.episodes.get(index).map(Vec::as_slice)
    }

    pub fn current(&self) -> Option<&[T]> {
        self.episodes.last().map(Vec::as_slice)
    }

    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    pub fn step_count(&self) -> usize {
        self.episodes.iter().map(Vec::len).sum()
    }
}

#[derive(Default)]
pub struct RewardHarvester {
    log: EpisodeLog<RewardMap>,
}

impl RewardHarvester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &EpisodeLog<RewardMap> {
        &self.log
    }

    /// Mean reward per agent over the current episode.
    pub fn current_episode_mean(&self) -> BTreeMap<AgentId, f32> {
        let mut totals: BTreeMap<AgentId, (f32, usize)> = BTreeMap::new();
        for rewards in self.log.current().unwrap_or_default() {
            for (agent, reward) in rewards {
                let entry = totals.entry(agent.clone()).or_default();
                entry.0 += reward;
                entry.1 += 1;
            }
        }
        totals
            .into_iter()
            .map(|(agent, (sum, count))| (agent, sum / count as f32))
            .collect()
    }
}

impl Component for RewardHarvester {}

impl Injectable for RewardHarvester {
    fn construct(_context: &WiringContext) -> Result<Self> {
        Ok(Self::new())
    }

    fn into_handle(value: Shared<Self>) -> Handle {
        Handle::callback(value)
    }
}

impl Callback for RewardHarvester {
    fn on_reset(&mut self, _obs: &ObsMap, _state: &GameState) -> Result<()> {
        self.log.start_episode();
        Ok(())
    }

    fn on_step(&mut self, step: &Transition<'_>) -> Result<()> {
        self.log.record(step.rewards.clone());
        Ok(())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "episodes": self.log.episode_count(),
            "current_mean": self.current_episode_mean(),
        })
    }
}

#[derive(Default)]
pub struct StateHarvester {
    log: EpisodeLog<GameState>,
}

impl StateHarvester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &EpisodeLog<GameState> {
        &self.log
    }
}

impl Component for StateHarvester {}

impl Callback for StateHarvester {
    fn on_reset(&mut self, _obs: &ObsMap, _state: &GameState) -> Result<()> {
        self.log.start_episode();
        Ok(())
    }

    fn on_step(&mut self, step: &Transition<'_>) -> Result<()> {
        self.log.record(step.state.clone());
        Ok(())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "episodes": self.log.episode_count(),
            "steps": self.log.step_count(),
        })
    }
}

#[derive(Default)]
pub struct ActionHarvester {
    log: EpisodeLog<ActionMap>,
}

impl ActionHarvester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &EpisodeLog<ActionMap> {
        &self.log
    }
}

impl Component for ActionHarvester {}

impl Callback for ActionHarvester {
    fn on_reset(&mut self, _obs: &ObsMap, _state: &GameState) -> Result<()> {
        self.log.start_episode();
        Ok(())
    }

    fn on_step(&mut self, step: &Transition<'_>) -> Result<()> {
        self.log.record(step.actions.clone());
        Ok(())
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "episodes": self.log.episode_count(),
            "steps": self.log.step_count(),
        })
    }
}

#[cfg(test)]
#[path = "tests/harvesters_tests.rs"]
mod tests;

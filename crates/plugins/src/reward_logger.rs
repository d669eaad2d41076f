//! Periodic per-agent reward summaries.

use std::collections::BTreeMap;

use anyhow::Result;
use harness_core::{Callback, Capabilities, Component, Dependency};
use serde::Serialize;
use shared::domain::{ActionMap, AgentId, RewardMap, StepOutcome};
use tracing::info;

use crate::harvesters::RewardHarvester;

pub const DEFAULT_PRINT_FREQUENCY: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentRewards {
    pub last: f32,
    /// Mean over the steps the harvester has recorded this episode.
    pub episode_mean: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardReport {
    pub step: u64,
    pub agents: BTreeMap<AgentId, AgentRewards>,
}

pub type ReportSink = Box<dyn FnMut(&RewardReport) + Send>;

fn log_report(report: &RewardReport) {
    for (agent, rewards) in &report.agents {
        info!(
            step = report.step,
            %agent,
            last = rewards.last,
            episode_mean = rewards.episode_mean,
            "rewards"
        );
    }
}

/// Reports every agent's latest reward and episode mean every
/// `print_frequency` steps. Relies on a [`RewardHarvester`], building one if
/// none was registered. Reports are taken after every `on_step` hook has run,
/// so the mean always includes the reported step.
pub struct RewardLogger {
    capabilities: Capabilities,
    print_frequency: u64,
    count: u64,
    sink: ReportSink,
}

impl RewardLogger {
    pub fn new(print_frequency: u64) -> Self {
        Self {
            capabilities: Capabilities::new(),
            print_frequency: print_frequency.max(1),
            count: 0,
            sink: Box::new(log_report),
        }
    }

    /// Sends reports somewhere other than the log.
    pub fn with_sink(mut self, sink: impl FnMut(&RewardReport) + Send + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    fn report(&self, rewards: &RewardMap) -> Result<RewardReport> {
        let harvester = self.capabilities.require::<RewardHarvester>()?;
        let means = harvester
            .lock()
            .map_err(|_| anyhow::anyhow!("reward harvester lock poisoned"))?
            .current_episode_mean();
        let agents = rewards
            .iter()
            .map(|(agent, last)| {
                let episode_mean = means.get(agent).copied().unwrap_or(*last);
                (
                    agent.clone(),
                    AgentRewards {
                        last: *last,
                        episode_mean,
                    },
                )
            })
            .collect();
        Ok(RewardReport {
            step: self.count,
            agents,
        })
    }
}

impl Default for RewardLogger {
    fn default() -> Self {
        Self::new(DEFAULT_PRINT_FREQUENCY)
    }
}

impl Component for RewardLogger {
    fn dependencies(&self) -> Vec<Dependency> {
        vec![Dependency::on::<RewardHarvester>()]
    }

    fn capabilities_mut(&mut self) -> Option<&mut Capabilities> {
        Some(&mut self.capabilities)
    }
}

impl Callback for RewardLogger {
    fn on_post_step(&mut self, _actions: &ActionMap, outcome: StepOutcome) -> Result<StepOutcome> {
        if self.count != 0 && self.count % self.print_frequency == 0 {
            let report = self.report(&outcome.rewards)?;
            (self.sink)(&report);
        }
        self.count += 1;
        Ok(outcome)
    }

    fn state_view(&self) -> serde_json::Value {
        serde_json::json!({
            "print_frequency": self.print_frequency,
            "steps": self.count,
        })
    }
}

#[cfg(test)]
#[path = "tests/reward_logger_tests.rs"]
mod tests;

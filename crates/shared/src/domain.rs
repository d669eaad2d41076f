use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

id_newtype!(CallbackId);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type Observation = Vec<f32>;
pub type Action = Vec<f32>;
pub type ObsMap = BTreeMap<AgentId, Observation>;
pub type ActionMap = BTreeMap<AgentId, Action>;
pub type RewardMap = BTreeMap<AgentId, f32>;
pub type DoneMap = BTreeMap<AgentId, bool>;
pub type Info = BTreeMap<String, serde_json::Value>;

/// Opaque simulator state. The harness only carries it around; the payload
/// layout belongs to whichever simulation produced it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameState {
    pub tick: u64,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl GameState {
    pub fn at_tick(tick: u64) -> Self {
        Self {
            tick,
            data: serde_json::Value::Null,
        }
    }
}

/// What a simulation step produced, after the step and before it is returned
/// to the caller. Post-step hooks receive and return this value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StepOutcome {
    pub obs: ObsMap,
    pub rewards: RewardMap,
    pub terminated: DoneMap,
    pub truncated: DoneMap,
    #[serde(default)]
    pub info: Info,
}

impl StepOutcome {
    pub fn is_terminated(&self) -> bool {
        self.terminated.values().any(|done| *done)
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated.values().any(|done| *done)
    }

    pub fn is_done(&self) -> bool {
        self.is_terminated() || self.is_truncated()
    }

    /// Marks every agent terminated, including agents that only appear in the
    /// observations.
    pub fn force_terminate(&mut self) {
        for done in self.terminated.values_mut() {
            *done = true;
        }
        for agent in self.obs.keys() {
            self.terminated.entry(agent.clone()).or_insert(true);
        }
    }
}

/// Borrowed view of one completed step, handed to `on_step` hooks.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    pub obs: &'a ObsMap,
    pub actions: &'a ActionMap,
    pub rewards: &'a RewardMap,
    pub terminated: &'a DoneMap,
    pub truncated: &'a DoneMap,
    pub state: &'a GameState,
}

/// A recorded starting state plus the actions replayed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    pub starting_state: GameState,
    pub actions: Vec<ActionMap>,
}

impl Clip {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;

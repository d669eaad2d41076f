//! The narrow mediator plugins use to reach the environment.
//!
//! Plugins never hold the concrete environment. They depend on [`Observer`],
//! which forwards a closed set of requests to whatever implements
//! [`EnvironmentControl`]. The observer keeps only a weak reference, so a
//! plugin that outlives its environment gets an error instead of keeping the
//! environment alive.

use std::sync::{Arc, Weak};

use anyhow::Result;
use shared::domain::Clip;
use thiserror::Error;

use crate::{
    component::{Component, Injectable},
    distributor::WiringContext,
    runner::Policy,
};

/// Privileged operations an environment exposes to plugins.
///
/// Implementations are called from the command polling thread as well as
/// from the stepping thread, so every operation must be a flag flip or a
/// small value swap.
pub trait EnvironmentControl: Send + Sync {
    /// Flips the pause flag and returns the new state.
    fn toggle_pause(&self) -> bool;
    fn is_paused(&self) -> bool;
    /// Ends the current episode after the step in progress.
    fn force_reset(&self);
    /// Closes the environment after the step in progress.
    fn close(&self);
    fn update_state_setter(&self, name: &str, index: usize);
    fn add_replay_clip(&self, clip: Clip);
    fn agent(&self) -> Option<Arc<dyn Policy>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObserverRequest {
    Pause,
    Reset,
    Close,
    ChangeStateSetter { name: String, index: usize },
    AddClip(Clip),
    GetEnv,
    GetAgent,
}

pub enum ObserverReply {
    None,
    Paused(bool),
    Env(Arc<dyn EnvironmentControl>),
    Agent(Option<Arc<dyn Policy>>),
}

impl std::fmt::Debug for ObserverReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObserverReply::None => f.write_str("None"),
            ObserverReply::Paused(paused) => f.debug_tuple("Paused").field(paused).finish(),
            ObserverReply::Env(_) => f.write_str("Env(..)"),
            ObserverReply::Agent(agent) => f
                .debug_tuple("Agent")
                .field(&agent.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("the observed environment has been dropped")]
    EnvironmentDropped,
}

pub struct Observer {
    env: Weak<dyn EnvironmentControl>,
}

impl Observer {
    pub fn new(env: &Arc<dyn EnvironmentControl>) -> Self {
        Self {
            env: Arc::downgrade(env),
        }
    }

    pub fn from_weak(env: Weak<dyn EnvironmentControl>) -> Self {
        Self { env }
    }

    pub fn env(&self) -> Option<Arc<dyn EnvironmentControl>> {
        self.env.upgrade()
    }

    pub fn update(&self, request: ObserverRequest) -> Result<ObserverReply, ObserverError> {
        let env = self.env().ok_or(ObserverError::EnvironmentDropped)?;
        let reply = match request {
            ObserverRequest::Pause => ObserverReply::Paused(env.toggle_pause()),
            ObserverRequest::Reset => {
                env.force_reset();
                ObserverReply::None
            }
            ObserverRequest::Close => {
                env.close();
                ObserverReply::None
            }
            ObserverRequest::ChangeStateSetter { name, index } => {
                env.update_state_setter(&name, index);
                ObserverReply::None
            }
            ObserverRequest::AddClip(clip) => {
                env.add_replay_clip(clip);
                ObserverReply::None
            }
            ObserverRequest::GetEnv => ObserverReply::Env(env),
            ObserverRequest::GetAgent => ObserverReply::Agent(env.agent()),
        };
        Ok(reply)
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("attached", &(self.env.strong_count() > 0))
            .finish()
    }
}

impl Component for Observer {}

impl Injectable for Observer {
    fn construct(context: &WiringContext) -> Result<Self> {
        Ok(Self::from_weak(context.environment()))
    }
}

#[cfg(test)]
#[path = "tests/observer_tests.rs"]
mod tests;

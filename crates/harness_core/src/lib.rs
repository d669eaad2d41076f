//! Plugin lifecycle and wiring for the experimentation harness.
//!
//! - `callback`: the `Callback` hook trait and the lifecycle-gated `Handle`
//! - `multi`: `MultiCallback`, the ordered composite
//! - `component`: capability declarations and the injected capability map
//! - `distributor`: dependency resolution, injection and start-up
//! - `observer`: the narrow mediator plugins use to reach the environment
//! - `env`: `HarvestableEnv`, which drives hooks around an external simulation
//! - `runner`: a policy-driven step loop
//! - `ui`: command lookup and views for an external UI transport

mod callback;
mod component;
mod distributor;
pub mod env;
mod multi;
mod observer;
pub mod runner;
pub mod ui;

pub use callback::{Callback, Handle, Lifecycle};
pub use component::{
    camel_to_snake, shared, short_type_name, Capabilities, Component, Dependency, Injectable,
    Shared,
};
pub use distributor::{Distributor, Link, WiringContext, WiringError};
pub use env::{
    EnvBuilder, EnvControls, EnvError, HarvestableEnv, InitialState, Simulation, CLIP_SETTER,
};
pub use multi::MultiCallback;
pub use observer::{EnvironmentControl, Observer, ObserverError, ObserverReply, ObserverRequest};
pub use runner::{run, Policy, RunOptions, RunSummary};
pub use ui::UiDispatcher;

//! Dependency resolution, injection and start-up for a set of plugins.

use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

use commands::{keys::KeyBindings, Command};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    callback::Handle,
    component::{Component, Dependency, Shared},
    env::EnvControls,
    observer::EnvironmentControl,
};

/// Configuration errors. Any of these aborts environment start-up.
#[derive(Debug, Error)]
pub enum WiringError {
    #[error("dependency cycle: {chain}")]
    DependencyCycle { chain: String },
    #[error("failed to construct dependency `{type_name}`")]
    Construction {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("`{type_name}` declares dependencies but cannot receive capabilities")]
    NotInjectable { type_name: String },
    #[error("no instance of `{type_name}` was provided and it cannot be constructed")]
    Unresolved { type_name: String },
}

/// What constructors get to see while the distributor builds missing
/// dependencies.
#[derive(Clone)]
pub struct WiringContext {
    environment: Weak<dyn EnvironmentControl>,
    bindings: KeyBindings,
}

impl WiringContext {
    pub fn new(environment: Weak<dyn EnvironmentControl>, bindings: KeyBindings) -> Self {
        Self {
            environment,
            bindings,
        }
    }

    /// A context with no environment behind it. Observers built from it
    /// report the environment as dropped.
    pub fn detached() -> Self {
        let environment: Weak<dyn EnvironmentControl> = Weak::<EnvControls>::new();
        Self::new(environment, KeyBindings::default())
    }

    pub fn environment(&self) -> Weak<dyn EnvironmentControl> {
        self.environment.clone()
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }
}

/// A recorded `(requester, required type)` pair.
#[derive(Clone)]
pub struct Link {
    pub source: Handle,
    pub dependency: Dependency,
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ---> {}",
            self.source.type_name(),
            self.dependency.type_name()
        )
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub struct Distributor {
    callbacks: Vec<Handle>,
    others: Vec<Handle>,
    pipeline: Vec<Handle>,
    order: Vec<Handle>,
    links: Vec<Link>,
}

impl Distributor {
    /// Tracks every harvester and its nested children, resolves each declared
    /// dependency to a single shared instance (building missing ones), injects
    /// them, then starts every tracked callback in registration order.
    pub fn distribute(
        harvesters: Vec<Handle>,
        others: Vec<Handle>,
        context: &WiringContext,
    ) -> Result<Self, WiringError> {
        let mut distributor = Self {
            callbacks: Vec::new(),
            others: Vec::new(),
            pipeline: Vec::new(),
            order: Vec::new(),
            links: Vec::new(),
        };

        for harvester in harvesters {
            if distributor.register(&harvester) {
                distributor.pipeline.push(harvester);
            }
        }
        for other in others {
            distributor.register(&other);
        }

        let mut next = 0;
        while next < distributor.order.len() {
            let requester = distributor.order[next].clone();
            next += 1;
            distributor.wire(&requester, context)?;
        }

        distributor.check_cycles()?;

        for link in &distributor.links {
            debug!(link = %link, "dependency resolved");
        }
        for callback in &distributor.callbacks {
            callback.start();
        }
        info!(
            callbacks = distributor.callbacks.len(),
            others = distributor.others.len(),
            links = distributor.links.len(),
            "plugins wired"
        );
        Ok(distributor)
    }

    /// Every tracked callback, nested children included, in registration
    /// order.
    pub fn callbacks(&self) -> &[Handle] {
        &self.callbacks
    }

    pub fn others(&self) -> &[Handle] {
        &self.others
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Callbacks the environment should drive directly: the harvesters it was
    /// given plus any callback built to satisfy a dependency. Nested children
    /// are driven by their parents.
    pub fn pipeline(&self) -> &[Handle] {
        &self.pipeline
    }

    /// Union of the commands of every tracked callback, each command once.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let mut commands: Vec<Arc<Command>> = Vec::new();
        for group in self.callbacks.iter().filter_map(Handle::commands) {
            for command in group.commands() {
                if !commands.iter().any(|known| Arc::ptr_eq(known, &command)) {
                    commands.push(command);
                }
            }
        }
        commands
    }

    pub fn get<T: Component>(&self) -> Option<Shared<T>> {
        self.find(TypeId::of::<T>())?.downcast::<T>()
    }

    fn is_tracked(&self, handle: &Handle) -> bool {
        self.order.iter().any(|known| known.same_instance(handle))
    }

    /// Tracks `handle` and its children. Returns false if it was already
    /// tracked.
    fn register(&mut self, handle: &Handle) -> bool {
        if self.is_tracked(handle) {
            return false;
        }
        self.order.push(handle.clone());
        if handle.is_callback() {
            self.callbacks.push(handle.clone());
        } else {
            self.others.push(handle.clone());
        }
        for child in handle.children() {
            self.register(&child);
        }
        true
    }

    fn find(&self, type_id: TypeId) -> Option<&Handle> {
        self.callbacks
            .iter()
            .chain(self.others.iter())
            .find(|handle| handle.type_id() == type_id)
    }

    fn wire(&mut self, requester: &Handle, context: &WiringContext) -> Result<(), WiringError> {
        for dependency in requester.dependencies() {
            self.links.push(Link {
                source: requester.clone(),
                dependency,
            });
            let existing = self.find(dependency.type_id()).cloned();
            let provider = match existing {
                Some(found) => found,
                None => self.construct(dependency, context)?,
            };
            requester.inject(provider)?;
        }
        Ok(())
    }

    /// Builds a missing dependency and tracks it before its own dependencies
    /// are wired, so a later request for the same type finds this instance.
    fn construct(
        &mut self,
        dependency: Dependency,
        context: &WiringContext,
    ) -> Result<Handle, WiringError> {
        let type_name = dependency.type_name().to_string();
        let constructor = dependency
            .constructor()
            .ok_or_else(|| WiringError::Unresolved {
                type_name: type_name.clone(),
            })?;
        let handle = constructor(context)
            .map_err(|source| WiringError::Construction { type_name, source })?;

        debug!(dependency = dependency.type_name(), "constructed missing dependency");
        self.register(&handle);
        if handle.is_callback() {
            self.pipeline.push(handle.clone());
        }
        Ok(handle)
    }

    /// Rejects cycles in the type graph, including ones where both ends were
    /// supplied up front and nothing had to be built.
    fn check_cycles(&self) -> Result<(), WiringError> {
        let mut edges: HashMap<TypeId, Vec<TypeId>> = HashMap::new();
        let mut names: HashMap<TypeId, &'static str> = HashMap::new();
        for link in &self.links {
            names.insert(link.source.type_id(), link.source.type_name());
            names.insert(link.dependency.type_id(), link.dependency.type_name());
            let targets = edges.entry(link.source.type_id()).or_default();
            if !targets.contains(&link.dependency.type_id()) {
                targets.push(link.dependency.type_id());
            }
        }

        let mut finished: Vec<TypeId> = Vec::new();
        for link in &self.links {
            let start = link.source.type_id();
            let mut path = Vec::new();
            if let Some(chain) = visit(start, &edges, &names, &mut path, &mut finished) {
                return Err(WiringError::DependencyCycle { chain });
            }
        }
        Ok(())
    }
}

fn visit(
    node: TypeId,
    edges: &HashMap<TypeId, Vec<TypeId>>,
    names: &HashMap<TypeId, &'static str>,
    path: &mut Vec<TypeId>,
    finished: &mut Vec<TypeId>,
) -> Option<String> {
    if finished.contains(&node) {
        return None;
    }
    if let Some(position) = path.iter().position(|seen| *seen == node) {
        let mut chain: Vec<&str> = path[position..]
            .iter()
            .map(|id| names.get(id).copied().unwrap_or("?"))
            .collect();
        chain.push(names.get(&node).copied().unwrap_or("?"));
        return Some(chain.join(" -> "));
    }

    path.push(node);
    for target in edges.get(&node).map(Vec::as_slice).unwrap_or_default() {
        if let Some(chain) = visit(*target, edges, names, path, finished) {
            return Some(chain);
        }
    }
    path.pop();
    finished.push(node);
    None
}

#[cfg(test)]
#[path = "tests/distributor_tests.rs"]
mod tests;

//! Capability declarations and the injected capability map.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Result};

use crate::{callback::Handle, distributor::WiringContext};

pub type Shared<T> = Arc<Mutex<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Anything the distributor can track: callbacks and the "other"
/// collaborators they depend on.
pub trait Component: Any + Send {
    /// Capability types this instance needs injected.
    fn dependencies(&self) -> Vec<Dependency> {
        Vec::new()
    }

    /// Where injected capabilities are stored. Components that declare
    /// dependencies must return `Some`.
    fn capabilities_mut(&mut self) -> Option<&mut Capabilities> {
        None
    }

    /// Sub-plugins owned by this component. They are tracked, can satisfy
    /// dependencies, and are started before their parent.
    fn children(&self) -> Vec<Handle> {
        Vec::new()
    }
}

/// A component the distributor can build when no instance of it exists.
pub trait Injectable: Component + Sized {
    fn construct(context: &WiringContext) -> Result<Self>;

    /// Wraps a freshly constructed instance. Callbacks override this to
    /// register through `Handle::callback` so their hooks join the pipeline.
    fn into_handle(value: Shared<Self>) -> Handle {
        Handle::component(value)
    }
}

type Constructor = fn(&WiringContext) -> Result<Handle>;

fn construct_handle<T: Injectable>(context: &WiringContext) -> Result<Handle> {
    let value = T::construct(context)?;
    Ok(T::into_handle(shared(value)))
}

/// A declared need for one capability type.
#[derive(Clone, Copy)]
pub struct Dependency {
    type_id: TypeId,
    type_name: &'static str,
    construct: Option<Constructor>,
}

impl Dependency {
    /// Depends on `T`, building one with `T::construct` if none is tracked.
    pub fn on<T: Injectable>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name::<T>(),
            construct: Some(construct_handle::<T>),
        }
    }

    /// Depends on `T`, which must be supplied to the distributor up front.
    pub fn provided<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name::<T>(),
            construct: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn capability_name(&self) -> String {
        camel_to_snake(self.type_name)
    }

    pub(crate) fn constructor(&self) -> Option<Constructor> {
        self.construct
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Dependency").field(&self.type_name).finish()
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// Capabilities injected into one component, keyed by concrete type.
#[derive(Clone, Default)]
pub struct Capabilities {
    slots: HashMap<TypeId, Handle>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: Handle) {
        self.slots.insert(handle.type_id(), handle);
    }

    pub fn contains<T: Component>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn get<T: Component>(&self) -> Option<Shared<T>> {
        self.slots.get(&TypeId::of::<T>())?.downcast::<T>()
    }

    pub fn require<T: Component>(&self) -> Result<Shared<T>> {
        self.get::<T>().ok_or_else(|| {
            anyhow!(
                "capability `{}` was not injected",
                camel_to_snake(short_type_name::<T>())
            )
        })
    }

    pub fn handle<T: Component>(&self) -> Option<&Handle> {
        self.slots.get(&TypeId::of::<T>())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.values().map(Handle::name).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Last path segment of a type name, without generic arguments.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// `ForceInstructor` -> `force_instructor`, `HTTPServer` -> `http_server`.
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (index, &current) in chars.iter().enumerate() {
        if current.is_uppercase() && index > 0 {
            let previous = chars[index - 1];
            let next_is_lower = chars.get(index + 1).is_some_and(|next| next.is_lowercase());
            if previous.is_lowercase()
                || previous.is_ascii_digit()
                || (previous.is_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.extend(current.to_lowercase());
    }
    out
}

#[cfg(test)]
#[path = "tests/component_tests.rs"]
mod tests;

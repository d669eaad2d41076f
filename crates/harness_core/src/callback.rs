use std::{
    any::{Any, TypeId},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering},
        Arc, Mutex, PoisonError, TryLockError,
    },
};

use anyhow::Result;
use commands::Hittable;
use shared::{
    domain::{ActionMap, CallbackId, GameState, ObsMap, StepOutcome, Transition},
    protocol::CallbackView,
};
use tracing::{debug, error};

use crate::{
    component::{camel_to_snake, short_type_name, Component, Dependency, Shared},
    distributor::WiringError,
};

/// One unit of step-loop extension.
///
/// Every hook has a no-op default. Hooks are only invoked through a
/// [`Handle`], which keeps them inert until the plugin is started and after
/// it is closed, and which isolates a failing or panicking hook from the rest
/// of the pipeline.
pub trait Callback: Component {
    /// Runs once when the plugin goes live.
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Before the initial state of the next episode is built.
    fn on_pre_reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_reset(&mut self, _obs: &ObsMap, _state: &GameState) -> Result<()> {
        Ok(())
    }

    /// Returns the actions to step with. Callers must use the returned value;
    /// a plugin may replace the actions entirely.
    fn on_pre_step(&mut self, actions: ActionMap) -> Result<ActionMap> {
        Ok(actions)
    }

    fn on_step(&mut self, _step: &Transition<'_>) -> Result<()> {
        Ok(())
    }

    /// Last chance to rewrite the step result, typically to force the episode
    /// to end.
    fn on_post_step(&mut self, _actions: &ActionMap, outcome: StepOutcome) -> Result<StepOutcome> {
        Ok(outcome)
    }

    fn on_close(&mut self) -> Result<()> {
        Ok(())
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        None
    }

    /// Plugin-specific state for UI views.
    fn state_view(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Uninitialized = 0,
    Started = 1,
    Closed = 2,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Lifecycle::Started,
            2 => Lifecycle::Closed,
            _ => Lifecycle::Uninitialized,
        }
    }
}

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

struct HandleInner {
    id: CallbackId,
    type_id: TypeId,
    type_name: &'static str,
    any: Arc<dyn Any + Send + Sync>,
    component: Arc<Mutex<dyn Component>>,
    callback: Option<Arc<Mutex<dyn Callback>>>,
    dependencies: Vec<Dependency>,
    commands: Option<Arc<dyn Hittable>>,
    lifecycle: AtomicU8,
}

/// Registration of one tracked instance. Clones share identity and lifecycle,
/// so wrap each instance once and clone the handle.
///
/// Declared dependencies and the command group are read once when the handle
/// is built. Lookups and views never wait on a plugin whose hook is running.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<HandleInner>,
}

impl Handle {
    pub fn new<T: Callback>(value: T) -> Self {
        Self::callback(crate::component::shared(value))
    }

    pub fn callback<T: Callback>(value: Shared<T>) -> Self {
        let callback: Arc<Mutex<dyn Callback>> = value.clone();
        Self::build(value, Some(callback))
    }

    pub fn component<T: Component>(value: Shared<T>) -> Self {
        Self::build(value, None)
    }

    fn build<T: Component>(value: Shared<T>, callback: Option<Arc<Mutex<dyn Callback>>>) -> Self {
        let dependencies = value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dependencies();
        let commands = callback.as_ref().and_then(|callback| {
            callback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .commands()
        });
        let any: Arc<dyn Any + Send + Sync> = value.clone();
        let component: Arc<Mutex<dyn Component>> = value;
        Self {
            inner: Arc::new(HandleInner {
                id: CallbackId(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed)),
                type_id: TypeId::of::<T>(),
                type_name: short_type_name::<T>(),
                any,
                component,
                callback,
                dependencies,
                commands,
                lifecycle: AtomicU8::new(Lifecycle::Uninitialized as u8),
            }),
        }
    }

    pub fn id(&self) -> CallbackId {
        self.inner.id
    }

    pub fn type_id(&self) -> TypeId {
        self.inner.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    pub fn name(&self) -> String {
        camel_to_snake(self.inner.type_name)
    }

    pub fn is_callback(&self) -> bool {
        self.inner.callback.is_some()
    }

    pub fn downcast<T: Component>(&self) -> Option<Shared<T>> {
        self.inner.any.clone().downcast::<Mutex<T>>().ok()
    }

    /// True when both handles wrap the same instance, even if they were
    /// created separately.
    pub fn same_instance(&self, other: &Handle) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner.any), Arc::as_ptr(&other.inner.any))
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.inner.lifecycle.load(Ordering::Acquire))
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle() == Lifecycle::Started
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        self.inner.dependencies.clone()
    }

    pub fn children(&self) -> Vec<Handle> {
        self.lock_component().children()
    }

    pub fn commands(&self) -> Option<Arc<dyn Hittable>> {
        self.inner.commands.clone()
    }

    pub(crate) fn inject(&self, capability: Handle) -> Result<(), WiringError> {
        let mut component = self.lock_component();
        match component.capabilities_mut() {
            Some(capabilities) => {
                capabilities.insert(capability);
                Ok(())
            }
            None => Err(WiringError::NotInjectable {
                type_name: self.inner.type_name.to_string(),
            }),
        }
    }

    /// Starts children first, then this instance. Repeated calls are no-ops,
    /// so a child shared by several parents starts once.
    pub fn start(&self) {
        if self.lifecycle() != Lifecycle::Uninitialized {
            return;
        }
        for child in self.children() {
            child.start();
        }
        let transitioned = self
            .inner
            .lifecycle
            .compare_exchange(
                Lifecycle::Uninitialized as u8,
                Lifecycle::Started as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if transitioned {
            debug!(plugin = %self.name(), "callback started");
            self.invoke("on_start", |callback| callback.on_start());
        }
    }

    pub fn on_pre_reset(&self) {
        self.invoke("on_pre_reset", |callback| callback.on_pre_reset());
    }

    pub fn on_reset(&self, obs: &ObsMap, state: &GameState) {
        self.invoke("on_reset", |callback| callback.on_reset(obs, state));
    }

    /// A failing plugin leaves the actions as they were handed to it.
    pub fn on_pre_step(&self, actions: ActionMap) -> ActionMap {
        if !self.is_live() {
            return actions;
        }
        let fallback = actions.clone();
        self.invoke("on_pre_step", move |callback| callback.on_pre_step(actions))
            .unwrap_or(fallback)
    }

    pub fn on_step(&self, step: &Transition<'_>) {
        self.invoke("on_step", |callback| callback.on_step(step));
    }

    pub fn on_post_step(&self, actions: &ActionMap, outcome: StepOutcome) -> StepOutcome {
        if !self.is_live() {
            return outcome;
        }
        let fallback = outcome.clone();
        self.invoke("on_post_step", move |callback| {
            callback.on_post_step(actions, outcome)
        })
        .unwrap_or(fallback)
    }

    /// Terminal hook. The handle is inert afterwards.
    pub fn on_close(&self) {
        self.invoke("on_close", |callback| callback.on_close());
        let _ = self.inner.lifecycle.compare_exchange(
            Lifecycle::Started as u8,
            Lifecycle::Closed as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn view(&self) -> CallbackView {
        let dependencies = self
            .inner
            .dependencies
            .iter()
            .map(Dependency::capability_name)
            .collect();
        let commands = self
            .commands()
            .map(|group| group.views())
            .unwrap_or_default();
        let state = self.state_view();

        CallbackView {
            id: self.id(),
            name: self.name(),
            started: self.is_started(),
            dependencies,
            commands,
            state,
        }
    }

    /// `Null` while a hook holds the plugin, e.g. a pause spinning in
    /// `on_step`.
    fn state_view(&self) -> serde_json::Value {
        let Some(callback) = self.inner.callback.as_ref() else {
            return serde_json::Value::Null;
        };
        match callback.try_lock() {
            Ok(guard) => guard.state_view(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().state_view(),
            Err(TryLockError::WouldBlock) => serde_json::Value::Null,
        }
    }

    fn is_live(&self) -> bool {
        self.is_started() && self.inner.callback.is_some()
    }

    fn lock_component(&self) -> std::sync::MutexGuard<'_, dyn Component> {
        self.inner
            .component
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn invoke<R>(
        &self,
        hook: &'static str,
        call: impl FnOnce(&mut dyn Callback) -> Result<R>,
    ) -> Option<R> {
        if !self.is_started() {
            return None;
        }
        let callback = self.inner.callback.as_ref()?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut guard = callback.lock().unwrap_or_else(PoisonError::into_inner);
            call(&mut *guard)
        }));
        match outcome {
            Ok(Ok(value)) => Some(value),
            Ok(Err(error)) => {
                error!(plugin = %self.name(), hook, error = %format!("{error:#}"), "callback hook failed");
                None
            }
            Err(_) => {
                error!(plugin = %self.name(), hook, "callback hook panicked");
                None
            }
        }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.inner.id)
            .field("type_name", &self.inner.type_name)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/callback_tests.rs"]
mod tests;

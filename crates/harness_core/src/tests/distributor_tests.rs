use super::*;
use crate::{
    callback::Callback,
    component::{Capabilities, Injectable},
    observer::Observer,
};
use anyhow::{bail, Result};
use commands::{bundles::ForceCommands, Hittable};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

macro_rules! requester {
    ($name:ident, $($dep:expr),*) => {
        #[derive(Default)]
        struct $name {
            capabilities: Capabilities,
        }

        impl Component for $name {
            fn dependencies(&self) -> Vec<Dependency> {
                vec![$($dep),*]
            }

            fn capabilities_mut(&mut self) -> Option<&mut Capabilities> {
                Some(&mut self.capabilities)
            }
        }

        impl Callback for $name {}

        impl Injectable for $name {
            fn construct(_context: &WiringContext) -> Result<Self> {
                Ok(Self::default())
            }

            fn into_handle(value: Shared<Self>) -> Handle {
                Handle::callback(value)
            }
        }
    };
}

requester!(Viewer, Dependency::on::<Observer>());
requester!(Pauser, Dependency::on::<Observer>());
requester!(Left, Dependency::on::<Right>());
requester!(Right, Dependency::on::<Left>());
requester!(Lonely, Dependency::provided::<Database>());
requester!(Grumpy, Dependency::on::<Unbuildable>());
requester!(Selfish, Dependency::on::<Selfish>());
requester!(WantsViewer, Dependency::on::<Viewer>());

struct Database;
impl Component for Database {}

struct Unbuildable;
impl Component for Unbuildable {}
impl Injectable for Unbuildable {
    fn construct(_context: &WiringContext) -> Result<Self> {
        bail!("needs a GPU")
    }
}

fn handle_of<T: Callback>(value: T) -> (Shared<T>, Handle) {
    let value = crate::component::shared(value);
    let handle = Handle::callback(value.clone());
    (value, handle)
}

#[test]
fn missing_dependency_is_built_once_and_shared() {
    let (viewer, viewer_handle) = handle_of(Viewer::default());
    let (pauser, pauser_handle) = handle_of(Pauser::default());

    let distributor = Distributor::distribute(
        vec![viewer_handle, pauser_handle],
        Vec::new(),
        &WiringContext::detached(),
    )
    .expect("wired");

    let first = viewer.lock().expect("viewer").capabilities.require::<Observer>().expect("observer");
    let second = pauser.lock().expect("pauser").capabilities.require::<Observer>().expect("observer");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(distributor.others().len(), 1);
    assert_eq!(distributor.links().len(), 2);
    assert_eq!(distributor.links()[0].to_string(), "Viewer ---> Observer");
}

#[test]
fn provided_instance_is_preferred_over_construction() {
    let context = WiringContext::detached();
    let observer = crate::component::shared(Observer::from_weak(context.environment()));
    let (viewer, viewer_handle) = handle_of(Viewer::default());

    Distributor::distribute(
        vec![viewer_handle],
        vec![Handle::component(observer.clone())],
        &context,
    )
    .expect("wired");

    let injected = viewer.lock().expect("viewer").capabilities.require::<Observer>().expect("observer");
    assert!(Arc::ptr_eq(&injected, &observer));
}

#[test]
fn mutually_dependent_types_are_a_configuration_error() {
    let (_, left) = handle_of(Left::default());
    let error = Distributor::distribute(vec![left], Vec::new(), &WiringContext::detached())
        .err()
        .expect("cycle");
    match error {
        WiringError::DependencyCycle { chain } => {
            assert!(chain.contains("Left") && chain.contains("Right"), "{chain}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let (_, left) = handle_of(Left::default());
    let (_, right) = handle_of(Right::default());
    let error = Distributor::distribute(vec![left, right], Vec::new(), &WiringContext::detached())
        .err()
        .expect("cycle");
    assert!(matches!(error, WiringError::DependencyCycle { .. }));
}

#[test]
fn self_dependency_is_a_cycle() {
    let (_, selfish) = handle_of(Selfish::default());
    let error = Distributor::distribute(vec![selfish], Vec::new(), &WiringContext::detached())
        .err()
        .expect("cycle");
    assert!(matches!(error, WiringError::DependencyCycle { chain } if chain == "Selfish -> Selfish"));
}

#[test]
fn provided_only_dependency_must_be_supplied() {
    let (_, lonely) = handle_of(Lonely::default());
    let error = Distributor::distribute(vec![lonely.clone()], Vec::new(), &WiringContext::detached())
        .err()
        .expect("unresolved");
    assert!(matches!(error, WiringError::Unresolved { type_name } if type_name == "Database"));
    assert!(!lonely.is_started(), "nothing starts when wiring fails");

    let database = Handle::component(crate::component::shared(Database));
    Distributor::distribute(vec![lonely.clone()], vec![database], &WiringContext::detached())
        .expect("wired");
    assert!(lonely.is_started());
}

#[test]
fn construction_failure_names_the_type() {
    let (_, grumpy) = handle_of(Grumpy::default());
    let error = Distributor::distribute(vec![grumpy], Vec::new(), &WiringContext::detached())
        .err()
        .expect("construction");
    assert_eq!(error.to_string(), "failed to construct dependency `Unbuildable`");
    let source = std::error::Error::source(&error).expect("source");
    assert_eq!(source.to_string(), "needs a GPU");
}

struct Starter {
    order: Arc<Mutex<Vec<&'static str>>>,
    label: &'static str,
    starts: Arc<AtomicUsize>,
    children: Vec<Handle>,
    commands: Option<Arc<ForceCommands>>,
}

impl Starter {
    fn new(label: &'static str, order: &Arc<Mutex<Vec<&'static str>>>, starts: &Arc<AtomicUsize>) -> Self {
        Self {
            order: order.clone(),
            label,
            starts: starts.clone(),
            children: Vec::new(),
            commands: None,
        }
    }
}

impl Component for Starter {
    fn children(&self) -> Vec<Handle> {
        self.children.clone()
    }
}

impl Callback for Starter {
    fn on_start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.order.lock().expect("order").push(self.label);
        Ok(())
    }

    fn commands(&self) -> Option<Arc<dyn Hittable>> {
        self.commands.clone().map(|commands| commands as Arc<dyn Hittable>)
    }
}

#[test]
fn nested_children_are_tracked_and_everything_starts_once() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let starts = Arc::new(AtomicUsize::new(0));
    let shared_commands = Arc::new(ForceCommands::default());

    let mut child = Starter::new("child", &order, &starts);
    child.commands = Some(shared_commands.clone());
    let child = Handle::new(child);

    let mut parent = Starter::new("parent", &order, &starts);
    parent.children.push(child.clone());
    parent.commands = Some(shared_commands);
    let parent = Handle::new(parent);
    let sibling = Handle::new(Starter::new("sibling", &order, &starts));

    let distributor = Distributor::distribute(
        vec![parent.clone(), sibling, child.clone()],
        Vec::new(),
        &WiringContext::detached(),
    )
    .expect("wired");

    assert_eq!(distributor.callbacks().len(), 3);
    assert_eq!(distributor.pipeline().len(), 2, "nested child is driven by its parent");
    assert_eq!(starts.load(Ordering::SeqCst), 3);
    assert_eq!(*order.lock().expect("order"), vec!["child", "parent", "sibling"]);
    assert_eq!(distributor.commands().len(), 3, "shared commands are listed once");
    assert!(distributor.get::<Starter>().is_some());
}

#[test]
fn constructed_callbacks_join_the_pipeline() {
    let (_, wants_viewer) = handle_of(WantsViewer::default());

    let distributor =
        Distributor::distribute(vec![wants_viewer], Vec::new(), &WiringContext::detached())
            .expect("wired");
    assert_eq!(distributor.pipeline().len(), 2);
    assert!(distributor.pipeline().iter().all(Handle::is_started));
    assert!(distributor.get::<Viewer>().is_some());
    assert!(distributor.get::<Observer>().is_some());
}

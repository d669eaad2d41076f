use super::*;
use harness_core::Handle;

struct Stick(Action);

impl HumanControls for Stick {
    fn controls(&mut self) -> Action {
        self.0.clone()
    }
}

fn actions() -> ActionMap {
    ActionMap::from([
        (AgentId::new("blue"), vec![0.5, 0.5]),
        (AgentId::new("orange"), vec![0.25, 0.25]),
    ])
}

fn started(plugin: LivePlaying) -> (Handle, Arc<LivePlayingCommands>) {
    let commands = plugin.commands.clone();
    let handle = Handle::new(plugin);
    handle.start();
    (handle, commands)
}

#[test]
fn deadzone_zeroes_small_inputs() {
    assert_eq!(apply_deadzone(vec![0.05, -0.5, -0.09], 0.1), vec![0.0, -0.5, 0.0]);
}

#[test]
fn activate_toggles_takeover_of_the_first_agent() {
    let plugin = LivePlaying::new(Box::new(Stick(vec![1.0, 0.05])), 0.1, &KeyBindings::default());
    let (handle, commands) = started(plugin);

    assert_eq!(handle.on_pre_step(actions()), actions());

    commands.activate.fire().expect("activate");
    let taken = handle.on_pre_step(actions());
    assert_eq!(taken[&AgentId::new("blue")], vec![1.0, 0.0]);
    assert_eq!(taken[&AgentId::new("orange")], vec![0.25, 0.25]);

    commands.activate.fire().expect("deactivate");
    assert_eq!(handle.on_pre_step(actions()), actions());
}

#[test]
fn explicit_agent_is_taken_over() {
    let plugin = LivePlaying::new(Box::new(Stick(vec![-1.0, -1.0])), 0.0, &KeyBindings::default())
        .for_agent(AgentId::new("orange"));
    let (handle, commands) = started(plugin);
    commands.activate.fire().expect("activate");

    let taken = handle.on_pre_step(actions());
    assert_eq!(taken[&AgentId::new("blue")], vec![0.5, 0.5]);
    assert_eq!(taken[&AgentId::new("orange")], vec![-1.0, -1.0]);
}

#[test]
fn keyboard_controls_map_keys_to_axes() {
    let keys = Arc::new(KeyState::new());
    let mut controls = KeyboardControls::new(keys.clone());
    assert_eq!(controls.controls(), vec![0.0, 0.0]);

    keys.press("up");
    keys.press("left");
    assert_eq!(controls.controls(), vec![1.0, -1.0]);
    keys.press("down");
    assert_eq!(controls.controls(), vec![0.0, -1.0]);
}

#[test]
fn activate_key_follows_bindings() {
    let bindings = KeyBindings::new().with_override("activate", "f1");
    let plugin = LivePlaying::new(Box::new(Stick(vec![])), 0.0, &bindings);
    assert_eq!(plugin.commands.activate.trigger(), "f1");
}

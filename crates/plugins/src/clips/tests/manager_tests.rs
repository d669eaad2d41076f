use super::*;
use crate::{clips::replayer::LatestClip, force_instructor::ForceInstructor};
use commands::KeyState;
use harness_core::{Distributor, EnvControls, EnvironmentControl, Observer, WiringContext};
use shared::domain::AgentId;
use std::fs;

struct Rig {
    _dir: tempfile::TempDir,
    manager: Shared<ClipManager>,
    handle: Handle,
    distributor: Distributor,
    library: Arc<ClipLibrary>,
    commands: Arc<ClipManagerCommands>,
}

fn rig(n_steps_saved: usize) -> Rig {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ClipManagerConfig {
        clip_path: dir.path().join("clips.json"),
        legend_path: dir.path().join("clips.txt"),
        n_steps_saved,
        wait_for_selection: false,
    };
    let manager = ClipManager::new(&config, &KeyBindings::default(), Box::new(LatestClip))
        .expect("manager");
    let library = manager.library().clone();
    let commands = manager.clip_commands().clone();
    let manager = harness_core::shared(manager);
    let handle = Handle::callback(manager.clone());

    let controls: Arc<dyn EnvironmentControl> = Arc::new(EnvControls::new());
    let observer = Handle::component(harness_core::shared(Observer::new(&controls)));
    let distributor = Distributor::distribute(
        vec![handle.clone()],
        vec![observer],
        &WiringContext::detached(),
    )
    .expect("wired");

    Rig {
        _dir: dir,
        manager,
        handle,
        distributor,
        library,
        commands,
    }
}

fn step(handle: &Handle, tick: u64) {
    let actions = ActionMap::from([(AgentId::new("blue"), vec![tick as f32])]);
    let actions = handle.on_pre_step(actions);
    let state = GameState::at_tick(tick);
    handle.on_step(&Transition {
        obs: &Default::default(),
        actions: &actions,
        rewards: &Default::default(),
        terminated: &Default::default(),
        truncated: &Default::default(),
        state: &state,
    });
}

#[test]
fn children_are_tracked_and_the_replayer_is_wired() {
    let rig = rig(10);
    let names: Vec<String> = rig.distributor.callbacks().iter().map(Handle::name).collect();
    assert_eq!(
        names,
        vec![
            "clip_manager",
            "state_action_clipper",
            "state_action_replayer",
            "clip_recorder",
            "force_instructor",
        ]
    );
    let pipeline: Vec<String> = rig.distributor.pipeline().iter().map(Handle::name).collect();
    assert_eq!(pipeline, vec!["clip_manager", "force_instructor"]);
    assert!(rig.distributor.get::<ForceInstructor>().is_some());
    assert!(rig.distributor.callbacks().iter().all(Handle::is_started));
}

#[test]
fn clipping_blocks_replay_and_library_commands() {
    let rig = rig(10);
    let keys = KeyState::new();
    let clip = &rig.commands.clipper_commands.clip;
    assert!(!clip.is_pressed(&keys));
    keys.press(clip.trigger());
    assert!(clip.is_pressed(&keys));

    assert!(rig.commands.replayer_commands.play_clip.is_blocked());
    assert!(rig.commands.unload_clips.is_blocked());
    assert!(rig.commands.save_clips.is_blocked());
    assert!(rig.commands.load_clips.is_blocked());
    assert!(!rig.commands.recorder_commands.toggle_recording.is_blocked());

    clip.fire().expect("clip");
    step(&rig.handle, 1);
    assert!(!rig.commands.replayer_commands.play_clip.is_blocked());
}

#[test]
fn clip_saves_the_rolling_window() {
    let rig = rig(3);
    for tick in 1..=5 {
        step(&rig.handle, tick);
    }
    rig.commands.clipper_commands.clip.fire().expect("clip");
    step(&rig.handle, 6);

    let clips = rig.library.clips();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].starting_state, GameState::at_tick(3));
    let replayed: Vec<f32> = clips[0]
        .actions
        .iter()
        .map(|actions| actions[&AgentId::new("blue")][0])
        .collect();
    assert_eq!(replayed, vec![3.0, 4.0, 5.0]);
}

#[test]
fn recording_runs_between_two_toggles() {
    let rig = rig(10);
    let toggle = &rig.commands.recorder_commands.toggle_recording;

    step(&rig.handle, 1);
    toggle.fire().expect("start");
    step(&rig.handle, 2);
    step(&rig.handle, 3);
    step(&rig.handle, 4);
    toggle.fire().expect("stop");
    assert!(rig.library.is_empty(), "saved on the next step");
    step(&rig.handle, 5);

    let clip = rig.library.get(0).expect("recorded clip");
    assert_eq!(clip.starting_state, GameState::at_tick(2));
    assert_eq!(clip.len(), 2);
}

#[test]
fn unload_then_load_restores_saved_clips() {
    let rig = rig(2);
    step(&rig.handle, 1);
    rig.commands.clipper_commands.clip.fire().expect("clip");
    step(&rig.handle, 2);
    assert_eq!(rig.library.len(), 1);

    rig.commands.unload_clips.fire().expect("unload");
    assert_eq!(rig.library.len(), 1, "unload happens on the step thread");
    step(&rig.handle, 3);
    assert!(rig.library.is_empty());
    assert_eq!(rig.manager.lock().expect("manager").clipper.lock().expect("clipper").window_len(), 0);

    rig.commands.load_clips.fire().expect("load");
    assert_eq!(rig.library.len(), 1);
}

#[test]
fn save_rewrites_the_legend() {
    let rig = rig(2);
    step(&rig.handle, 1);
    rig.commands.clipper_commands.clip.fire().expect("clip");
    step(&rig.handle, 2);
    fs::write(rig.library.legend_path(), "").expect("truncate legend");

    rig.commands.save_clips.fire().expect("save");
    let legend = fs::read_to_string(rig.library.legend_path()).expect("legend");
    assert!(legend.starts_with("0 - Clip_"));
}

#[test]
fn state_view_nests_child_state() {
    let rig = rig(4);
    step(&rig.handle, 1);
    let view = rig.handle.view();
    assert_eq!(view.state["children"]["state_action_clipper"]["window"], 1);
    assert_eq!(view.state["children"]["clip_recorder"]["recording"], false);
    assert!(view
        .commands
        .iter()
        .any(|command| command.name == "replayer_commands.stop_clip"));
}

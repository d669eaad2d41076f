use super::*;
use commands::{Command, KeyState};
use harness_core::{
    Distributor, EnvControls, EnvironmentControl, Handle, InitialState, WiringContext,
};
use shared::domain::{AgentId, GameState};

struct Rig {
    _dir: tempfile::TempDir,
    controls: Arc<EnvControls>,
    commands: Arc<StateActionReplayerCommands>,
    replayer: harness_core::Shared<StateActionReplayer>,
    handle: Handle,
    distributor: Distributor,
}

fn actions(value: f32) -> ActionMap {
    ActionMap::from([(AgentId::new("blue"), vec![value])])
}

fn rig(clips: usize, selector: Box<dyn ClipSelector>) -> Rig {
    let dir = tempfile::tempdir().expect("tempdir");
    let library = Arc::new(
        ClipLibrary::open(dir.path().join("clips.json"), dir.path().join("clips.txt"))
            .expect("library"),
    );
    for index in 0..clips {
        let base = (index * 10) as f32;
        library
            .register(
                GameState::at_tick(index as u64 * 100),
                vec![actions(base + 1.0), actions(base + 2.0), actions(base + 3.0)],
            )
            .expect("register");
    }

    let controls = Arc::new(EnvControls::new());
    let control: Arc<dyn EnvironmentControl> = controls.clone();
    let observer = Handle::component(harness_core::shared(Observer::new(&control)));

    let commands = Arc::new(StateActionReplayerCommands::default());
    let replayer = harness_core::shared(StateActionReplayer::new(library, commands.clone(), selector));
    let handle = Handle::callback(replayer.clone());
    let distributor = Distributor::distribute(
        vec![handle.clone()],
        vec![observer],
        &WiringContext::detached(),
    )
    .expect("wired");

    Rig {
        _dir: dir,
        controls,
        commands,
        replayer,
        handle,
        distributor,
    }
}

fn step(handle: &Handle, input: ActionMap) -> ActionMap {
    let actions = handle.on_pre_step(input);
    let state = GameState::default();
    handle.on_step(&Transition {
        obs: &Default::default(),
        actions: &actions,
        rewards: &Default::default(),
        terminated: &Default::default(),
        truncated: &Default::default(),
        state: &state,
    });
    actions
}

/// Registers a clip command blocked by `play_clip` and presses `play_clip`
/// so the block is active.
fn press_play(play_clip: &Arc<Command>) -> Arc<Command> {
    let clip = Command::new("k", 0).shared();
    play_clip.add_to_blocked(&[&clip]);

    let keys = KeyState::new();
    assert!(!play_clip.is_pressed(&keys));
    keys.press(play_clip.trigger());
    assert!(play_clip.is_pressed(&keys));
    assert!(clip.is_blocked());
    clip
}

#[test]
fn play_clip_forces_a_reset_and_queues_the_selected_clip() {
    let rig = rig(2, Box::new(FixedClip(1)));
    let force = rig
        .distributor
        .get::<ForceInstructor>()
        .expect("force instructor built")
        .lock()
        .expect("instructor")
        .signals();

    rig.commands.play_clip.fire().expect("play");
    assert!(force.is_reset_pending());

    rig.handle.on_pre_reset();
    assert_eq!(rig.controls.current_setter(), Some((CLIP_SETTER.to_string(), 0)));
    assert_eq!(
        rig.controls.take_initial_state(),
        InitialState::Clip(GameState::at_tick(100))
    );
    assert!(rig.replayer.lock().expect("replayer").is_replaying());
}

#[test]
fn clip_actions_replace_the_agent_actions_until_the_clip_ends() {
    let rig = rig(1, Box::new(LatestClip));
    let clip = press_play(&rig.commands.play_clip);

    rig.commands.play_clip.fire().expect("play");
    rig.handle.on_pre_reset();

    assert_eq!(step(&rig.handle, actions(0.0)), actions(1.0));
    assert_eq!(step(&rig.handle, actions(0.0)), actions(2.0));
    assert_eq!(step(&rig.handle, actions(0.0)), actions(3.0));
    assert!(!rig.replayer.lock().expect("replayer").is_replaying());
    assert!(!clip.is_blocked(), "end of clip unblocks clipping");

    assert_eq!(step(&rig.handle, actions(0.0)), actions(0.0));
}

#[test]
fn stop_clip_ends_the_replay_early() {
    let rig = rig(1, Box::new(LatestClip));
    rig.commands.play_clip.fire().expect("play");
    rig.handle.on_pre_reset();

    assert_eq!(step(&rig.handle, actions(0.0)), actions(1.0));
    rig.commands.stop_clip.fire().expect("stop");
    step(&rig.handle, actions(0.0));
    assert_eq!(step(&rig.handle, actions(5.0)), actions(5.0));
}

#[test]
fn reset_during_replay_ends_it() {
    let rig = rig(1, Box::new(LatestClip));
    rig.commands.play_clip.fire().expect("play");
    rig.handle.on_pre_reset();
    step(&rig.handle, actions(0.0));

    rig.handle.on_pre_reset();
    assert!(!rig.replayer.lock().expect("replayer").is_replaying());
    assert_eq!(rig.controls.pending_clips(), 1, "only the first request queued a clip");
}

#[test]
fn empty_library_or_bad_choice_cancels() {
    let empty = rig(0, Box::new(LatestClip));
    let clip = press_play(&empty.commands.play_clip);
    empty.commands.play_clip.fire().expect("play");
    empty.handle.on_pre_reset();
    assert!(!empty.replayer.lock().expect("replayer").is_replaying());
    assert!(!clip.is_blocked());
    assert_eq!(empty.controls.current_setter(), None);

    let out_of_range = rig(1, Box::new(FixedClip(7)));
    out_of_range.commands.play_clip.fire().expect("play");
    out_of_range.handle.on_pre_reset();
    assert!(!out_of_range.replayer.lock().expect("replayer").is_replaying());
    assert_eq!(out_of_range.controls.pending_clips(), 0);
}

#[test]
fn targets_are_inert_after_close() {
    let rig = rig(1, Box::new(LatestClip));
    rig.handle.on_close();
    rig.commands.play_clip.fire().expect("play");
    let view = rig.handle.view();
    assert_eq!(view.state["active"], false);
    assert_eq!(view.state["clips"], 1);
}

#[test]
fn stop_pressed_while_idle_does_not_cancel_a_later_play() {
    let rig = rig(1, Box::new(LatestClip));

    rig.commands.stop_clip.fire().expect("stop");
    assert_eq!(step(&rig.handle, actions(0.0)), actions(0.0));

    rig.commands.play_clip.fire().expect("play");
    rig.handle.on_pre_reset();
    assert!(rig.replayer.lock().expect("replayer").is_replaying());
    assert_eq!(step(&rig.handle, actions(0.0)), actions(1.0));
}

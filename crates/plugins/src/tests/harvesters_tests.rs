use super::*;
use harness_core::Handle;
use shared::domain::DoneMap;

fn blue() -> AgentId {
    AgentId::new("blue")
}

fn orange() -> AgentId {
    AgentId::new("orange")
}

fn step(handle: &Handle, tick: u64, blue_reward: f32, orange_reward: f32) {
    let rewards = RewardMap::from([(blue(), blue_reward), (orange(), orange_reward)]);
    let actions = ActionMap::from([(blue(), vec![tick as f32])]);
    let state = GameState::at_tick(tick);
    handle.on_step(&Transition {
        obs: &ObsMap::new(),
        actions: &actions,
        rewards: &rewards,
        terminated: &DoneMap::new(),
        truncated: &DoneMap::new(),
        state: &state,
    });
}

#[test]
fn episode_log_opens_an_episode_on_first_record() {
    let mut log = EpisodeLog::default();
    assert!(log.current().is_none());
    log.record(1);
    log.record(2);
    log.start_episode();
    log.record(3);

    assert_eq!(log.episodes(), &[vec![1, 2], vec![3]]);
    assert_eq!(log.episode(0), Some(&[1, 2][..]));
    assert_eq!(log.step_count(), 3);
}

#[test]
fn reward_harvester_averages_the_current_episode() {
    let harvester = harness_core::shared(RewardHarvester::new());
    let handle = Handle::callback(harvester.clone());
    handle.start();

    handle.on_reset(&ObsMap::new(), &GameState::default());
    step(&handle, 1, 5.0, 0.0);
    handle.on_reset(&ObsMap::new(), &GameState::default());
    step(&handle, 1, 1.0, -1.0);
    step(&handle, 2, 3.0, 1.0);

    let harvester = harvester.lock().expect("harvester");
    assert_eq!(harvester.log().episode_count(), 2);
    let mean = harvester.current_episode_mean();
    assert_eq!(mean[&blue()], 2.0);
    assert_eq!(mean[&orange()], 0.0);
}

#[test]
fn state_and_action_harvesters_split_by_episode() {
    let states = harness_core::shared(StateHarvester::new());
    let actions = harness_core::shared(ActionHarvester::new());
    let handles = [Handle::callback(states.clone()), Handle::callback(actions.clone())];

    for handle in &handles {
        handle.start();
        handle.on_reset(&ObsMap::new(), &GameState::default());
        step(handle, 1, 0.0, 0.0);
        step(handle, 2, 0.0, 0.0);
        handle.on_reset(&ObsMap::new(), &GameState::default());
        step(handle, 1, 0.0, 0.0);
    }

    let states = states.lock().expect("states");
    let ticks: Vec<u64> = states.log().episodes()[0].iter().map(|state| state.tick).collect();
    assert_eq!(ticks, vec![1, 2]);
    assert_eq!(states.log().episode_count(), 2);

    let actions = actions.lock().expect("actions");
    assert_eq!(actions.log().current().map(<[ActionMap]>::len), Some(1));
    assert_eq!(handles[1].view().state["steps"], 3);
}

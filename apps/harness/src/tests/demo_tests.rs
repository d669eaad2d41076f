use super::*;

#[test]
fn kickoff_places_cars_symmetrically() {
    let mut sim = ChaseSimulation::new(10);
    let (obs, state) = sim
        .reset(&InitialState::Setter {
            name: KICKOFF_SETTER.into(),
            index: 1,
        })
        .expect("reset");

    assert_eq!(state.tick, 0);
    assert_eq!(obs[&blue()][1], 0.0);
    assert!((obs[&blue()][0] + obs[&orange()][0]).abs() < f32::EPSILON);
}

#[test]
fn scatter_is_deterministic() {
    assert_eq!(ChaseState::scatter(4), ChaseState::scatter(4));
    assert_ne!(ChaseState::scatter(4), ChaseState::scatter(5));
}

#[test]
fn unknown_setter_is_an_error() {
    let mut sim = ChaseSimulation::new(10);
    let error = sim
        .reset(&InitialState::Setter {
            name: "aerial".into(),
            index: 0,
        })
        .expect_err("unknown");
    assert!(error.to_string().contains("aerial"));
}

#[test]
fn chasing_the_ball_ends_the_episode() {
    let mut sim = ChaseSimulation::new(1_000);
    let (mut obs, _) = sim.reset(&InitialState::Default).expect("reset");
    let policy = ChaseBall;

    let mut steps = 0;
    loop {
        let actions = policy.act(&obs).expect("act");
        let (outcome, _) = sim.step(&actions).expect("step");
        steps += 1;
        obs = outcome.obs.clone();
        if outcome.is_done() {
            assert!(outcome.is_terminated());
            break;
        }
        assert!(steps < 100, "cars never reached the ball");
    }
}

#[test]
fn episodes_truncate_after_the_step_limit() {
    let mut sim = ChaseSimulation::new(2);
    sim.reset(&InitialState::Default).expect("reset");
    let idle = ActionMap::from([(blue(), vec![0.0]), (orange(), vec![0.0])]);

    let (first, _) = sim.step(&idle).expect("step");
    let (second, _) = sim.step(&idle).expect("step");
    assert!(!first.is_truncated());
    assert!(second.is_truncated());
}

#[test]
fn clips_restore_the_saved_positions() {
    let mut sim = ChaseSimulation::new(10);
    sim.reset(&InitialState::Setter {
        name: SCATTER_SETTER.into(),
        index: 2,
    })
    .expect("reset");
    let idle = ActionMap::from([(blue(), vec![1.0])]);
    let (_, saved) = sim.step(&idle).expect("step");
    let saved_state = sim.state().clone();

    sim.reset(&InitialState::Default).expect("reset");
    let (_, restored) = sim.reset(&InitialState::Clip(saved.clone())).expect("clip");

    assert_eq!(restored.tick, saved.tick);
    assert_eq!(sim.state().cars, saved_state.cars);
    assert_eq!(sim.state().episode_tick, 0);
}

#[test]
fn actions_for_unknown_agents_fail() {
    let mut sim = ChaseSimulation::new(10);
    sim.reset(&InitialState::Default).expect("reset");
    let actions = ActionMap::from([(AgentId::new("purple"), vec![1.0])]);
    assert!(sim.step(&actions).is_err());
}

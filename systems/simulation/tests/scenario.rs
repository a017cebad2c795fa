use std::time::Duration;

use chronopath_core::{
    EpisodeOutcome, Event, Layout, Position, RunAverages, SimulationState, WorldSnapshot,
};
use chronopath_system_simulation::{GridConfig, SimulationConfig, SimulationController};
use chronopath_world::query;

const TICK: Duration = Duration::from_millis(100);

fn open_field() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.grid = GridConfig {
        width: 5,
        height: 5,
        start: Position::new(0, 0),
        goal: Position::new(4, 4),
        layout: Layout::Open,
        holes: 0,
    };
    config.history.snapshot_period_ms = 0;
    config.drift.period_ticks = 0;
    config.run.episodes = 1;
    config
}

fn run_to_completion(controller: &mut SimulationController, limit: usize) -> Vec<Event> {
    let mut events = Vec::new();
    controller.start(&mut events);
    for _ in 0..limit {
        if controller.is_finished() {
            break;
        }
        controller.tick(TICK, &mut events).expect("tick");
    }
    events
}

#[test]
fn open_field_is_crossed_diagonally_without_rewinds() {
    let mut controller = SimulationController::new(open_field()).expect("controller");

    let events = run_to_completion(&mut controller, 50);

    let steps: Vec<(Position, u32)> = events
        .iter()
        .filter_map(|event| match event {
            Event::AgentMoved { to, step_cost, .. } => Some((*to, *step_cost)),
            _ => None,
        })
        .collect();
    assert_eq!(
        steps,
        vec![
            (Position::new(1, 1), 14),
            (Position::new(2, 2), 14),
            (Position::new(3, 3), 14),
            (Position::new(4, 4), 14),
        ]
    );
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::RewindScheduled { .. })));

    let summaries = controller.statistics().summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].outcome, EpisodeOutcome::ReachedGoal);
    assert_eq!(summaries[0].final_cost, 56);
    assert_eq!(summaries[0].rewinds_used, 0);
    assert_eq!(summaries[0].ticks, 4);
    assert!(events.contains(&Event::RunCompleted {
        averages: RunAverages {
            episodes: 1,
            mean_cost: 56.0,
            mean_rewinds: 0.0,
        },
    }));
    assert_eq!(controller.state(), SimulationState::Paused);
}

#[test]
fn every_episode_restarts_from_the_start_cell() {
    let mut config = open_field();
    config.run.episodes = 3;
    let mut controller = SimulationController::new(config).expect("controller");

    let events = run_to_completion(&mut controller, 50);

    let summaries = controller.statistics().summaries();
    assert_eq!(summaries.len(), 3);
    assert!(summaries
        .iter()
        .zip(1..)
        .all(|(summary, episode)| summary.episode == episode && summary.final_cost == 56));
    let resets = events
        .iter()
        .filter(|event| matches!(event, Event::LayoutReset { .. }))
        .count();
    assert_eq!(resets, 2);
}

#[test]
fn seeded_runs_with_drift_are_reproducible() {
    let mut config = SimulationConfig::default();
    config.run.episodes = 3;
    config.run.seed = 0xc0ffee;

    let mut first_controller = SimulationController::new(config.clone()).expect("controller");
    let mut second_controller = SimulationController::new(config).expect("controller");

    let first = run_to_completion(&mut first_controller, 10_000);
    let second = run_to_completion(&mut second_controller, 10_000);

    assert_eq!(first, second);
    assert!(first
        .iter()
        .any(|event| matches!(event, Event::TilesDrifted { .. })));
}

#[test]
fn automatic_rewinds_land_on_the_chosen_snapshot() {
    let mut config = SimulationConfig::default();
    config.rewind.base_cost = 1;
    config.rewind.comparison_window = 1;
    config.drift.period_ticks = 1;
    config.drift.tiles = 8;
    config.history.snapshot_period_ms = 100;
    config.run.episodes = 2;

    let mut scheduled = 0;
    let mut restored = 0;
    for seed in 0..24 {
        config.run.seed = seed;
        let mut controller = SimulationController::new(config.clone()).expect("controller");
        let base_cost = controller.config().rewind.base_cost;
        let mut events = Vec::new();
        controller.start(&mut events);

        let mut target: Option<WorldSnapshot> = None;
        let mut rewinds_in_episode = 0;
        for _ in 0..10_000 {
            if controller.is_finished() {
                break;
            }
            events.clear();
            controller.tick(TICK, &mut events).expect("tick");

            let episode_ended = events
                .iter()
                .any(|event| matches!(event, Event::EpisodeCompleted { .. }));
            for event in &events {
                match event {
                    Event::RewindScheduled {
                        snapshots_ago,
                        penalty,
                    } => {
                        assert_eq!(*penalty, base_cost * (rewinds_in_episode + 1));
                        rewinds_in_episode += 1;
                        scheduled += 1;
                        if !episode_ended {
                            let snapshot = controller
                                .history()
                                .at(*snapshots_ago)
                                .expect("rewind target is recorded");
                            target = Some(snapshot.clone());
                        }
                    }
                    Event::RewindCompleted { .. } if !episode_ended => {
                        let expected = target.take().expect("completion follows a schedule");
                        assert_eq!(query::snapshot(controller.world()), expected);
                        restored += 1;
                    }
                    Event::EpisodeCompleted { summary } => {
                        assert_eq!(summary.rewinds_used, rewinds_in_episode);
                        rewinds_in_episode = 0;
                        target = None;
                        if !controller.is_finished() {
                            assert_eq!(controller.episode(), summary.episode + 1);
                            assert_eq!(controller.rewinds_used(), 0);
                        }
                    }
                    _ => {}
                }
            }
        }
        assert!(controller.is_finished());
    }

    assert!(scheduled > 0);
    assert!(restored > 0);
}

//! Plain-text lines printed for finished episodes and runs.

use chronopath_core::{EpisodeOutcome, EpisodeSummary, Event, RunAverages};

/// Formats the lines worth printing for a batch of events.
pub(crate) fn render(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::EpisodeCompleted { summary } => Some(episode_line(summary)),
            Event::RunCompleted { averages } => Some(run_line(averages)),
            _ => None,
        })
        .collect()
}

fn episode_line(summary: &EpisodeSummary) -> String {
    let outcome = match summary.outcome {
        EpisodeOutcome::ReachedGoal => "reached goal",
        EpisodeOutcome::Stranded => "stranded",
    };
    format!(
        "episode {}: {outcome}, cost {}, rewinds {}, ticks {}",
        summary.episode, summary.final_cost, summary.rewinds_used, summary.ticks
    )
}

fn run_line(averages: &RunAverages) -> String {
    format!(
        "run: {} episodes, mean cost {:.2}, mean rewinds {:.2}",
        averages.episodes, averages.mean_cost, averages.mean_rewinds
    )
}

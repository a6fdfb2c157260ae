pub mod plurality;

use crate::models::{PollDefinition, PollSnapshot};

// Generic structure for poll results
#[derive(Debug, Clone, PartialEq)]
pub struct PollResults {
    pub winner: Option<String>,    // Title of the leading option, if any votes exist
    pub winner_id: Option<String>, // ID of the leading option
    pub summary: String,           // Detailed results as formatted text
    pub total_votes: u64,
    pub raw_results: Vec<VoteCount>, // Counts for all options, highest first
}

// Structure to hold vote counts
#[derive(Debug, Clone, PartialEq)]
pub struct VoteCount {
    pub option_id: String,
    pub option_text: String,
    pub votes: u64,
    pub percentage: f64,
    pub rank: usize,
}

/// Totals across every poll on the results page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverallStats {
    pub total_votes: u64,
    pub total_options: usize,
    /// Polls with at least one vote.
    pub active_polls: usize,
}

pub fn overall_stats(polls: &[(&PollDefinition, PollSnapshot)]) -> OverallStats {
    polls
        .iter()
        .fold(OverallStats::default(), |mut stats, (_, snapshot)| {
            let votes = snapshot.total_votes();
            stats.total_votes = stats.total_votes.saturating_add(votes);
            stats.total_options += snapshot.options.len();
            if votes > 0 {
                stats.active_polls += 1;
            }
            stats
        })
}

/// Share of `votes` in `total` as a percentage rounded to one decimal.
pub fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 1000.0 / total as f64).round() / 10.0
}

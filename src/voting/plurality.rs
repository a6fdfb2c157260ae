use crate::models::PollSnapshot;
use crate::voting::{percentage, PollResults, VoteCount};

pub fn calculate_results(snapshot: &PollSnapshot) -> PollResults {
    let total_votes = snapshot.total_votes();

    // Highest tally first; the sort is stable so ties keep seed order
    let mut sorted: Vec<_> = snapshot.options.iter().collect();
    sorted.sort_by(|a, b| b.votes.cmp(&a.votes));

    let raw_results: Vec<VoteCount> = sorted
        .iter()
        .enumerate()
        .map(|(i, option)| VoteCount {
            option_id: option.id.clone(),
            option_text: option.title.clone(),
            votes: option.votes,
            percentage: percentage(option.votes, total_votes),
            rank: i + 1,
        })
        .collect();

    // If no votes were cast
    if total_votes == 0 {
        return PollResults {
            winner: None,
            winner_id: None,
            summary: "No votes were cast in this poll.".to_string(),
            total_votes,
            raw_results,
        };
    }

    let winner = &raw_results[0];

    let mut summary = String::new();
    for count in &raw_results {
        // Format the line differently for the winner
        let line = if count.option_id == winner.option_id {
            format!("**{}**: {} votes ({:.1}%)", count.option_text, count.votes, count.percentage)
        } else {
            format!("{}: {} votes ({:.1}%)", count.option_text, count.votes, count.percentage)
        };
        summary.push_str(&line);
        summary.push('\n');
    }
    summary.push_str(&format!("\n{} votes in total.", total_votes));

    PollResults {
        winner: Some(winner.option_text.clone()),
        winner_id: Some(winner.option_id.clone()),
        summary,
        total_votes,
        raw_results,
    }
}

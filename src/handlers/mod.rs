use log::{error, info, warn};

use crate::commands::{Command, HELP};
use crate::models::{seed, PollSnapshot, PollUpdate, UpdateSource};
use crate::session::SessionGuard;
use crate::store::{PollStore, PollStoreError};
use crate::voting::{overall_stats, percentage, plurality};

// Run one command against this tab's store and describe the outcome
pub async fn handle_command(store: &PollStore, guard: &mut SessionGuard, command: Command) -> String {
    info!("Received command: {:?}", command);
    match command {
        Command::List => handle_list(store).await,
        Command::Show { poll_id } => {
            let snapshot = store.get_snapshot(&poll_id).await;
            render_poll(&poll_id, &snapshot, guard.selected_option(&poll_id))
        }
        Command::Vote { poll_id, option_id } => handle_vote(store, guard, &poll_id, &option_id).await,
        Command::Reset { poll_id } => {
            // A reset poll can be voted in again from this tab
            guard.clear(&poll_id);
            match store.reset_poll(&poll_id).await {
                Ok(snapshot) => format!("Poll '{}' reset.\n{}", poll_id, render_poll(&poll_id, &snapshot, None)),
                Err(e) => persist_notice(&e),
            }
        }
        Command::ResetAll => {
            guard.clear_all();
            match store.reset_all().await {
                Ok(()) => "All polls are back to their starting tallies.".to_string(),
                Err(e) => persist_notice(&e),
            }
        }
        Command::Results => handle_results(store).await,
        Command::Help => HELP.to_string(),
        Command::Quit => "Bye.".to_string(),
    }
}

async fn handle_list(store: &PollStore) -> String {
    let polls = store.snapshots().await;
    let mut out = String::new();
    for (poll, snapshot) in &polls {
        out.push_str(&format!(
            "{:<10} {} ({} votes)\n",
            poll.id,
            poll.title,
            snapshot.total_votes()
        ));
    }
    out.trim_end().to_string()
}

async fn handle_vote(store: &PollStore, guard: &mut SessionGuard, poll_id: &str, option_id: &str) -> String {
    // Check if this tab has already voted in this poll
    if let Some(previous) = guard.selected_option(poll_id) {
        return format!("You already voted for '{}' in '{}' from this tab.", previous, poll_id);
    }

    let snapshot = match store.cast_vote(poll_id, option_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            // The vote still counts in this tab, so the guard records it
            error!("Vote in '{}' was not saved: {}", poll_id, e);
            guard.record_vote(poll_id, option_id);
            return persist_notice(&e);
        }
    };

    if snapshot.option(option_id).is_none() {
        warn!("Vote for unknown option '{}' in poll '{}'", option_id, poll_id);
        return format!("Poll '{}' has no option '{}'.", poll_id, option_id);
    }

    guard.record_vote(poll_id, option_id);
    format!(
        "Thanks for voting!\n{}",
        render_poll(poll_id, &snapshot, Some(option_id))
    )
}

async fn handle_results(store: &PollStore) -> String {
    let polls = store.snapshots().await;
    let stats = overall_stats(&polls);

    let mut out = format!(
        "{} votes across {} options, {} active poll(s)\n",
        stats.total_votes, stats.total_options, stats.active_polls
    );
    for (poll, snapshot) in &polls {
        let results = plurality::calculate_results(snapshot);
        out.push_str(&format!("\n{} - {}\n", poll.title, poll.description));
        if let Some(winner) = &results.winner {
            out.push_str(&format!("Leading: {}\n", winner));
        }
        out.push_str(&results.summary);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn persist_notice(err: &PollStoreError) -> String {
    format!(
        "Notice: the change shows in this tab but was not saved, other tabs will not see it ({}).",
        err
    )
}

/// Text view of one poll, options in stored order.
pub fn render_poll(poll_id: &str, snapshot: &PollSnapshot, selected: Option<&str>) -> String {
    if snapshot.is_empty() {
        return format!("Poll '{}' has no options.", poll_id);
    }

    let title = seed::definition(poll_id).map(|poll| poll.title).unwrap_or(poll_id);
    let total = snapshot.total_votes();
    let mut out = format!("{} (total votes: {})\n", title, total);
    for option in &snapshot.options {
        let marker = if selected == Some(option.id.as_str()) { "*" } else { " " };
        out.push_str(&format!(
            "{} {:<10} {:<14} {:>6} {:>5.1}%\n",
            marker,
            option.id,
            option.title,
            option.votes,
            percentage(option.votes, total)
        ));
    }
    out.trim_end().to_string()
}

/// One log line per update delivered to this tab's subscriptions.
pub fn describe_update(update: &PollUpdate) -> String {
    let via = match update.source {
        UpdateSource::Local => "this tab",
        UpdateSource::CrossTab => "another tab",
        UpdateSource::Polling => "storage poll",
    };
    format!(
        "Poll '{}' updated via {}: {} votes",
        update.poll_id,
        via,
        update.snapshot.total_votes()
    )
}

use std::collections::HashMap;

/// Per-tab record of which polls this tab already voted in.
///
/// Lives only as long as the tab. The poll store never looks at it; the
/// front-end checks it before casting a vote and fills it in afterwards.
#[derive(Debug, Default)]
pub struct SessionGuard {
    votes: HashMap<String, String>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_voted(&self, poll_id: &str) -> bool {
        self.votes.contains_key(poll_id)
    }

    pub fn selected_option(&self, poll_id: &str) -> Option<&str> {
        self.votes.get(poll_id).map(String::as_str)
    }

    pub fn record_vote(&mut self, poll_id: &str, option_id: &str) {
        self.votes.insert(poll_id.to_string(), option_id.to_string());
    }

    pub fn clear(&mut self, poll_id: &str) {
        self.votes.remove(poll_id);
    }

    pub fn clear_all(&mut self) {
        self.votes.clear();
    }
}

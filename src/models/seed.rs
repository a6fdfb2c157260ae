use lazy_static::lazy_static;

use super::{PollDefinition, PollOption, PollSnapshot};

fn option(id: &str, title: &str, description: &str, votes: u64, color: &str) -> PollOption {
    PollOption {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        votes,
        color: color.to_string(),
    }
}

lazy_static! {
    // Built-in polls, in the order result pages list them.
    static ref CATALOGUE: Vec<PollDefinition> = vec![
        PollDefinition {
            id: "frontend",
            title: "Frontend Frameworks",
            description: "Most popular frontend frameworks and libraries",
            seed: PollSnapshot::new(vec![
                option("react", "React", "JavaScript library for building user interfaces", 245, "hsl(193, 95%, 68%)"),
                option("vue", "Vue.js", "Progressive framework for building UIs", 189, "hsl(153, 47%, 49%)"),
                option("angular", "Angular", "Platform for building mobile and desktop apps", 156, "hsl(348, 86%, 61%)"),
                option("svelte", "Svelte", "Cybernetically enhanced web apps", 87, "hsl(15, 100%, 50%)"),
            ]),
        },
        PollDefinition {
            id: "backend",
            title: "Backend Technologies",
            description: "Preferred backend technologies and frameworks",
            seed: PollSnapshot::new(vec![
                option("nodejs", "Node.js", "JavaScript runtime built on Chrome's V8", 312, "hsl(120, 100%, 25%)"),
                option("python", "Python", "High-level programming language", 298, "hsl(55, 100%, 50%)"),
                option("java", "Java", "Object-oriented programming language", 201, "hsl(25, 100%, 50%)"),
                option("csharp", "C#", "Modern language by Microsoft", 167, "hsl(280, 100%, 50%)"),
            ]),
        },
        PollDefinition {
            id: "devtools",
            title: "Developer Tools",
            description: "Essential development tools and editors",
            seed: PollSnapshot::new(vec![
                option("vscode", "VS Code", "Free source-code editor by Microsoft", 423, "hsl(210, 100%, 60%)"),
                option("webstorm", "WebStorm", "Powerful IDE for JavaScript development", 156, "hsl(45, 100%, 50%)"),
                option("vim", "Vim/Neovim", "Highly configurable text editor", 134, "hsl(120, 50%, 40%)"),
                option("sublime", "Sublime Text", "Sophisticated text editor", 89, "hsl(30, 100%, 50%)"),
            ]),
        },
    ];
}

/// Every known poll, in display order.
pub fn catalogue() -> &'static [PollDefinition] {
    &CATALOGUE
}

pub fn definition(poll_id: &str) -> Option<&'static PollDefinition> {
    CATALOGUE.iter().find(|poll| poll.id == poll_id)
}

/// Seed options for `poll_id`, or an empty snapshot for an unknown poll.
pub fn seed_snapshot(poll_id: &str) -> PollSnapshot {
    definition(poll_id)
        .map(|poll| poll.seed.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_known_poll_starts_non_empty() {
        for poll in catalogue() {
            assert!(!poll.seed.is_empty(), "{} has no options", poll.id);
            assert!(poll.seed.options.iter().all(|o| o.votes > 0));

            let ids: HashSet<&str> = poll.seed.options.iter().map(|o| o.id.as_str()).collect();
            assert_eq!(ids.len(), poll.seed.options.len(), "{} has duplicate ids", poll.id);
        }
    }

    #[test]
    fn frontend_seed_matches_published_tallies() {
        let seed = seed_snapshot("frontend");
        assert_eq!(seed.option("react").map(|o| o.votes), Some(245));
        assert_eq!(seed.option("vue").map(|o| o.votes), Some(189));
        assert_eq!(seed.total_votes(), 245 + 189 + 156 + 87);
    }

    #[test]
    fn unknown_poll_has_empty_seed() {
        assert!(seed_snapshot("mobile").is_empty());
        assert!(definition("mobile").is_none());
    }
}

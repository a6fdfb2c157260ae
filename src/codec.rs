//! String encoding of a [`PollSnapshot`] for the backing store.
//!
//! The stored shape is `{"options":[{"id":..,"title":..,"description":..,"votes":..,"color":..}]}`.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::PollSnapshot;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::CorruptSnapshot(err.to_string())
    }
}

pub fn encode(snapshot: &PollSnapshot) -> String {
    // A struct of strings and integers cannot fail to serialize.
    serde_json::to_string(snapshot).unwrap_or_else(|_| String::from(r#"{"options":[]}"#))
}

pub fn decode(raw: &str) -> Result<PollSnapshot, CodecError> {
    let snapshot: PollSnapshot = serde_json::from_str(raw)?;

    let mut seen = HashSet::with_capacity(snapshot.options.len());
    for option in &snapshot.options {
        if !seen.insert(option.id.as_str()) {
            return Err(CodecError::CorruptSnapshot(format!(
                "duplicate option id '{}'",
                option.id
            )));
        }
    }

    if snapshot.checked_total().is_none() {
        return Err(CodecError::CorruptSnapshot(
            "vote total does not fit in 64 bits".to_string(),
        ));
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seed;

    #[test]
    fn seed_snapshots_round_trip() {
        for poll in seed::catalogue() {
            let mut snapshot = poll.seed.clone();
            let second = snapshot.options[1].id.clone();
            snapshot.increment(&second);
            assert_eq!(decode(&encode(&snapshot)).unwrap(), snapshot);
        }
        let empty = PollSnapshot::default();
        assert_eq!(decode(&encode(&empty)).unwrap(), empty);
    }

    #[test]
    fn reads_the_browser_storage_shape() {
        let raw = r#"{"options":[{"id":"react","title":"React","description":"UI","votes":3,"color":"hsl(193, 95%, 68%)"}]}"#;
        let snapshot = decode(raw).unwrap();
        assert_eq!(snapshot.options[0].id, "react");
        assert_eq!(snapshot.total_votes(), 3);
    }

    #[test]
    fn rejects_malformed_values() {
        for raw in [
            "",
            "not json",
            "[]",
            r#"{"options":{}}"#,
            r#"{"options":[{"id":"a","title":"A","description":"","votes":-1,"color":""}]}"#,
            r#"{"options":[{"id":"a","title":"A","description":"","votes":"many","color":""}]}"#,
        ] {
            assert!(
                matches!(decode(raw), Err(CodecError::CorruptSnapshot(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn rejects_overflowing_totals() {
        let raw = r#"{"options":[
            {"id":"a","title":"A","description":"","votes":18446744073709551615,"color":""},
            {"id":"b","title":"B","description":"","votes":1,"color":""}
        ]}"#;
        let err = decode(raw).unwrap_err();
        assert!(err.to_string().contains("does not fit"));

        let single = r#"{"options":[{"id":"a","title":"A","description":"","votes":18446744073709551615,"color":""}]}"#;
        assert_eq!(decode(single).unwrap().total_votes(), u64::MAX);
    }

    #[test]
    fn rejects_duplicate_option_ids() {
        let raw = r#"{"options":[
            {"id":"a","title":"A","description":"","votes":1,"color":""},
            {"id":"a","title":"A again","description":"","votes":2,"color":""}
        ]}"#;
        let err = decode(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate option id 'a'"));
    }
}

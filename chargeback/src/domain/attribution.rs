//! Roster join and per-target summary

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ChargebackError;
use super::history::QueryRecord;

// =============================================================================
// Policies
// =============================================================================

/// What to do with records whose user has no roster entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Drop unmatched records
    Inner,
    /// Keep unmatched records without attribution
    Left,
}

impl fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinPolicy::Inner => write!(f, "inner"),
            JoinPolicy::Left => write!(f, "left"),
        }
    }
}

/// What to do when one user appears in the roster with different targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateRosterPolicy {
    #[default]
    Reject,
    FirstMatch,
}

impl fmt::Display for DuplicateRosterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateRosterPolicy::Reject => write!(f, "reject"),
            DuplicateRosterPolicy::FirstMatch => write!(f, "first-match"),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// One roster row: who is billed to which target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub user_name: String,
    pub target: String,
}

impl RosterEntry {
    pub fn new(user_name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributedRecord {
    #[serde(flatten)]
    pub record: QueryRecord,
    pub attribution: Option<String>,
}

/// Totals for one attribution target (`None` = unattributed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributionSummary {
    pub target: Option<String>,
    pub query_count: usize,
    pub distinct_users: usize,
    pub total_duration_ms: i64,
    pub unknown_duration_count: usize,
}

// =============================================================================
// Joiner
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct AttributionJoiner {
    join: JoinPolicy,
    duplicates: DuplicateRosterPolicy,
}

impl AttributionJoiner {
    pub fn new(join: JoinPolicy, duplicates: DuplicateRosterPolicy) -> Self {
        Self { join, duplicates }
    }

    /// Attach a roster target to each record by exact `user_name` match.
    ///
    /// Input order is preserved. Under `Reject`, any user listed with more
    /// than one distinct target fails the whole join.
    pub fn join(
        &self,
        records: Vec<QueryRecord>,
        roster: &[RosterEntry],
    ) -> Result<Vec<AttributedRecord>, ChargebackError> {
        let index = self.build_index(roster)?;

        let total = records.len();
        let mut unmatched = 0usize;
        let mut out = Vec::with_capacity(total);
        for record in records {
            let attribution = index.get(record.user_name.as_str()).map(|t| t.to_string());
            if attribution.is_none() {
                unmatched += 1;
                if self.join == JoinPolicy::Inner {
                    continue;
                }
            }
            out.push(AttributedRecord {
                record,
                attribution,
            });
        }

        if unmatched > 0 {
            tracing::info!(
                unmatched,
                total,
                join = %self.join,
                "Queries by users missing from the roster"
            );
        }
        Ok(out)
    }

    fn build_index<'a>(
        &self,
        roster: &'a [RosterEntry],
    ) -> Result<HashMap<&'a str, &'a str>, ChargebackError> {
        let mut targets: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();
        for entry in roster {
            let seen = targets.entry(entry.user_name.as_str()).or_insert_with(|| {
                order.push(entry.user_name.as_str());
                Vec::new()
            });
            if !seen.contains(&entry.target.as_str()) {
                seen.push(entry.target.as_str());
            }
        }

        let mut index = HashMap::with_capacity(targets.len());
        for user in order {
            let user_targets = &targets[user];
            if user_targets.len() > 1 {
                match self.duplicates {
                    DuplicateRosterPolicy::Reject => {
                        return Err(ChargebackError::AmbiguousJoin {
                            user_name: user.to_string(),
                            targets: user_targets.iter().map(|t| t.to_string()).collect(),
                        });
                    }
                    DuplicateRosterPolicy::FirstMatch => {
                        tracing::warn!(
                            user_name = user,
                            targets = ?user_targets,
                            chosen = user_targets[0],
                            "Roster lists several targets for one user"
                        );
                    }
                }
            }
            index.insert(user, user_targets[0]);
        }
        Ok(index)
    }
}

/// Totals per target, sorted by target with the unattributed group last.
///
/// Fails with `Schema` when a group's known durations overflow `i64`.
pub fn summarize(records: &[AttributedRecord]) -> Result<Vec<AttributionSummary>, ChargebackError> {
    #[derive(Default)]
    struct Acc {
        queries: usize,
        users: HashSet<i64>,
        duration_ms: i64,
        unknown_duration: usize,
    }

    // (is_unattributed, target) sorts named targets first
    let mut groups: BTreeMap<(bool, String), Acc> = BTreeMap::new();
    for attributed in records {
        let key = match &attributed.attribution {
            Some(target) => (false, target.clone()),
            None => (true, String::new()),
        };
        let acc = groups.entry(key).or_default();
        acc.queries += 1;
        acc.users.insert(attributed.record.user_id);
        match attributed.record.duration_ms {
            Some(ms) => {
                acc.duration_ms = acc.duration_ms.checked_add(ms).ok_or_else(|| {
                    ChargebackError::Schema(format!(
                        "total duration for {} overflows at query '{}' (duration {} ms)",
                        attributed.attribution.as_deref().unwrap_or("unattributed queries"),
                        attributed.record.query_id,
                        ms
                    ))
                })?;
            }
            None => acc.unknown_duration += 1,
        }
    }

    Ok(groups
        .into_iter()
        .map(|((unattributed, target), acc)| AttributionSummary {
            target: (!unattributed).then_some(target),
            query_count: acc.queries,
            distinct_users: acc.users.len(),
            total_duration_ms: acc.duration_ms,
            unknown_duration_count: acc.unknown_duration,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::history::types::fixtures::record;

    const T0: i64 = 1_700_000_000_000;

    fn records() -> Vec<QueryRecord> {
        vec![
            record("q1", 1, "alice", T0),
            record("q2", 2, "bob", T0),
            record("q3", 3, "carol", T0),
            record("q4", 1, "alice", T0 + 60_000),
        ]
    }

    fn roster() -> Vec<RosterEntry> {
        vec![
            RosterEntry::new("alice", "CC-100"),
            RosterEntry::new("bob", "CC-200"),
        ]
    }

    fn joiner(join: JoinPolicy) -> AttributionJoiner {
        AttributionJoiner::new(join, DuplicateRosterPolicy::Reject)
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        let out = joiner(JoinPolicy::Left).join(records(), &roster()).unwrap();
        let view: Vec<_> = out
            .iter()
            .map(|a| (a.record.query_id.as_str(), a.attribution.as_deref()))
            .collect();
        assert_eq!(
            view,
            vec![
                ("q1", Some("CC-100")),
                ("q2", Some("CC-200")),
                ("q3", None),
                ("q4", Some("CC-100")),
            ]
        );
    }

    #[test]
    fn test_inner_join_drops_unmatched() {
        let out = joiner(JoinPolicy::Inner).join(records(), &roster()).unwrap();
        let ids: Vec<_> = out.iter().map(|a| a.record.query_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q4"]);
    }

    #[test]
    fn test_empty_roster_left_keeps_all_unattributed() {
        let out = joiner(JoinPolicy::Left).join(records(), &[]).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|a| a.attribution.is_none()));
    }

    #[test]
    fn test_empty_roster_inner_returns_nothing() {
        let out = joiner(JoinPolicy::Inner).join(records(), &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let roster = vec![RosterEntry::new("Alice", "CC-100")];
        let out = joiner(JoinPolicy::Inner).join(records(), &roster).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_conflicting_targets_rejected() {
        let mut roster = roster();
        roster.push(RosterEntry::new("alice", "CC-999"));

        let err = joiner(JoinPolicy::Left).join(records(), &roster).unwrap_err();
        match err {
            ChargebackError::AmbiguousJoin { user_name, targets } => {
                assert_eq!(user_name, "alice");
                assert_eq!(targets, vec!["CC-100", "CC-999"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_repeated_identical_rows_not_ambiguous() {
        let mut roster = roster();
        roster.push(RosterEntry::new("alice", "CC-100"));
        let out = joiner(JoinPolicy::Inner).join(records(), &roster).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_first_match_uses_roster_order() {
        let roster = vec![
            RosterEntry::new("alice", "CC-300"),
            RosterEntry::new("alice", "CC-100"),
        ];
        let out = AttributionJoiner::new(JoinPolicy::Inner, DuplicateRosterPolicy::FirstMatch)
            .join(records(), &roster)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| a.attribution.as_deref() == Some("CC-300")));
    }

    #[test]
    fn test_summary_groups_sorted_unattributed_last() {
        let mut input = records();
        input[1].duration_ms = None;
        input.push(record("q5", 9, "zed", T0));
        let roster = vec![
            RosterEntry::new("alice", "CC-200"),
            RosterEntry::new("bob", "CC-100"),
        ];
        let joined = joiner(JoinPolicy::Left).join(input, &roster).unwrap();

        let summary = summarize(&joined).unwrap();
        assert_eq!(summary.len(), 3);

        assert_eq!(summary[0].target.as_deref(), Some("CC-100"));
        assert_eq!(summary[0].query_count, 1);
        assert_eq!(summary[0].total_duration_ms, 0);
        assert_eq!(summary[0].unknown_duration_count, 1);

        assert_eq!(summary[1].target.as_deref(), Some("CC-200"));
        assert_eq!(summary[1].query_count, 2);
        assert_eq!(summary[1].distinct_users, 1);
        assert_eq!(summary[1].total_duration_ms, 2000);

        assert_eq!(summary[2].target, None);
        assert_eq!(summary[2].query_count, 2);
        assert_eq!(summary[2].distinct_users, 2);
    }

    #[test]
    fn test_summary_duration_overflow_is_error() {
        let mut input = vec![record("q1", 1, "alice", T0), record("q2", 1, "alice", T0)];
        input[0].duration_ms = Some(i64::MAX);
        input[1].duration_ms = Some(10);
        let joined = joiner(JoinPolicy::Left).join(input, &[]).unwrap();

        let err = summarize(&joined).unwrap_err();
        match err {
            ChargebackError::Schema(message) => {
                assert!(message.contains("q2"), "{message}");
                assert!(message.contains("unattributed"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_policy_serde_names() {
        assert_eq!(
            serde_json::from_str::<JoinPolicy>(r#""left""#).unwrap(),
            JoinPolicy::Left
        );
        assert_eq!(
            serde_json::from_str::<DuplicateRosterPolicy>(r#""first-match""#).unwrap(),
            DuplicateRosterPolicy::FirstMatch
        );
        assert_eq!(DuplicateRosterPolicy::FirstMatch.to_string(), "first-match");
    }
}

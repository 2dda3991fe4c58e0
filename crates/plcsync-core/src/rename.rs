//! Rename detection between two successive variable tables.
//!
//! A textual edit replaces the whole variable table, so a rename looks like a
//! delete plus an add. [`detect_renames`] pairs them up: a variable that
//! disappeared is matched with a newly appeared variable of the same type.
//! This is a heuristic. Adding one variable while deleting another of the
//! same type is indistinguishable from a rename, which is why the choice
//! among candidates goes through a pluggable [`RenameMatcher`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{find_variable, Variable, VariableType};

/// A detected rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamePair {
    pub old_name: String,
    pub new_name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
}

/// Chooses the new variable a removed one was renamed to.
///
/// `candidates` are already filtered: same type as `removed`, absent from the
/// previous table, not claimed by an earlier pair. They are in the new
/// table's declaration order.
pub trait RenameMatcher {
    fn choose<'a>(&self, removed: &Variable, candidates: &[&'a Variable]) -> Option<&'a Variable>;
}

/// First candidate in declaration order wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSameType;

impl RenameMatcher for FirstSameType {
    fn choose<'a>(&self, _removed: &Variable, candidates: &[&'a Variable]) -> Option<&'a Variable> {
        candidates.first().copied()
    }
}

/// Pairs only when the candidate is unambiguous.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueSameType;

impl RenameMatcher for UniqueSameType {
    fn choose<'a>(&self, _removed: &Variable, candidates: &[&'a Variable]) -> Option<&'a Variable> {
        match candidates {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// Never pairs; every edit is treated as delete plus add.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenames;

impl RenameMatcher for NoRenames {
    fn choose<'a>(
        &self,
        _removed: &Variable,
        _candidates: &[&'a Variable],
    ) -> Option<&'a Variable> {
        None
    }
}

/// Configurable matcher selection (`renameMatcher` config key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatcherKind {
    #[default]
    FirstMatch,
    Unique,
    Off,
}

impl MatcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::FirstMatch => "first-match",
            MatcherKind::Unique => "unique",
            MatcherKind::Off => "off",
        }
    }

    pub fn matcher(&self) -> &'static dyn RenameMatcher {
        match self {
            MatcherKind::FirstMatch => &FirstSameType,
            MatcherKind::Unique => &UniqueSameType,
            MatcherKind::Off => &NoRenames,
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first-match" | "first" => Ok(MatcherKind::FirstMatch),
            "unique" => Ok(MatcherKind::Unique),
            "off" | "none" => Ok(MatcherKind::Off),
            other => Err(format!(
                "unknown rename matcher '{}' (expected first-match, unique or off)",
                other
            )),
        }
    }
}

/// Detect renames with the default first-match heuristic.
pub fn detect_renames(previous: &[Variable], next: &[Variable]) -> Vec<RenamePair> {
    detect_renames_with(&FirstSameType, previous, next)
}

/// Detect renames, letting `matcher` pick among the candidates.
///
/// Every old name and every new name appears in at most one pair.
pub fn detect_renames_with(
    matcher: &dyn RenameMatcher,
    previous: &[Variable],
    next: &[Variable],
) -> Vec<RenamePair> {
    let appeared: Vec<&Variable> = next
        .iter()
        .filter(|v| find_variable(previous, &v.name).is_none())
        .collect();

    let mut seen_old = HashSet::new();
    let mut claimed = HashSet::new();
    let mut pairs = Vec::new();

    for removed in previous {
        if find_variable(next, &removed.name).is_some() {
            continue;
        }
        if !seen_old.insert(removed.name.to_ascii_lowercase()) {
            continue;
        }
        let candidates: Vec<&Variable> = appeared
            .iter()
            .copied()
            .filter(|v| v.var_type.same_as(&removed.var_type))
            .filter(|v| !claimed.contains(&v.name.to_ascii_lowercase()))
            .collect();

        if let Some(target) = matcher.choose(removed, &candidates) {
            claimed.insert(target.name.to_ascii_lowercase());
            debug!(old = %removed.name, new = %target.name, "detected rename");
            pairs.push(RenamePair {
                old_name: removed.name.clone(),
                new_name: target.name.clone(),
                var_type: removed.var_type.clone(),
            });
        }
    }
    pairs
}

//! Cross-source event matching.
//!
//! Pairs events from two providers that describe the same real-world match.
//! Each event appears in at most one pair; an event without a counterpart is
//! reported to telemetry and left out, never an error.

pub mod names;

use std::cmp::Ordering;

use crate::domain::Event;
use crate::telemetry::{SharedTelemetry, Signal, TracingTelemetry};

pub use names::{compact, name_similarity, substring_equivalent, tokens};

/// How team names are compared
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchStrategy {
    /// Compact-name containment, greedy first match in right-hand order
    Substring,
    /// Token-set similarity with a global best-first assignment
    TokenSet { min_similarity: f64 },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        MatchStrategy::TokenSet {
            min_similarity: 0.5,
        }
    }
}

/// Two events judged to be the same match
#[derive(Debug, Clone, PartialEq)]
pub struct EventPair<'a> {
    pub left: &'a Event,
    pub right: &'a Event,
    /// min(home similarity, away similarity), in [0, 1]
    pub confidence: f64,
}

pub struct EventMatcher {
    strategy: MatchStrategy,
    telemetry: SharedTelemetry,
}

impl EventMatcher {
    pub fn new(strategy: MatchStrategy, telemetry: SharedTelemetry) -> Self {
        Self {
            strategy,
            telemetry,
        }
    }

    pub fn substring() -> Self {
        Self::new(MatchStrategy::Substring, TracingTelemetry::shared())
    }

    pub fn token_set(min_similarity: f64) -> Self {
        Self::new(
            MatchStrategy::TokenSet { min_similarity },
            TracingTelemetry::shared(),
        )
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Pair events of `left` with events of `right`.
    ///
    /// Output follows the order of `left`.
    pub fn match_events<'a>(&self, left: &'a [Event], right: &'a [Event]) -> Vec<EventPair<'a>> {
        if left.is_empty() || right.is_empty() {
            self.report(left, &[], right.len());
            return Vec::new();
        }

        let assignment = match self.strategy {
            MatchStrategy::Substring => substring_assignment(left, right),
            MatchStrategy::TokenSet { min_similarity } => {
                token_set_assignment(left, right, min_similarity)
            }
        };

        let pairs: Vec<EventPair<'a>> = assignment
            .into_iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                slot.map(|(j, confidence)| EventPair {
                    left: &left[i],
                    right: &right[j],
                    confidence,
                })
            })
            .collect();

        self.report(left, &pairs, right.len());
        pairs
    }

    fn report(&self, left: &[Event], pairs: &[EventPair<'_>], right_len: usize) {
        for event in left {
            if !pairs.iter().any(|p| std::ptr::eq(p.left, event)) {
                self.telemetry.emit(Signal::EventUnmatched {
                    event_ref: event.event_ref(),
                    matchup: event.matchup(),
                });
            }
        }
        self.telemetry.emit(Signal::EventsMatched {
            left: left.len(),
            right: right_len,
            pairs: pairs.len(),
        });
    }
}

/// Pair confidence: the weaker of the two team similarities
pub fn pair_score(a: &Event, b: &Event) -> f64 {
    name_similarity(&a.home_team, &b.home_team).min(name_similarity(&a.away_team, &b.away_team))
}

fn cross_source(a: &Event, b: &Event) -> bool {
    a.source != b.source
}

/// Greedy, first-match-wins in `right` order; consumed right-hand events are skipped
fn substring_assignment(left: &[Event], right: &[Event]) -> Vec<Option<(usize, f64)>> {
    let mut consumed = vec![false; right.len()];
    left.iter()
        .map(|a| {
            let j = right.iter().enumerate().position(|(j, b)| {
                !consumed[j]
                    && cross_source(a, b)
                    && substring_equivalent(&a.home_team, &b.home_team)
                    && substring_equivalent(&a.away_team, &b.away_team)
            })?;
            consumed[j] = true;
            Some((j, pair_score(a, &right[j])))
        })
        .collect()
}

/// Best-first assignment over every candidate above the threshold.
///
/// Candidates are ranked by score, then by the two event refs, so the result
/// does not depend on the order either list arrived in.
fn token_set_assignment(
    left: &[Event],
    right: &[Event],
    min_similarity: f64,
) -> Vec<Option<(usize, f64)>> {
    let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
    for (i, a) in left.iter().enumerate() {
        for (j, b) in right.iter().enumerate() {
            if !cross_source(a, b) {
                continue;
            }
            let score = pair_score(a, b);
            if score > 0.0 && score >= min_similarity {
                candidates.push((i, j, score));
            }
        }
    }

    candidates.sort_by(|x, y| {
        y.2.partial_cmp(&x.2)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left[x.0].event_ref().cmp(&left[y.0].event_ref()))
            .then_with(|| right[x.1].event_ref().cmp(&right[y.1].event_ref()))
    });

    let mut assignment = vec![None; left.len()];
    let mut consumed = vec![false; right.len()];
    for (i, j, score) in candidates {
        if assignment[i].is_some() || consumed[j] {
            continue;
        }
        assignment[i] = Some((j, score));
        consumed[j] = true;
    }
    assignment
}

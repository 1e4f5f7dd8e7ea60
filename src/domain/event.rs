use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EdgeError;

/// Lifecycle status of a sporting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    InProgress,
    Final,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::InProgress => "in_progress",
            EventStatus::Final => "final",
        }
    }

    /// A finished game can no longer be bet
    pub fn is_final(&self) -> bool {
        matches!(self, EventStatus::Final)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = EdgeError;

    /// Accepts our own spelling plus the provider spellings seen in feeds
    /// (`STATUS_FINAL`, `pre`/`in`/`post`, `live`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s
            .trim()
            .to_ascii_lowercase()
            .trim_start_matches("status_")
            .replace(['-', ' '], "_");

        match norm.as_str() {
            "scheduled" | "pre" | "upcoming" | "not_started" | "open" => Ok(EventStatus::Scheduled),
            "in_progress" | "in" | "live" | "halftime" | "end_period" => {
                Ok(EventStatus::InProgress)
            }
            "final" | "post" | "closed" | "full_time" | "final_ot" => Ok(EventStatus::Final),
            _ => Err(EdgeError::Validation(format!("unknown event status: {s}"))),
        }
    }
}

/// Source-scoped event identity. Two refs are equal only if both the source
/// and the source's own id are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventRef {
    pub source: String,
    pub event_id: String,
}

impl EventRef {
    pub fn new(source: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            event_id: event_id.into(),
        }
    }
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.event_id)
    }
}

/// One provider's view of a real-world match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Provider that published this event (e.g. "pinnacle", "espn")
    pub source: String,
    /// Provider-scoped id
    pub event_id: String,
    pub sport: String,
    #[serde(default)]
    pub league: Option<String>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    pub status: EventStatus,
}

impl Event {
    pub fn event_ref(&self) -> EventRef {
        EventRef::new(self.source.clone(), self.event_id.clone())
    }

    pub fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_final()
    }
}

//! UTC trading sessions and the entry gate built from them.

use crate::domain::candle::Candle;
use crate::domain::error::UnumError;
use std::fmt;
use std::str::FromStr;

/// A UTC-hour trading window. Windows overlap, so one hour may belong to
/// several sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    Asian,
    European,
    American,
}

impl Session {
    pub const ALL: [Session; 3] = [Session::Asian, Session::European, Session::American];

    /// Half-open hour range `[start, end)`.
    pub fn hours(&self) -> (u32, u32) {
        match self {
            Session::Asian => (0, 9),
            Session::European => (7, 16),
            Session::American => (13, 22),
        }
    }

    pub fn contains_hour(&self, hour: u32) -> bool {
        let (start, end) = self.hours();
        hour >= start && hour < end
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Session::Asian => "asian",
            Session::European => "european",
            Session::American => "american",
        };
        f.write_str(name)
    }
}

impl FromStr for Session {
    type Err = UnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asian" => Ok(Session::Asian),
            "european" => Ok(Session::European),
            "american" => Ok(Session::American),
            other => Err(UnumError::invalid_parameter(
                "allowed_sessions",
                format!("unknown session '{other}' (expected asian, european or american)"),
            )),
        }
    }
}

/// Parses a comma-separated session list. An empty list means no restriction.
pub fn parse_sessions(s: &str) -> Result<Option<Vec<Session>>, UnumError> {
    let sessions = s
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<Session>, _>>()?;
    Ok(if sessions.is_empty() {
        None
    } else {
        Some(sessions)
    })
}

/// Decides whether a new position may be opened on a bar.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryGate {
    pub skip_weekends: bool,
    pub allowed_sessions: Option<Vec<Session>>,
}

impl EntryGate {
    pub fn in_session(&self, hour: u32) -> bool {
        match &self.allowed_sessions {
            None => true,
            Some(sessions) => sessions.iter().any(|s| s.contains_hour(hour)),
        }
    }

    pub fn allows(&self, candle: &Candle) -> bool {
        if self.skip_weekends && candle.is_weekend() {
            return false;
        }
        self.in_session(candle.hour())
    }
}

use crate::error::MissionError;
use crate::geo::GeoPoint;
use crate::pattern::{waypoint_count, Rectangle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HomePosition {
    pub point: GeoPoint,
    /// Absolute altitude above mean sea level.
    pub altitude_msl_m: f64,
}

/// A validated survey request: where to scan and how far apart the lines are.
/// Any value of this type yields a flyable pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurveyArea {
    rectangle: Rectangle,
    spacing_m: f64,
}

impl SurveyArea {
    pub fn new(rectangle: Rectangle, spacing_m: f64) -> Result<Self, MissionError> {
        waypoint_count(&rectangle, spacing_m)?;
        Ok(Self {
            rectangle,
            spacing_m,
        })
    }

    pub fn rectangle(&self) -> &Rectangle {
        &self.rectangle
    }

    pub fn spacing_m(&self) -> f64 {
        self.spacing_m
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum MissionPhase {
    #[default]
    Connecting,
    Arming,
    TakingOff,
    AwaitingAreaInput,
    Scanning {
        index: usize,
        total: usize,
    },
    ReturningHome,
    Landing,
    Complete,
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionPhase::Connecting => f.write_str("connecting"),
            MissionPhase::Arming => f.write_str("arming"),
            MissionPhase::TakingOff => f.write_str("taking off"),
            MissionPhase::AwaitingAreaInput => f.write_str("awaiting area input"),
            MissionPhase::Scanning { index, total } => {
                write!(f, "scanning {}/{}", index + 1, total)
            }
            MissionPhase::ReturningHome => f.write_str("returning home"),
            MissionPhase::Landing => f.write_str("landing"),
            MissionPhase::Complete => f.write_str("complete"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MissionStats {
    pub detected: u32,
    pub clear: u32,
    /// Waypoints whose classification prompt failed.
    pub unclassified: u32,
    pub arrival_timeouts: u32,
}

impl MissionStats {
    pub fn points_visited(&self) -> u32 {
        self.detected + self.clear + self.unclassified
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionSummary {
    pub run_id: Uuid,
    pub points_visited: u32,
    pub detected: u32,
    pub clear: u32,
    pub unclassified: u32,
    pub arrival_timeouts: u32,
}

impl MissionSummary {
    pub fn new(run_id: Uuid, stats: &MissionStats) -> Self {
        Self {
            run_id,
            points_visited: stats.points_visited(),
            detected: stats.detected,
            clear: stats.clear,
            unclassified: stats.unclassified,
            arrival_timeouts: stats.arrival_timeouts,
        }
    }

    /// One-line form written to the detection log.
    pub fn summary_note(&self) -> String {
        let mut note = format!(
            "SUMMARY | total={} | detected={} | clear={}",
            self.points_visited, self.detected, self.clear
        );
        if self.unclassified > 0 {
            note.push_str(&format!(" | unclassified={}", self.unclassified));
        }
        note
    }
}

impl fmt::Display for MissionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MISSION SUMMARY ({})", self.run_id)?;
        writeln!(f, "  Total points visited : {}", self.points_visited)?;
        writeln!(f, "  Detected             : {}", self.detected)?;
        writeln!(f, "  Clear                : {}", self.clear)?;
        if self.unclassified > 0 {
            writeln!(f, "  Unclassified         : {}", self.unclassified)?;
        }
        write!(f, "  Arrival timeouts     : {}", self.arrival_timeouts)
    }
}

/// Append-only record line: `<UTC timestamp> | <note>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

impl LogEntry {
    pub fn new(note: impl Into<String>) -> Self {
        Self::at(Utc::now(), note)
    }

    pub fn at(timestamp: DateTime<Utc>, note: impl Into<String>) -> Self {
        Self {
            timestamp,
            note: note.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}",
            self.timestamp.format("%Y-%m-%d_%H-%M-%S"),
            self.note
        )
    }
}

//! Core data types shared between the scan and the query pipeline
//!
//! - `Sample`: a single `(timestamp, series id, value)` observation
//! - `Direction`: the order in which the scan walks timestamps
//! - `TimeBounds`: the inclusive range handed to the scan

use serde::{Deserialize, Serialize};

/// A single time-series observation produced by the storage scan.
///
/// Samples are small and `Copy`; they travel by value through the
/// pipeline and are only retained by stages that buffer explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    /// Timestamp, usually milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Interned series identifier
    pub series_id: u64,
    /// The measured value
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: u64, series_id: u64, value: f64) -> Self {
        Self {
            timestamp,
            series_id,
            value,
        }
    }

    /// Ordering key used wherever output must be time ordered
    pub fn sort_key(&self) -> (u64, u64) {
        (self.timestamp, self.series_id)
    }
}

/// Scan direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending timestamps
    #[default]
    Forward,
    /// Descending timestamps
    Backward,
}

impl Direction {
    /// Derive the direction from the requested begin/end pair
    pub fn from_range(begin: u64, end: u64) -> Self {
        if begin <= end {
            Self::Forward
        } else {
            Self::Backward
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "forward" | "asc" => Some(Self::Forward),
            "backward" | "desc" => Some(Self::Backward),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Inclusive timestamp range: `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    /// Lowest timestamp (inclusive)
    pub lower: u64,
    /// Highest timestamp (inclusive)
    pub upper: u64,
}

impl TimeBounds {
    /// Build bounds from a begin/end pair given in either order
    pub fn from_range(begin: u64, end: u64) -> Self {
        Self {
            lower: begin.min(end),
            upper: begin.max(end),
        }
    }

    /// Bounds covering every representable timestamp
    pub fn unbounded() -> Self {
        Self {
            lower: 0,
            upper: u64::MAX,
        }
    }

    /// Check if a timestamp falls within these bounds
    pub fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.lower && timestamp <= self.upper
    }
}

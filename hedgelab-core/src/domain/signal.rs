//! Per-bar direction signals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading label predicted for a bar: -1 short, 0 flat, 1 long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Direction {
    Short,
    Flat,
    Long,
}

impl Direction {
    /// All labels in ascending order.
    pub const ALL: [Direction; 3] = [Direction::Short, Direction::Flat, Direction::Long];

    pub fn from_label(label: i8) -> Option<Self> {
        match label {
            -1 => Some(Direction::Short),
            0 => Some(Direction::Flat),
            1 => Some(Direction::Long),
            _ => None,
        }
    }

    pub fn label(self) -> i8 {
        match self {
            Direction::Short => -1,
            Direction::Flat => 0,
            Direction::Long => 1,
        }
    }
}

impl From<Direction> for i8 {
    fn from(d: Direction) -> Self {
        d.label()
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(label: i8) -> Result<Self, Self::Error> {
        Direction::from_label(label).ok_or_else(|| format!("invalid trading label {label}"))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Direction plus the classifier's confidence in it, for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    /// Probability of the predicted class, in [0, 1].
    pub confidence: f64,
}

impl Signal {
    pub fn new(direction: Direction, confidence: f64) -> Self {
        Self {
            direction,
            confidence,
        }
    }

    pub fn flat() -> Self {
        Self::new(Direction::Flat, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_roundtrip() {
        for d in Direction::ALL {
            assert_eq!(Direction::from_label(d.label()), Some(d));
        }
        assert_eq!(Direction::from_label(2), None);
    }

    #[test]
    fn direction_serializes_as_integer() {
        let json = serde_json::to_string(&Direction::Short).unwrap();
        assert_eq!(json, "-1");
        let back: Direction = serde_json::from_str("1").unwrap();
        assert_eq!(back, Direction::Long);
        assert!(serde_json::from_str::<Direction>("3").is_err());
    }
}

//! # Processing strategies.
//!
//! [`Strategy`] is the policy applied to every batch of messages a worker
//! claims from the primary queue. The set is closed and exhaustively matched
//! everywhere; adding a strategy is a compile-time change, not a runtime
//! registration.
//!
//! | Strategy | Behavior |
//! |---|---|
//! | `Normal` | process every message at full cost |
//! | `Overflow` | divert messages into the overflow queue for cheap draining |
//! | `Selective` | process `High`-priority messages, shed the rest |
//! | `Batch` | process a claimed batch as one unit, commit all-or-nothing |
//!
//! Only the `Normal ↔ Overflow` edge is driven automatically (by the backlog
//! monitor); `Selective` and `Batch` are entered and left solely by explicit
//! external command.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::ControlError;

/// Processing strategy currently applied to claimed messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Strategy {
    /// Process every message synchronously at full cost.
    #[default]
    Normal = 0,
    /// Divert claimed messages into the overflow queue service.
    Overflow = 1,
    /// Process priority messages, intentionally drop the rest.
    Selective = 2,
    /// Process the whole claimed batch as one unit.
    Batch = 3,
}

impl Strategy {
    /// Stable lowercase name, the same one [`FromStr`] accepts.
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Normal => "normal",
            Strategy::Overflow => "overflow",
            Strategy::Selective => "selective",
            Strategy::Batch => "batch",
        }
    }

    /// All strategies, for error messages and exhaustive tests.
    pub const ALL: [Strategy; 4] = [
        Strategy::Normal,
        Strategy::Overflow,
        Strategy::Selective,
        Strategy::Batch,
    ];

    fn from_u8(v: u8) -> Strategy {
        match v {
            1 => Strategy::Overflow,
            2 => Strategy::Selective,
            3 => Strategy::Batch,
            _ => Strategy::Normal,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ControlError;

    /// Parses a case-insensitive strategy name.
    ///
    /// # Example
    /// ```
    /// use floodgate::Strategy;
    ///
    /// assert_eq!("OVERFLOW".parse::<Strategy>().unwrap(), Strategy::Overflow);
    /// assert!("turbo".parse::<Strategy>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Strategy::Normal),
            "overflow" => Ok(Strategy::Overflow),
            "selective" => Ok(Strategy::Selective),
            "batch" => Ok(Strategy::Batch),
            _ => Err(ControlError::UnknownStrategy { name: s.to_string() }),
        }
    }
}

/// Lock-free cell holding the currently visible strategy.
///
/// Reads are a single atomic load (workers read once per claimed batch).
/// Writes happen only inside the strategy controller's serialized
/// transition path; no other component may store into the cell.
#[derive(Debug)]
pub(crate) struct StrategyCell(AtomicU8);

impl StrategyCell {
    pub(crate) fn new(initial: Strategy) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> Strategy {
        Strategy::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, s: Strategy) {
        self.0.store(s as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_names_round_trip() {
        for s in Strategy::ALL {
            assert_eq!(s.as_str().parse::<Strategy>().unwrap(), s);
            assert_eq!(s.as_str().to_uppercase().parse::<Strategy>().unwrap(), s);
        }
    }

    #[test]
    fn test_parse_unknown_is_client_error() {
        let err = "TURBO".parse::<Strategy>().unwrap_err();
        assert_eq!(err.as_label(), "unknown_strategy");
    }

    #[test]
    fn test_cell_round_trip() {
        let cell = StrategyCell::new(Strategy::Normal);
        assert_eq!(cell.load(), Strategy::Normal);
        cell.store(Strategy::Batch);
        assert_eq!(cell.load(), Strategy::Batch);
    }
}

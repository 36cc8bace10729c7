//! Chamber location codec
//!
//! Every chamber occupies a location of the form `"<tier>.<row>.<pos>"`.
//! Within a tier the forest is a single binary tree rooted at `<tier>.1.1`
//! (the tier root): row `r` holds `2^(r-1)` positions, and the children of
//! `(r, p)` are `(r+1, 2p-1)` and `(r+1, 2p)`.
//!
//! # Critical Invariants
//!
//! 1. Parsing and formatting are exact inverses for every valid location
//! 2. `parent()` is pure and deterministic; only the tier root has none
//! 3. Two `parent()` hops from any second-level safe slot land on its anchor
//!
//! # Example
//! ```
//! use khazon_matrix_core_rs::coords::Location;
//!
//! let anchor: Location = "2.3.2".parse().unwrap();
//! let left = anchor.left_child();
//! assert_eq!(left.to_string(), "2.4.3");
//! assert_eq!(left.parent(), Some(anchor));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing a location string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationParseError {
    #[error("Location must have exactly three dot-separated fields")]
    WrongFieldCount,

    #[error("Location field is not a number: {0}")]
    NotANumber(String),

    #[error("Tier must be between 1 and {max}, got {got}")]
    TierOutOfRange { got: u64, max: u8 },

    #[error("Row must be at least 1 and at most {max}, got {got}")]
    RowOutOfRange { got: u64, max: u32 },

    #[error("Position {pos} does not exist on row {row}")]
    PositionOutOfRange { pos: u64, row: u32 },
}

/// Highest tier any location may reference
pub const MAX_TIER: u8 = 7;

/// Deepest row a parsed location may reference
///
/// Row 64 would already hold 2^63 positions; nothing real approaches it.
/// The bound keeps child-position arithmetic inside u64.
pub const MAX_ROW: u32 = 62;

/// A chamber position: tier, row within the tier's tree, position within the row
///
/// Ordering is (tier, row, pos), which makes the tier root the minimum of
/// its tier and keeps rows grouped, convenient for sorted displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    tier: u8,
    row: u32,
    pos: u64,
}

impl Location {
    /// Build a location from raw parts, validating every field
    pub fn new(tier: u8, row: u32, pos: u64) -> Result<Self, LocationParseError> {
        if tier == 0 || tier > MAX_TIER {
            return Err(LocationParseError::TierOutOfRange {
                got: tier as u64,
                max: MAX_TIER,
            });
        }
        if row == 0 || row > MAX_ROW {
            return Err(LocationParseError::RowOutOfRange {
                got: row as u64,
                max: MAX_ROW,
            });
        }
        let row_width = 1u64 << (row - 1);
        if pos == 0 || pos > row_width {
            return Err(LocationParseError::PositionOutOfRange { pos, row });
        }
        Ok(Self { tier, row, pos })
    }

    /// The canonical root location of a tier's tree (`"<tier>.1.1"`)
    pub fn tier_root(tier: u8) -> Result<Self, LocationParseError> {
        Self::new(tier, 1, 1)
    }

    /// Tier this location belongs to
    pub fn tier(&self) -> u8 {
        self.tier
    }

    /// Row within the tier's tree (1 = tier root)
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Position within the row (1-indexed, left to right)
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Whether this location is its tier's root
    pub fn is_tier_root(&self) -> bool {
        self.row == 1
    }

    /// The location one structural hop toward the tier root
    ///
    /// Returns `None` for the tier root. For any other location the parent
    /// is `(row - 1, ceil(pos / 2))`.
    pub fn parent(&self) -> Option<Location> {
        if self.row == 1 {
            return None;
        }
        Some(Location {
            tier: self.tier,
            row: self.row - 1,
            pos: (self.pos + 1) / 2,
        })
    }

    /// Left direct descendant slot: `(row + 1, 2 * pos - 1)`
    pub fn left_child(&self) -> Location {
        Location {
            tier: self.tier,
            row: self.row + 1,
            pos: 2 * self.pos - 1,
        }
    }

    /// Right direct descendant slot: `(row + 1, 2 * pos)`
    pub fn right_child(&self) -> Location {
        Location {
            tier: self.tier,
            row: self.row + 1,
            pos: 2 * self.pos,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.tier, self.row, self.pos)
    }
}

impl FromStr for Location {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('.').collect();
        if fields.len() != 3 {
            return Err(LocationParseError::WrongFieldCount);
        }
        let parse_field = |field: &str| -> Result<u64, LocationParseError> {
            field
                .parse::<u64>()
                .map_err(|_| LocationParseError::NotANumber(field.to_string()))
        };
        let tier = parse_field(fields[0])?;
        let row = parse_field(fields[1])?;
        let pos = parse_field(fields[2])?;
        if tier > MAX_TIER as u64 {
            return Err(LocationParseError::TierOutOfRange {
                got: tier,
                max: MAX_TIER,
            });
        }
        if row > MAX_ROW as u64 {
            return Err(LocationParseError::RowOutOfRange { got: row, max: MAX_ROW });
        }
        Location::new(tier as u8, row as u32, pos)
    }
}

impl TryFrom<String> for Location {
    type Error = LocationParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.to_string()
    }
}

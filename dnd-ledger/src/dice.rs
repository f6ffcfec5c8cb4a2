//! D&D die types.
//!
//! Hit dice are tracked per die size, keyed by their tag ("d8"). The rest
//! engine heals by the average roll of a die rather than rolling it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for die tag parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid die notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
}

/// Standard D&D die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }

    /// The fixed "average" result used instead of rolling: `floor(sides / 2) + 1`.
    ///
    /// A d8 averages 5, a d6 averages 4, a d12 averages 7.
    pub fn average_roll(&self) -> i32 {
        (self.sides() / 2) as i32 + 1
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

impl FromStr for DieType {
    type Err = DiceError;

    /// Parse a die tag such as `"d8"` or `"D12"`. A leading count of 1 is
    /// tolerated (`"1d8"`), anything else is not a single die.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        let d_pos = tag
            .find('d')
            .ok_or_else(|| DiceError::InvalidNotation(s.to_string()))?;

        match &tag[..d_pos] {
            "" | "1" => {}
            _ => return Err(DiceError::InvalidNotation(s.to_string())),
        }

        let sides: u32 = tag[d_pos + 1..]
            .parse()
            .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;

        DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))
    }
}

impl From<DieType> for String {
    fn from(die: DieType) -> Self {
        die.to_string()
    }
}

impl TryFrom<String> for DieType {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

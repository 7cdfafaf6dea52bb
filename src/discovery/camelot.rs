//! Camelot wheel positions and harmonic distance.
//!
//! The wheel has 24 positions: numbers 1-12 in two rings, `A` (minor) and
//! `B` (major). Neighbouring numbers in the same ring are one step apart, as
//! are the `A`/`B` pair sharing a number. Number 12 sits next to number 1.

use crate::error::DiscoveryError;
use crate::models::{Mode, MusicalKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Camelot number for each pitch class (C = 0 .. B = 11), major keys
const MAJOR_NUMBERS: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];
/// Camelot number for each pitch class (C = 0 .. B = 11), minor keys
const MINOR_NUMBERS: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];

/// Largest possible distance between two wheel positions
pub const MAX_CAMELOT_DISTANCE: u8 = 7;

/// A validated position on the Camelot wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CamelotKey {
    number: u8,
    mode: Mode,
}

impl CamelotKey {
    pub fn new(number: u8, mode: Mode) -> Result<Self, DiscoveryError> {
        if !(1..=12).contains(&number) {
            return Err(DiscoveryError::invalid(
                "camelot position",
                format!("number {number} is outside 1-12"),
            ));
        }
        Ok(Self { number, mode })
    }

    pub fn number(self) -> u8 {
        self.number
    }

    pub fn mode(self) -> Mode {
        self.mode
    }

    /// All 24 positions, lowest number first and `A` before `B`
    pub fn all() -> impl Iterator<Item = CamelotKey> {
        (1..=12u8).flat_map(|number| {
            [Mode::Minor, Mode::Major]
                .into_iter()
                .map(move |mode| CamelotKey { number, mode })
        })
    }

    /// Position of a musical key on the wheel
    pub fn from_key(key: MusicalKey) -> Self {
        let table = match key.mode {
            Mode::Major => &MAJOR_NUMBERS,
            Mode::Minor => &MINOR_NUMBERS,
        };
        Self {
            number: table[usize::from(key.pitch_class % 12)],
            mode: key.mode,
        }
    }

    /// The musical key sitting at this position
    pub fn to_key(self) -> MusicalKey {
        let table = match self.mode {
            Mode::Major => &MAJOR_NUMBERS,
            Mode::Minor => &MINOR_NUMBERS,
        };
        // every number 1-12 appears exactly once per table
        let pitch_class = table
            .iter()
            .position(|&n| n == self.number)
            .unwrap_or_default() as u8;
        MusicalKey {
            pitch_class,
            mode: self.mode,
        }
    }

    fn letter(self) -> char {
        match self.mode {
            Mode::Minor => 'A',
            Mode::Major => 'B',
        }
    }
}

/// Shortest number of wheel steps between two positions.
///
/// Symmetric, zero only for identical positions, at most
/// [`MAX_CAMELOT_DISTANCE`].
pub fn camelot_distance(a: CamelotKey, b: CamelotKey) -> u8 {
    let diff = a.number.abs_diff(b.number);
    let around = diff.min(12 - diff);
    around + u8::from(a.mode != b.mode)
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.letter())
    }
}

impl FromStr for CamelotKey {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || {
            DiscoveryError::invalid("camelot position", format!("'{s}' is not a Camelot code"))
        };

        let mut chars = trimmed.chars();
        let letter = chars.next_back().ok_or_else(invalid)?;
        let mode = match letter.to_ascii_uppercase() {
            'A' => Mode::Minor,
            'B' => Mode::Major,
            _ => return Err(invalid()),
        };
        let number: u8 = chars.as_str().parse().map_err(|_| invalid())?;
        Self::new(number, mode)
    }
}

impl TryFrom<String> for CamelotKey {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CamelotKey> for String {
    fn from(key: CamelotKey) -> Self {
        key.to_string()
    }
}

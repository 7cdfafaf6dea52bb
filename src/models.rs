use crate::discovery::camelot::CamelotKey;
use crate::error::DiscoveryError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Major or minor tonality. Minor keys sit on the `A` ring of the Camelot
/// wheel, major keys on the `B` ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    Minor,
    Major,
}

/// A musical key as pitch class (C = 0 .. B = 11) plus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MusicalKey {
    pub pitch_class: u8,
    pub mode: Mode,
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", NOTE_NAMES[usize::from(self.pitch_class % 12)], mode)
    }
}

impl FromStr for MusicalKey {
    type Err = DiscoveryError;

    /// Accepts "Am", "C#", "Db major", "F# minor", "Ebmin" and similar
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DiscoveryError::invalid("musical key", format!("'{s}' is not a key"));
        let trimmed = s.trim();
        let mut chars = trimmed.chars();

        let base: i8 = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(invalid()),
        };

        let mut rest = chars.as_str();
        let accidental = match rest.chars().next() {
            Some('#') | Some('♯') => 1,
            Some('b') | Some('♭') => -1,
            _ => 0,
        };
        if accidental != 0 {
            let skip = rest.chars().next().map(char::len_utf8).unwrap_or_default();
            rest = &rest[skip..];
        }

        let mode = match rest.trim().to_lowercase().as_str() {
            "" | "maj" | "major" => Mode::Major,
            "m" | "min" | "minor" => Mode::Minor,
            _ => return Err(invalid()),
        };

        Ok(MusicalKey {
            pitch_class: (base + accidental).rem_euclid(12) as u8,
            mode,
        })
    }
}

impl TryFrom<String> for MusicalKey {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MusicalKey> for String {
    fn from(key: MusicalKey) -> Self {
        key.to_string()
    }
}

/// Time signature such as 4/4 or 6/8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            DiscoveryError::invalid("time signature", format!("'{s}' is not a time signature"))
        };
        let (num, den) = s.trim().split_once('/').ok_or_else(invalid)?;
        let numerator: u8 = num.trim().parse().map_err(|_| invalid())?;
        let denominator: u8 = den.trim().parse().map_err(|_| invalid())?;
        if numerator == 0 || !denominator.is_power_of_two() {
            return Err(invalid());
        }
        Ok(Self::new(numerator, denominator))
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = DiscoveryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(sig: TimeSignature) -> Self {
        sig.to_string()
    }
}

/// A track and its musical metadata, in the library file layout.
///
/// Only `id` is required. Anything else may be missing; the engine skips a
/// dimension whenever either side lacks the data for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default, deserialize_with = "positive_or_none")]
    pub bpm: Option<f64>,
    #[serde(default, deserialize_with = "known_or_none")]
    pub key: Option<MusicalKey>,
    #[serde(
        default,
        rename = "camelot_position",
        deserialize_with = "known_or_none"
    )]
    pub camelot: Option<CamelotKey>,
    #[serde(default, deserialize_with = "known_or_none")]
    pub time_signature: Option<TimeSignature>,
    #[serde(default, rename = "energy_level")]
    pub energy: Option<f64>,
    #[serde(default, deserialize_with = "genre_keywords")]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub spotify_url: Option<String>,
    #[serde(default)]
    pub album_art_url: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>) -> Self {
        Track {
            id: id.into(),
            title: String::new(),
            artist: String::new(),
            album: None,
            bpm: None,
            key: None,
            camelot: None,
            time_signature: None,
            energy: None,
            genres: BTreeSet::new(),
            spotify_url: None,
            album_art_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>, artist: impl Into<String>) -> Self {
        self.title = title.into();
        self.artist = artist.into();
        self
    }
}

#[cfg(test)]
impl Track {
    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = Some(bpm);
        self
    }

    pub fn with_key(mut self, key: MusicalKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_camelot(mut self, camelot: CamelotKey) -> Self {
        self.camelot = Some(camelot);
        self
    }

    pub fn with_time_signature(mut self, sig: TimeSignature) -> Self {
        self.time_signature = Some(sig);
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.genres = genres
            .into_iter()
            .filter_map(|g| normalize_genre(g.as_ref()))
            .collect();
        self
    }
}

impl Track {
    /// Camelot position, derived from the musical key when not stored
    pub fn camelot(&self) -> Option<CamelotKey> {
        self.camelot.or_else(|| self.key.map(CamelotKey::from_key))
    }

    /// Check the invariants the engine relies on
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        let stage = "track validation";
        if let Some(bpm) = self.bpm {
            if !(bpm.is_finite() && bpm > 0.0) {
                return Err(DiscoveryError::invalid(
                    stage,
                    format!("track '{}' has non-positive BPM {bpm}", self.id),
                ));
            }
        }
        if let Some(energy) = self.energy {
            if !(0.0..=1.0).contains(&energy) {
                return Err(DiscoveryError::invalid(
                    stage,
                    format!("track '{}' has energy {energy} outside 0-1", self.id),
                ));
            }
        }
        if let (Some(key), Some(camelot)) = (self.key, self.camelot) {
            if CamelotKey::from_key(key) != camelot {
                return Err(DiscoveryError::invalid(
                    stage,
                    format!(
                        "track '{}' has key {key} but Camelot position {camelot}",
                        self.id
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Lowercase and trim a genre keyword, dropping empty ones
pub fn normalize_genre(raw: &str) -> Option<String> {
    let genre = raw.trim().to_lowercase();
    (!genre.is_empty()).then_some(genre)
}

fn is_unknown_marker(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("unknown") || raw.eq_ignore_ascii_case("n/a")
}

/// Parse an optional textual field, reading "Unknown" and "" as absent
fn known_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        Some(s) if is_unknown_marker(s) => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Importers write 0 for tempos they could not detect
fn positive_or_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|bpm| bpm.is_finite() && *bpm > 0.0))
}

fn genre_keywords<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .filter_map(|g| normalize_genre(g))
        .collect())
}

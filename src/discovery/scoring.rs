use super::camelot::{MAX_CAMELOT_DISTANCE, camelot_distance};
use super::{BpmTolerance, DiscoveryConfig, Entropy, GenreRules, TimeSignatureRules};
use crate::models::{TimeSignature, Track};
use serde::Serialize;
use std::collections::BTreeSet;

/// Musical dimensions a candidate is checked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Bpm,
    Key,
    TimeSignature,
    Genre,
}

/// Outcome of one evaluated dimension. Dimensions lacking data on either
/// side are not evaluated at all and show up as `None` in the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionCheck<M> {
    pub measure: M,
    pub passed: bool,
    /// 1.0 for a perfect match, falling towards 0.0 as the pair drifts apart
    pub closeness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BpmMeasure {
    pub delta: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyMeasure {
    pub distance: u8,
    pub max_distance: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSignatureRelation {
    Identical,
    Related,
    Unrelated,
}

/// Strongest genre link found between two keyword sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenreOverlap {
    None,
    Family,
    Partial,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenreMeasure {
    /// Keywords present in both sets
    pub shared: usize,
    pub overlap: GenreOverlap,
}

/// Per-dimension breakdown of a seed/candidate comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompatibilityResult {
    pub bpm: Option<DimensionCheck<BpmMeasure>>,
    pub key: Option<DimensionCheck<KeyMeasure>>,
    pub time_signature: Option<DimensionCheck<TimeSignatureRelation>>,
    pub genre: Option<DimensionCheck<GenreMeasure>>,
    /// Informational only, never disqualifies
    pub energy_delta: Option<f64>,
}

impl CompatibilityResult {
    fn evaluated(&self) -> [(Dimension, Option<(bool, f64)>); 4] {
        [
            (Dimension::Bpm, self.bpm.as_ref().map(|c| (c.passed, c.closeness))),
            (Dimension::Key, self.key.as_ref().map(|c| (c.passed, c.closeness))),
            (
                Dimension::TimeSignature,
                self.time_signature.as_ref().map(|c| (c.passed, c.closeness)),
            ),
            (Dimension::Genre, self.genre.as_ref().map(|c| (c.passed, c.closeness))),
        ]
    }

    /// True when no evaluated dimension disqualifies the candidate
    pub fn is_compatible(&self) -> bool {
        self.evaluated()
            .iter()
            .all(|(_, check)| check.is_none_or(|(passed, _)| passed))
    }

    pub fn failed_dimensions(&self) -> Vec<Dimension> {
        self.evaluated()
            .iter()
            .filter(|(_, check)| matches!(check, Some((false, _))))
            .map(|(dimension, _)| *dimension)
            .collect()
    }

    pub fn skipped_dimensions(&self) -> Vec<Dimension> {
        self.evaluated()
            .iter()
            .filter(|(_, check)| check.is_none())
            .map(|(dimension, _)| *dimension)
            .collect()
    }

    /// Mean closeness over evaluated dimensions (1.0 when nothing could be compared)
    pub fn score(&self) -> f64 {
        let closeness: Vec<f64> = self
            .evaluated()
            .iter()
            .filter_map(|(_, check)| check.map(|(_, c)| c))
            .collect();
        if closeness.is_empty() {
            return 1.0;
        }
        closeness.iter().sum::<f64>() / closeness.len() as f64
    }
}

/// Compatibility checks between a seed and a candidate
pub struct CompatibilityScorer;

impl CompatibilityScorer {
    /// Compare two tracks at an already validated entropy
    pub fn evaluate(
        seed: &Track,
        candidate: &Track,
        entropy: Entropy,
        config: &DiscoveryConfig,
    ) -> CompatibilityResult {
        CompatibilityResult {
            bpm: Self::check_bpm(seed.bpm, candidate.bpm, entropy, &config.bpm),
            key: Self::check_key(seed, candidate, entropy, config),
            time_signature: Self::check_time_signature(
                seed.time_signature,
                candidate.time_signature,
                entropy,
                &config.time_signature,
            ),
            genre: Self::check_genre(&seed.genres, &candidate.genres, entropy, &config.genre),
            energy_delta: match (seed.energy, candidate.energy) {
                (Some(a), Some(b)) => Some((a - b).abs()),
                _ => None,
            },
        }
    }

    /// Compare two tracks at a raw entropy value, rejecting values outside [0, 1]
    #[cfg(test)]
    pub fn evaluate_raw(
        seed: &Track,
        candidate: &Track,
        entropy: f64,
        config: &DiscoveryConfig,
    ) -> Result<CompatibilityResult, crate::error::DiscoveryError> {
        let entropy = Entropy::new(entropy)?;
        Ok(Self::evaluate(seed, candidate, entropy, config))
    }

    #[cfg(test)]
    pub fn is_compatible(
        seed: &Track,
        candidate: &Track,
        entropy: Entropy,
        config: &DiscoveryConfig,
    ) -> bool {
        Self::evaluate(seed, candidate, entropy, config).is_compatible()
    }

    pub fn check_bpm(
        seed: Option<f64>,
        candidate: Option<f64>,
        entropy: Entropy,
        tolerance: &BpmTolerance,
    ) -> Option<DimensionCheck<BpmMeasure>> {
        let (seed, candidate) = (seed?, candidate?);
        let delta = (seed - candidate).abs();
        let tolerance = tolerance.at(entropy);
        let closeness = if tolerance > 0.0 {
            (1.0 - delta / tolerance).clamp(0.0, 1.0)
        } else if delta == 0.0 {
            1.0
        } else {
            0.0
        };
        Some(DimensionCheck {
            measure: BpmMeasure { delta, tolerance },
            passed: delta <= tolerance,
            closeness,
        })
    }

    pub fn check_key(
        seed: &Track,
        candidate: &Track,
        entropy: Entropy,
        config: &DiscoveryConfig,
    ) -> Option<DimensionCheck<KeyMeasure>> {
        let (seed, candidate) = (seed.camelot()?, candidate.camelot()?);
        let distance = camelot_distance(seed, candidate);
        let max_distance = config.max_key_distance(entropy);
        Some(DimensionCheck {
            measure: KeyMeasure {
                distance,
                max_distance,
            },
            passed: distance <= max_distance,
            closeness: 1.0 - f64::from(distance) / f64::from(MAX_CAMELOT_DISTANCE),
        })
    }

    pub fn time_signature_relation(
        a: TimeSignature,
        b: TimeSignature,
        rules: &TimeSignatureRules,
    ) -> TimeSignatureRelation {
        if a == b {
            return TimeSignatureRelation::Identical;
        }
        let related = rules
            .related_pairs
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a));
        if related {
            TimeSignatureRelation::Related
        } else {
            TimeSignatureRelation::Unrelated
        }
    }

    pub fn check_time_signature(
        seed: Option<TimeSignature>,
        candidate: Option<TimeSignature>,
        entropy: Entropy,
        rules: &TimeSignatureRules,
    ) -> Option<DimensionCheck<TimeSignatureRelation>> {
        let relation = Self::time_signature_relation(seed?, candidate?, rules);
        let e = entropy.value();
        let passed = match relation {
            TimeSignatureRelation::Identical => true,
            TimeSignatureRelation::Related => e >= rules.related_from,
            TimeSignatureRelation::Unrelated => e >= rules.any_from,
        };
        let closeness = match relation {
            TimeSignatureRelation::Identical => 1.0,
            TimeSignatureRelation::Related => 0.5,
            TimeSignatureRelation::Unrelated => 0.0,
        };
        Some(DimensionCheck {
            measure: relation,
            passed,
            closeness,
        })
    }

    pub fn genre_measure(
        seed: &BTreeSet<String>,
        candidate: &BTreeSet<String>,
        rules: &GenreRules,
    ) -> GenreMeasure {
        let shared = seed.intersection(candidate).count();
        let overlap = if shared > 0 {
            GenreOverlap::Exact
        } else if Self::share_a_word(seed, candidate) {
            GenreOverlap::Partial
        } else if Self::share_a_family(seed, candidate, &rules.families) {
            GenreOverlap::Family
        } else {
            GenreOverlap::None
        };
        GenreMeasure { shared, overlap }
    }

    pub fn check_genre(
        seed: &BTreeSet<String>,
        candidate: &BTreeSet<String>,
        entropy: Entropy,
        rules: &GenreRules,
    ) -> Option<DimensionCheck<GenreMeasure>> {
        if seed.is_empty() || candidate.is_empty() {
            return None;
        }
        let measure = Self::genre_measure(seed, candidate, rules);
        let e = entropy.value();
        let passed = e >= rules.ignore_from
            || match measure.overlap {
                GenreOverlap::Exact => true,
                GenreOverlap::Partial | GenreOverlap::Family => e >= rules.partial_from,
                GenreOverlap::None => false,
            };
        let closeness = match measure.overlap {
            GenreOverlap::Exact => measure.shared as f64 / seed.len().min(candidate.len()) as f64,
            GenreOverlap::Partial => 0.5,
            GenreOverlap::Family => 0.25,
            GenreOverlap::None => 0.0,
        };
        Some(DimensionCheck {
            measure,
            passed,
            closeness,
        })
    }

    /// Split a keyword into words: "hip-hop" and "hip hop" both give [hip, hop]
    fn words(genre: &str) -> Vec<String> {
        genre
            .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '/' | ','))
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn share_a_word(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
        let a_words: BTreeSet<String> = a.iter().flat_map(|g| Self::words(g)).collect();
        b.iter()
            .flat_map(|g| Self::words(g))
            .any(|w| a_words.contains(&w))
    }

    /// Whether `genre` names `member`, either exactly or as a run of its words
    fn names(genre: &str, member: &str) -> bool {
        let genre = format!(" {} ", Self::words(genre).join(" "));
        let member = Self::words(member).join(" ");
        !member.is_empty() && genre.contains(&format!(" {member} "))
    }

    fn families_of<'a>(
        genres: &'a BTreeSet<String>,
        families: &'a [Vec<String>],
    ) -> impl Iterator<Item = usize> + 'a {
        families.iter().enumerate().filter_map(move |(index, family)| {
            genres
                .iter()
                .any(|g| family.iter().any(|member| Self::names(g, member)))
                .then_some(index)
        })
    }

    fn share_a_family(
        a: &BTreeSet<String>,
        b: &BTreeSet<String>,
        families: &[Vec<String>],
    ) -> bool {
        let a_families: BTreeSet<usize> = Self::families_of(a, families).collect();
        Self::families_of(b, families).any(|index| a_families.contains(&index))
    }
}

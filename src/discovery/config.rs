use super::Entropy;
use crate::error::DiscoveryError;
use crate::models::TimeSignature;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Tuning for the discovery engine.
///
/// Every threshold that widens with entropy lives here. All of them must be
/// nondecreasing in entropy so that raising entropy only ever grows the set of
/// compatible candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub bpm: BpmTolerance,
    pub key_steps: Vec<KeyStep>,
    pub time_signature: TimeSignatureRules,
    pub genre: GenreRules,
    pub centroid: CentroidSettings,
}

/// BPM tolerance: `base + entropy * range`, compared inclusively
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpmTolerance {
    pub base: f64,
    pub range: f64,
}

/// From `min_entropy` upwards, Camelot distances up to `max_distance` pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyStep {
    pub min_entropy: f64,
    pub max_distance: u8,
}

/// Time signature matching: exact below `related_from`, exact or a related
/// pair from `related_from`, anything from `any_from`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSignatureRules {
    pub related_from: f64,
    pub any_from: f64,
    pub related_pairs: Vec<(TimeSignature, TimeSignature)>,
}

/// Genre matching: exact keyword overlap below `partial_from`, word or family
/// overlap from `partial_from`, no genre requirement from `ignore_from`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreRules {
    pub partial_from: f64,
    pub ignore_from: f64,
    /// Groups of keywords considered thematically related
    pub families: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidSettings {
    pub policy: CentroidPolicy,
    pub genres: GenreSelection,
    /// Collections smaller than this keep every genre keyword
    pub small_collection: usize,
}

/// When to replace the seed with the centroid of the pool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CentroidPolicy {
    Never,
    Always,
    /// Strictly above the threshold
    AboveEntropy { threshold: f64 },
}

impl CentroidPolicy {
    pub fn applies(self, entropy: Entropy) -> bool {
        match self {
            CentroidPolicy::Never => false,
            CentroidPolicy::Always => true,
            CentroidPolicy::AboveEntropy { threshold } => entropy.value() > threshold,
        }
    }
}

/// Which genre keywords a centroid keeps
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GenreSelection {
    /// Keywords seen at least twice (everything for small collections)
    Recurring,
    /// The `k` most frequent keywords
    TopK { k: usize },
}

impl BpmTolerance {
    pub fn at(&self, entropy: Entropy) -> f64 {
        self.base + entropy.value() * self.range
    }
}

impl DiscoveryConfig {
    /// Largest Camelot distance accepted at this entropy
    pub fn max_key_distance(&self, entropy: Entropy) -> u8 {
        self.key_steps
            .iter()
            .filter(|step| step.min_entropy <= entropy.value())
            .map(|step| step.max_distance)
            .max()
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), DiscoveryError> {
        let stage = "discovery config";
        if !(self.bpm.base >= 0.0 && self.bpm.range >= 0.0) {
            return Err(DiscoveryError::invalid(
                stage,
                "BPM base and range must be non-negative",
            ));
        }

        let thresholds = self
            .key_steps
            .iter()
            .map(|s| ("key step", s.min_entropy))
            .chain([
                ("time signature related_from", self.time_signature.related_from),
                ("time signature any_from", self.time_signature.any_from),
                ("genre partial_from", self.genre.partial_from),
                ("genre ignore_from", self.genre.ignore_from),
            ]);
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(DiscoveryError::invalid(
                    stage,
                    format!("{name} threshold {value} is outside 0.0-1.0"),
                ));
            }
        }

        if self.time_signature.any_from < self.time_signature.related_from {
            return Err(DiscoveryError::invalid(
                stage,
                "time signature any_from must not be below related_from",
            ));
        }
        if self.genre.ignore_from < self.genre.partial_from {
            return Err(DiscoveryError::invalid(
                stage,
                "genre ignore_from must not be below partial_from",
            ));
        }
        if let CentroidPolicy::AboveEntropy { threshold } = self.centroid.policy {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(DiscoveryError::invalid(
                    stage,
                    format!("centroid threshold {threshold} is outside 0.0-1.0"),
                ));
            }
        }
        Ok(())
    }

    /// Load tuning from a JSON file; missing fields keep their defaults
    pub fn load_from_file(path: &str) -> anyhow::Result<DiscoveryConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading tuning file '{path}'"))?;
        let config: DiscoveryConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing tuning file '{path}'"))?;
        config.validate()?;
        Ok(config)
    }
}

const GENRE_FAMILIES: [&[&str]; 6] = [
    &["house", "techno", "trance", "edm", "electronic", "dance", "electro"],
    &["rock", "metal", "punk", "grunge", "alternative", "indie"],
    &["hip hop", "rap", "trap", "grime", "drill"],
    &["jazz", "soul", "funk", "blues", "r&b", "disco"],
    &["ambient", "downtempo", "chillout", "lo-fi", "trip hop"],
    &["pop", "synthpop", "dance pop", "electropop", "k-pop"],
];

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let sig = TimeSignature::new;
        Self {
            bpm: BpmTolerance {
                base: 5.0,
                range: 25.0,
            },
            key_steps: vec![
                KeyStep { min_entropy: 0.0, max_distance: 1 },
                KeyStep { min_entropy: 0.3, max_distance: 2 },
                KeyStep { min_entropy: 0.7, max_distance: 3 },
                KeyStep { min_entropy: 0.9, max_distance: 7 },
            ],
            time_signature: TimeSignatureRules {
                related_from: 0.5,
                any_from: 0.9,
                related_pairs: vec![
                    (sig(4, 4), sig(2, 4)),
                    (sig(3, 4), sig(6, 8)),
                    (sig(2, 2), sig(4, 4)),
                    (sig(6, 8), sig(12, 8)),
                ],
            },
            genre: GenreRules {
                partial_from: 0.4,
                ignore_from: 0.85,
                families: GENRE_FAMILIES
                    .iter()
                    .map(|family| family.iter().map(|g| g.to_string()).collect())
                    .collect(),
            },
            centroid: CentroidSettings {
                policy: CentroidPolicy::AboveEntropy { threshold: 0.5 },
                genres: GenreSelection::Recurring,
                small_collection: 3,
            },
        }
    }
}

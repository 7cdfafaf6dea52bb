use crate::discovery::camelot::CamelotKey;
use crate::models::{MusicalKey, TimeSignature, Track, normalize_genre};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Community supplied metadata for one track, matched by Spotify id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackContribution {
    pub track_id_spotify: Option<String>,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub time_signature: Option<String>,
    pub camelot_key: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub genre_keywords: Vec<String>,
    pub source_description: Option<String>,
    pub confidence: Option<f64>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a contributed field, warning about values that do not parse
fn parse_field<T: FromStr>(raw: Option<&str>, field: &str, id: &str) -> Option<T> {
    let raw = raw?.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("unknown") {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring contributed {field} '{raw}' for track '{id}'");
            None
        }
    }
}

impl TrackContribution {
    /// A copy of `track` with this contribution layered on top.
    ///
    /// Present scalar fields replace the track's own values and genre
    /// keywords are merged. Key and Camelot position always end up agreeing:
    /// whichever one is contributed determines the other, and when both are
    /// contributed but disagree the Camelot position wins.
    pub fn apply_to(&self, track: &Track) -> Track {
        let mut merged = track.clone();

        if let Some(bpm) = self.bpm {
            if bpm.is_finite() && bpm > 0.0 {
                merged.bpm = Some(bpm);
            } else {
                log::warn!("Ignoring contributed BPM {bpm} for track '{}'", track.id);
            }
        }

        let sig = self.time_signature.as_deref();
        if let Some(sig) = parse_field::<TimeSignature>(sig, "time signature", &track.id) {
            merged.time_signature = Some(sig);
        }

        let key = parse_field::<MusicalKey>(self.key.as_deref(), "key", &track.id);
        let camelot = self.camelot_key.as_deref();
        let camelot = parse_field::<CamelotKey>(camelot, "Camelot key", &track.id);
        match (key, camelot) {
            (Some(key), Some(camelot)) => {
                if CamelotKey::from_key(key) != camelot {
                    log::warn!(
                        "Contributed key {key} disagrees with Camelot {camelot} for track '{}', \
                         using {camelot}",
                        track.id
                    );
                }
                merged.camelot = Some(camelot);
                merged.key = Some(camelot.to_key());
            }
            (Some(key), None) => {
                merged.key = Some(key);
                merged.camelot = Some(CamelotKey::from_key(key));
            }
            (None, Some(camelot)) => {
                merged.camelot = Some(camelot);
                merged.key = Some(camelot.to_key());
            }
            (None, None) => {}
        }

        merged
            .genres
            .extend(self.genre_keywords.iter().filter_map(|g| normalize_genre(g)));
        merged
    }
}

/// Load contributions keyed by Spotify track id.
///
/// The overlay is optional: a missing, unreadable or malformed file gives an
/// empty overlay.
pub fn load_contributions(path: impl AsRef<Path>) -> HashMap<String, TrackContribution> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "Contributions file {} not found, continuing without contributions",
            path.display()
        );
        return HashMap::new();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("Failed to read contributions {} ({e}), ignoring them", path.display());
            return HashMap::new();
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(value) => parse_contributions(value),
        Err(e) => {
            log::warn!("Failed to parse contributions {} ({e}), ignoring them", path.display());
            HashMap::new()
        }
    }
}

pub fn parse_contributions(value: Value) -> HashMap<String, TrackContribution> {
    let mut contributions = HashMap::new();
    let Value::Array(items) = value else {
        log::warn!("Expected a list of contributions, no contributions loaded");
        return contributions;
    };

    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            log::warn!("Contribution item at index {index} is not an object, skipping");
            continue;
        }
        let contribution: TrackContribution = match serde_json::from_value(item) {
            Ok(contribution) => contribution,
            Err(e) => {
                log::warn!("Contribution item at index {index} is invalid ({e}), skipping");
                continue;
            }
        };
        let Some(id) = contribution
            .track_id_spotify
            .clone()
            .filter(|id| !id.trim().is_empty())
        else {
            log::warn!("Contribution item at index {index} has no track_id_spotify, skipping");
            continue;
        };
        if contributions.contains_key(&id) {
            log::warn!("Duplicate contribution for '{id}', using the first entry");
            continue;
        }
        contributions.insert(id, contribution);
    }
    contributions
}

/// Apply contributions to every matching track
pub fn apply_overlay(
    tracks: Vec<Track>,
    contributions: &HashMap<String, TrackContribution>,
) -> Vec<Track> {
    if contributions.is_empty() {
        return tracks;
    }
    let mut applied = 0;
    let merged = tracks
        .into_iter()
        .map(|track| match contributions.get(&track.id) {
            Some(contribution) => {
                applied += 1;
                contribution.apply_to(&track)
            }
            None => track,
        })
        .collect();
    log::info!("Applied {applied} of {} contributions", contributions.len());
    merged
}

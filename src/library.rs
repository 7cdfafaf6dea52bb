use crate::models::Track;
use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Load a track library saved as a JSON array of track records.
///
/// Records that do not parse, repeat an earlier id, or break a track
/// invariant are skipped with a warning so one bad entry does not hide the
/// rest of the collection.
pub fn load_library(path: impl AsRef<Path>) -> Result<Vec<Track>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read library {}", path.display()))?;
    let tracks = parse_library(&content)
        .with_context(|| format!("Failed to parse library {}", path.display()))?;
    log::info!("Loaded {} tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}

pub fn parse_library(content: &str) -> Result<Vec<Track>> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(items) = value else {
        return Err(anyhow!("expected a JSON array of tracks"));
    };

    let mut seen = HashSet::new();
    let mut tracks = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let track: Track = match serde_json::from_value(item) {
            Ok(track) => track,
            Err(e) => {
                log::warn!("Skipping library entry {index}: {e}");
                continue;
            }
        };
        if let Err(e) = track.validate() {
            log::warn!("Skipping library entry {index}: {e}");
            continue;
        }
        if !seen.insert(track.id.clone()) {
            log::warn!("Duplicate track id '{}' at entry {index}, keeping the first", track.id);
            continue;
        }
        tracks.push(track);
    }
    Ok(tracks)
}

/// Find a track by id
pub fn find_track<'a>(tracks: &'a [Track], id: &str) -> Option<&'a Track> {
    tracks.iter().find(|track| track.id == id)
}

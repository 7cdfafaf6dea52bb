//! Synthetic "average track" of a collection, used as a surrogate seed.

use super::camelot::{CamelotKey, camelot_distance};
use super::{CentroidSettings, GenreSelection};
use crate::error::DiscoveryError;
use crate::models::{TimeSignature, Track};
use std::collections::HashMap;

pub const CENTROID_ID: &str = "centroid";

/// Reduce a non-empty collection to a single synthetic track.
///
/// Time signature ties go to the value seen first in `tracks`, so the result
/// depends on input order when two signatures are equally common.
pub fn compute_centroid(
    tracks: &[Track],
    settings: &CentroidSettings,
) -> Result<Track, DiscoveryError> {
    if tracks.is_empty() {
        return Err(DiscoveryError::invalid(
            "centroid",
            "cannot aggregate an empty collection",
        ));
    }

    let camelot = median_camelot(tracks);
    let mut centroid = Track::new(CENTROID_ID).with_title(
        format!("Centroid of {} tracks", tracks.len()),
        "Various Artists",
    );
    centroid.bpm = mean(tracks.iter().filter_map(|t| t.bpm));
    centroid.energy = mean(tracks.iter().filter_map(|t| t.energy));
    centroid.camelot = camelot;
    centroid.key = camelot.map(CamelotKey::to_key);
    centroid.time_signature = modal_time_signature(tracks);
    centroid.genres = top_genres(tracks, settings).into_iter().collect();

    log::debug!(
        "Centroid of {} tracks: bpm={:?} camelot={:?} time_signature={:?} genres={:?}",
        tracks.len(),
        centroid.bpm,
        centroid.camelot.map(|c| c.to_string()),
        centroid.time_signature.map(|s| s.to_string()),
        centroid.genres
    );

    Ok(centroid)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Position with the least total wheel distance to every known position
pub fn median_camelot(tracks: &[Track]) -> Option<CamelotKey> {
    let known: Vec<CamelotKey> = tracks.iter().filter_map(Track::camelot).collect();
    if known.is_empty() {
        return None;
    }

    let mut best: Option<(CamelotKey, u32)> = None;
    // `all()` walks 1A, 1B, 2A, ... so the first minimum wins ties
    for candidate in CamelotKey::all() {
        let total: u32 = known
            .iter()
            .map(|&k| u32::from(camelot_distance(candidate, k)))
            .sum();
        if best.is_none_or(|(_, best_total)| total < best_total) {
            best = Some((candidate, total));
        }
    }
    best.map(|(key, _)| key)
}

fn modal_time_signature(tracks: &[Track]) -> Option<TimeSignature> {
    // (signature, count) in first-seen order
    let mut counts: Vec<(TimeSignature, usize)> = Vec::new();
    for sig in tracks.iter().filter_map(|t| t.time_signature) {
        match counts.iter_mut().find(|(s, _)| *s == sig) {
            Some((_, count)) => *count += 1,
            None => counts.push((sig, 1)),
        }
    }

    let mut best: Option<(TimeSignature, usize)> = None;
    for (sig, count) in counts {
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((sig, count));
        }
    }
    best.map(|(sig, _)| sig)
}

/// Genre keywords ordered by frequency, then first appearance
pub fn top_genres(tracks: &[Track], settings: &CentroidSettings) -> Vec<String> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for genre in tracks.iter().flat_map(|t| t.genres.iter()) {
        let next_index = first_seen.len();
        first_seen.entry(genre.as_str()).or_insert(next_index);
        *counts.entry(genre.as_str()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by_key(|&(genre, count)| (std::cmp::Reverse(count), first_seen[genre]));

    let keep = match settings.genres {
        GenreSelection::TopK { k } => k,
        GenreSelection::Recurring if tracks.len() < settings.small_collection => ranked.len(),
        GenreSelection::Recurring => ranked.iter().filter(|(_, count)| *count >= 2).count(),
    };
    ranked
        .into_iter()
        .take(keep)
        .map(|(genre, _)| genre.to_string())
        .collect()
}

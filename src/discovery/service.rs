use super::centroid::compute_centroid;
use super::random::{CancellationToken, QuantumByteSource, RandomByteBuffer, bytes_for_bound};
use super::scoring::{CompatibilityResult, CompatibilityScorer};
use super::{DiscoveryConfig, Entropy};
use crate::error::DiscoveryError;
use crate::models::Track;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Parameters of a single recommendation call
#[derive(Debug, Clone)]
pub struct RecommendRequest<'a> {
    pub seed: &'a Track,
    pub pool: &'a [Track],
    /// Raw entropy; validated by the service
    pub entropy: f64,
    pub desired_count: usize,
    /// Force the centroid on or off; `None` defers to the configured policy
    pub use_centroid: Option<bool>,
    /// Collection to build the centroid from instead of the pool
    pub centroid_reference: Option<&'a [Track]>,
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl<'a> RecommendRequest<'a> {
    pub fn new(seed: &'a Track, pool: &'a [Track], entropy: f64, desired_count: usize) -> Self {
        Self {
            seed,
            pool,
            entropy,
            desired_count,
            use_centroid: None,
            centroid_reference: None,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_centroid(mut self, use_centroid: bool) -> Self {
        self.use_centroid = Some(use_centroid);
        self
    }

    pub fn with_centroid_reference(mut self, reference: &'a [Track]) -> Self {
        self.centroid_reference = Some(reference);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A recommended track and why it qualified
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation<'a> {
    pub track: &'a Track,
    pub compatibility: CompatibilityResult,
}

/// Recommendation orchestrator.
///
/// Holds only its tuning and the injected byte source, so one instance can
/// serve concurrent requests from several threads.
pub struct EntropyService {
    source: Arc<dyn QuantumByteSource>,
    config: DiscoveryConfig,
}

impl EntropyService {
    pub fn new(
        source: Arc<dyn QuantumByteSource>,
        config: DiscoveryConfig,
    ) -> Result<Self, DiscoveryError> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// The track candidates are compared against: the seed itself, or the
    /// centroid of the reference collection (the pool by default)
    pub fn effective_seed<'a>(
        &self,
        request: &RecommendRequest<'a>,
        entropy: Entropy,
    ) -> Result<Cow<'a, Track>, DiscoveryError> {
        let use_centroid = request
            .use_centroid
            .unwrap_or_else(|| self.config.centroid.policy.applies(entropy));
        if !use_centroid {
            return Ok(Cow::Borrowed(request.seed));
        }
        let reference = request.centroid_reference.unwrap_or(request.pool);
        log::debug!("Using centroid of {} tracks as seed", reference.len());
        compute_centroid(reference, &self.config.centroid).map(Cow::Owned)
    }

    /// Pool members compatible with `seed`, in pool order, skipping
    /// `exclude_id` and repeated identifiers
    pub fn compatible_candidates<'a>(
        &self,
        seed: &Track,
        exclude_id: &str,
        pool: &'a [Track],
        entropy: Entropy,
    ) -> Vec<Recommendation<'a>> {
        let mut seen = HashSet::new();
        pool.iter()
            .filter(|track| track.id != exclude_id)
            .filter(|track| seen.insert(track.id.as_str()))
            .filter_map(|track| {
                let compatibility =
                    CompatibilityScorer::evaluate(seed, track, entropy, &self.config);
                if compatibility.is_compatible() {
                    Some(Recommendation {
                        track,
                        compatibility,
                    })
                } else {
                    log::trace!(
                        "Rejected '{}': {:?}",
                        track.id,
                        compatibility.failed_dimensions()
                    );
                    None
                }
            })
            .collect()
    }

    /// Pick up to `desired_count` compatible tracks in random order.
    ///
    /// An empty result means nothing is compatible at this entropy, or that
    /// no tracks were asked for. Failure of the byte source fails the whole
    /// call; there is no fallback.
    pub fn recommend<'a>(
        &self,
        request: &RecommendRequest<'a>,
    ) -> Result<Vec<Recommendation<'a>>, DiscoveryError> {
        let entropy = Entropy::new(request.entropy)?;
        if request.pool.is_empty() {
            return Err(DiscoveryError::invalid("candidate pool", "pool is empty"));
        }
        request.seed.validate()?;
        let reference = request.centroid_reference.unwrap_or_default();
        for track in request.pool.iter().chain(reference) {
            track.validate()?;
        }
        if request.desired_count == 0 {
            log::debug!("Zero tracks requested");
            return Ok(Vec::new());
        }

        let seed = self.effective_seed(request, entropy)?;
        let mut candidates =
            self.compatible_candidates(&seed, &request.seed.id, request.pool, entropy);
        log::debug!(
            "{} of {} pool tracks compatible with '{}' at entropy {}",
            candidates.len(),
            request.pool.len(),
            seed.id,
            entropy
        );
        if candidates.is_empty() {
            log::info!("No compatible candidates at entropy {entropy}");
            return Ok(Vec::new());
        }

        let picks = request.desired_count.min(candidates.len());
        let n = candidates.len();
        let upfront: usize = (0..picks).map(|i| bytes_for_bound(n - i)).sum();

        let mut buffer = RandomByteBuffer::new(
            self.source.as_ref(),
            request.cancel.clone(),
            request.deadline,
        );
        if upfront > 0 {
            buffer.fill(upfront)?;
        }

        // partial Fisher-Yates: position i receives a uniform pick from i..n
        for i in 0..picks {
            let j = i + buffer.draw_index(n - i)?;
            candidates.swap(i, j);
        }
        candidates.truncate(picks);

        log::info!(
            "Recommended {} tracks at entropy {} using {} random bytes in {} request(s)",
            candidates.len(),
            entropy,
            buffer.consumed(),
            buffer.requests()
        );
        Ok(candidates)
    }

    /// Same as [`EntropyService::recommend`], returning only the tracks
    #[cfg(test)]
    pub fn recommend_tracks<'a>(
        &self,
        request: &RecommendRequest<'a>,
    ) -> Result<Vec<&'a Track>, DiscoveryError> {
        Ok(self
            .recommend(request)?
            .into_iter()
            .map(|rec| rec.track)
            .collect())
    }
}

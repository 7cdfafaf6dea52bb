#[cfg(test)]
mod tests {
    use super::super::scoring::*;
    use super::super::*;
    use crate::error::DiscoveryError;
    use crate::models::{TimeSignature, Track};
    use approx::assert_relative_eq;
    use std::collections::BTreeSet;

    fn entropy(value: f64) -> Entropy {
        Entropy::new(value).unwrap()
    }

    fn genres(keywords: &[&str]) -> BTreeSet<String> {
        keywords.iter().map(|g| g.to_string()).collect()
    }

    fn sig(text: &str) -> TimeSignature {
        text.parse().unwrap()
    }

    fn create_test_track(
        id: &str,
        bpm: f64,
        camelot: &str,
        time_sig: &str,
        keywords: &[&str],
    ) -> Track {
        Track::new(id)
            .with_bpm(bpm)
            .with_camelot(camelot.parse().unwrap())
            .with_time_signature(sig(time_sig))
            .with_genres(keywords.iter().copied())
    }

    #[test]
    fn test_bpm_boundary_is_inclusive() {
        let config = DiscoveryConfig::default();
        let check = |candidate: f64, e: f64| {
            CompatibilityScorer::check_bpm(Some(120.0), Some(candidate), entropy(e), &config.bpm)
                .unwrap()
        };
        let at_edge = check(125.0, 0.0);
        assert!(at_edge.passed);
        assert_relative_eq!(at_edge.measure.tolerance, 5.0);

        assert!(!check(126.0, 0.0).passed);
        assert!(check(126.0, 1.0).passed);
    }

    #[test]
    fn test_unknown_bpm_skips_dimension() {
        let config = DiscoveryConfig::default();
        let check = |seed: Option<f64>, candidate: Option<f64>| {
            CompatibilityScorer::check_bpm(seed, candidate, entropy(0.0), &config.bpm)
        };
        assert!(check(None, Some(120.0)).is_none());
        assert!(check(Some(120.0), None).is_none());
    }

    #[test]
    fn test_bpm_closeness_with_zero_tolerance() {
        let tolerance = BpmTolerance { base: 0.0, range: 0.0 };
        let check = |candidate: f64| {
            CompatibilityScorer::check_bpm(Some(100.0), Some(candidate), entropy(0.0), &tolerance)
                .unwrap()
        };
        let same = check(100.0);
        assert!(same.passed);
        assert_relative_eq!(same.closeness, 1.0);
        let different = check(101.0);
        assert!(!different.passed);
        assert_relative_eq!(different.closeness, 0.0);
    }

    #[test]
    fn test_key_distance_widens_with_entropy() {
        let config = DiscoveryConfig::default();
        let seed = Track::new("s").with_camelot("8A".parse().unwrap());
        let adjacent = Track::new("a").with_camelot("9A".parse().unwrap());
        let two_away = Track::new("b").with_camelot("10A".parse().unwrap());

        let passes = |candidate: &Track, e: f64| {
            CompatibilityScorer::check_key(&seed, candidate, entropy(e), &config)
                .unwrap()
                .passed
        };
        assert!(passes(&adjacent, 0.0));
        assert!(!passes(&two_away, 0.0));
        assert!(passes(&two_away, 0.3));
    }

    #[test]
    fn test_key_uses_camelot_derived_from_musical_key() {
        let config = DiscoveryConfig::default();
        let seed = Track::new("s").with_key("A minor".parse().unwrap());
        let candidate = Track::new("c").with_camelot("8A".parse().unwrap());
        let check =
            CompatibilityScorer::check_key(&seed, &candidate, entropy(0.0), &config).unwrap();
        assert_eq!(check.measure.distance, 0);

        let unknown = Track::new("u");
        assert!(CompatibilityScorer::check_key(&seed, &unknown, entropy(0.0), &config).is_none());
    }

    #[test]
    fn test_time_signature_relaxation() {
        let rules = DiscoveryConfig::default().time_signature;
        let check = |a: &str, b: &str, e: f64| {
            CompatibilityScorer::check_time_signature(
                Some(sig(a)),
                Some(sig(b)),
                entropy(e),
                &rules,
            )
            .unwrap()
        };

        assert!(check("4/4", "4/4", 0.0).passed);
        assert!(!check("4/4", "2/4", 0.0).passed);
        assert!(check("4/4", "2/4", 0.5).passed);
        assert!(check("6/8", "3/4", 0.5).passed);
        assert_eq!(check("6/8", "3/4", 0.5).measure, TimeSignatureRelation::Related);
        assert!(!check("4/4", "7/8", 0.5).passed);
        assert!(check("4/4", "7/8", 0.9).passed);
        let unknown =
            CompatibilityScorer::check_time_signature(None, Some(sig("4/4")), entropy(0.0), &rules);
        assert!(unknown.is_none());
    }

    #[test]
    fn test_genre_overlap_levels() {
        let rules = DiscoveryConfig::default().genre;
        let measure = |a: &[&str], b: &[&str]| {
            CompatibilityScorer::genre_measure(&genres(a), &genres(b), &rules).overlap
        };

        assert_eq!(measure(&["house", "disco"], &["disco"]), GenreOverlap::Exact);
        assert_eq!(measure(&["deep house"], &["house"]), GenreOverlap::Partial);
        assert_eq!(measure(&["hip-hop"], &["hip hop"]), GenreOverlap::Partial);
        assert_eq!(measure(&["techno"], &["trance"]), GenreOverlap::Family);
        assert_eq!(measure(&["minimal techno"], &["progressive trance"]), GenreOverlap::Family);
        assert_eq!(measure(&["jazz"], &["metal"]), GenreOverlap::None);
    }

    #[test]
    fn test_genre_relaxation() {
        let rules = DiscoveryConfig::default().genre;
        let check = |a: &[&str], b: &[&str], e: f64| {
            CompatibilityScorer::check_genre(&genres(a), &genres(b), entropy(e), &rules).unwrap()
        };

        assert!(check(&["house"], &["house", "disco"], 0.0).passed);
        assert!(!check(&["deep house"], &["house"], 0.0).passed);
        assert!(check(&["deep house"], &["house"], 0.4).passed);
        assert!(check(&["techno"], &["trance"], 0.4).passed);
        assert!(!check(&["jazz"], &["metal"], 0.84).passed);
        assert!(check(&["jazz"], &["metal"], 0.85).passed);
    }

    #[test]
    fn test_empty_genres_skip_dimension() {
        let rules = DiscoveryConfig::default().genre;
        let (none, rock) = (genres(&[]), genres(&["rock"]));
        let check = CompatibilityScorer::check_genre(&none, &rock, entropy(0.0), &rules);
        assert!(check.is_none());
    }

    #[test]
    fn test_unknown_dimensions_never_disqualify() {
        let config = DiscoveryConfig::default();
        let seed = create_test_track("seed", 120.0, "8B", "4/4", &["house"]);
        let bare = Track::new("bare");
        let result = CompatibilityScorer::evaluate(&seed, &bare, entropy(0.0), &config);
        assert!(result.is_compatible());
        assert_eq!(result.skipped_dimensions().len(), 4);
        assert_relative_eq!(result.score(), 1.0);
    }

    #[test]
    fn test_breakdown_lists_failing_dimensions() {
        let config = DiscoveryConfig::default();
        let seed = create_test_track("seed", 120.0, "8B", "4/4", &["house"]);
        let candidate = create_test_track("c", 140.0, "8B", "3/4", &["house"]);
        let result = CompatibilityScorer::evaluate(&seed, &candidate, entropy(0.0), &config);
        assert!(!result.is_compatible());
        assert_eq!(
            result.failed_dimensions(),
            vec![Dimension::Bpm, Dimension::TimeSignature]
        );
        assert!(result.skipped_dimensions().is_empty());
    }

    #[test]
    fn test_score_averages_closeness() {
        let config = DiscoveryConfig::default();
        let seed = create_test_track("seed", 120.0, "8B", "4/4", &["house"]);
        let identical = create_test_track("c", 120.0, "8B", "4/4", &["house"]);
        let result = CompatibilityScorer::evaluate(&seed, &identical, entropy(0.0), &config);
        assert_relative_eq!(result.score(), 1.0);

        let drifting = create_test_track("d", 130.0, "8B", "4/4", &["house"]);
        let result = CompatibilityScorer::evaluate(&seed, &drifting, entropy(1.0), &config);
        // bpm closeness 1 - 10/30, the other three are perfect
        assert_relative_eq!(result.score(), (2.0 / 3.0 + 3.0) / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_energy_delta_is_informational() {
        let config = DiscoveryConfig::default();
        let seed = Track::new("s").with_energy(0.9);
        let candidate = Track::new("c").with_energy(0.1);
        let result = CompatibilityScorer::evaluate(&seed, &candidate, entropy(0.0), &config);
        assert_relative_eq!(result.energy_delta.unwrap(), 0.8, epsilon = 1e-9);
        assert!(result.is_compatible());
    }

    #[test]
    fn test_evaluate_raw_rejects_invalid_entropy() {
        let config = DiscoveryConfig::default();
        let track = Track::new("t");
        for bad in [-0.1, 1.1, f64::NAN] {
            let err = CompatibilityScorer::evaluate_raw(&track, &track, bad, &config).unwrap_err();
            assert!(matches!(err, DiscoveryError::InvalidArgument { stage: "entropy", .. }));
        }
        assert!(CompatibilityScorer::evaluate_raw(&track, &track, 0.5, &config).is_ok());
    }

    #[test]
    fn test_compatibility_is_monotonic_in_entropy() {
        let config = DiscoveryConfig::default();
        let seed = create_test_track("seed", 120.0, "8B", "4/4", &["deep house"]);
        let pool = vec![
            create_test_track("a", 121.0, "8B", "4/4", &["deep house"]),
            create_test_track("b", 128.0, "9B", "2/4", &["house"]),
            create_test_track("c", 140.0, "5A", "6/8", &["techno"]),
            create_test_track("d", 90.0, "2A", "7/8", &["jazz"]),
            create_test_track("e", 104.0, "10B", "4/4", &["tech house"]),
            Track::new("f").with_bpm(150.0),
            Track::new("g").with_genres(["ambient"]),
        ];

        let mut previous: Vec<String> = Vec::new();
        for step in 0..=20 {
            let e = entropy(step as f64 / 20.0);
            let current: Vec<String> = pool
                .iter()
                .filter(|t| CompatibilityScorer::is_compatible(&seed, t, e, &config))
                .map(|t| t.id.clone())
                .collect();
            for id in &previous {
                assert!(current.contains(id), "{id} dropped out at entropy {e}");
            }
            previous = current;
        }
        assert_eq!(previous.len(), pool.len());
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn entropy(value: f64) -> Entropy {
        Entropy::new(value).unwrap()
    }

    #[test]
    fn test_default_bpm_tolerance_spans_five_to_thirty() {
        let config = DiscoveryConfig::default();
        assert_relative_eq!(config.bpm.at(Entropy::COMFORT_ZONE), 5.0);
        assert_relative_eq!(config.bpm.at(entropy(0.5)), 17.5);
        assert_relative_eq!(config.bpm.at(Entropy::COSMIC_DRIFT), 30.0);
    }

    #[test]
    fn test_key_steps_are_a_nondecreasing_step_function() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.max_key_distance(entropy(0.0)), 1);
        assert_eq!(config.max_key_distance(entropy(0.29)), 1);
        assert_eq!(config.max_key_distance(entropy(0.3)), 2);
        assert_eq!(config.max_key_distance(entropy(0.7)), 3);
        assert_eq!(config.max_key_distance(entropy(1.0)), 7);

        let mut previous = 0;
        for i in 0..=100 {
            let current = config.max_key_distance(entropy(i as f64 / 100.0));
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_unordered_key_steps_still_never_shrink() {
        let config = DiscoveryConfig {
            key_steps: vec![
                KeyStep { min_entropy: 0.5, max_distance: 1 },
                KeyStep { min_entropy: 0.0, max_distance: 3 },
            ],
            ..DiscoveryConfig::default()
        };
        assert_eq!(config.max_key_distance(entropy(0.2)), 3);
        assert_eq!(config.max_key_distance(entropy(0.8)), 3);
    }

    #[test]
    fn test_centroid_policy() {
        let above = CentroidPolicy::AboveEntropy { threshold: 0.5 };
        assert!(!above.applies(entropy(0.5)));
        assert!(above.applies(entropy(0.51)));
        assert!(CentroidPolicy::Always.applies(Entropy::COMFORT_ZONE));
        assert!(!CentroidPolicy::Never.applies(Entropy::COSMIC_DRIFT));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(DiscoveryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_shrinking_tolerance() {
        let mut config = DiscoveryConfig::default();
        config.bpm.range = -1.0;
        assert!(config.validate().is_err());

        let mut config = DiscoveryConfig::default();
        config.genre.ignore_from = 0.1;
        assert!(config.validate().is_err());

        let mut config = DiscoveryConfig::default();
        config.time_signature.related_from = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_tuning_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "bpm": {{ "base": 3.0, "range": 10.0 }},
                "time_signature": {{
                    "related_from": 0.2,
                    "any_from": 0.6,
                    "related_pairs": [["4/4", "2/4"]]
                }},
                "centroid": {{
                    "policy": {{ "mode": "always" }},
                    "genres": {{ "mode": "top_k", "k": 2 }},
                    "small_collection": 1
                }}
            }}"#
        )
        .unwrap();

        let config = DiscoveryConfig::load_from_file(file.path().to_str().unwrap()).unwrap();
        assert_relative_eq!(config.bpm.at(Entropy::COSMIC_DRIFT), 13.0);
        assert_eq!(config.time_signature.related_pairs.len(), 1);
        assert_eq!(config.centroid.policy, CentroidPolicy::Always);
        assert_eq!(config.centroid.genres, GenreSelection::TopK { k: 2 });
        // untouched sections keep their defaults
        assert_eq!(config.key_steps.len(), 4);
        assert_relative_eq!(config.genre.partial_from, 0.4);
    }

    #[test]
    fn test_load_rejects_invalid_tuning_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "bpm": {{ "base": -5.0, "range": 10.0 }} }}"#).unwrap();
        assert!(DiscoveryConfig::load_from_file(file.path().to_str().unwrap()).is_err());
    }
}

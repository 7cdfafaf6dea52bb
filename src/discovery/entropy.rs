use crate::error::DiscoveryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far recommendations may drift from the seed.
///
/// 0.0 is the "Comfort Zone" (strictest matching), 1.0 is "Cosmic Drift"
/// (loosest). Values outside that range cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Entropy(f64);

impl Entropy {
    pub const COMFORT_ZONE: Entropy = Entropy(0.0);
    pub const COSMIC_DRIFT: Entropy = Entropy(1.0);

    /// Reject NaN and anything outside [0, 1]
    pub fn new(value: f64) -> Result<Self, DiscoveryError> {
        if !(0.0..=1.0).contains(&value) {
            return Err(DiscoveryError::invalid(
                "entropy",
                format!("{value} is outside 0.0-1.0"),
            ));
        }
        Ok(Entropy(value))
    }

    /// Clamp into range; NaN maps to the comfort zone
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::COMFORT_ZONE;
        }
        Entropy(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<f64> for Entropy {
    type Error = DiscoveryError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Entropy::new(value)
    }
}

impl From<Entropy> for f64 {
    fn from(entropy: Entropy) -> Self {
        entropy.0
    }
}

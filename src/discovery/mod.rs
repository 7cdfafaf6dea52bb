pub mod camelot;
pub mod centroid;
pub mod config;
pub mod entropy;
pub mod random;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod scoring_tests;

pub use config::*;
pub use entropy::*;
pub use service::*;

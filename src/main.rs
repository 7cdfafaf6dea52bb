use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod client;
mod config;
mod contributions;
mod discovery;
mod error;
mod library;
mod models;


use crate::client::OccyByteClient;
use crate::config::load_config;
use crate::contributions::{apply_overlay, load_contributions};
use crate::discovery::scoring::CompatibilityResult;
use crate::discovery::random::CancellationToken;
use crate::discovery::{
    DiscoveryConfig, Entropy, EntropyService, RecommendRequest, Recommendation,
};
use crate::library::{find_track, load_library};
use crate::models::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CentroidMode {
    /// Follow the tuning's centroid policy
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "quantum-discovery")]
#[command(about = "Recommend tracks for a seed, with quantum randomness deciding how far to drift")]
#[command(version)]
struct Args {
    /// Path to the track library JSON file
    #[arg(short = 'l', long = "library", default_value = "library.json")]
    library_file: String,

    /// Optional community contributions overlay
    #[arg(long = "contributions", default_value = "contributions.json")]
    contributions_file: String,

    /// Id of the seed track
    #[arg(short = 's', long = "seed")]
    seed: String,

    /// How adventurous the picks are, 0.0 (familiar) to 1.0 (anything goes)
    #[arg(short = 'e', long = "entropy", default_value_t = 0.5)]
    entropy: f64,

    /// Number of recommendations
    #[arg(short = 'n', long = "count", default_value_t = 10)]
    count: usize,

    /// Compare candidates against the centroid of the library instead of the seed
    #[arg(long = "centroid", value_enum, default_value_t = CentroidMode::Auto)]
    centroid: CentroidMode,

    /// Library whose centroid is used instead of the candidate pool
    #[arg(long = "reference")]
    reference_file: Option<String>,

    /// Engine tuning JSON file
    #[arg(short = 't', long = "tuning")]
    tuning_file: Option<String>,

    /// Give up on the request after this many seconds
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,

    /// Show the per-dimension breakdown for every recommendation
    #[arg(long = "explain")]
    explain: bool,

    /// Print the result as JSON
    #[arg(long = "json", conflicts_with = "explain")]
    json: bool,

    /// Quiet mode - only warnings and errors are logged
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Verbose logging, repeat for more
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn default_log_filter(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn use_centroid(&self) -> Option<bool> {
        match self.centroid {
            CentroidMode::Auto => None,
            CentroidMode::On => Some(true),
            CentroidMode::Off => Some(false),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    seed: &'a Track,
    entropy: Entropy,
    recommendations: &'a [Recommendation<'a>],
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.default_log_filter()),
    )
    .init();

    let entropy = Entropy::clamped(args.entropy);
    if entropy.value() != args.entropy {
        log::warn!("Entropy {} is outside 0.0-1.0, using {}", args.entropy, entropy);
    }

    let tuning = match &args.tuning_file {
        Some(path) => DiscoveryConfig::load_from_file(path)?,
        None => DiscoveryConfig::default(),
    };

    let overlay = load_contributions(&args.contributions_file);
    let tracks = apply_overlay(load_library(&args.library_file)?, &overlay);
    let seed = find_track(&tracks, &args.seed)
        .ok_or_else(|| anyhow!("Seed track '{}' is not in {}", args.seed, args.library_file))?;
    let reference = match &args.reference_file {
        Some(path) => Some(apply_overlay(load_library(path)?, &overlay)),
        None => None,
    };

    // Load configuration from .env
    let config = load_config()?;
    let client = OccyByteClient::new(&config);
    let service = EntropyService::new(Arc::new(client), tuning)
        .context("Invalid engine tuning")?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("Interrupted, abandoning the request");
        handler_token.cancel();
    })
    .context("Failed to install the Ctrl-C handler")?;

    let mut request = RecommendRequest::new(seed, &tracks, entropy.value(), args.count)
        .with_cancellation(cancel);
    if let Some(use_centroid) = args.use_centroid() {
        request = request.with_centroid(use_centroid);
    }
    if let Some(reference) = &reference {
        request = request.with_centroid_reference(reference);
    }
    if let Some(secs) = args.timeout_secs {
        request = request.with_deadline(Instant::now() + Duration::from_secs(secs));
    }

    if args.explain {
        explain_pool(&service, &request, entropy)?;
    }

    let recommendations = service.recommend(&request)?;

    if args.json {
        let report = JsonReport {
            generated_at: Utc::now(),
            seed,
            entropy,
            recommendations: &recommendations,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "\nSeed: {} by {} [BPM {} | {}]",
        seed.title,
        seed.artist,
        display_bpm(seed.bpm),
        display_camelot(seed)
    );
    println!("Entropy: {entropy}");

    if recommendations.is_empty() {
        println!("\nNo compatible tracks at this entropy. Try raising it.");
        return Ok(());
    }

    println!("\n=== RECOMMENDATIONS ===");
    for (i, rec) in recommendations.iter().enumerate() {
        let track = rec.track;
        println!(
            "{:2}. {} - {} | BPM: {} | Key: {} | Score: {:.2}",
            i + 1,
            track.artist,
            track.title,
            display_bpm(track.bpm),
            display_camelot(track),
            rec.compatibility.score()
        );
        if args.explain {
            print_breakdown(&rec.compatibility);
        }
    }

    Ok(())
}

/// Summarize how much of the pool survives filtering before any bytes are spent
fn explain_pool(
    service: &EntropyService,
    request: &RecommendRequest,
    entropy: Entropy,
) -> Result<()> {
    let seed = service.effective_seed(request, entropy)?;
    if seed.id != request.seed.id {
        println!(
            "Comparing against the centroid: BPM {} | Key {} | Genres: {}",
            display_bpm(seed.bpm),
            display_camelot(&seed),
            seed.genres.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    let tuning = service.config();
    println!(
        "BPM tolerance {:.1} | Max key distance {}",
        tuning.bpm.at(entropy),
        tuning.max_key_distance(entropy)
    );
    let compatible = service.compatible_candidates(&seed, &request.seed.id, request.pool, entropy);
    println!(
        "{} of {} library tracks are compatible at entropy {}",
        compatible.len(),
        request.pool.len(),
        entropy
    );
    Ok(())
}

fn print_breakdown(result: &CompatibilityResult) {
    let verdict = |passed: bool| if passed { "ok" } else { "FAIL" };
    if let Some(bpm) = &result.bpm {
        println!(
            "      BPM   {:>4} delta {:.1} (tolerance {:.1})",
            verdict(bpm.passed),
            bpm.measure.delta,
            bpm.measure.tolerance
        );
    }
    if let Some(key) = &result.key {
        println!(
            "      Key   {:>4} distance {} (max {})",
            verdict(key.passed),
            key.measure.distance,
            key.measure.max_distance
        );
    }
    if let Some(sig) = &result.time_signature {
        println!("      Meter {:>4} {:?}", verdict(sig.passed), sig.measure);
    }
    if let Some(genre) = &result.genre {
        println!(
            "      Genre {:>4} {:?}, {} shared",
            verdict(genre.passed),
            genre.measure.overlap,
            genre.measure.shared
        );
    }
    if let Some(delta) = result.energy_delta {
        println!("      Energy delta {delta:.2}");
    }
    let skipped = result.skipped_dimensions();
    if !skipped.is_empty() {
        println!("      Not compared: {skipped:?}");
    }
}

fn display_bpm(bpm: Option<f64>) -> String {
    bpm.map(|b| format!("{b:.0}")).unwrap_or_else(|| "?".to_string())
}

fn display_camelot(track: &Track) -> String {
    track
        .camelot()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "?".to_string())
}

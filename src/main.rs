//! Pageveil CLI
//!
//! Demonstration binary: runs the filtering pipeline against a scripted
//! in-memory page, classifying samples with either a local stub or a
//! live classification service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use pageveil::classify::{Classifier, HttpClassifier, ScriptedClassifier};
use pageveil::engine::{FileConfig, FilterEngine, StatsSnapshot};
use pageveil::profile::SiteProfileTable;
use pageveil::surface::{ElementId, MockPage, RectPx};

#[cfg(feature = "metrics")]
use pageveil::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "pageveil", version, about = "Real-time page-media filtering demo")]
struct Args {
    /// Page host used for site profile detection.
    #[arg(long, default_value = "example.com")]
    host: String,

    /// Base URL of a live classification service. The scripted stub is
    /// used when omitted.
    #[arg(long)]
    endpoint: Option<String>,

    /// Flag every Nth sample when running against the stub.
    #[arg(long, default_value_t = 3)]
    flag_every: u64,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run length in seconds (overrides the config file).
    #[arg(long)]
    duration: Option<u64>,

    /// Run until interrupted instead of for a fixed duration.
    #[arg(long)]
    continuous: bool,

    /// Metrics server port (overrides the config file; 0 disables).
    #[cfg(feature = "metrics")]
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Pageveil v{}", pageveil::VERSION);

    let file_config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    let engine_config = file_config.engine.clone();
    let classifier: Arc<dyn Classifier> = match &args.endpoint {
        Some(endpoint) => {
            let client = HttpClassifier::new(endpoint.clone(), engine_config.submit_deadline());
            info!(endpoint = %client.endpoint(), "Submitting to classification service");
            Arc::new(client)
        }
        None => {
            info!(
                "No endpoint given, using the scripted stub (flags every {} samples)",
                args.flag_every
            );
            let stub = ScriptedClassifier::flag_every(args.flag_every, 0.9)
                .with_delay(Duration::from_millis(40));
            Arc::new(stub)
        }
    };

    let page = MockPage::new(&args.host);
    let demo = demo_page(&page);

    let (engine, handle) = FilterEngine::new(
        page.clone(),
        classifier,
        &SiteProfileTable::builtin(),
        file_config.settings.clone(),
        engine_config,
    );

    #[cfg(feature = "metrics")]
    let metrics_state = {
        let port = args.metrics_port.unwrap_or(file_config.output.metrics_port);
        if port == 0 {
            None
        } else {
            match MetricsRegistry::new() {
                Ok(registry) => {
                    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
                    let state = server.state();
                    tokio::spawn(async move {
                        if let Err(e) = server.run().await {
                            warn!("Metrics server error: {}", e);
                        }
                    });
                    info!(port, "Metrics server listening");
                    Some(state)
                }
                Err(e) => {
                    warn!("Metrics registry unavailable: {}", e);
                    None
                }
            }
        }
    };

    let continuous = args.continuous || file_config.output.continuous;
    let duration = Duration::from_secs(args.duration.unwrap_or(file_config.output.duration_secs));
    if continuous {
        info!("Running until interrupted (ctrl-c to stop)");
    } else {
        info!("Running for {}s", duration.as_secs());
    }

    let driver = async {
        let start = tokio::time::Instant::now();
        let mut poll = tokio::time::interval_at(start + Duration::from_secs(1), Duration::from_secs(1));
        let mut elapsed_secs: u64 = 0;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
                _ = poll.tick() => {
                    elapsed_secs += 1;
                    mutate(&page, &demo, elapsed_secs);

                    if let Ok(snapshot) = handle.stats().await {
                        #[cfg(feature = "metrics")]
                        if let Some(state) = &metrics_state {
                            state.read().await.update(&snapshot);
                        }

                        if elapsed_secs % 5 == 0 {
                            info!(
                                tracked = snapshot.elements_tracked,
                                fps = snapshot.current_fps,
                                flagged = snapshot.verdicts_flagged,
                                overlays = snapshot.active_overlays,
                                "Pipeline status"
                            );
                        }
                    }

                    if !continuous && elapsed_secs >= duration.as_secs() {
                        break;
                    }
                }
            }
        }

        let final_stats = handle.stats().await.ok();
        handle.shutdown();
        final_stats
    };

    let (_, final_stats) = tokio::join!(engine.run(), driver);

    match final_stats {
        Some(stats) => {
            info!(
                "Done. {} samples classified, {} flagged",
                stats.verdicts_flagged + stats.verdicts_clean,
                stats.verdicts_flagged
            );
            print_summary(&stats);
        }
        None => warn!("Engine stopped before a final snapshot could be taken"),
    }
}

/// Handles to the scripted demo elements that get mutated mid-run.
struct DemoPage {
    photos: Vec<ElementId>,
    lazy: ElementId,
}

/// Populates the scripted page with a plausible media gallery: one hero
/// video, a photo grid, and a lazy image waiting for its loader.
fn demo_page(page: &MockPage) -> DemoPage {
    page.add_video(
        RectPx::new(40.0, 60.0, 640.0, 360.0),
        "https://cdn.example.com/hero.mp4",
    );

    let mut photos = Vec::new();
    for i in 0..4 {
        let x = 720.0 + f64::from(i % 2) * 260.0;
        let y = 60.0 + f64::from(i / 2) * 200.0;
        photos.push(page.add_image(
            RectPx::new(x, y, 240.0, 180.0),
            &format!("https://cdn.example.com/photo-{i}.jpg"),
        ));
    }

    let lazy = page.add_lazy_image(
        RectPx::new(40.0, 460.0, 240.0, 180.0),
        "data-src",
        "https://cdn.example.com/lazy.jpg",
    );

    DemoPage { photos, lazy }
}

/// Applies scripted page activity so the pipeline has mutations to chase.
fn mutate(page: &MockPage, demo: &DemoPage, elapsed_secs: u64) {
    match elapsed_secs {
        // A lazy loader finishing its work.
        4 => page.set_attribute(demo.lazy, "src", "https://cdn.example.com/lazy.jpg"),
        // Gallery rotation swaps a source in place.
        7 => page.set_attribute(demo.photos[0], "src", "https://cdn.example.com/rotated.jpg"),
        // Late insertion, the kind an infinite scroller produces.
        10 => {
            page.add_image(
                RectPx::new(300.0, 460.0, 240.0, 180.0),
                "https://cdn.example.com/late.jpg",
            );
        }
        // A teardown the overlay manager has to follow.
        13 => page.remove_element(demo.photos[1]),
        _ => {
            if elapsed_secs % 15 == 0 {
                page.scroll_by(0.0, 240.0);
            }
        }
    }
}

/// Prints the end-of-run summary.
fn print_summary(stats: &StatsSnapshot) {
    println!();
    println!("Run summary ({}s uptime, profile {}):", stats.uptime_seconds, stats.profile);
    println!("  scans:              {}", stats.scans);
    println!("  samples captured:   {}", stats.samples_captured);
    println!("  samples submitted:  {}", stats.samples_submitted);
    println!("  samples evicted:    {}", stats.samples_evicted);
    println!("  capture errors:     {}", stats.capture_errors);
    println!("  verdicts flagged:   {}", stats.verdicts_flagged);
    println!("  verdicts clean:     {}", stats.verdicts_clean);
    println!("  verdicts discarded: {}", stats.verdicts_discarded);
    println!("  transient failures: {}", stats.failures_transient);
    println!("  permanent failures: {}", stats.failures_permanent);
    println!("  retries:            {}", stats.retries);
    println!("  rate adjustments:   {}", stats.rate_adjustments);
    println!("  overlays applied:   {}", stats.overlays_applied);
    println!("  overlays expired:   {}", stats.overlays_expired);
    if let Some(latency) = stats.average_latency_ms {
        println!("  service latency:    {:.1} ms", latency);
    }
}

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use hijackd::{serve, Detector, EngineConfig, MemoryStore, RuleTable};

#[derive(Parser, Debug)]
#[clap(name = "hijackd", rename_all = "kebab-case")]
/// BGP hijack detection engine
///
/// Reads route updates as JSON lines on stdin and writes detection events
/// as JSON lines on stdout. Send SIGHUP to reload the config.
struct Args {
    /// Path to hijackd config.toml
    config_path: String,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences))]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let (hijackd_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("hijackd"), hijackd_level)
        .filter(None, other_level)
        .init();
    info!("Logging at levels {}/{}", hijackd_level, other_level);

    let config = EngineConfig::from_file(&args.config_path)?;
    let rules = Arc::new(RuleTable::new(config.rule_index()));
    debug!(
        "Found {} configured prefixes in {}",
        rules.load().len(),
        args.config_path
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let detector = Detector::new(
        rules,
        Arc::new(MemoryStore::new()),
        config.validator(),
        events_tx,
        config.settings.clone(),
    );
    detector.request_ongoing();

    // Swap in a freshly built rule index on every SIGHUP
    let mut hangups = signal(SignalKind::hangup())?;
    let reloader = {
        let detector = detector.clone();
        let config_path = args.config_path.clone();
        tokio::spawn(async move {
            while hangups.recv().await.is_some() {
                match EngineConfig::from_file(&config_path) {
                    Ok(config) => {
                        detector.rules().replace(config.rule_index());
                        info!("Reloaded config from {}", config_path);
                        detector.request_ongoing();
                    }
                    Err(err) => error!("Keeping current rules: {}", err),
                }
            }
        })
    };

    info!("Starting hijack detection...");
    serve(detector, tokio::io::stdin(), tokio::io::stdout(), events_rx).await?;
    reloader.abort();
    info!("Input closed, stopping hijackd");
    Ok(())
}

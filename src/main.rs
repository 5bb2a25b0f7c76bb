use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use autoclick::bitmap::BitmapCache;
use autoclick::config as cfg;
use autoclick::executor::{ActionExecutor, Effect, Gesture, Listeners, MainContext, join_primary};
use autoclick::runner::Runner;
use autoclick::sources::{self, EventSource, StdinSource};

/// Autoclick CLI
#[derive(Debug, Parser)]
#[command(
    name = autoclick::PKG_NAME,
    version = autoclick::PKG_VERSION,
    about = "Play back condition-triggered input actions and print the resulting effects as JSON lines"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long = "config", default_value = "config/default.json")]
    config: PathBuf,

    /// Run this scenario once and exit instead of reading triggers from stdin
    #[arg(short = 's', long = "scenario")]
    scenario: Option<String>,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

/// Listeners writing every effect to stdout as one JSON object per line.
fn stdout_listeners() -> Listeners {
    fn emit(effect: Effect) {
        match serde_json::to_string(&effect) {
            Ok(line) => println!("{line}"),
            Err(e) => error!(error = %e, "Failed to serialize effect"),
        }
    }

    Listeners {
        on_gesture: Some(Box::new(|gesture: Gesture| emit(Effect::Gesture(gesture)))),
        on_action: Some(Box::new(|action_id: i32, arguments: BTreeMap<String, String>| {
            emit(Effect::Action {
                action_id,
                arguments,
            })
        })),
        on_button: Some(Box::new(|code: i32| emit(Effect::GlobalAction { code }))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = args
        .log_level
        .as_deref()
        .map(|l| autoclick::parse_level(l).unwrap_or(tracing::Level::INFO));
    autoclick::init_tracing(level);

    if args.print_schema {
        cfg::write_schema_to_writer(std::io::stdout())?;
        println!();
        return Ok(());
    }

    info!(
        version = autoclick::PKG_VERSION,
        config = %args.config.display(),
        "Starting Autoclick"
    );

    let config = cfg::load_from_path_async(&args.config).await?;
    debug!(target: "autoclick", scenarios = config.scenarios.len(), "Configuration loaded");

    let cache = Arc::new(BitmapCache::from_config(&config.cache));
    let (main_ctx, primary) = MainContext::spawn(stdout_listeners(), &Handle::current());
    let executor = ActionExecutor::new(Handle::current(), main_ctx);
    let runner = Runner::new(config, cache, executor.clone());

    runner.preload().await?;

    if let Some(name) = &args.scenario {
        if !runner.run_scenario(name).await? {
            warn!(scenario = %name, "Scenario conditions unavailable; nothing executed");
        }
        tokio::select! {
            _ = executor.wait_idle() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, cancelling");
                executor.cancel();
            }
        }
    } else {
        let (tx, mut rx) = mpsc::channel::<Value>(256);
        let stdin: Vec<Box<dyn EventSource>> = vec![Box::new(StdinSource::new())];
        let _handles = sources::spawn_all_sources(&stdin, tx);

        tokio::select! {
            _ = async {
                while let Some(event) = rx.recv().await {
                    if let Err(err) = runner.run_event(&event).await {
                        error!(error = %err, event = %event, "Failed to handle trigger");
                    }
                }
                executor.wait_idle().await;
            } => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                executor.cancel();
            }
        }
    }

    runner.cache().release_all();
    drop(runner);
    drop(executor);
    join_primary(primary).await;

    info!("Autoclick exited");
    Ok(())
}

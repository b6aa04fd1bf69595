use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use contact_scout::core::config::{load_scout_config, load_scout_config_from, ScoutConfig};
use contact_scout::harvest::status::{
    BroadcastStatusSink, FanoutStatusSink, LogStatusSink, StatusEvent, StatusSink,
};
use contact_scout::harvest::{Harvester, RunStats};
use contact_scout::scraping::browser_manager::BrowserSession;
use contact_scout::scraping::interceptor::spawn_response_interceptor;
use contact_scout::scraping::ChromiumPageAdapter;

const HELP: &str = "Commands: start | stop | download | status | quit";

#[derive(Debug, Default)]
struct CliArgs {
    url: Option<String>,
    out: Option<String>,
    headless: bool,
    profile: Option<String>,
    config: Option<String>,
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs::default();
    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        let (key, inline) = match a.split_once('=') {
            Some((k, v)) => (k.to_string(), Some(v.to_string())),
            None => (a.clone(), None),
        };
        let mut value = || inline.clone().or_else(|| args.next());
        match key.as_str() {
            "--url" => cli.url = value(),
            "--out" => cli.out = value(),
            "--profile" => cli.profile = value(),
            "--config" => cli.config = value(),
            "--headless" => cli.headless = true,
            other => warn!("Ignoring unknown argument: {}", other),
        }
    }
    cli
}

fn load_config(cli: &CliArgs) -> anyhow::Result<ScoutConfig> {
    let mut config = match &cli.config {
        Some(path) => load_scout_config_from(&PathBuf::from(path))
            .with_context(|| format!("loading config {}", path))?,
        None => load_scout_config(),
    };
    // Flags win over the file and env.
    if let Some(url) = &cli.url {
        config.target.url = Some(url.clone());
    }
    if let Some(out) = &cli.out {
        config.export_dir = Some(out.clone());
    }
    if let Some(profile) = &cli.profile {
        config.browser.user_data_dir = Some(profile.clone());
    }
    if cli.headless {
        config.browser.headless = Some(true);
    }
    Ok(config)
}

/// Print run outcomes to the console and remember the latest stats for `status`.
fn spawn_console_printer(
    mut events: broadcast::Receiver<StatusEvent>,
    latest_stats: watch::Sender<Option<RunStats>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StatusEvent::Stats(stats)) => {
                    latest_stats.send_replace(Some(stats));
                }
                Ok(event @ StatusEvent::Finished { .. }) => println!("{}", event),
                Ok(StatusEvent::Message(_)) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("console fell behind by {} status events", n)
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chromiumoxide=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let config = load_config(&cli)?;
    let target_url = config.target.resolve_url();
    let export_dir = config.resolve_export_dir();

    info!("Starting contact-scout");

    let session = BrowserSession::launch(&config.browser).await?;

    let broadcast_sink = Arc::new(BroadcastStatusSink::new(256));
    let status: Arc<dyn StatusSink> = Arc::new(
        FanoutStatusSink::new()
            .with(Arc::new(LogStatusSink))
            .with(broadcast_sink.clone()),
    );
    let (stats_tx, stats_rx) = watch::channel(None);
    let printer = spawn_console_printer(broadcast_sink.subscribe(), stats_tx);

    let adapter = Arc::new(ChromiumPageAdapter::new(
        session.page().clone(),
        &config.selectors,
    )?);
    let mut harvester = Harvester::new(
        adapter,
        config.scroll.clone(),
        config.target.resolve_expected_location(),
        Arc::clone(&status),
    );
    let interceptor =
        spawn_response_interceptor(session.page(), harvester.feed(), Arc::clone(&status)).await?;

    if let Err(e) = session.navigate(&target_url).await {
        warn!("Initial navigation failed: {}", e);
    }

    println!("Sign in if needed, open the directory, then type `start`.");
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interrupted = false;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                if harvester.is_running() && !interrupted {
                    interrupted = true;
                    harvester.stop();
                    println!("Stopping. Press Ctrl-C again to quit.");
                    continue;
                }
                break;
            }
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin read failed: {}", e);
                break;
            }
        };
        interrupted = false;

        match line.trim().to_ascii_lowercase().as_str() {
            "" => {}
            "start" => {
                let url = match session.current_url().await {
                    Ok(url) => url,
                    Err(e) => {
                        error!("{}", e);
                        continue;
                    }
                };
                match harvester.start(&url).await {
                    Ok(id) => println!("Run {} started", id),
                    Err(e) => println!("{}", e),
                }
            }
            "stop" => {
                if !harvester.stop() {
                    println!("No run in progress");
                }
            }
            "download" => {
                let today = chrono::Local::now().date_naive();
                match harvester.download(&export_dir, today) {
                    Ok(Some(path)) => println!("Saved {}", path.display()),
                    Ok(None) => println!("No data to download"),
                    Err(e) => println!("Error downloading data: {}", e),
                }
            }
            "status" => {
                let state = if harvester.is_running() { "running" } else { "idle" };
                println!("{} | {} contacts", state, harvester.results().len());
                if let Some(stats) = stats_rx.borrow().as_ref() {
                    println!("{}", stats);
                }
            }
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            other => println!("Unknown command `{}`. {}", other, HELP),
        }
    }

    if let Some(finished) = harvester.shutdown().await {
        info!("Run {} closed with {} contacts", finished.id, finished.total());
    }
    interceptor.abort();
    printer.abort();
    session.close().await;
    Ok(())
}

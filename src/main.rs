use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use forebet_alerts::agent::poller::Poller;
use forebet_alerts::agent::session::Session;
use forebet_alerts::alerts::telegram::TelegramClient;
use forebet_alerts::alerts::{AlertSink, LogSink};
use forebet_alerts::bot::listener::CommandListener;
use forebet_alerts::config::AppConfig;
use forebet_alerts::monitoring::{health, logger};
use forebet_alerts::source::build_source;

#[derive(Debug, Parser)]
#[command(name = "forebet-alerts", about = "Live forebet prediction alerts over Telegram")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,

    /// Log alerts instead of sending them.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load(&cli.config)?;

    logger::init_logging(&config.monitoring)?;

    tracing::info!(
        source = ?config.source.kind,
        poll_interval_s = config.bot.poll_interval_seconds,
        once = cli.once,
        dry_run = cli.dry_run,
        "Forebet alerts starting"
    );

    let source = build_source(&config.source, &secrets)?;
    let session = Session::new(config.bot.start_watching || cli.once);
    let telegram = Arc::new(TelegramClient::new(
        &config.bot.telegram_base_url,
        secrets.bot_token,
        secrets.chat_id,
        &config.alerts,
    )?);
    let sink: Arc<dyn AlertSink> = if cli.dry_run {
        Arc::new(LogSink)
    } else {
        telegram.clone()
    };

    let poller = Poller::new(&config, source, sink, session.clone())?;

    if cli.once {
        let report = poller.run_cycle().await;
        tracing::info!(summary = %report.summary(), "Single cycle finished");
        return Ok(());
    }

    let port = std::env::var("PORT").ok();
    let health_handle = health::spawn_health_server(
        session.clone(),
        config.monitoring.health_addr(port.as_deref()),
    );

    let listener = CommandListener::new(telegram, session, &config.bot);
    let listener_handle = tokio::spawn(async move { listener.run().await });

    let interval = Duration::from_secs(config.bot.poll_interval_seconds.max(1));
    tokio::select! {
        _ = poller.run(interval) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    listener_handle.abort();
    health_handle.abort();

    Ok(())
}

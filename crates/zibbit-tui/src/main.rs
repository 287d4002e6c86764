// Zibbit live client entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Create mpsc channels
// 4. Spawn the push channel task
// 5. Spawn the session task
// 6. Run the TUI until the user quits
// 7. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use zibbit_core::actions::{ActionDispatcher, HttpActionSink};
use zibbit_core::app::{self, Session};
use zibbit_core::config;
use zibbit_core::push_channel;
use zibbit_tui::tui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Zibbit client starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!("Config loaded: server={}", config.server.base_url);

    let (push_tx, push_rx) = mpsc::channel(256);
    let (tick_tx, tick_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    // One client shared by the event stream and the outbound actions.
    let http = reqwest::Client::new();

    let events_url = config.server.events_url();
    let reconnect = config.reconnect.clone();
    let push_http = http.clone();
    let push_handle = tokio::spawn(async move {
        if let Err(e) = push_channel::run(push_http, events_url, reconnect, push_tx).await {
            error!("Push channel error: {}", e);
        }
    });

    let sink = Arc::new(HttpActionSink::new(http, config.server.clone()));
    let actions = ActionDispatcher::new(sink, &config.server);
    let session = Session::new(config, actions, tick_tx);

    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(push_rx, tick_rx, cmd_rx, ui_tx, session).await {
            error!("Session loop error: {}", e);
        }
    });

    info!("Application ready");

    // Blocks until the user quits.
    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {}", e);
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    // The push channel retries forever.
    push_handle.abort();

    info!("Zibbit client shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (the terminal belongs to the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("zibbit.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("zibbit=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

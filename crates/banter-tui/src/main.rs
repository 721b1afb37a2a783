use std::io;
use std::sync::Arc;

use anyhow::Context;
use banter_client::{controller_config, HttpTransport};
use banter_config::ConfigManager;
use banter_observability::{LogManager, LoggingConfig};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info};

mod app;
mod ui;
mod view;

use app::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    banter_config::init_banter_dirs().await?;
    let manager = ConfigManager::load_default()
        .await
        .context("failed to load ~/.banter/config.json")?;
    let config = manager.snapshot().await;

    // the terminal is ours, so logs always go to a file
    let mut logging = LoggingConfig::from_app_config(&config.logging);
    if logging.file_path.is_none() {
        logging.file_path = banter_config::default_log_path();
    }
    let _log_manager = LogManager::new(&logging)?;
    info!("Connecting to {}", config.server.base_url);

    let transport = Arc::new(HttpTransport::from_config(&config)?);
    let mut app = App::new(
        transport,
        controller_config(&config),
        config.client.notification_ttl(),
    );

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start().await;
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("TUI exited with error: {:?}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    let mut last_tick = tokio::time::Instant::now();
    let tick_rate = tokio::time::Duration::from_millis(100);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| tokio::time::Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if app.handle_key(key).await {
                    return Ok(());
                }
            }
        }

        // replies from sends running in the background
        app.process_replies().await;

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = tokio::time::Instant::now();
        }
    }
}

/// NSE Options OI Live
///
/// Polls the option chain of the selected index on a timer and shows calls OI, puts OI,
/// the put/call ratio and a per-strike chart. The last good snapshot stays on screen,
/// flagged stale, while failed polls are retried in the background.
use std::{
    error::Error,
    fs::OpenOptions,
    io,
    path::Path,
    sync::Mutex,
    time::{Duration, Instant},
};

use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use oi_dashboard::{App, DashboardConfig, FeedStatus, render_dashboard, spawn_oi_feed};
use oi_data::{OiPoller, PollerConfig};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Redraw at least this often so the staleness counter keeps moving
const TICK_RATE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = DashboardConfig::from_env();
    init_logging(&config.log_file)?;

    let poller = OiPoller::from_config(PollerConfig::from_env())?;
    info!(
        symbols = ?config.symbols,
        leg_policy = %poller.leg_policy(),
        "Starting NSE options OI dashboard"
    );

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config);

    let (control_tx, control_rx) = watch::channel(app.control());
    let (update_tx, mut update_rx) = mpsc::channel(16);
    let (status_tx, status_rx) = watch::channel(FeedStatus::Idle);
    let feed = spawn_oi_feed(poller, control_rx, update_tx, status_tx);

    let mut last_tick = Instant::now() - TICK_RATE;

    loop {
        let mut dirty = false;
        while let Ok(update) = update_rx.try_recv() {
            dirty |= app.apply(update);
        }
        let status = *status_rx.borrow();
        if status != app.feed_status() {
            app.set_feed_status(status);
            dirty = true;
        }

        if dirty || last_tick.elapsed() >= TICK_RATE {
            terminal.draw(|f| render_dashboard(f, &app, Utc::now()))?;
            last_tick = Instant::now();
        }

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));
        // crossterm polling blocks, keep it off the runtime's worker
        let key = tokio::task::block_in_place(|| -> io::Result<Option<KeyCode>> {
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    return Ok(Some(key.code));
                }
            }
            Ok(None)
        })?;

        let control_changed = match key {
            Some(KeyCode::Char('q')) | Some(KeyCode::Esc) => break,
            Some(KeyCode::Char('s')) | Some(KeyCode::Tab) => {
                app.next_symbol();
                true
            }
            Some(KeyCode::Char('+')) | Some(KeyCode::Char('=')) => app.faster(),
            Some(KeyCode::Char('-')) => app.slower(),
            _ => false,
        };
        if control_changed {
            let _ = control_tx.send(app.control());
            last_tick = Instant::now() - TICK_RATE;
        }
    }

    feed.abort();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Initialize logging to a file, the terminal is owned by the UI
fn init_logging(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}

use color_eyre::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use geopick::{
    app::App,
    config::{Config, DEFAULT_CONFIG_PATH},
    events::{Event, EventHandler},
    geocode::{NominatimClient, Resolver},
    location, logging,
    picker::{LocationPicker, PickerOptions},
    runtime::{BundledFetcher, Document, RuntimeLoader},
    ui,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging(logging::LOG_DIR);
    install_panic_hook();
    color_eyre::install()?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path);

    // One loader for the whole process; every picker shares it.
    let loader = Arc::new(RuntimeLoader::new(
        Arc::new(Document::new()),
        Arc::new(BundledFetcher),
        config.map.sources(),
    ));
    let resolver = Resolver::new(Arc::new(NominatimClient::new(&config.geocoder)?));
    let options = PickerOptions::from(&config.picker)
        .with_initial_position(location::initial_position(&config.picker).await);

    let (picker_tx, mut picker_rx) = mpsc::unbounded_channel();
    let mut picker = LocationPicker::new(options, loader, resolver, picker_tx);
    picker.mount();

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut app = App::new(picker);
    let mut events = EventHandler::new(config.ui.tick_rate_ms);

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        tokio::select! {
            Some(event) = events.next() => match event {
                Event::Tick => app.on_tick(),
                Event::Input(key) => app.handle_key(key),
                Event::Click { column, row } => {
                    let area = ui::map_area(terminal.size()?);
                    app.handle_click(column, row, area);
                }
                Event::Resize => {}
            },
            Some(event) = picker_rx.recv() => app.on_picker_event(event),
            else => break,
        }
    }

    app.picker.destroy();
    restore_terminal(terminal)?;
    info!("Exited cleanly");
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(
            std::io::stdout(),
            DisableMouseCapture,
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        )
        .ok();
        original_hook(panic_info);
    }));
}

//! Terminal event source for the geopick TUI.
//!
//! [`EventHandler`] runs a background task that polls crossterm for key and
//! mouse input and emits periodic [`Event::Tick`]s. Picker completions travel
//! on their own channel; the main loop selects over both.

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Periodic tick; advances the fly-to animation.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// Left mouse button pressed at a terminal cell.
    Click { column: u16, row: u16 },
    /// The terminal was resized; the next draw picks up the new size.
    Resize,
}

/// Multiplexes terminal input and ticks into a single event stream.
///
/// The spawned input task owns the only sender and stops when the receiver
/// is dropped or crossterm errors out.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// # Arguments
    ///
    /// * `tick_rate_ms` - Interval in milliseconds between [`Event::Tick`] emissions.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (event_tx, rx) = mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));
                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(raw) => {
                            if let Some(ev) = translate(raw) {
                                if event_tx.send(ev).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            return;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        return;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        return;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { rx }
    }

    /// Receives the next event from the channel.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Keeps the crossterm events the app reacts to and drops the rest.
fn translate(raw: CrosstermEvent) -> Option<Event> {
    match raw {
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Input(key)),
        CrosstermEvent::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => Some(Event::Click {
                column: mouse.column,
                row: mouse.row,
            }),
            _ => None,
        },
        CrosstermEvent::Resize(_, _) => Some(Event::Resize),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers, MouseEvent};

    #[test]
    fn left_click_becomes_click_event() {
        let raw = CrosstermEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 10,
            row: 4,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(translate(raw), Some(Event::Click { column: 10, row: 4 }));
    }

    #[test]
    fn mouse_moves_and_key_releases_are_dropped() {
        let moved = CrosstermEvent::Mouse(MouseEvent {
            kind: MouseEventKind::Moved,
            column: 1,
            row: 1,
            modifiers: KeyModifiers::NONE,
        });
        assert_eq!(translate(moved), None);

        let mut key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(translate(CrosstermEvent::Key(key)), None);
    }

    #[tokio::test]
    async fn stream_ticks_or_ends_when_the_input_task_stops() {
        // Without a terminal the poll fails, the task exits and drops the
        // only sender, so `next` must return instead of waiting forever.
        let mut events = EventHandler::new(10);
        let next = tokio::time::timeout(Duration::from_secs(5), events.next()).await;
        assert!(next.is_ok());
    }
}

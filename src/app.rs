use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use std::collections::VecDeque;
use std::sync::mpsc;
use std::time::Instant;
use tracing::info;

use crate::form::CoordinateForm;
use crate::models::SelectionResult;
use crate::picker::{LocationPicker, PickerEvent};

pub const HISTORY_LEN: usize = 10;

/// Cells moved per arrow key press.
const PAN_STEP_X: i32 = 4;
const PAN_STEP_Y: i32 = 2;

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum Focus {
    #[default]
    Map,
    Form,
}

#[derive(Debug, Clone)]
pub struct PinnedLocation {
    pub at: DateTime<Local>,
    pub selection: SelectionResult,
}

pub struct App {
    pub picker: LocationPicker,
    pub form: CoordinateForm,
    pub focus: Focus,
    pub form_error: Option<String>,
    pub history: VecDeque<PinnedLocation>,
    pub should_quit: bool,
    selections: mpsc::Receiver<SelectionResult>,
}

impl App {
    /// Takes ownership of the picker and subscribes to its selections.
    pub fn new(mut picker: LocationPicker) -> Self {
        let (tx, rx) = mpsc::channel();
        picker.on_location_select(move |selection| {
            let _ = tx.send(selection);
        });

        Self {
            picker,
            form: CoordinateForm::new(),
            focus: Focus::Map,
            form_error: None,
            history: VecDeque::with_capacity(HISTORY_LEN),
            should_quit: false,
            selections: rx,
        }
    }

    pub fn on_tick(&mut self) {
        self.picker.tick(Instant::now());
    }

    pub fn on_picker_event(&mut self, event: PickerEvent) {
        self.picker.handle_event(event);

        // Catch selections delivered by the picker
        while let Ok(selection) = self.selections.try_recv() {
            self.form.apply_selection(&selection);
            if self.history.len() == HISTORY_LEN {
                self.history.pop_back();
            }
            self.history.push_front(PinnedLocation {
                at: Local::now(),
                selection,
            });
        }
    }

    /// Routes a left click. `map_area` is the inner map rectangle of the last frame.
    pub fn handle_click(&mut self, column: u16, row: u16, map_area: Rect) {
        let inside = column >= map_area.x
            && column < map_area.x + map_area.width
            && row >= map_area.y
            && row < map_area.y + map_area.height;
        if !inside {
            return;
        }
        let Some(vp) = self.picker.viewport() else {
            return;
        };
        let coord = vp.unproject(
            column - map_area.x,
            row - map_area.y,
            map_area.width,
            map_area.height,
        );
        self.focus = Focus::Map;
        self.picker.click(coord);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.focus {
            Focus::Map => self.handle_map_key(key),
            Focus::Form => self.handle_form_key(key),
        }
    }

    fn handle_map_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('g') | KeyCode::Tab => self.focus = Focus::Form,
            KeyCode::Char('+') | KeyCode::Char('=') => self.zoom(1),
            KeyCode::Char('-') => self.zoom(-1),
            KeyCode::Left | KeyCode::Char('h') => self.pan(-PAN_STEP_X, 0),
            KeyCode::Right | KeyCode::Char('l') => self.pan(PAN_STEP_X, 0),
            KeyCode::Up | KeyCode::Char('k') => self.pan(0, -PAN_STEP_Y),
            KeyCode::Down | KeyCode::Char('j') => self.pan(0, PAN_STEP_Y),
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.focus = Focus::Map,
            KeyCode::Tab | KeyCode::BackTab => self.form.next_field(),
            KeyCode::Backspace => self.form.backspace(),
            KeyCode::Enter => match self.form.submit() {
                Ok(request) => {
                    info!("Coordinate entry accepted: {}", request.coord);
                    self.form_error = None;
                    self.focus = Focus::Map;
                    self.picker.fly_to(request);
                }
                Err(e) => self.form_error = Some(e.to_string()),
            },
            KeyCode::Char(c) => self.form.push(c),
            _ => {}
        }
    }

    fn pan(&mut self, dx: i32, dy: i32) {
        if let Some(vp) = self.picker.viewport_mut() {
            vp.pan_cells(dx, dy);
        }
    }

    fn zoom(&mut self, delta: i8) {
        if let Some(vp) = self.picker.viewport_mut() {
            vp.zoom_by(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{GeocodeError, ReverseGeocoder, Resolver};
    use crate::models::Coordinate;
    use crate::picker::{Phase, PickerOptions};
    use crate::runtime::RuntimeLoader;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::mpsc as tokio_mpsc;

    struct Named;

    #[async_trait]
    impl ReverseGeocoder for Named {
        async fn reverse(&self, _: Coordinate) -> Result<Option<String>, GeocodeError> {
            Ok(Some("MG Road, Bengaluru".to_string()))
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn ready_app() -> (App, tokio_mpsc::UnboundedReceiver<PickerEvent>) {
        let (tx, mut rx) = tokio_mpsc::unbounded_channel();
        let options = PickerOptions {
            fly_duration: std::time::Duration::ZERO,
            ..PickerOptions::default()
        };
        let mut picker = LocationPicker::new(
            options,
            Arc::new(RuntimeLoader::bundled()),
            Resolver::new(Arc::new(Named)),
            tx,
        );
        picker.mount();
        let mut app = App::new(picker);
        let ready = rx.recv().await.unwrap();
        app.on_picker_event(ready);
        assert_eq!(app.picker.phase(), Phase::Ready);
        (app, rx)
    }

    #[tokio::test]
    async fn form_submission_flies_and_records_history() {
        let (mut app, mut rx) = ready_app().await;
        app.handle_key(key(KeyCode::Char('g')));
        for c in "12.97".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Tab));
        for c in "77.59".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.focus, Focus::Map);
        assert_eq!(
            app.picker.viewport().unwrap().center(),
            Coordinate::new(12.97, 77.59)
        );

        let resolved = rx.recv().await.unwrap();
        app.on_picker_event(resolved);
        assert_eq!(app.history.len(), 1);
        assert_eq!(app.history[0].selection.address, "MG Road, Bengaluru");
        assert_eq!(app.form.lat, "12.970000");
    }

    #[tokio::test]
    async fn invalid_entry_reports_error_and_keeps_focus() {
        let (mut app, _rx) = ready_app().await;
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char('9')));
        app.handle_key(key(KeyCode::Char('9')));
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(app.focus, Focus::Form);
        assert!(app.form_error.as_deref().unwrap().contains("latitude"));
    }

    #[tokio::test]
    async fn clicks_outside_the_map_are_ignored() {
        let (mut app, _rx) = ready_app().await;
        let area = Rect::new(10, 1, 40, 20);
        app.handle_click(5, 5, area);
        assert!(app.picker.marker().is_none());
        app.handle_click(30, 10, area);
        assert!(app.picker.marker().is_some());
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (mut app, mut rx) = ready_app().await;
        let area = Rect::new(0, 0, 40, 20);
        for i in 0..(HISTORY_LEN as u16 + 3) {
            app.handle_click(i, 10, area);
            let resolved = rx.recv().await.unwrap();
            app.on_picker_event(resolved);
        }
        assert_eq!(app.history.len(), HISTORY_LEN);
    }

    #[tokio::test]
    async fn ctrl_c_quits_from_the_form() {
        let (mut app, _rx) = ready_app().await;
        app.focus = Focus::Form;
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }
}

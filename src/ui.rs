//! TUI rendering for geopick.
//!
//! Map on the left, coordinate entry and selection details on the right.

use crate::app::{App, Focus};
use crate::form::Field;
use crate::runtime::MapRuntime;
use crate::viewport::Viewport;
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        canvas::*,
        *,
    },
};

use ratatui::text::Line;

const MAP_SHARE: u16 = 70;

fn rgb([r, g, b]: [u8; 3]) -> Color {
    Color::Rgb(r, g, b)
}

fn split(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(MAP_SHARE),
            Constraint::Percentage(100 - MAP_SHARE),
        ])
        .split(area)
}

fn map_block(runtime: Option<&MapRuntime>) -> Block<'static> {
    let block = Block::default()
        .title(" Map ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    match runtime {
        Some(rt) => block.title(
            Title::from(format!(" {} ", rt.layer.attribution))
                .position(Position::Bottom)
                .alignment(Alignment::Right),
        ),
        None => block,
    }
}

/// Inner rectangle of the map for a frame of size `area`. Mouse clicks are
/// projected against this.
pub fn map_area(area: Rect) -> Rect {
    map_block(None).inner(split(area)[0])
}

/// Renders one frame.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = split(f.size());
    render_map(f, app, chunks[0]);
    render_sidebar(f, app, chunks[1]);
}

fn render_map(f: &mut Frame, app: &App, area: Rect) {
    let runtime = app.picker.runtime().map(|rt| rt.as_ref());
    let block = map_block(runtime);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (Some(rt), Some(vp)) = (runtime, app.picker.viewport()) else {
        render_loading(f, inner);
        return;
    };

    let ([x0, x1], [y0, y1]) = vp.bounds(inner.width, inner.height);
    let style = &rt.style;
    let resolution = if vp.zoom() >= style.high_detail_zoom {
        MapResolution::High
    } else {
        MapResolution::Low
    };
    let marker = app.picker.marker();

    let canvas = Canvas::default()
        .marker(symbols::Marker::Braille)
        .x_bounds([x0, x1])
        .y_bounds([y0, y1])
        .paint(|ctx| {
            ctx.draw(&Map {
                color: rgb(style.outline),
                resolution,
            });
            ctx.layer();

            if let Some(m) = marker {
                ctx.print(
                    m.position.lng,
                    m.position.lat,
                    Line::from(Span::styled(
                        style.marker_symbol.clone(),
                        Style::default()
                            .fg(rgb(style.marker))
                            .add_modifier(Modifier::BOLD),
                    )),
                );
                if let Some(popup) = &m.popup {
                    let (lng_step, _) = vp.degrees_per_cell();
                    ctx.print(
                        m.position.lng + lng_step * 2.0,
                        m.position.lat,
                        Line::from(Span::styled(
                            format!(" {} ", truncate(popup, 48)),
                            Style::default().fg(rgb(style.popup_fg)).bg(rgb(style.popup_bg)),
                        )),
                    );
                }
            }
        });
    f.render_widget(canvas, inner);
}

fn render_loading(f: &mut Frame, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height / 2),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);
    let msg = Paragraph::new("Loading Map...")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(msg, rows[1]);
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Coordinate entry
            Constraint::Length(6), // Pinned location
            Constraint::Length(5), // Viewport
            Constraint::Min(3),    // History
            Constraint::Length(2), // Help
        ])
        .split(area);

    render_form(f, app, chunks[0]);
    render_pinned(f, app, chunks[1]);
    render_viewport(f, app, chunks[2]);
    render_history(f, app, chunks[3]);

    let help = match app.focus {
        Focus::Map => " click pin  ←↑↓→ pan  +/- zoom  g enter coords  q quit",
        Focus::Form => " Tab switch field  Enter fly  Esc back",
    };
    f.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true }),
        chunks[4],
    );
}

fn render_form(f: &mut Frame, app: &App, area: Rect) {
    let editing = app.focus == Focus::Form;
    let field_style = |field: Field| {
        if editing && app.form.focus == field {
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Rgb(30, 30, 60))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Latitude:  ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(format!("{:<12}", app.form.lat), field_style(Field::Latitude)),
        ]),
        Line::from(vec![
            Span::styled("Longitude: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(format!("{:<12}", app.form.lng), field_style(Field::Longitude)),
        ]),
    ];
    if let Some(err) = &app.form_error {
        lines.push(Line::from(Span::styled(
            err.as_str(),
            Style::default().fg(Color::Red),
        )));
    }

    let border = if editing { Color::Cyan } else { Color::DarkGray };
    let p = Paragraph::new(lines).block(
        Block::default()
            .title(" Coordinates ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(p, area);
}

fn render_pinned(f: &mut Frame, app: &App, area: Rect) {
    let content = match (app.form.pinned_banner(), app.form.pinned()) {
        (Some(banner), Some(pinned)) => vec![
            Line::from(Span::styled(banner, Style::default().fg(Color::Green))),
            Line::from(pinned.address.as_str()),
        ],
        _ => vec![Line::from(Span::styled(
            "Click the map or enter coordinates.",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    let p = Paragraph::new(content)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(" Location ").borders(Borders::ALL));
    f.render_widget(p, area);
}

fn render_viewport(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" View ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let lines = match (app.picker.viewport(), app.picker.runtime()) {
        (Some(vp), Some(rt)) => viewport_lines(vp, rt),
        _ => vec![Line::from("—")],
    };
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn viewport_lines(vp: &Viewport, rt: &MapRuntime) -> Vec<Line<'static>> {
    let center = vp.center();
    vec![
        Line::from(vec![
            Span::styled("Center: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{:.5}, {:.5}", center.lat, center.lng)),
            Span::raw(format!("  z{}", vp.zoom())),
        ]),
        Line::from(Span::styled(
            rt.layer.tile_url(center, vp.zoom()),
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

fn render_history(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .history
        .iter()
        .map(|pin| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    pin.at.format("%H:%M:%S ").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(truncate(&pin.selection.address, 40)),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Recent ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(list, area);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

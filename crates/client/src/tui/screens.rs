use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Points, Rectangle};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use cubesync::{ConnectionState, SessionBackend};

use super::form::{ConnectForm, Field};
use crate::app::App;

/// Half the visible world extent on each axis.
const VIEW_HALF_EXTENT: f64 = 20.0;
const CUBE_SIZE: f64 = 1.0;

pub fn render<B: SessionBackend>(frame: &mut Frame, app: &App<B>) {
    let area = frame.area();

    let block = Block::default()
        .title(" Cubesync ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(block, area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Min(0)])
        .split(area)[0];

    if app.form().is_visible(app.state()) {
        render_form(frame, inner, app.form(), app.state());
    } else {
        render_scene(frame, inner, app);
    }
}

fn render_form(frame: &mut Frame, area: Rect, form: &ConnectForm, state: ConnectionState) {
    let dialog_area = centered_rect(50, 14, area);
    frame.render_widget(Clear, dialog_area);

    let dialog = Block::default()
        .title(" Create or Join Session ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(dialog, dialog_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(dialog_area);

    let editable = form.is_editable(state);
    render_input(
        frame,
        inner[0],
        "Profile Name",
        form.profile(),
        form.focus() == Field::Profile,
        editable,
    );
    render_input(
        frame,
        inner[1],
        "Session Name",
        form.session(),
        form.focus() == Field::Session,
        editable,
    );

    let enabled = form.submit_enabled(state);
    let mut button_style = if enabled {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    if enabled && form.focus() == Field::Submit {
        button_style = button_style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
    }
    let button = Paragraph::new("[ Create or Join Session ]")
        .style(button_style)
        .alignment(Alignment::Center);
    frame.render_widget(button, inner[3]);

    let status = match state {
        ConnectionState::Connecting => Span::styled(
            "Connecting...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        _ => Span::styled(state.as_str(), Style::default().fg(Color::DarkGray)),
    };
    let status = Paragraph::new(Line::from(status)).alignment(Alignment::Center);
    frame.render_widget(status, inner[4]);

    let help = Paragraph::new("Tab Next  Enter Submit  Esc Quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, inner[5]);
}

fn render_input(
    frame: &mut Frame,
    area: Rect,
    label: &str,
    value: &str,
    focused: bool,
    editable: bool,
) {
    let border = if !editable {
        Color::DarkGray
    } else if focused {
        Color::Yellow
    } else {
        Color::White
    };

    let text = if focused && editable {
        format!("{}_", value)
    } else {
        value.to_string()
    };

    let input = Paragraph::new(text)
        .style(Style::default().fg(if editable { Color::White } else { Color::DarkGray }))
        .block(
            Block::default()
                .title(format!(" {} ", label))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border)),
        );
    frame.render_widget(input, area);
}

fn render_scene<B: SessionBackend>(frame: &mut Frame, area: Rect, app: &App<B>) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(20), Constraint::Length(34)])
        .split(area);

    let scene = app.scene();
    let vertical_to_z = scene.controller().config().apply_vertical_to_z_axis;

    // Plane the cube moves in: X against Y, or X against Z.
    let position = scene.cube().map(|cube| {
        let p = cube.transform.position;
        let second = if vertical_to_z { p.z } else { p.y };
        (p.x as f64, second as f64)
    });

    let (center_x, center_y) = position
        .map(|(x, y)| (page_center(x), page_center(y)))
        .unwrap_or((0.0, 0.0));

    let title = if vertical_to_z { " Scene (X/Z) " } else { " Scene (X/Y) " };
    let canvas = Canvas::default()
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .x_bounds([center_x - VIEW_HALF_EXTENT, center_x + VIEW_HALF_EXTENT])
        .y_bounds([center_y - VIEW_HALF_EXTENT, center_y + VIEW_HALF_EXTENT])
        .paint(move |ctx| {
            ctx.draw(&Points {
                coords: &[(0.0, 0.0)],
                color: Color::DarkGray,
            });
            if let Some((x, y)) = position {
                ctx.draw(&Rectangle {
                    x: x - CUBE_SIZE / 2.0,
                    y: y - CUBE_SIZE / 2.0,
                    width: CUBE_SIZE,
                    height: CUBE_SIZE,
                    color: Color::Yellow,
                });
            }
        });
    frame.render_widget(canvas, chunks[0]);

    render_info(frame, chunks[1], app);
}

fn render_info<B: SessionBackend>(frame: &mut Frame, area: Rect, app: &App<B>) {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White);
    let row = |name: &'static str, text: String| {
        Line::from(vec![Span::styled(format!("{:<10}", name), label), Span::styled(text, value)])
    };

    let mut lines = Vec::new();
    if let Some(session) = app.session() {
        lines.push(row("Session", session.name().to_string()));
        lines.push(row("Client", session.local_client_id().to_string()));
        lines.push(row(
            "Owner",
            if session.is_session_owner() { "yes" } else { "no" }.to_string(),
        ));
        lines.push(row(
            "Players",
            format!("{}/{}", session.player_count(), session.max_players()),
        ));
        lines.push(row("Topology", session.topology().as_str().to_string()));
    }
    lines.push(Line::default());

    let scene = app.scene();
    match scene.cube() {
        Some(cube) => {
            let p = cube.transform.position;
            lines.push(row("Position", format!("{:.2} {:.2} {:.2}", p.x, p.y, p.z)));
        }
        None => lines.push(row("Position", "-".to_string())),
    }
    let axes = scene.input().current();
    lines.push(row(
        "Axes",
        format!("{:+.2} {:+.2}", axes.horizontal, axes.vertical),
    ));
    lines.push(row(
        "Ticks",
        format!("{} @ {}Hz", scene.ticks(), scene.tick_rate()),
    ));

    if let Some(status) = app.status() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            status.to_string(),
            Style::default().fg(Color::Green),
        )));
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Arrows/WASD Move  Esc Leave  Q Quit",
        label,
    )));

    let info = Paragraph::new(lines).block(
        Block::default()
            .title(" Session ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(info, area);
}

/// Snaps the view to pages so the camera only moves when the cube leaves it.
fn page_center(coord: f64) -> f64 {
    let page = VIEW_HALF_EXTENT * 2.0;
    (coord / page).round() * page
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

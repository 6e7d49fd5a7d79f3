use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::App;
use crate::image_input;
use crate::keypad::{self, KEYPAD};
use crate::types::{CalcKind, Calculation};
use crate::ui_state::{Focus, Tab};
use crate::visualizer::PlotView;

const BG_DARK: Color = Color::Rgb(10, 10, 10); // #0a0a0a
const BG_PANEL: Color = Color::Rgb(24, 24, 27); // zinc-900
const BG_KEY: Color = Color::Rgb(39, 39, 42); // zinc-800

// Indigo accents
const INDIGO: Color = Color::Rgb(79, 70, 229); // #4F46E5 - operators
const INDIGO_LIGHT: Color = Color::Rgb(129, 140, 248); // #818CF8 - highlights

const RED_SOFT: Color = Color::Rgb(248, 113, 113); // clear key, errors
const RED_BG: Color = Color::Rgb(69, 10, 10);
const OLIVE: Color = Color::Rgb(131, 179, 102); // camera live

// Text colors
const TEXT_PRIMARY: Color = Color::Rgb(244, 244, 245);
const TEXT_SECONDARY: Color = Color::Rgb(161, 161, 170);
const TEXT_MUTED: Color = Color::Rgb(113, 113, 122);

const BORDER_DIM: Color = Color::Rgb(39, 39, 42);
const BORDER_ACCENT: Color = Color::Rgb(70, 85, 110);

const SPINNER: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

/// Cut a string to `max` columns, adding an ellipsis when shortened.
fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn panel(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(if focused { INDIGO_LIGHT } else { BORDER_DIM }))
        .style(Style::default().bg(BG_DARK))
}

pub fn draw(frame: &mut Frame, app: &App) {
    // Fill entire background
    let bg = Block::default().style(Style::default().bg(BG_DARK));
    frame.render_widget(bg, frame.area());

    let area = frame.area();
    let padded = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    };

    let main_area = if app.ui.show_history {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(app.ui.sidebar_width), // History
                Constraint::Length(1),  // Gap
                Constraint::Min(40),    // Workspace
            ])
            .split(padded);
        draw_history(frame, app, chunks[0]);
        chunks[2]
    } else {
        padded
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Panels
            Constraint::Length(1), // Notice / status
            Constraint::Length(1), // Hints
        ])
        .split(main_area);

    draw_tabs(frame, app, rows[0]);

    if let Some(calc) = app.latest_solution() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(50),
                Constraint::Length(1),
                Constraint::Percentage(50),
            ])
            .split(rows[1]);
        draw_workspace(frame, app, cols[0]);
        draw_result(frame, app, calc, cols[2]);
    } else {
        draw_workspace(frame, app, rows[1]);
    }

    draw_notice(frame, app, rows[2]);
    draw_keyboard_hints(frame, app, rows[3]);
}

fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_DIM));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(inner);

    for (i, tab) in Tab::ALL.iter().enumerate() {
        let style = if *tab == app.ui.tab {
            Style::default().fg(TEXT_PRIMARY).bg(BG_KEY).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(TEXT_MUTED)
        };
        let label = Paragraph::new(format!("F{} {}", i + 1, tab.title()))
            .style(style)
            .alignment(Alignment::Center);
        frame.render_widget(label, cols[i]);
    }
}

fn draw_workspace(frame: &mut Frame, app: &App, area: Rect) {
    match app.ui.tab {
        Tab::Standard => draw_standard(frame, app, area),
        Tab::Smart => draw_smart(frame, app, area),
        Tab::Vision => draw_vision(frame, app, area),
    }
}

fn draw_standard(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.ui.focus == Focus::Workspace;
    let block = panel("Standard", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Display
            Constraint::Min(5),    // Keypad
        ])
        .split(inner);

    let width = chunks[0].width.saturating_sub(2) as usize;
    let display_lines = vec![
        Line::from(Span::styled(
            truncate(app.last_basic_query().unwrap_or(""), width),
            Style::default().fg(TEXT_MUTED),
        )),
        Line::from(""),
        Line::from(Span::styled(
            truncate(app.display(), width),
            Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
        )),
    ];
    frame.render_widget(
        Paragraph::new(display_lines).alignment(Alignment::Right),
        Rect { x: chunks[0].x + 1, width: chunks[0].width.saturating_sub(2), ..chunks[0] },
    );

    draw_keypad(frame, app, chunks[1], focused);
}

fn draw_keypad(frame: &mut Frame, app: &App, area: Rect, focused: bool) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Ratio(1, keypad::ROWS as u32); keypad::ROWS])
        .split(area);

    for (r, labels) in KEYPAD.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, keypad::COLS as u32); keypad::COLS])
            .split(rows[r]);

        for (c, label) in labels.iter().enumerate() {
            let selected =
                focused && app.ui.keypad_cursor.row == r && app.ui.keypad_cursor.col == c;
            let (fg, bg) = if *label == "C" {
                (RED_SOFT, RED_BG)
            } else if keypad::is_operator(label) {
                (TEXT_PRIMARY, INDIGO)
            } else {
                (TEXT_PRIMARY, BG_KEY)
            };
            let border = if selected { INDIGO_LIGHT } else { BG_DARK };

            let key = Paragraph::new(keypad::display_label(label))
                .alignment(Alignment::Center)
                .style(Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .border_style(Style::default().fg(border).bg(bg)),
                );
            frame.render_widget(key, cols[c]);
        }
    }
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect, placeholder: &str) {
    let focused = app.ui.focus == Focus::Workspace;

    // Pulsing border when focused
    let border_color = if focused {
        let glow = (app.animation_frame as f64 / 90.0).sin() * 0.3 + 0.7;
        Color::Rgb((129.0 * glow) as u8, (140.0 * glow) as u8, (248.0 * glow) as u8)
    } else {
        BORDER_DIM
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = if app.ui.input.is_empty() && !focused {
        Line::from(Span::styled(format!(" > {}", placeholder), Style::default().fg(TEXT_MUTED)))
    } else {
        let cursor = if focused && app.animation_frame % 30 < 15 { "|" } else { " " };
        Line::from(vec![
            Span::styled(" > ", Style::default().fg(INDIGO_LIGHT)),
            Span::styled(format!("{}{}", app.ui.input, cursor), Style::default().fg(TEXT_PRIMARY)),
        ])
    };
    frame.render_widget(Paragraph::new(line).wrap(Wrap { trim: false }), inner);
}

fn loading_line(app: &App, idle: &str, busy: &str) -> Line<'static> {
    if app.is_loading() {
        let spin = SPINNER[(app.animation_frame / 6) % SPINNER.len()];
        Line::from(vec![
            Span::styled(format!("{} ", spin), Style::default().fg(INDIGO_LIGHT)),
            Span::styled(busy.to_string(), Style::default().fg(TEXT_SECONDARY)),
        ])
    } else {
        Line::from(Span::styled(idle.to_string(), Style::default().fg(TEXT_MUTED)))
    }
}

fn draw_smart(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Smart AI", app.ui.focus == Focus::Workspace);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Min(3),    // Input
            Constraint::Length(1), // Submit state
        ])
        .split(inner);

    let header = Paragraph::new(vec![Line::from(Span::styled(
        "Ask any math question in plain words.",
        Style::default().fg(TEXT_SECONDARY),
    ))]);
    frame.render_widget(header, chunks[0]);

    let input_height = chunks[1].height.min(6);
    draw_input(
        frame,
        app,
        Rect { height: input_height, ..chunks[1] },
        "e.g. what is the derivative of x^2?",
    );

    frame.render_widget(
        Paragraph::new(loading_line(app, "Enter to solve", "Thinking...")),
        chunks[2],
    );
}

fn draw_vision(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel("Vision", app.ui.focus == Focus::Workspace);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Camera / image
            Constraint::Length(3), // Caption
            Constraint::Length(1), // Submit state
        ])
        .split(inner);

    let frame_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER_ACCENT))
        .style(Style::default().bg(BG_PANEL));
    let preview = frame_block.inner(chunks[0]);
    frame.render_widget(frame_block, chunks[0]);

    let lines = if let Some(url) = app.captured_image() {
        let kb = image_input::payload_bytes(url).div_ceil(1024);
        vec![
            Line::from(""),
            Line::from(Span::styled(
                "▣ Image captured",
                Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(format!("PNG, {} KB", kb), Style::default().fg(TEXT_MUTED))),
            Line::from(""),
            Line::from(Span::styled("F6 discard", Style::default().fg(TEXT_MUTED))),
        ]
    } else if app.is_capturing() {
        let spin = SPINNER[(app.animation_frame / 6) % SPINNER.len()];
        vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("{} Capturing frame", spin),
                Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
            )),
        ]
    } else if app.camera_live() {
        let pulse = if app.animation_frame % 60 < 30 { "●" } else { "○" };
        vec![
            Line::from(""),
            Line::from(vec![
                Span::styled(format!("{} ", pulse), Style::default().fg(OLIVE)),
                Span::styled(
                    "Camera live",
                    Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                "F5 capture · /open <path> · /paste",
                Style::default().fg(TEXT_MUTED),
            )),
        ]
    } else {
        vec![
            Line::from(""),
            Line::from(Span::styled("Camera off", Style::default().fg(TEXT_SECONDARY))),
            Line::from(""),
            Line::from(Span::styled(
                "/camera retry · /open <path> · /paste",
                Style::default().fg(TEXT_MUTED),
            )),
        ]
    };
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), preview);

    draw_input(frame, app, chunks[1], "optional caption for the photo");

    let idle = if app.captured_image().is_some() {
        "Enter to solve photo"
    } else {
        "Capture or open an image first"
    };
    frame.render_widget(Paragraph::new(loading_line(app, idle, "Analysing...")), chunks[2]);
}

fn draw_result(frame: &mut Frame, app: &App, calc: &Calculation, area: Rect) {
    let block = panel(&format!("Result: {}", calc.result), app.ui.focus == Focus::Result);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let plot = PlotView::new(calc.plot());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(if plot.is_some() {
            vec![Constraint::Min(4), Constraint::Length(12)]
        } else {
            vec![Constraint::Min(4), Constraint::Length(0)]
        })
        .split(inner);

    let mut lines = vec![
        Line::from(Span::styled(calc.query.clone(), Style::default().fg(TEXT_MUTED))),
        Line::from(""),
        Line::from(Span::styled(
            "STEP BY STEP",
            Style::default().fg(TEXT_MUTED).add_modifier(Modifier::BOLD),
        )),
    ];
    for (idx, step) in calc.steps.iter().flatten().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(
                format!(" {:>2} ", idx + 1),
                Style::default().fg(INDIGO_LIGHT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(step.clone(), Style::default().fg(TEXT_SECONDARY)),
        ]));
    }
    if let Some(explanation) = calc.explanation.as_deref().filter(|e| !e.is_empty()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("\"{}\"", explanation),
            Style::default().fg(TEXT_SECONDARY).add_modifier(Modifier::ITALIC),
        )));
    }

    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.ui.result_scroll, 0));
    frame.render_widget(body, chunks[0]);

    if let Some(view) = plot {
        view.render(frame, chunks[1], "Function graph", app.ui.hovered_point);
    }
}

fn draw_history(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.ui.focus == Focus::History;
    let block = panel("History", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.history().is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("No recent calculations", Style::default().fg(TEXT_MUTED))),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(empty, inner);
        return;
    }

    let width = inner.width.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = Vec::new();
    for (idx, calc) in app.history().iter().enumerate() {
        let selected = focused && idx == app.ui.history_selection;
        let marker = if selected { "▌" } else { " " };
        let kind_color = match calc.kind {
            CalcKind::Basic => TEXT_MUTED,
            CalcKind::Ai => INDIGO_LIGHT,
            CalcKind::Vision => OLIVE,
        };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(INDIGO_LIGHT)),
            Span::styled(
                calc.kind.label().to_uppercase(),
                Style::default().fg(kind_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  {}", calc.timestamp.with_timezone(&chrono::Local).format("%H:%M")),
                Style::default().fg(TEXT_MUTED),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(INDIGO_LIGHT)),
            Span::styled(truncate(&calc.query, width), Style::default().fg(TEXT_SECONDARY)),
        ]));
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(INDIGO_LIGHT)),
            Span::styled(
                truncate(&calc.result, width),
                Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD),
            ),
        ]));
        lines.push(Line::from(""));
    }

    // Keep the selection visible
    let entry_height = 4u16;
    let selected_bottom = u16::try_from(app.ui.history_selection)
        .unwrap_or(u16::MAX)
        .saturating_add(1)
        .saturating_mul(entry_height);
    let scroll = selected_bottom.saturating_sub(inner.height);
    frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), inner);
}

fn draw_notice(frame: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(notice) = app.notice() {
        Line::from(Span::styled(
            format!(" ✕ {} ", notice.message),
            Style::default().fg(RED_SOFT).bg(RED_BG).add_modifier(Modifier::BOLD),
        ))
    } else if let Some(status) = &app.ui.status_message {
        Line::from(Span::styled(format!(" {}", status), Style::default().fg(TEXT_SECONDARY)))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_keyboard_hints(frame: &mut Frame, app: &App, area: Rect) {
    let key = |k: &str| {
        Span::styled(k.to_string(), Style::default().fg(INDIGO_LIGHT).add_modifier(Modifier::BOLD))
    };
    let text = |t: &str| Span::styled(t.to_string(), Style::default().fg(TEXT_MUTED));

    let mut spans = vec![key("Tab"), text(" mode  "), key("S-Tab"), text(" focus  ")];
    match (app.ui.focus, app.ui.tab) {
        (Focus::History, _) => {
            spans.extend([key("↑↓"), text(" select  "), key("Enter"), text(" recall  ")])
        }
        (Focus::Result, _) => {
            spans.extend([key("←→"), text(" point  "), key("↑↓"), text(" scroll  ")])
        }
        (Focus::Workspace, Tab::Standard) => spans.extend([
            key("Enter"),
            text(" =  "),
            key("Del"),
            text(" clear  "),
            key("Space"),
            text(" press key  "),
        ]),
        (Focus::Workspace, _) => {
            spans.extend([key("Enter"), text(" solve  "), key("/help"), text(" cmds  ")])
        }
    }
    spans.extend([key("F4"), text(" history  "), key("Esc"), text(" quit")]);

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::widgets::{dashboard, window};
use super::{Mode, View};

pub fn draw(f: &mut Frame, view: &View) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_title(f, view, chunks[0]);
    match view.mode {
        Mode::Menu => dashboard::draw(f, view, chunks[1]),
        Mode::Drill => window::draw(f, view, chunks[1]),
    }
    draw_status(f, view, chunks[2]);
    draw_help_bar(f, view, chunks[3]);
}

fn draw_title(f: &mut Frame, view: &View, area: Rect) {
    let title = Paragraph::new(Line::from(Span::styled(
        view.title.as_str(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL).title(" Linecue "));

    f.render_widget(title, area);
}

fn draw_status(f: &mut Frame, view: &View, area: Rect) {
    let status = Paragraph::new(Span::styled(
        view.status.as_str(),
        Style::default().fg(Color::Gray),
    ));
    f.render_widget(status, area);
}

fn key(label: &str) -> Span<'_> {
    Span::styled(label, Style::default().fg(Color::Cyan))
}

fn draw_help_bar(f: &mut Frame, view: &View, area: Rect) {
    let spans = match view.mode {
        Mode::Menu => vec![
            key("l"),
            Span::raw(" Learn  "),
            key("i"),
            Span::raw(" Ingest  "),
            key("r"),
            Span::raw(" Review  "),
            key("s"),
            Span::raw(" Scene  "),
            key("q"),
            Span::raw(" Quit"),
        ],
        Mode::Drill => vec![
            key("1/a"),
            Span::raw(" Again  "),
            key("2/h"),
            Span::raw(" Hard  "),
            key("3/g"),
            Span::raw(" Good  "),
            key("4/e"),
            Span::raw(" Easy  "),
            key("<Space>"),
            Span::raw(" Peek  "),
            key("q/<Esc>"),
            Span::raw(" Stop"),
        ],
    };

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem},
    Frame,
};

use crate::models::{DisplayTier, Rating};
use crate::tui::{LineState, ShownLine, View};

pub fn draw(f: &mut Frame, view: &View, area: Rect) {
    let items: Vec<ListItem> = view.lines.iter().map(line_item).collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Lines ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(List::new(items).block(block), area);
}

fn line_item(line: &ShownLine) -> ListItem<'static> {
    let (marker, text, style) = match line.state {
        LineState::Waiting => (
            "  ",
            scaffold(line.display, &line.text),
            Style::default().fg(Color::DarkGray),
        ),
        LineState::Current => (
            "> ",
            scaffold(line.display, &line.text),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        // Rated lines show in full so the learner can check themselves
        LineState::Rated(rating) => (
            "  ",
            line.text.clone(),
            Style::default().fg(rating_color(rating)),
        ),
    };
    ListItem::new(Line::from(vec![
        Span::styled(marker, Style::default().fg(Color::Yellow)),
        Span::styled(text, style),
    ]))
}

fn scaffold(display: DisplayTier, text: &str) -> String {
    let rendered = display.render(text);
    if rendered.is_empty() {
        "…".to_string()
    } else {
        rendered
    }
}

fn rating_color(rating: Rating) -> Color {
    match rating {
        Rating::Again => Color::Red,
        Rating::Hard => Color::Magenta,
        Rating::Good => Color::Green,
        Rating::Easy => Color::Cyan,
    }
}

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::models::DisplayTier;
use crate::scheduler::Stats;
use crate::tui::View;

const BAR_WIDTH: usize = 20;
const DAYS_SHOWN: usize = 7;

pub fn draw(f: &mut Frame, view: &View, area: Rect) {
    let Some(stats) = view.stats.as_ref().filter(|s| s.total > 0) else {
        let empty = Paragraph::new("No cards yet. Press l to learn or i to ingest.")
            .block(Block::default().borders(Borders::ALL).title(" Stats "));
        f.render_widget(empty, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Counts + display tiers row
            Constraint::Min(0),    // Upcoming days
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    draw_counts(f, stats, top_chunks[0]);
    draw_tiers(f, stats, top_chunks[1]);
    draw_upcoming(f, stats, chunks[1]);
}

fn count_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])
}

fn draw_counts(f: &mut Frame, stats: &Stats, area: Rect) {
    let scheme = stats.scheme.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
    let text = vec![
        count_line("Scheme", scheme, Color::Cyan),
        count_line("Cards", stats.total.to_string(), Color::White),
        count_line(
            "Due",
            stats.due.to_string(),
            if stats.due > 0 { Color::Yellow } else { Color::White },
        ),
        count_line("Reviewable", stats.reviewable.to_string(), Color::White),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_tiers(f: &mut Frame, stats: &Stats, area: Rect) {
    let tiers = [
        DisplayTier::All,
        DisplayTier::WordInitials,
        DisplayTier::LineInitials,
        DisplayTier::None,
    ];
    let items: Vec<ListItem> = tiers
        .iter()
        .map(|tier| {
            let count = stats.by_display.get(tier).copied().unwrap_or(0);
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<14}", tier.label()), Style::default().fg(Color::White)),
                Span::styled(bar(count, stats.total), Style::default().fg(Color::Green)),
                Span::styled(format!(" {}", count), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Hints ")
        .title_style(Style::default().fg(Color::Green));

    f.render_widget(List::new(items).block(block), area);
}

fn draw_upcoming(f: &mut Frame, stats: &Stats, area: Rect) {
    let items: Vec<ListItem> = stats
        .by_due_day
        .iter()
        .take(DAYS_SHOWN)
        .map(|(day, count)| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<12}", day), Style::default().fg(Color::DarkGray)),
                Span::styled(bar(*count, stats.total), Style::default().fg(Color::Yellow)),
                Span::styled(format!(" {}", count), Style::default().fg(Color::White)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Due By Day ")
        .title_style(Style::default().fg(Color::Yellow));

    f.render_widget(List::new(items).block(block), area);
}

fn bar(count: usize, total: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (count * BAR_WIDTH + total - 1) / total
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

//! Render functions for the TUI.

use crate::app::App;
use crate::lemmy::{FeedKind, ListingType};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{feed_list, help, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 40;
pub(super) const MIN_HEIGHT: u16 = 6;

const TABS: [(FeedKind, &str); 5] = [
    (FeedKind::Posts(ListingType::All), "1 All"),
    (FeedKind::Posts(ListingType::Local), "2 Local"),
    (FeedKind::Posts(ListingType::Subscribed), "3 Home"),
    (FeedKind::Inbox, "i Inbox"),
    (FeedKind::Modlog, "m Mod Logs"),
];

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = Paragraph::new("Terminal too small").alignment(Alignment::Center);
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_tabs(f, app, chunks[0]);
    feed_list::render(f, app, chunks[1]);
    status::render(f, app, chunks[2]);

    if app.show_help {
        help::render(f);
    }
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::with_capacity(TABS.len() * 2 + 1);
    for (kind, label) in TABS {
        let style = if kind == app.kind {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", label), style));
        spans.push(Span::raw(" "));
    }
    if app.hidden.show_hidden() {
        spans.push(Span::styled("[showing hidden]", Style::default().fg(Color::Yellow)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

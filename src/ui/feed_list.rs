//! Virtualized feed list.
//!
//! Only the rows inside the viewport (plus overscan) are pulled out of the
//! loader and turned into widgets. A trailing footer row reports the load
//! state of the feed.

use crate::app::App;
use crate::feed::window::{scroll_to_keep_visible, visible_range, OVERSCAN};
use crate::feed::Footer;
use crate::lemmy::{CommentReplyView, FeedItem, ModlogEntry, PostView};
use crate::util::{relative_time, strip_control_chars, truncate_to_width};
use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::helpers::SPINNER_FRAMES;

/// Render the feed list panel
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    let title = format!(" {} · {} ", app.kind.title(), sort_label(app));
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let viewport = inner.height as usize;
    app.viewport_height = viewport;
    if viewport == 0 || inner.width == 0 {
        return;
    }

    if app.loader.shows_spinner() {
        let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
        let msg = Paragraph::new(format!("{} Loading…", spinner)).alignment(Alignment::Center);
        f.render_widget(msg, inner);
        app.rendered_range = None;
        return;
    }

    let item_count = app.loader.visible_len();
    let footer = footer_line(app);
    let total_rows = item_count + usize::from(footer.is_some());

    app.clamp_selection();
    app.scroll_offset = scroll_to_keep_visible(app.scroll_offset, app.selected, viewport)
        .min(total_rows.saturating_sub(1));

    // Materialize the overscanned window; only the part inside the viewport is drawn
    let range = visible_range(item_count, viewport, app.scroll_offset, OVERSCAN);
    let items = app.loader.visible_slice(range.start, range.end);
    app.rendered_range = (!range.is_empty()).then(|| range.clone());

    let width = inner.width as usize;
    let now = Utc::now();
    let mut lines: Vec<Line> = Vec::with_capacity(viewport);

    for row in app.scroll_offset..(app.scroll_offset + viewport).min(total_rows) {
        if row < item_count {
            let Some(item) = row.checked_sub(range.start).and_then(|i| items.get(i)) else {
                continue;
            };
            let selected = row == app.selected;
            lines.push(item_line(app, item, width, now, selected));
        } else if let Some(footer) = &footer {
            lines.push(footer.clone());
        }
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn sort_label(app: &App) -> String {
    match app.kind {
        crate::lemmy::FeedKind::Posts(_) => app.sort.to_string(),
        _ => "New".to_string(),
    }
}

/// The trailing row, if the feed state calls for one.
fn footer_line(app: &App) -> Option<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    match app.loader.footer() {
        Footer::LoadFailed => Some(Line::from(Span::styled(
            "Failed to load. Press l to retry.",
            Style::default().fg(Color::Red),
        ))),
        Footer::End { empty: true } => Some(Line::from(Span::styled("Nothing here.", dim))),
        Footer::End { empty: false } => Some(Line::from(Span::styled("End of feed.", dim))),
        Footer::FetchMore { page } => Some(Line::from(Span::styled(
            format!("Page {} loaded. Press l for more.", page),
            dim,
        ))),
        Footer::None if app.loader.is_loading() => {
            let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
            Some(Line::from(Span::styled(
                format!("{} Loading more…", spinner),
                dim,
            )))
        }
        Footer::None => None,
    }
}

fn item_line(
    app: &App,
    item: &FeedItem,
    width: usize,
    now: DateTime<Utc>,
    selected: bool,
) -> Line<'static> {
    let text = match item {
        FeedItem::Post(view) => post_text(app, view, now),
        FeedItem::Reply(view) => reply_text(view),
        FeedItem::Modlog(entry) => modlog_text(entry, now),
    };
    let text = truncate_to_width(&text, width).into_owned();

    let style = if selected {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    } else if item.post_id().is_some_and(|id| app.hidden.contains(id)) {
        Style::default().fg(Color::DarkGray)
    } else if matches!(item, FeedItem::Reply(view) if !view.comment_reply.read) {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    Line::from(Span::styled(text, style))
}

fn post_text(app: &App, view: &PostView, now: DateTime<Utc>) -> String {
    let age = view
        .published_at()
        .map(|t| relative_time(t, now))
        .unwrap_or_default();
    let marker = if app.hidden.contains(view.post.id) {
        "⊘ "
    } else if view.post.featured_community || view.post.featured_local {
        "📌 "
    } else {
        ""
    };
    let host = view
        .link_host()
        .map(|h| format!(" ({})", h))
        .unwrap_or_default();
    format!(
        "{:>5} {}{}{}  {} · {} · {}c",
        view.counts.score,
        marker,
        strip_control_chars(&view.post.name),
        host,
        view.community.handle(),
        age,
        view.counts.comments
    )
}

fn reply_text(view: &CommentReplyView) -> String {
    let content = strip_control_chars(&view.comment.content);
    format!(
        "↩ {}: {}  on \"{}\"",
        view.creator.handle(),
        content.trim(),
        strip_control_chars(&view.post.name)
    )
}

fn modlog_text(entry: &ModlogEntry, now: DateTime<Utc>) -> String {
    let mut text = entry.label();
    if let Some(target) = &entry.target {
        text.push_str(&format!(" \"{}\"", strip_control_chars(target)));
    }
    if let Some(moderator) = &entry.moderator {
        text.push_str(&format!(" by {}", moderator));
    }
    if let Some(when) = entry.when {
        text.push_str(&format!(" · {}", relative_time(when, now)));
    }
    if let Some(reason) = &entry.reason {
        text.push_str(&format!(" · {}", strip_control_chars(reason)));
    }
    text
}

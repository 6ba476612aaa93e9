//! Help overlay listing the key bindings.

use ratatui::{
    layout::Constraint,
    style::{Modifier, Style},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

use super::helpers::centered_rect;

const BINDINGS: [(&str, &str); 14] = [
    ("j / ↓", "Next item"),
    ("k / ↑", "Previous item"),
    ("g / G", "Top / bottom"),
    ("PgDn / PgUp", "Page down / up"),
    ("r", "Refresh"),
    ("l", "Load more, or retry after an error"),
    ("h", "Hide / unhide post"),
    ("H", "Show / hide hidden posts"),
    ("1 2 3", "All / Local / Home"),
    ("i", "Inbox"),
    ("m", "Mod log"),
    ("s", "Next sort"),
    ("?", "Toggle this help"),
    ("q", "Quit"),
];

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame) {
    let overlay = centered_rect(60, 70, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }

    f.render_widget(Clear, overlay);

    let rows = BINDINGS
        .iter()
        .map(|(key, description)| Row::new(vec![format!("  {}", key), description.to_string()]));

    let table = Table::new(rows, [Constraint::Length(14), Constraint::Min(10)])
        .header(
            Row::new(vec!["  Key", "Action"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(" Help "));

    f.render_widget(table, overlay);
}

use crate::app::App;
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg)
    } else if let Some(error) = app.loader.with_state(|s| s.last_error().map(str::to_string)) {
        Cow::Owned(format!("Error: {}", error))
    } else {
        Cow::Borrowed("[j/k]move [r]efresh [l]oad more [h]ide [H]idden [1/2/3]listing [i]nbox [m]odlog [s]ort [?]help [q]uit")
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}

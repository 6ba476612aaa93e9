//! Input handling for the TUI.

use crate::app::{App, AppEvent};
use crate::feed::Footer;
use crate::lemmy::{FeedKind, ListingType};
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::Action;

/// Main input dispatch function.
pub(super) async fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Action::Quit;
    }

    // Help overlay captures everything but its own toggles
    if app.show_help {
        if matches!(code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return Action::Continue;
    }

    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => app.show_help = true,

        KeyCode::Char('j') | KeyCode::Down => app.nav_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.nav_up(1),
        KeyCode::PageDown => app.nav_down(app.viewport_height.max(1)),
        KeyCode::PageUp => app.nav_up(app.viewport_height.max(1)),
        KeyCode::Char('g') | KeyCode::Home => app.nav_top(),
        KeyCode::Char('G') | KeyCode::End => app.nav_bottom(),

        KeyCode::Char('r') => {
            app.reset_view();
            app.spawn_fetch(true, event_tx);
            app.set_status("Refreshing…");
        }
        KeyCode::Char('l') => load_more(app, event_tx),

        KeyCode::Char('h') => app.toggle_hide_selected(event_tx),
        KeyCode::Char('H') => app.toggle_show_hidden(),

        KeyCode::Char('1') => {
            app.switch_feed(FeedKind::Posts(ListingType::All), event_tx)
                .await
        }
        KeyCode::Char('2') => {
            app.switch_feed(FeedKind::Posts(ListingType::Local), event_tx)
                .await
        }
        KeyCode::Char('3') => {
            app.switch_feed(FeedKind::Posts(ListingType::Subscribed), event_tx)
                .await
        }
        KeyCode::Char('i') => app.switch_feed(FeedKind::Inbox, event_tx).await,
        KeyCode::Char('m') => app.switch_feed(FeedKind::Modlog, event_tx).await,
        KeyCode::Char('s') => app.cycle_sort(event_tx).await,

        _ => {}
    }

    Action::Continue
}

/// Manual "load more", also the retry after a failed page.
fn load_more(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    match app.loader.footer() {
        Footer::End { .. } => app.set_status("No more items"),
        _ if app.fetches_in_progress > 0 => app.set_status("Already loading"),
        _ => app.spawn_fetch(false, event_tx),
    }
}

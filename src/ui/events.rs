//! Application event handling.
//!
//! Processes results reported by background tasks: feed fetches and
//! hide/unhide writes, including automatic hiding.

use crate::app::{App, AppEvent, FETCH_TASK};
use crate::feed::FetchOutcome;

/// Apply one background event to the app state.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::FetchFinished { feed, result } => {
            app.fetches_in_progress = app.fetches_in_progress.saturating_sub(1);
            match result {
                Ok(FetchOutcome::Loaded { received, added }) => {
                    tracing::debug!(%feed, received, added, "Feed page loaded");
                    if feed == app.kind {
                        app.apply_pending_selection();
                        app.clamp_selection();
                    }
                }
                Ok(FetchOutcome::Skipped(reason)) => {
                    tracing::debug!(%feed, ?reason, "Fetch skipped");
                }
                Ok(FetchOutcome::Cancelled) => {
                    tracing::debug!(%feed, "Fetch cancelled");
                }
                Err(error) => {
                    // The loader already logged the failure and set load_failed
                    if feed == app.kind {
                        app.set_status(format!("Failed to load {}: {}", feed.title(), error));
                    }
                }
            }
        }
        AppEvent::HideSaved { post_id, hidden } => {
            tracing::debug!(post_id, hidden, "Post flag saved");
        }
        AppEvent::AutoHidden { result } => match result {
            Ok(post_ids) => app.auto_hidden.extend(post_ids),
            Err(error) => {
                tracing::warn!(error = %error, "Failed to auto-hide posts");
                app.set_status("Could not save hidden state");
            }
        },
        AppEvent::HideFailed {
            post_id,
            hidden,
            error,
        } => {
            tracing::warn!(post_id, hidden, error = %error, "Failed to save post flag");
            // Revert the optimistic toggle
            if app.hidden.contains(post_id) == hidden {
                app.hidden.toggle(post_id);
            }
            app.auto_hidden.retain(|id| *id != post_id);
            app.clamp_selection();
            app.set_status("Could not save hidden state");
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            if task == FETCH_TASK {
                app.fetches_in_progress = app.fetches_in_progress.saturating_sub(1);
            }
            app.set_status(format!("Internal error in {} task", task));
        }
    }
}

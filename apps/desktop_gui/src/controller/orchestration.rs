//! Applies UI actions through the session controller and turns failures into
//! status-line text.

use client_core::{SelectionError, SessionController, SessionError, SessionState};

use crate::controller::events::UiAction;

/// Runs `action`. Must be called outside any `with_local` borrow of the
/// dispatcher state.
pub fn apply_action(
    controller: &SessionController,
    action: UiAction,
    token: &mut String,
    status: &mut String,
) {
    let result = match action {
        UiAction::ToggleSession => toggle_session(controller, token),
        UiAction::SelectServer(id) => controller.select_server(id),
        UiAction::SelectChannel(id) => controller.select_channel(id),
        UiAction::SelectMessage(id) => controller.select_message(id),
        UiAction::SendDraft => controller.send_draft(),
        UiAction::DismissNotice => controller
            .dispatcher()
            .invoke_action(|state| {
                state.dismiss_notice();
            })
            .map_err(SessionError::from),
    };

    match result {
        Ok(()) => {
            tracing::debug!(action = action.name(), "applied ui action");
            status.clear();
        }
        Err(err) => {
            tracing::warn!(action = action.name(), "ui action failed: {err}");
            *status = describe_failure(&err);
        }
    }
}

fn toggle_session(controller: &SessionController, token: &mut String) -> Result<(), SessionError> {
    let result = match controller.state()? {
        SessionState::Idle => controller.start(token.trim()),
        _ => controller.stop(),
    };
    // The token is only needed for the start itself.
    token.clear();
    result
}

pub fn describe_failure(err: &SessionError) -> String {
    match err {
        SessionError::AlreadyActive(state) => format!("The bot is already {state}."),
        SessionError::NotActive(_) | SessionError::NotRunning(_) => {
            "The bot is not running.".to_string()
        }
        SessionError::NoChannelSelected => "Select a channel before sending.".to_string(),
        SessionError::BlankMessage => "Type a message first.".to_string(),
        SessionError::Selection(SelectionError::UnknownServer(_)) => {
            "That server is no longer available.".to_string()
        }
        other => other.to_string(),
    }
}

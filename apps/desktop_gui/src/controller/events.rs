//! Operator actions raised by the UI.

use shared::domain::{ChannelId, MessageId, ServerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// Start the bot when idle, stop it otherwise.
    ToggleSession,
    SelectServer(ServerId),
    SelectChannel(ChannelId),
    SelectMessage(MessageId),
    SendDraft,
    DismissNotice,
}

impl UiAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::ToggleSession => "toggle_session",
            Self::SelectServer(_) => "select_server",
            Self::SelectChannel(_) => "select_channel",
            Self::SelectMessage(_) => "select_message",
            Self::SendDraft => "send_draft",
            Self::DismissNotice => "dismiss_notice",
        }
    }
}

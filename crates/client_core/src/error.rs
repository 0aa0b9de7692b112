//! Error types and the operator-facing notice model.

use std::fmt;

use shared::domain::{ChannelId, MessageId, ServerId};
use thiserror::Error;

use crate::session::SessionState;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("property `{0}` is read-only")]
    ReadOnlyProperty(&'static str),
    #[error("dispatch re-entered while the affinity thread was already executing a call")]
    Reentrant,
    #[error("operation is only valid on the affinity thread")]
    WrongThread,
    #[error("affinity thread is no longer accepting work")]
    Disconnected,
    #[error("dispatched call panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("server {0} is not in the server list")]
    UnknownServer(ServerId),
    #[error("cannot select channel {0} without a selected server")]
    NoServerSelected(ChannelId),
    #[error("channel {0} is not listed for the selected server")]
    UnknownChannel(ChannelId),
    #[error("message {0} is not in the message list")]
    UnknownMessage(MessageId),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already {0}")]
    AlreadyActive(SessionState),
    #[error("no session to stop (session is {0})")]
    NotActive(SessionState),
    #[error("session is {0}, not running")]
    NotRunning(SessionState),
    #[error("no channel selected")]
    NoChannelSelected,
    #[error("message text is blank")]
    BlankMessage,
    #[error("failed to spawn session worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSource {
    /// Opening or closing the connection failed.
    Connection,
    /// An event handler or outgoing-message task failed.
    Handler,
    /// The chat client itself reported an error.
    Client,
}

/// A failure shown to the operator: originating event plus detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub source: NoticeSource,
    pub event_name: String,
    pub detail: String,
}

impl ErrorNotice {
    pub fn new(
        source: NoticeSource,
        event_name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source,
            event_name: event_name.into(),
            detail: detail.into(),
        }
    }

    pub fn connection(event_name: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::new(NoticeSource::Connection, event_name, format!("{err:#}"))
    }

    pub fn handler(event_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(NoticeSource::Handler, event_name, detail)
    }

    pub fn title(&self) -> &'static str {
        match self.source {
            NoticeSource::Connection => "Connection failure",
            NoticeSource::Handler | NoticeSource::Client => "Unhandled exception in the Bot",
        }
    }
}

impl fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exception in {}: {}", self.event_name, self.detail)
    }
}

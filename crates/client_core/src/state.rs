//! State owned by the affinity thread: everything the operator sees.

use std::collections::VecDeque;

use shared::domain::Server;
use tracing::warn;

use crate::{
    collections::ChatCollections,
    dispatcher::Property,
    error::ErrorNotice,
    session::{Session, SessionState},
};

const MAX_PENDING_NOTICES: usize = 32;
const CONNECTED_TITLE_SUFFIX: &str = " — connected";

pub struct SurfaceState {
    pub(crate) collections: ChatCollections,
    pub(crate) session: Session,
    controls_enabled: bool,
    base_title: String,
    window_title: String,
    draft: String,
    notices: VecDeque<ErrorNotice>,
}

impl SurfaceState {
    pub const CONTROLS_ENABLED: Property<Self, bool> = Property::new(
        "controls_enabled",
        |state| state.controls_enabled,
        |state, enabled| state.controls_enabled = enabled,
    );

    pub const WINDOW_TITLE: Property<Self, String> = Property::new(
        "window_title",
        |state| state.window_title.clone(),
        |state, title| state.window_title = title,
    );

    pub const DRAFT: Property<Self, String> = Property::new(
        "draft",
        |state| state.draft.clone(),
        |state, draft| state.draft = draft,
    );

    pub const SELECTED_SERVER: Property<Self, Option<Server>> = Property::new(
        "selected_server",
        |state| state.collections.selection().server().cloned(),
        |state, server| state.collections.select_server(server),
    );

    pub const SESSION_STATE: Property<Self, SessionState> =
        Property::read_only("session_state", |state| state.session.state());

    pub fn new(window_title: impl Into<String>) -> Self {
        let base_title = window_title.into();
        Self {
            collections: ChatCollections::new(),
            session: Session::default(),
            controls_enabled: true,
            window_title: base_title.clone(),
            base_title,
            draft: String::new(),
            notices: VecDeque::new(),
        }
    }

    pub fn collections(&self) -> &ChatCollections {
        &self.collections
    }

    pub fn collections_mut(&mut self) -> &mut ChatCollections {
        &mut self.collections
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn has_worker(&self) -> bool {
        self.session.has_worker()
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn window_title(&self) -> &str {
        &self.window_title
    }

    /// Start/stop button text for the current session state.
    pub fn control_label(&self) -> &'static str {
        match self.session.state() {
            SessionState::Idle => "Start the Bot",
            SessionState::Starting | SessionState::Running => "Stop the Bot",
            SessionState::Stopping => "Stopping…",
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut String {
        &mut self.draft
    }

    pub fn take_draft(&mut self) -> String {
        std::mem::take(&mut self.draft)
    }

    pub fn pending_notice(&self) -> Option<&ErrorNotice> {
        self.notices.front()
    }

    pub fn report(&mut self, notice: ErrorNotice) {
        warn!(
            source = ?notice.source,
            event = %notice.event_name,
            "{}",
            notice.detail
        );
        if self.notices.len() == MAX_PENDING_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    pub fn dismiss_notice(&mut self) -> Option<ErrorNotice> {
        self.notices.pop_front()
    }

    pub(crate) fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls_enabled = enabled;
    }

    pub(crate) fn show_connected_title(&mut self) {
        self.window_title = format!("{}{CONNECTED_TITLE_SUFFIX}", self.base_title);
    }

    pub(crate) fn restore_title(&mut self) {
        self.window_title.clone_from(&self.base_title);
    }
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_WINDOW_TITLE)
    }
}

use super::*;
use shared::domain::Server;

use crate::loopback::LoopbackClient;

fn loopback() -> Arc<dyn ChatClient> {
    Arc::new(LoopbackClient::new("bot", Vec::new()))
}

#[test]
fn claim_rejects_a_second_session() {
    let mut state = SurfaceState::default();
    let ticket = state.claim_session(loopback()).expect("first claim");
    assert_eq!(state.session_state(), SessionState::Starting);
    assert!(!state.controls_enabled());

    match state.claim_session(loopback()) {
        Err(SessionError::AlreadyActive(SessionState::Starting)) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("second claim succeeded"),
    }
    assert_eq!(state.session.generation(), ticket.generation);
    assert!(!ticket.cancel.is_cancelled());
}

#[test]
fn stop_cancels_and_is_rejected_when_idle() {
    let mut state = SurfaceState::default();
    assert!(matches!(
        state.session.request_stop(),
        Err(SessionError::NotActive(SessionState::Idle))
    ));

    let ticket = state.claim_session(loopback()).expect("claim");
    state.session.request_stop().expect("stop while starting");
    assert_eq!(state.session_state(), SessionState::Stopping);
    assert!(ticket.cancel.is_cancelled());
    assert!(matches!(
        state.session.request_stop(),
        Err(SessionError::NotActive(SessionState::Stopping))
    ));

    // A stop requested while connecting wins over the late connect.
    assert!(!state.session_connected(ticket.generation));
    assert_eq!(state.session_state(), SessionState::Stopping);
}

#[test]
fn connected_session_updates_controls_and_title() {
    let mut state = SurfaceState::new("Bot");
    let ticket = state.claim_session(loopback()).expect("claim");
    assert!(state.session_connected(ticket.generation));
    assert_eq!(state.session_state(), SessionState::Running);
    assert!(state.controls_enabled());
    assert_eq!(state.window_title(), "Bot — connected");
    assert_eq!(state.control_label(), "Stop the Bot");
    assert!(state.session.client().is_some());
}

#[test]
fn finishing_resets_collections_and_title() {
    let mut state = SurfaceState::new("Bot");
    let ticket = state.claim_session(loopback()).expect("claim");
    state.session_connected(ticket.generation);
    state.collections.add_server(Server::new(ServerId(1), "A"));
    state
        .collections
        .select_server_by_id(ServerId(1))
        .expect("select");

    state.session.request_stop().expect("stop");
    state.session.mark_stopping(ticket.generation);
    assert_eq!(state.control_label(), "Stopping…");
    assert!(state.session_finished(ticket.generation));

    assert_eq!(state.session_state(), SessionState::Idle);
    assert!(!state.has_worker());
    assert!(state.session.client().is_none());
    assert!(state.collections().servers().is_empty());
    assert!(state.collections().selection().is_empty());
    assert!(state.controls_enabled());
    assert_eq!(state.window_title(), "Bot");
    assert_eq!(state.control_label(), "Start the Bot");
}

#[test]
fn stale_generation_never_touches_a_newer_session() {
    let mut state = SurfaceState::default();
    let first = state.claim_session(loopback()).expect("first claim");
    assert!(state.session_finished(first.generation));

    let second = state.claim_session(loopback()).expect("second claim");
    assert_ne!(first.generation, second.generation);

    assert!(!state.session_finished(first.generation));
    assert!(!state.session_connected(first.generation));
    state.session.mark_stopping(first.generation);
    assert_eq!(state.session_state(), SessionState::Starting);

    let worker = thread::spawn(|| {});
    let returned = state.session.attach_worker(first.generation, worker);
    assert!(returned.is_some(), "stale handle is handed back");
    if let Some(handle) = returned {
        handle.join().expect("join");
    }
    assert!(!state.has_worker());

    let worker = thread::spawn(|| {});
    assert!(state.session.attach_worker(second.generation, worker).is_none());
    assert!(state.has_worker());
}

#[test]
fn session_state_display_is_lowercase() {
    let labels: Vec<String> = [
        SessionState::Idle,
        SessionState::Starting,
        SessionState::Running,
        SessionState::Stopping,
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(labels, vec!["idle", "starting", "running", "stopping"]);
    assert_eq!(
        SessionError::AlreadyActive(SessionState::Running).to_string(),
        "a session is already running"
    );
}

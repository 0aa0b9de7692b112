//! Bot session lifecycle: `Idle -> Starting -> Running -> Stopping -> Idle`.
//!
//! The session slot lives inside the affinity-owned [`SurfaceState`], so every
//! transition is serialized by the dispatcher. The long-lived work (connect,
//! wait for stop, disconnect) runs on a dedicated worker thread that drives
//! the client's futures with the runtime handle.

use std::{
    fmt,
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::anyhow;
use shared::domain::{Channel, ChannelId, MessageId, ServerId};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use crate::{
    config::ClientSettings,
    dispatcher::Dispatcher,
    error::{DispatchError, ErrorNotice, SessionError},
    log_sink::LogSink,
    router::EventRouter,
    state::SurfaceState,
    ChatClient, ClientFactory,
};

const WORKER_THREAD_NAME: &str = "session-worker";
const ROUTER_THREAD_NAME: &str = "event-router";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl SessionState {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single session slot. At most one worker exists per slot.
#[derive(Default)]
pub struct Session {
    state: SessionState,
    generation: u64,
    cancel: Option<CancellationToken>,
    worker: Option<JoinHandle<()>>,
    client: Option<Arc<dyn ChatClient>>,
}

struct SessionTicket {
    generation: u64,
    cancel: CancellationToken,
}

impl Session {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    pub(crate) fn client(&self) -> Option<Arc<dyn ChatClient>> {
        self.client.clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && !self.state.is_idle()
    }

    fn begin(&mut self, client: Arc<dyn ChatClient>) -> Result<SessionTicket, SessionError> {
        if !self.state.is_idle() {
            return Err(SessionError::AlreadyActive(self.state));
        }
        let cancel = CancellationToken::new();
        self.generation = self.generation.wrapping_add(1);
        self.state = SessionState::Starting;
        self.cancel = Some(cancel.clone());
        self.client = Some(client);
        Ok(SessionTicket {
            generation: self.generation,
            cancel,
        })
    }

    /// Stores the worker handle. Hands it back when the session it belongs
    /// to has already finished.
    fn attach_worker(&mut self, generation: u64, worker: JoinHandle<()>) -> Option<JoinHandle<()>> {
        if !self.is_current(generation) {
            return Some(worker);
        }
        self.worker = Some(worker);
        None
    }

    fn mark_running(&mut self, generation: u64) -> bool {
        if self.generation != generation || self.state != SessionState::Starting {
            return false;
        }
        self.state = SessionState::Running;
        true
    }

    fn request_stop(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Starting | SessionState::Running => {
                self.state = SessionState::Stopping;
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
                Ok(())
            }
            other => Err(SessionError::NotActive(other)),
        }
    }

    fn mark_stopping(&mut self, generation: u64) {
        if self.is_current(generation) {
            self.state = SessionState::Stopping;
        }
    }

    fn finish(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.state = SessionState::Idle;
        self.cancel = None;
        self.client = None;
        // Detaches the worker; it is the thread running this call.
        self.worker = None;
        true
    }
}

impl SurfaceState {
    fn claim_session(&mut self, client: Arc<dyn ChatClient>) -> Result<SessionTicket, SessionError> {
        let ticket = self.session.begin(client)?;
        self.set_controls_enabled(false);
        Ok(ticket)
    }

    fn session_connected(&mut self, generation: u64) -> bool {
        if !self.session.mark_running(generation) {
            return false;
        }
        self.set_controls_enabled(true);
        self.show_connected_title();
        true
    }

    fn session_finished(&mut self, generation: u64) -> bool {
        if !self.session.finish(generation) {
            return false;
        }
        self.collections.reset();
        self.set_controls_enabled(true);
        self.restore_title();
        true
    }
}

/// Starts, stops and talks to the bot session. Cheap to clone and usable
/// from any thread.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    dispatcher: Dispatcher<SurfaceState>,
    runtime: Handle,
    client_factory: ClientFactory,
    log_sink: Arc<dyn LogSink>,
    chat_log_path: Option<PathBuf>,
    disconnect_timeout: Duration,
}

impl SessionController {
    pub fn new(
        dispatcher: Dispatcher<SurfaceState>,
        runtime: Handle,
        settings: &ClientSettings,
        client_factory: ClientFactory,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                dispatcher,
                runtime,
                client_factory,
                log_sink,
                chat_log_path: settings.chat_log_path(),
                disconnect_timeout: settings.disconnect_timeout(),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<SurfaceState> {
        &self.inner.dispatcher
    }

    pub fn state(&self) -> Result<SessionState, DispatchError> {
        self.inner.dispatcher.get_property(SurfaceState::SESSION_STATE)
    }

    pub fn has_worker(&self) -> Result<bool, DispatchError> {
        self.inner.dispatcher.invoke_func(|state| state.has_worker())
    }

    /// Claims the session slot and starts a worker that connects with
    /// `token`. Fails with [`SessionError::AlreadyActive`] unless idle.
    pub fn start(&self, token: &str) -> Result<(), SessionError> {
        let client = (self.inner.client_factory)(token);
        let claimed = Arc::clone(&client);
        let ticket = self
            .inner
            .dispatcher
            .invoke_func(move |state| state.claim_session(claimed))??;
        let generation = ticket.generation;
        info!(generation, "session starting");

        let worker = SessionWorker {
            dispatcher: self.inner.dispatcher.clone(),
            runtime: self.inner.runtime.clone(),
            router: EventRouter::new(
                self.inner.dispatcher.clone(),
                Arc::clone(&self.inner.log_sink),
                self.inner.chat_log_path.clone(),
            ),
            client,
            cancel: ticket.cancel,
            generation,
            disconnect_timeout: self.inner.disconnect_timeout,
        };
        let handle = match thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(err) => {
                error!(generation, "failed to spawn session worker: {err}");
                self.inner.dispatcher.invoke_action(move |state| {
                    state.session_finished(generation);
                })?;
                return Err(SessionError::Spawn(err));
            }
        };

        let stale = self
            .inner
            .dispatcher
            .invoke_func(move |state| state.session.attach_worker(generation, handle))?;
        if stale.is_some() {
            debug!(generation, "session worker finished before its handle was attached");
        }
        Ok(())
    }

    /// Requests a graceful stop. The worker finishes the teardown and moves
    /// the session back to idle.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.inner
            .dispatcher
            .invoke_func(|state: &mut SurfaceState| -> Result<(), SessionError> {
                state.session.request_stop()?;
                state.set_controls_enabled(false);
                Ok(())
            })??;
        info!("session stop requested");
        Ok(())
    }

    /// Sends `text` to the selected channel without waiting for delivery.
    /// Delivery failures surface as error notices.
    pub fn send_message(&self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::BlankMessage);
        }
        let (channel, client, session_state) = self.inner.dispatcher.invoke_func(|state| {
            (
                state.collections.selection().channel().cloned(),
                state.session.client(),
                state.session.state(),
            )
        })?;
        let channel = channel.ok_or(SessionError::NoChannelSelected)?;
        let client = match (client, session_state) {
            (Some(client), SessionState::Running) => client,
            (_, other) => return Err(SessionError::NotRunning(other)),
        };
        self.spawn_send(client, channel, text);
        Ok(())
    }

    /// Sends the composed draft. The draft is kept when no channel is
    /// selected.
    pub fn send_draft(&self) -> Result<(), SessionError> {
        let text = self.inner.dispatcher.invoke_func(|state| {
            state
                .collections
                .selection()
                .channel()
                .is_some()
                .then(|| state.take_draft())
        })?;
        self.send_message(text.ok_or(SessionError::NoChannelSelected)?)
    }

    pub fn select_server(&self, id: ServerId) -> Result<(), SessionError> {
        self.inner
            .dispatcher
            .invoke_func(move |state| state.collections.select_server_by_id(id))??;
        Ok(())
    }

    pub fn select_channel(&self, id: ChannelId) -> Result<(), SessionError> {
        self.inner
            .dispatcher
            .invoke_func(move |state| state.collections.select_channel_by_id(id))??;
        Ok(())
    }

    pub fn select_message(&self, id: MessageId) -> Result<(), SessionError> {
        self.inner
            .dispatcher
            .invoke_func(move |state| state.collections.select_message_by_id(id))??;
        Ok(())
    }

    fn spawn_send(&self, client: Arc<dyn ChatClient>, channel: Channel, text: String) {
        let dispatcher = self.inner.dispatcher.clone();
        self.inner.runtime.spawn(async move {
            debug!(channel_id = channel.id.0, len = text.len(), "sending message");
            if let Err(err) = client.send_message(channel.id, &text).await {
                let notice = ErrorNotice::handler("send_message", format!("{err:#}"));
                if let Err(dispatch_err) = dispatcher.post(move |state| state.report(notice)) {
                    warn!("failed to report send failure: {dispatch_err}");
                }
            }
        });
    }
}

enum ConnectOutcome {
    Connected,
    Cancelled,
    Failed(anyhow::Error),
}

struct SessionWorker {
    dispatcher: Dispatcher<SurfaceState>,
    runtime: Handle,
    router: EventRouter,
    client: Arc<dyn ChatClient>,
    cancel: CancellationToken,
    generation: u64,
    disconnect_timeout: Duration,
}

impl SessionWorker {
    fn run(self) {
        let span = info_span!("session", generation = self.generation);
        let _entered = span.enter();
        let generation = self.generation;

        let router_stop = CancellationToken::new();
        let (outcome, router_thread) = match self.spawn_router(router_stop.clone()) {
            Ok(handle) => (self.connect(), Some(handle)),
            Err(err) => (
                ConnectOutcome::Failed(anyhow::Error::new(err).context("failed to spawn event router")),
                None,
            ),
        };

        let should_disconnect = match outcome {
            ConnectOutcome::Connected => {
                info!("session connected");
                self.wait_for_stop();
                true
            }
            ConnectOutcome::Cancelled => {
                info!("stop requested before the connection completed");
                true
            }
            ConnectOutcome::Failed(err) => {
                error!("failed to connect: {err:#}");
                self.report(ErrorNotice::connection("connect", &err));
                false
            }
        };

        self.dispatch("mark_stopping", move |state| {
            state.session.mark_stopping(generation)
        });
        if should_disconnect {
            self.disconnect();
        }

        router_stop.cancel();
        if let Some(handle) = router_thread {
            if handle.join().is_err() {
                warn!("event router thread panicked");
            }
        }

        self.dispatch("finish", move |state| {
            state.session_finished(generation);
        });
        info!("session finished");
    }

    fn spawn_router(&self, stop: CancellationToken) -> std::io::Result<JoinHandle<()>> {
        // Subscribe before connecting so no early event is missed.
        let events = self.client.subscribe_events();
        let router = self.router.clone();
        let runtime = self.runtime.clone();
        thread::Builder::new()
            .name(ROUTER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(router.run(events, stop)))
    }

    fn connect(&self) -> ConnectOutcome {
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => ConnectOutcome::Cancelled,
                result = self.client.connect() => match result {
                    Ok(()) => ConnectOutcome::Connected,
                    Err(err) => ConnectOutcome::Failed(err),
                },
            }
        })
    }

    fn wait_for_stop(&self) {
        let generation = self.generation;
        match self
            .dispatcher
            .invoke_func(move |state| state.session_connected(generation))
        {
            Ok(true) => {}
            Ok(false) => debug!("stop was requested while connecting"),
            Err(err) => {
                warn!("could not publish running state: {err}");
                return;
            }
        }
        self.runtime.block_on(self.cancel.cancelled());
        info!("stop requested");
    }

    fn disconnect(&self) {
        let result = self.runtime.block_on(tokio::time::timeout(
            self.disconnect_timeout,
            self.client.disconnect(),
        ));
        let err = match result {
            Ok(Ok(())) => {
                info!("disconnected");
                return;
            }
            Ok(Err(err)) => err,
            Err(_) => anyhow!("disconnect timed out after {:?}", self.disconnect_timeout),
        };
        error!("failed to disconnect: {err:#}");
        self.report(ErrorNotice::connection("disconnect", &err));
    }

    fn report(&self, notice: ErrorNotice) {
        self.dispatch("report", move |state| state.report(notice));
    }

    fn dispatch(&self, step: &'static str, action: impl FnOnce(&mut SurfaceState) + Send + 'static) {
        if let Err(err) = self.dispatcher.invoke_action(action) {
            warn!(step, "dispatch failed: {err}");
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

//! Routes chat-client notifications into the affinity-owned collections.

use std::{
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use shared::protocol::GatewayEvent;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    dispatcher::Dispatcher,
    error::{DispatchError, ErrorNotice, NoticeSource},
    log_sink::LogSink,
    state::SurfaceState,
};

/// What routing a single event did to the visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    ServerAdded,
    ServerRemoved,
    /// The message belongs to the selected channel and was appended.
    MessageShown,
    /// The message was logged but not displayed.
    MessageHidden,
    ErrorReported,
    Unchanged,
}

#[derive(Clone)]
pub struct EventRouter {
    dispatcher: Dispatcher<SurfaceState>,
    chat_log: Option<Arc<ChatLog>>,
}

/// Best-effort chat log. Lines go through a queue to a single writer task so
/// they land in arrival order without holding up routing. Failures are only
/// logged.
struct ChatLog {
    sink: Arc<dyn LogSink>,
    path: PathBuf,
    writer: OnceLock<mpsc::UnboundedSender<String>>,
}

impl ChatLog {
    /// Must be called from within a tokio runtime; the writer task starts on
    /// the first line and exits once every router clone is dropped.
    fn forward(&self, line: String) {
        let writer = self.writer.get_or_init(|| {
            let (tx, mut rx) = mpsc::unbounded_channel::<String>();
            let sink = Arc::clone(&self.sink);
            let path = self.path.clone();
            tokio::spawn(async move {
                while let Some(line) = rx.recv().await {
                    if let Err(err) = sink.append_line(&path, &line).await {
                        warn!(path = %path.display(), "failed to append to chat log: {err:#}");
                    }
                }
            });
            tx
        });
        if writer.send(line).is_err() {
            warn!(path = %self.path.display(), "chat log writer stopped; line dropped");
        }
    }
}

impl EventRouter {
    pub fn new(
        dispatcher: Dispatcher<SurfaceState>,
        log_sink: Arc<dyn LogSink>,
        chat_log_path: Option<PathBuf>,
    ) -> Self {
        Self {
            dispatcher,
            chat_log: chat_log_path.map(|path| {
                Arc::new(ChatLog {
                    sink: log_sink,
                    path,
                    writer: OnceLock::new(),
                })
            }),
        }
    }

    pub async fn route(&self, event: GatewayEvent) -> Result<RouteOutcome, DispatchError> {
        debug!(event = event.name(), "routing event");
        match event {
            GatewayEvent::GuildAvailable { server } | GatewayEvent::GuildCreated { server } => {
                self.dispatcher
                    .invoke_action(move |state| state.collections.add_server(server))?;
                Ok(RouteOutcome::ServerAdded)
            }
            GatewayEvent::GuildUnavailable { server_id } | GatewayEvent::GuildDeleted { server_id } => {
                let removed = self.dispatcher.invoke_func(move |state| {
                    state.collections.remove_server(server_id).is_some()
                })?;
                Ok(if removed {
                    RouteOutcome::ServerRemoved
                } else {
                    RouteOutcome::Unchanged
                })
            }
            GatewayEvent::MessageCreated { message } => {
                let line = message.to_string();
                let shown = self
                    .dispatcher
                    .invoke_func(move |state| state.collections.append_message(message));
                // Every message is logged, displayed or not.
                if let Some(chat_log) = &self.chat_log {
                    chat_log.forward(line);
                }
                let shown = shown?;
                Ok(if shown {
                    RouteOutcome::MessageShown
                } else {
                    RouteOutcome::MessageHidden
                })
            }
            GatewayEvent::ClientErrored { event_name, detail } => {
                let notice = ErrorNotice::new(NoticeSource::Client, event_name, detail);
                self.dispatcher.invoke_action(move |state| state.report(notice))?;
                Ok(RouteOutcome::ErrorReported)
            }
        }
    }

    /// Routes events until `stop` fires or the client closes its stream.
    /// A failed event is reported and the loop keeps going.
    pub async fn run(self, mut events: broadcast::Receiver<GatewayEvent>, stop: CancellationToken) {
        loop {
            let received = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                received = events.recv() => received,
            };
            let event = match received {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event router fell behind; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => {
                    debug!("event stream closed");
                    break;
                }
            };

            let event_name = event.name();
            match self.route(event).await {
                Ok(outcome) => debug!(event = event_name, ?outcome, "event routed"),
                Err(DispatchError::Disconnected) => {
                    warn!("affinity thread is gone; event router exiting");
                    break;
                }
                Err(err) => {
                    warn!(event = event_name, "failed to route event: {err}");
                    let notice = ErrorNotice::handler(event_name, err.to_string());
                    if let Err(err) = self.dispatcher.post(move |state| state.report(notice)) {
                        warn!("failed to report routing failure: {err}");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;

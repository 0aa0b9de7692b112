//! Control-surface core for a chat bot: the affinity dispatcher that owns all
//! operator-visible state, the collections it holds, the session lifecycle
//! and the router that feeds client events into it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::{domain::ChannelId, protocol::GatewayEvent};
use tokio::sync::broadcast;

pub mod collections;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod log_sink;
pub mod loopback;
pub mod router;
pub mod session;
pub mod state;

pub use collections::{ChatCollections, Selection};
pub use config::{load_settings, ClientSettings};
pub use dispatcher::{AffinityThread, Dispatcher, Property};
pub use error::{DispatchError, ErrorNotice, NoticeSource, SelectionError, SessionError};
pub use gateway::GatewayClient;
pub use log_sink::{FileLogSink, LogSink, NullLogSink};
pub use loopback::LoopbackClient;
pub use router::{EventRouter, RouteOutcome};
pub use session::{SessionController, SessionState};
pub use state::SurfaceState;

/// A connection to the chat service, owned by one session.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()>;
    /// Every subscriber sees every event sent after it subscribed.
    fn subscribe_events(&self) -> broadcast::Receiver<GatewayEvent>;
}

/// Builds a fresh client for each session from the operator's token.
pub type ClientFactory = Arc<dyn Fn(&str) -> Arc<dyn ChatClient> + Send + Sync>;

//! In-process chat client used for the offline demo and in tests.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use shared::{
    domain::{ChannelId, ChannelInfo, ChannelKind, Message, MessageId, Server, ServerId},
    protocol::GatewayEvent,
};
use tokio::sync::broadcast;
use tracing::debug;

use crate::ChatClient;

const LOOPBACK_EVENT_BUFFER: usize = 256;

pub struct LoopbackClient {
    bot_name: String,
    servers: Vec<Server>,
    events: broadcast::Sender<GatewayEvent>,
    connected: AtomicBool,
    next_message_id: AtomicU64,
}

impl LoopbackClient {
    pub fn new(bot_name: impl Into<String>, servers: Vec<Server>) -> Self {
        let (events, _) = broadcast::channel(LOOPBACK_EVENT_BUFFER);
        Self {
            bot_name: bot_name.into(),
            servers,
            events,
            connected: AtomicBool::new(false),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// A client announcing two small servers.
    pub fn demo() -> Arc<Self> {
        let text = |id, name: &str, position| ChannelInfo {
            id: ChannelId(id),
            name: name.to_string(),
            kind: ChannelKind::Text,
            position,
        };
        let servers = vec![
            Server::new(ServerId(1), "Operations")
                .with_channel(text(10, "general", 0))
                .with_channel(text(11, "alerts", 1))
                .with_channel(ChannelInfo {
                    id: ChannelId(12),
                    name: "standup".to_string(),
                    kind: ChannelKind::Voice,
                    position: 2,
                }),
            Server::new(ServerId(2), "Playground").with_channel(text(20, "sandbox", 0)),
        ];
        Arc::new(Self::new("demo-bot", servers))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Injects an event as if the remote side had sent it. Returns how many
    /// subscribers received it.
    pub fn emit(&self, event: GatewayEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl ChatClient for LoopbackClient {
    async fn connect(&self) -> Result<()> {
        if self.connected.swap(true, Ordering::AcqRel) {
            bail!("loopback client is already connected");
        }
        for server in &self.servers {
            self.emit(GatewayEvent::GuildAvailable {
                server: server.clone(),
            });
        }
        debug!(servers = self.servers.len(), "loopback connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        if !self.is_connected() {
            bail!("loopback client is not connected");
        }
        let message = Message {
            id: self.next_message_id(),
            channel_id,
            author_name: self.bot_name.clone(),
            author_avatar_url: String::new(),
            content: text.to_string(),
        };
        self.emit(GatewayEvent::MessageCreated { message });
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }
}

//! Websocket chat client speaking the JSON gateway protocol.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use shared::{
    domain::ChannelId,
    protocol::{decode_gateway_frame, GatewayEvent, GatewayRequest},
};
use tokio::{
    net::TcpStream,
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::ChatClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct GatewayConnection {
    writer: SplitSink<WsStream, Message>,
    reader_task: JoinHandle<()>,
}

pub struct GatewayClient {
    gateway_url: Url,
    token: String,
    events: broadcast::Sender<GatewayEvent>,
    connection: Mutex<Option<GatewayConnection>>,
}

impl GatewayClient {
    pub fn new(gateway_url: Url, token: impl Into<String>, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            gateway_url,
            token: token.into(),
            events,
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ChatClient for GatewayClient {
    async fn connect(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            bail!("already connected to {}", self.gateway_url);
        }
        let (stream, _) = connect_async(self.gateway_url.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {}", self.gateway_url))?;
        let (mut writer, reader) = stream.split();

        let identify = encode_request(&GatewayRequest::Identify {
            token: self.token.clone(),
        })?;
        writer
            .send(Message::Text(identify))
            .await
            .context("failed to send identify frame")?;

        let reader_task = tokio::spawn(read_frames(reader, self.events.clone()));
        *connection = Some(GatewayConnection {
            writer,
            reader_task,
        });
        info!(url = %self.gateway_url, "gateway connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(mut connection) = self.connection.lock().await.take() else {
            return Ok(());
        };
        // The reader stops first so our own close handshake is not reported.
        connection.reader_task.abort();
        let closed = connection.writer.send(Message::Close(None)).await;
        match closed {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                info!(url = %self.gateway_url, "gateway disconnected");
                Ok(())
            }
            Err(err) => Err(err).context("failed to close websocket"),
        }
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        let frame = encode_request(&GatewayRequest::SendMessage {
            channel_id,
            content: text.to_string(),
        })?;
        let mut connection = self.connection.lock().await;
        let connection = connection
            .as_mut()
            .ok_or_else(|| anyhow!("not connected to the gateway"))?;
        connection
            .writer
            .send(Message::Text(frame))
            .await
            .context("failed to send message frame")
    }

    fn subscribe_events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }
}

fn encode_request(request: &GatewayRequest) -> Result<String> {
    serde_json::to_string(request).context("failed to encode gateway request")
}

async fn read_frames(mut reader: SplitStream<WsStream>, events: broadcast::Sender<GatewayEvent>) {
    loop {
        let Some(frame) = reader.next().await else {
            let _ = events.send(closed_by_server());
            break;
        };
        match frame {
            Ok(Message::Text(text)) => match decode_gateway_frame(&text) {
                Ok(Some(event)) => {
                    let _ = events.send(event);
                }
                Ok(None) => debug!("ignoring unrecognized gateway frame"),
                Err(err) => {
                    let _ = events.send(GatewayEvent::client_errored(
                        "gateway_frame",
                        format!("invalid gateway frame: {err}"),
                    ));
                }
            },
            Ok(Message::Close(close)) => {
                warn!(?close, "gateway closed the connection");
                let _ = events.send(closed_by_server());
                break;
            }
            Ok(_) => {}
            Err(err) => {
                let _ = events.send(GatewayEvent::client_errored(
                    "gateway_socket",
                    format!("websocket receive failed: {err}"),
                ));
                break;
            }
        }
    }
    debug!("gateway reader finished");
}

fn closed_by_server() -> GatewayEvent {
    GatewayEvent::client_errored("gateway_socket", "connection closed by server")
}

//! Chooses which chat client a session connects with.

use std::sync::Arc;

use client_core::{
    ChatClient, ClientFactory, ClientSettings, FileLogSink, GatewayClient, LogSink,
    LoopbackClient, NullLogSink,
};
use tracing::info;

pub fn client_factory(settings: &ClientSettings, demo: bool) -> anyhow::Result<ClientFactory> {
    if demo {
        info!("using the offline loopback client");
        return Ok(Arc::new(|_token: &str| -> Arc<dyn ChatClient> {
            LoopbackClient::demo()
        }));
    }

    let gateway_url = settings.gateway_url()?;
    let event_buffer = settings.event_buffer;
    info!(url = %gateway_url, "using the websocket gateway client");
    Ok(Arc::new(move |token: &str| -> Arc<dyn ChatClient> {
        Arc::new(GatewayClient::new(gateway_url.clone(), token, event_buffer))
    }))
}

pub fn log_sink(settings: &ClientSettings) -> Arc<dyn LogSink> {
    match settings.chat_log_path() {
        Some(path) => {
            info!(path = %path.display(), "chat log enabled");
            Arc::new(FileLogSink)
        }
        None => Arc::new(NullLogSink),
    }
}

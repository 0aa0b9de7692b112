use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChannelId, Message, Server, ServerId},
    error::GatewayRejection,
};

/// Notifications delivered by a chat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GatewayEvent {
    GuildAvailable { server: Server },
    GuildCreated { server: Server },
    GuildUnavailable { server_id: ServerId },
    GuildDeleted { server_id: ServerId },
    MessageCreated { message: Message },
    ClientErrored { event_name: String, detail: String },
}

impl GatewayEvent {
    pub const KNOWN_TYPES: [&'static str; 6] = [
        "guild_available",
        "guild_created",
        "guild_unavailable",
        "guild_deleted",
        "message_created",
        "client_errored",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GuildAvailable { .. } => "guild_available",
            Self::GuildCreated { .. } => "guild_created",
            Self::GuildUnavailable { .. } => "guild_unavailable",
            Self::GuildDeleted { .. } => "guild_deleted",
            Self::MessageCreated { .. } => "message_created",
            Self::ClientErrored { .. } => "client_errored",
        }
    }

    pub fn client_errored(event_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ClientErrored {
            event_name: event_name.into(),
            detail: detail.into(),
        }
    }
}

/// Frames sent from the client to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GatewayRequest {
    Identify { token: String },
    SendMessage { channel_id: ChannelId, content: String },
}

const REJECTED_FRAME: &str = "rejected";

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Decodes one text frame from the gateway.
///
/// Returns `Ok(None)` for well-formed frames whose type this client does not
/// handle. A `rejected` frame carrying a [`GatewayRejection`] is surfaced as a
/// `ClientErrored` notification.
pub fn decode_gateway_frame(text: &str) -> Result<Option<GatewayEvent>, serde_json::Error> {
    match serde_json::from_str::<GatewayEvent>(text) {
        Ok(event) => Ok(Some(event)),
        Err(err) => {
            let frame: RawFrame = serde_json::from_str(text)?;
            if frame.kind == REJECTED_FRAME {
                let rejection: GatewayRejection = serde_json::from_value(frame.payload)?;
                return Ok(Some(GatewayEvent::client_errored(
                    REJECTED_FRAME,
                    rejection.to_string(),
                )));
            }
            if GatewayEvent::KNOWN_TYPES.contains(&frame.kind.as_str()) {
                return Err(err);
            }
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;

    #[test]
    fn decodes_message_created_frame() {
        let frame = r#"{"type":"message_created","payload":{"message":{"id":99,"channel_id":10,"author_name":"alice","author_avatar_url":"https://cdn.example/a.png","content":"hi"}}}"#;
        let event = decode_gateway_frame(frame)
            .expect("decode")
            .expect("known event");
        match event {
            GatewayEvent::MessageCreated { message } => {
                assert_eq!(message.id, MessageId(99));
                assert_eq!(message.channel_id, ChannelId(10));
                assert_eq!(message.to_string(), "alice: hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_frame_types_are_ignored() {
        let frame = r#"{"type":"typing_started","payload":{"channel_id":10}}"#;
        assert!(decode_gateway_frame(frame).expect("decode").is_none());
    }

    #[test]
    fn malformed_known_frame_is_an_error() {
        let frame = r#"{"type":"guild_deleted","payload":{"server_id":"not-a-number"}}"#;
        assert!(decode_gateway_frame(frame).is_err());
        assert!(decode_gateway_frame("not json").is_err());
    }

    #[test]
    fn rejected_frame_becomes_client_errored() {
        let frame = r#"{"type":"rejected","payload":{"code":"unauthorized","message":"invalid token"}}"#;
        let event = decode_gateway_frame(frame)
            .expect("decode")
            .expect("rejection surfaced");
        match event {
            GatewayEvent::ClientErrored { event_name, detail } => {
                assert_eq!(event_name, "rejected");
                assert_eq!(detail, "Unauthorized: invalid token");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn requests_use_tagged_frames() {
        let frame = serde_json::to_value(GatewayRequest::SendMessage {
            channel_id: ChannelId(10),
            content: "hello".to_string(),
        })
        .expect("encode");
        assert_eq!(frame["type"], "send_message");
        assert_eq!(frame["payload"]["channel_id"], 10);
        assert_eq!(frame["payload"]["content"], "hello");
    }
}

//! Voice relay WebSocket message types.
//!
//! The client-facing protocol is deliberately small: binary frames are audio
//! and are relayed opaquely; JSON text messages carry status and keepalive
//! traffic only.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Incoming JSON control messages from the browser client.
///
/// Anything that fails to parse into one of these is logged and ignored, so
/// newer clients can send message types this server does not know yet.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum VoiceIncomingMessage {
    /// Keepalive probe; answered with `pong`.
    #[serde(rename = "ping")]
    Ping,
}

/// Outgoing JSON status messages to the browser client.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum VoiceOutgoingMessage {
    /// The dialogue session handshake completed; audio may flow.
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
    },

    /// Keepalive reply.
    #[serde(rename = "pong")]
    Pong,

    /// Something went wrong on the dialogue side of the relay.
    #[serde(rename = "error")]
    Error { error: String },

    /// The dialogue service ended the session.
    #[serde(rename = "end")]
    End,
}

/// Routing envelope for the client-socket sender task.
#[derive(Debug)]
pub enum VoiceMessageRoute {
    /// JSON status message.
    Outgoing(VoiceOutgoingMessage),
    /// Raw bytes from the dialogue service, forwarded unmodified.
    Raw(Bytes),
    /// Close the client socket.
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_ping_parses() {
        let msg: VoiceIncomingMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, VoiceIncomingMessage::Ping));
    }

    #[test]
    fn test_unknown_incoming_type_is_an_error() {
        assert!(serde_json::from_str::<VoiceIncomingMessage>(r#"{"type":"mute"}"#).is_err());
    }

    #[test]
    fn test_outgoing_wire_shapes() {
        let connected = serde_json::to_value(VoiceOutgoingMessage::Connected {
            session_id: "abc123".to_string(),
        })
        .unwrap();
        assert_eq!(connected["type"], "connected");
        assert_eq!(connected["sessionId"], "abc123");

        let end = serde_json::to_value(VoiceOutgoingMessage::End).unwrap();
        assert_eq!(end["type"], "end");

        let error = serde_json::to_value(VoiceOutgoingMessage::Error {
            error: "upstream unreachable".to_string(),
        })
        .unwrap();
        assert_eq!(error["error"], "upstream unreachable");
    }
}

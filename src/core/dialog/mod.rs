//! Speech dialogue service integration.
//!
//! This module owns everything that talks to the remote dialogue service:
//!
//! - `protocol` - the binary frame codec (header, events, length-prefixed
//!   sections, gzip/JSON payload handling)
//! - `config` - endpoint, credentials, and timing configuration
//! - `client` - the WebSocket client driving the session handshake and
//!   teardown sequences

pub mod client;
pub mod config;
pub mod protocol;


pub use client::{
    ClosedCallback, ConnectionState, DialogClient, DialogError, DialogResult, ErrorCallback,
    FrameCallback,
};
pub use config::DialogConfig;
pub use protocol::{
    EVENT_CLEAR_AUDIO_CACHE, EVENT_FINISH_CONNECTION, EVENT_FINISH_SESSION,
    EVENT_START_CONNECTION, EVENT_START_SESSION, EVENT_TASK_REQUEST, EVENT_TTS_AUDIO,
    FrameHeader, FramePayload, MessageType, ProtocolError, ServerFrame, audio_request_frame,
    decode_frame, encode_frame,
};

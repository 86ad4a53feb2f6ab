//! Binary frame codec for the speech dialogue service.
//!
//! The dialogue service speaks a custom binary framing protocol over
//! WebSocket. Every frame starts with a 4-byte bit-packed header, followed by
//! optional 4-byte sequence/event words and length-prefixed sections:
//!
//! ```text
//! ┌─────────┬──────────┬─────────────┬──────────┬───────────┐
//! │ header  │ sequence │   event     │ session  │  payload  │
//! │ 4 bytes │ 4 bytes  │   4 bytes   │ len+utf8 │ len+bytes │
//! │         │ (flag)   │   (flag)    │ (opt)    │           │
//! └─────────┴──────────┴─────────────┴──────────┴───────────┘
//! ```
//!
//! Header layout (one nibble each unless noted):
//!
//! - byte 0: protocol version | header size (in 4-byte words)
//! - byte 1: message type | message-type-specific flags
//! - byte 2: serialization method | compression type
//! - byte 3: reserved
//!
//! All multi-byte integers are big-endian. Payloads may be gzip-compressed
//! and/or JSON-serialized per the header nibbles, with one exception: frames
//! carrying the TTS audio event (352) are raw PCM and are never decompressed
//! or reinterpreted, whatever the header claims.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::warn;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Protocol version carried in the high nibble of header byte 0.
pub const PROTOCOL_VERSION: u8 = 0b0001;

// Message types (high nibble of header byte 1).
pub const CLIENT_FULL_REQUEST: u8 = 0b0001;
pub const CLIENT_AUDIO_ONLY_REQUEST: u8 = 0b0010;
pub const SERVER_FULL_RESPONSE: u8 = 0b1001;
pub const SERVER_ACK: u8 = 0b1011;
pub const SERVER_ERROR_RESPONSE: u8 = 0b1111;

// Message-type-specific flags (low nibble of header byte 1).
pub const NEG_SEQUENCE: u8 = 0b0010;
pub const MSG_WITH_EVENT: u8 = 0b0100;

// Serialization methods (high nibble of header byte 2).
pub const NO_SERIALIZATION: u8 = 0b0000;
pub const JSON_SERIALIZATION: u8 = 0b0001;

// Compression types (low nibble of header byte 2).
pub const COMPRESSION_NONE: u8 = 0b0000;
pub const COMPRESSION_GZIP: u8 = 0b0001;

// Event ids used by the dialogue protocol.
pub const EVENT_START_CONNECTION: u32 = 1;
pub const EVENT_FINISH_CONNECTION: u32 = 2;
pub const EVENT_START_SESSION: u32 = 100;
pub const EVENT_FINISH_SESSION: u32 = 102;
pub const EVENT_TASK_REQUEST: u32 = 200;
/// TTS audio chunk from the service. Payload is raw PCM, exempt from all
/// payload post-processing.
pub const EVENT_TTS_AUDIO: u32 = 352;
/// Instruction to drop any buffered TTS audio. Logged, not otherwise handled.
pub const EVENT_CLEAR_AUDIO_CACHE: u32 = 450;

// =============================================================================
// Errors
// =============================================================================

/// Frame codec error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Buffer too short to contain the 4-byte header.
    #[error("malformed frame: shorter than protocol header")]
    MalformedFrame,

    /// A declared section extends past the end of the buffer.
    #[error("truncated frame: {0}")]
    Truncated(&'static str),

    /// Payload compression failed while encoding.
    #[error("payload compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

// =============================================================================
// Frame Header
// =============================================================================

/// The four bit-packed header fields of a frame.
///
/// `Default` matches the header the original client sends on every control
/// frame: full request, event flag set, JSON payload, gzip compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub message_type: u8,
    pub flags: u8,
    pub serialization: u8,
    pub compression: u8,
    pub reserved: u8,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type: CLIENT_FULL_REQUEST,
            flags: MSG_WITH_EVENT,
            serialization: JSON_SERIALIZATION,
            compression: COMPRESSION_GZIP,
            reserved: 0x00,
        }
    }
}

impl FrameHeader {
    /// Encode the header, appending an optional extension section.
    ///
    /// The extension length must be a multiple of 4; the header-size nibble
    /// counts 4-byte words including the fixed header itself.
    pub fn encode(&self, extension: &[u8]) -> Vec<u8> {
        debug_assert!(extension.len() % 4 == 0);

        let header_size = (extension.len() / 4 + 1) as u8;
        let mut buf = Vec::with_capacity(4 + extension.len());
        buf.push((self.version << 4) | (header_size & 0x0f));
        buf.push((self.message_type << 4) | (self.flags & 0x0f));
        buf.push((self.serialization << 4) | (self.compression & 0x0f));
        buf.push(self.reserved);
        buf.extend_from_slice(extension);
        buf
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a full frame.
///
/// Sections are appended in wire order: sequence, event, session id, payload.
/// The payload is gzip-compressed first when the header says so. Presence of
/// `sequence`/`event` must match the header flags; the codec trusts the
/// caller on that.
pub fn encode_frame(
    header: &FrameHeader,
    sequence: Option<u32>,
    event: Option<u32>,
    session_id: Option<&str>,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let body = if header.compression == COMPRESSION_GZIP {
        gzip(payload)?
    } else {
        payload.to_vec()
    };

    let mut buf = header.encode(&[]);
    if let Some(seq) = sequence {
        buf.extend_from_slice(&seq.to_be_bytes());
    }
    if let Some(event) = event {
        buf.extend_from_slice(&event.to_be_bytes());
    }
    if let Some(sid) = session_id {
        buf.extend_from_slice(&(sid.len() as u32).to_be_bytes());
        buf.extend_from_slice(sid.as_bytes());
    }
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// StartConnection (event 1): empty JSON object, no session id.
pub fn start_connection_frame() -> Result<Vec<u8>, ProtocolError> {
    encode_frame(
        &FrameHeader::default(),
        None,
        Some(EVENT_START_CONNECTION),
        None,
        b"{}",
    )
}

/// StartSession (event 100): session-scoped, carries the dialog/audio config.
pub fn start_session_frame(
    session_id: &str,
    payload: &serde_json::Value,
) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(
        &FrameHeader::default(),
        None,
        Some(EVENT_START_SESSION),
        Some(session_id),
        payload.to_string().as_bytes(),
    )
}

/// FinishSession (event 102): empty JSON object, session-scoped.
pub fn finish_session_frame(session_id: &str) -> Result<Vec<u8>, ProtocolError> {
    encode_frame(
        &FrameHeader::default(),
        None,
        Some(EVENT_FINISH_SESSION),
        Some(session_id),
        b"{}",
    )
}

/// FinishConnection (event 2): empty JSON object, no session id.
pub fn finish_connection_frame() -> Result<Vec<u8>, ProtocolError> {
    encode_frame(
        &FrameHeader::default(),
        None,
        Some(EVENT_FINISH_CONNECTION),
        None,
        b"{}",
    )
}

/// Audio task request (event 200): raw PCM chunk, gzip-compressed, no
/// serialization. This is the frame a conforming client produces for each
/// captured audio chunk.
pub fn audio_request_frame(session_id: &str, audio: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let header = FrameHeader {
        message_type: CLIENT_AUDIO_ONLY_REQUEST,
        serialization: NO_SERIALIZATION,
        ..FrameHeader::default()
    };
    encode_frame(
        &header,
        None,
        Some(EVENT_TASK_REQUEST),
        Some(session_id),
        audio,
    )
}

// =============================================================================
// Decoding
// =============================================================================

/// Message type of a decoded server frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    FullResponse,
    Ack,
    ErrorResponse,
    /// Unknown message type; the header is parsed, payload sections are not.
    Other(u8),
}

impl MessageType {
    fn from_nibble(nibble: u8) -> Self {
        match nibble {
            SERVER_FULL_RESPONSE => Self::FullResponse,
            SERVER_ACK => Self::Ack,
            SERVER_ERROR_RESPONSE => Self::ErrorResponse,
            other => Self::Other(other),
        }
    }
}

/// Decoded payload, tagged by how the header said it was serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Empty,
    /// Raw bytes: unserialized payloads and all TTS audio (event 352).
    Binary(Bytes),
    /// Text that was declared serialized but did not parse as JSON.
    Text(String),
    Json(serde_json::Value),
}

impl FramePayload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Raw byte view, if this payload is binary.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }
}

/// A decoded frame from the dialogue service.
#[derive(Debug, Clone)]
pub struct ServerFrame {
    pub message_type: MessageType,
    pub flags: u8,
    pub serialization: u8,
    pub compression: u8,
    pub sequence: Option<u32>,
    pub event: Option<u32>,
    pub session_id: Option<String>,
    /// Error code, present on `ErrorResponse` frames only.
    pub error_code: Option<u32>,
    pub payload: FramePayload,
}

impl ServerFrame {
    /// Whether this frame carries a raw TTS audio chunk.
    pub fn is_audio(&self) -> bool {
        self.event == Some(EVENT_TTS_AUDIO)
    }
}

/// Decode a frame received from the dialogue service.
///
/// The header is read byte-by-byte; nothing relies on struct layout. Unknown
/// message types yield a frame with only the header fields set. Payload
/// post-processing (gunzip, JSON parse) never fails the decode: on error the
/// payload falls back to the less-processed form with a warning.
pub fn decode_frame(data: &[u8]) -> Result<ServerFrame, ProtocolError> {
    if data.len() < 4 {
        return Err(ProtocolError::MalformedFrame);
    }

    let header_size = (data[0] & 0x0f) as usize;
    let message_type = MessageType::from_nibble(data[1] >> 4);
    let flags = data[1] & 0x0f;
    let serialization = data[2] >> 4;
    let compression = data[2] & 0x0f;

    let body = data.get(header_size * 4..).unwrap_or(&[]);
    let mut reader = Reader::new(body);

    let mut frame = ServerFrame {
        message_type,
        flags,
        serialization,
        compression,
        sequence: None,
        event: None,
        session_id: None,
        error_code: None,
        payload: FramePayload::Empty,
    };

    let raw_payload = match message_type {
        MessageType::FullResponse | MessageType::Ack => {
            if flags & NEG_SEQUENCE != 0 {
                frame.sequence = Some(reader.read_u32("sequence")?);
            }
            if flags & MSG_WITH_EVENT != 0 {
                frame.event = Some(reader.read_u32("event")?);
            }
            // A frame may legitimately end here; leave the session and
            // payload sections unset rather than erroring.
            if reader.remaining() >= 4 {
                let sid = reader.read_prefixed("session id")?;
                frame.session_id = Some(String::from_utf8_lossy(&sid).into_owned());
                reader.read_prefixed("payload")?
            } else {
                Vec::new()
            }
        }
        MessageType::ErrorResponse => {
            frame.error_code = Some(reader.read_u32("error code")?);
            reader.read_prefixed("payload")?
        }
        MessageType::Other(nibble) => {
            warn!(message_type = nibble, "unknown message type, header only");
            Vec::new()
        }
    };

    frame.payload = finalize_payload(raw_payload, frame.event, serialization, compression);
    Ok(frame)
}

/// Apply payload post-processing per the header nibbles.
///
/// Event 352 payloads are raw PCM and bypass this entirely.
fn finalize_payload(
    raw: Vec<u8>,
    event: Option<u32>,
    serialization: u8,
    compression: u8,
) -> FramePayload {
    if raw.is_empty() {
        return FramePayload::Empty;
    }
    if event == Some(EVENT_TTS_AUDIO) {
        return FramePayload::Binary(Bytes::from(raw));
    }

    let bytes = if compression == COMPRESSION_GZIP {
        match gunzip(&raw) {
            Ok(inflated) => inflated,
            Err(e) => {
                warn!("payload gunzip failed, keeping raw bytes: {e}");
                raw
            }
        }
    } else {
        raw
    };

    if serialization == JSON_SERIALIZATION {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        match serde_json::from_str(&text) {
            Ok(value) => FramePayload::Json(value),
            Err(e) => {
                warn!("payload JSON parse failed, keeping text: {e}");
                FramePayload::Text(text)
            }
        }
    } else if serialization != NO_SERIALIZATION {
        FramePayload::Text(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        FramePayload::Binary(Bytes::from(bytes))
    }
}

/// Bounds-checked big-endian reader over a frame body.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, ProtocolError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or(ProtocolError::Truncated(what))?;
        self.pos += 4;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_prefixed(&mut self, what: &'static str) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_u32(what)? as usize;
        let bytes = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or(ProtocolError::Truncated(what))?;
        self.pos += len;
        Ok(bytes.to_vec())
    }
}

// =============================================================================
// Gzip helpers
// =============================================================================

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_header(serialization: u8, compression: u8, flags: u8) -> FrameHeader {
        FrameHeader {
            message_type: SERVER_FULL_RESPONSE,
            flags,
            serialization,
            compression,
            ..FrameHeader::default()
        }
    }

    #[test]
    fn test_header_size_invariant() {
        for ext_len in [0usize, 4, 8, 20] {
            let ext = vec![0u8; ext_len];
            let encoded = FrameHeader::default().encode(&ext);
            let header_size = (encoded[0] & 0x0f) as usize;
            assert_eq!(header_size, ext_len / 4 + 1);
            assert_eq!(encoded.len(), header_size * 4);
        }
    }

    #[test]
    fn test_header_nibble_packing() {
        let encoded = FrameHeader::default().encode(&[]);
        assert_eq!(encoded[0] >> 4, PROTOCOL_VERSION);
        assert_eq!(encoded[1] >> 4, CLIENT_FULL_REQUEST);
        assert_eq!(encoded[1] & 0x0f, MSG_WITH_EVENT);
        assert_eq!(encoded[2] >> 4, JSON_SERIALIZATION);
        assert_eq!(encoded[2] & 0x0f, COMPRESSION_GZIP);
        assert_eq!(encoded[3], 0x00);
    }

    #[test]
    fn test_round_trip_json_gzip() {
        let header = server_header(JSON_SERIALIZATION, COMPRESSION_GZIP, MSG_WITH_EVENT);
        let payload = json!({"dialog": {"bot_name": "assistant"}});
        let encoded = encode_frame(
            &header,
            None,
            Some(EVENT_START_SESSION),
            Some("abc123"),
            payload.to_string().as_bytes(),
        )
        .unwrap();

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.message_type, MessageType::FullResponse);
        assert_eq!(frame.event, Some(EVENT_START_SESSION));
        assert_eq!(frame.sequence, None);
        assert_eq!(frame.session_id.as_deref(), Some("abc123"));
        assert_eq!(frame.payload, FramePayload::Json(payload));
    }

    #[test]
    fn test_round_trip_with_sequence() {
        let header = server_header(
            JSON_SERIALIZATION,
            COMPRESSION_NONE,
            NEG_SEQUENCE | MSG_WITH_EVENT,
        );
        let encoded = encode_frame(&header, Some(7), Some(450), Some("s"), b"{}").unwrap();

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.sequence, Some(7));
        assert_eq!(frame.event, Some(EVENT_CLEAR_AUDIO_CACHE));
        assert_eq!(frame.payload, FramePayload::Json(json!({})));
    }

    #[test]
    fn test_round_trip_no_flags_binary() {
        // No sequence, no event, unserialized, uncompressed.
        let header = server_header(NO_SERIALIZATION, COMPRESSION_NONE, 0);
        let encoded = encode_frame(&header, None, None, Some("sid"), &[1, 2, 3]).unwrap();

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.sequence, None);
        assert_eq!(frame.event, None);
        assert_eq!(frame.session_id.as_deref(), Some("sid"));
        assert_eq!(
            frame.payload,
            FramePayload::Binary(Bytes::from_static(&[1, 2, 3]))
        );
    }

    #[test]
    fn test_ack_round_trip() {
        let header = FrameHeader {
            message_type: SERVER_ACK,
            flags: MSG_WITH_EVENT,
            serialization: NO_SERIALIZATION,
            compression: COMPRESSION_NONE,
            ..FrameHeader::default()
        };
        let encoded = encode_frame(&header, None, Some(200), Some("sid"), b"ok").unwrap();
        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.message_type, MessageType::Ack);
        assert_eq!(frame.event, Some(EVENT_TASK_REQUEST));
    }

    #[test]
    fn test_audio_event_exempt_from_post_processing() {
        // Header lies: claims gzip + JSON. Event 352 payload must come back
        // byte-for-byte regardless.
        let pcm: Vec<u8> = (0..=255).collect();
        let header = server_header(
            JSON_SERIALIZATION,
            COMPRESSION_NONE, // compression applied at encode must be None to control bytes
            MSG_WITH_EVENT,
        );
        let mut encoded =
            encode_frame(&header, None, Some(EVENT_TTS_AUDIO), Some("sid"), &pcm).unwrap();
        // Flip the declared compression to gzip without recompressing.
        encoded[2] = (JSON_SERIALIZATION << 4) | COMPRESSION_GZIP;

        let frame = decode_frame(&encoded).unwrap();
        assert!(frame.is_audio());
        assert_eq!(
            frame.payload,
            FramePayload::Binary(Bytes::from(pcm)),
            "audio payload must not be gunzipped or parsed"
        );
    }

    #[test]
    fn test_malformed_short_buffers() {
        for len in 0..4usize {
            let buf = vec![0u8; len];
            match decode_frame(&buf) {
                Err(ProtocolError::MalformedFrame) => {}
                other => panic!("expected MalformedFrame for len {len}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_error_response_decode() {
        let header = FrameHeader {
            message_type: SERVER_ERROR_RESPONSE,
            flags: 0,
            serialization: JSON_SERIALIZATION,
            compression: COMPRESSION_GZIP,
            ..FrameHeader::default()
        };
        // Error frames carry a 4-byte code before the payload and no session id.
        let body = json!({"error": "quota exceeded"});
        let compressed = gzip(body.to_string().as_bytes()).unwrap();
        let mut encoded = header.encode(&[]);
        encoded.extend_from_slice(&45000000u32.to_be_bytes());
        encoded.extend_from_slice(&(compressed.len() as u32).to_be_bytes());
        encoded.extend_from_slice(&compressed);

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.message_type, MessageType::ErrorResponse);
        assert_eq!(frame.error_code, Some(45000000));
        assert_eq!(frame.session_id, None);
        assert_eq!(frame.payload, FramePayload::Json(body));
    }

    #[test]
    fn test_unknown_message_type_header_only() {
        let header = FrameHeader {
            message_type: 0b0111,
            flags: MSG_WITH_EVENT,
            serialization: JSON_SERIALIZATION,
            compression: COMPRESSION_GZIP,
            ..FrameHeader::default()
        };
        let encoded = encode_frame(&header, None, Some(1), None, b"{}").unwrap();

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.message_type, MessageType::Other(0b0111));
        assert_eq!(frame.event, None);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_gunzip_failure_falls_back_to_raw() {
        // Declared gzip but payload is not a gzip stream.
        let header = server_header(NO_SERIALIZATION, COMPRESSION_NONE, MSG_WITH_EVENT);
        let mut encoded = encode_frame(&header, None, Some(500), Some("sid"), b"not-gzip").unwrap();
        encoded[2] = (NO_SERIALIZATION << 4) | COMPRESSION_GZIP;

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(
            frame.payload,
            FramePayload::Binary(Bytes::from_static(b"not-gzip"))
        );
    }

    #[test]
    fn test_json_parse_failure_falls_back_to_text() {
        let header = server_header(JSON_SERIALIZATION, COMPRESSION_NONE, MSG_WITH_EVENT);
        let encoded = encode_frame(&header, None, Some(500), Some("sid"), b"not json {").unwrap();

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.payload, FramePayload::Text("not json {".to_string()));
    }

    #[test]
    fn test_truncated_session_section() {
        let header = server_header(NO_SERIALIZATION, COMPRESSION_NONE, 0);
        let mut encoded = header.encode(&[]);
        // Declare an 8-byte session id but provide only 2 bytes.
        encoded.extend_from_slice(&8u32.to_be_bytes());
        encoded.extend_from_slice(b"ab");

        match decode_frame(&encoded) {
            Err(ProtocolError::Truncated(_)) => {}
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_ending_after_event_is_not_an_error() {
        // Full response with event only, no session/payload sections.
        let header = server_header(NO_SERIALIZATION, COMPRESSION_NONE, MSG_WITH_EVENT);
        let mut encoded = header.encode(&[]);
        encoded.extend_from_slice(&EVENT_TTS_AUDIO.to_be_bytes());

        let frame = decode_frame(&encoded).unwrap();
        assert_eq!(frame.event, Some(EVENT_TTS_AUDIO));
        assert_eq!(frame.session_id, None);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_audio_request_frame_shape() {
        let pcm = vec![0u8; 3200];
        let encoded = audio_request_frame("abc123", &pcm).unwrap();

        assert_eq!(encoded[1] >> 4, CLIENT_AUDIO_ONLY_REQUEST);
        assert_eq!(encoded[2] >> 4, NO_SERIALIZATION);
        assert_eq!(encoded[2] & 0x0f, COMPRESSION_GZIP);
        // Event word follows the 4-byte header.
        let event = u32::from_be_bytes([encoded[4], encoded[5], encoded[6], encoded[7]]);
        assert_eq!(event, EVENT_TASK_REQUEST);
        // Session id section follows the event.
        let sid_len = u32::from_be_bytes([encoded[8], encoded[9], encoded[10], encoded[11]]);
        assert_eq!(sid_len, 6);
        assert_eq!(&encoded[12..18], b"abc123");
        // Compressed payload round-trips to the original PCM.
        let payload_len =
            u32::from_be_bytes([encoded[18], encoded[19], encoded[20], encoded[21]]) as usize;
        assert_eq!(encoded.len(), 22 + payload_len);
        assert_eq!(gunzip(&encoded[22..]).unwrap(), pcm);
    }

    #[test]
    fn test_control_frame_events() {
        for (frame, event, has_sid) in [
            (start_connection_frame().unwrap(), EVENT_START_CONNECTION, false),
            (
                start_session_frame("s", &json!({})).unwrap(),
                EVENT_START_SESSION,
                true,
            ),
            (finish_session_frame("s").unwrap(), EVENT_FINISH_SESSION, true),
            (finish_connection_frame().unwrap(), EVENT_FINISH_CONNECTION, false),
        ] {
            let got = u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]);
            assert_eq!(got, event);
            if has_sid {
                let sid_len = u32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]);
                assert_eq!(sid_len, 1);
            }
        }
    }
}

//! Dialogue service configuration.
//!
//! Connection settings for the remote speech-dialogue service: endpoint,
//! per-request auth headers, the audio format requested at session start, and
//! the timing constants driving the handshake and teardown sequences.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use serde_json::json;

/// Default dialogue service endpoint.
pub const DEFAULT_DIALOG_URL: &str = "wss://openspeech.bytedance.com/api/v3/realtime/dialogue";

/// Gap between StartConnection and StartSession. The service does not expose
/// an explicit StartConnection ack, so the sequencing is delay-based.
pub const DEFAULT_HANDSHAKE_DELAY_MS: u64 = 500;

/// Gap between each teardown step (FinishSession, FinishConnection, close).
pub const DEFAULT_TEARDOWN_STEP_DELAY_MS: u64 = 100;

/// Upper bound on establishing the outbound WebSocket.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// TTS output sample rate requested at session start.
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Configuration for the outbound dialogue connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// WebSocket endpoint of the dialogue service.
    pub url: String,

    /// Application id (`X-Api-App-ID`).
    pub app_id: String,
    /// Access key (`X-Api-Access-Key`).
    pub access_key: String,
    /// Resource id (`X-Api-Resource-Id`).
    pub resource_id: String,
    /// Application key (`X-Api-App-Key`).
    pub app_key: String,

    /// Bot persona name sent in the StartSession payload.
    pub bot_name: String,
    /// TTS output sample rate (Hz).
    pub output_sample_rate: u32,

    /// StartConnection → StartSession gap in milliseconds.
    pub handshake_delay_ms: u64,
    /// Delay between teardown steps in milliseconds.
    pub teardown_step_delay_ms: u64,
    /// Outbound connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DIALOG_URL.to_string(),
            app_id: String::new(),
            access_key: String::new(),
            resource_id: "volc.speech.dialog".to_string(),
            app_key: String::new(),
            bot_name: "assistant".to_string(),
            output_sample_rate: DEFAULT_OUTPUT_SAMPLE_RATE,
            handshake_delay_ms: DEFAULT_HANDSHAKE_DELAY_MS,
            teardown_step_delay_ms: DEFAULT_TEARDOWN_STEP_DELAY_MS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DialogConfig {
    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }

    pub fn teardown_step_delay(&self) -> Duration {
        Duration::from_millis(self.teardown_step_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// StartSession payload: requested TTS audio format plus the bot persona.
    pub fn start_session_payload(&self) -> serde_json::Value {
        json!({
            "tts": {
                "audio_config": {
                    "channel": 1,
                    "format": "pcm",
                    "sample_rate": self.output_sample_rate,
                }
            },
            "dialog": {
                "bot_name": self.bot_name,
            }
        })
    }
}

/// Fresh per-connection id: millisecond timestamp plus a random suffix.
pub fn generate_connect_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{millis}{}", &suffix[..9])
}

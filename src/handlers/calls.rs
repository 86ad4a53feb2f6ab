//! Call control endpoints.
//!
//! REST collaborators of the relay: the start endpoint mints a session id and
//! tells the client where to open the relay WebSocket; the end endpoint
//! records the outcome of a finished call. Neither endpoint touches the
//! WebSocket pair — socket lifecycle belongs to the relay handler alone.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{Json, extract::State, http::HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

// =============================================================================
// Start call
// =============================================================================

/// Requested audio quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    Medium,
    High,
}

impl AudioQuality {
    /// (input, output) sample rates in Hz.
    fn sample_rates(self) -> (u32, u32) {
        match self {
            AudioQuality::Low => (8000, 16000),
            AudioQuality::Medium => (16000, 24000),
            AudioQuality::High => (24000, 24000),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartCallRequest {
    pub audio_quality: Option<AudioQuality>,
    pub silence_detection: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallResponse {
    pub success: bool,
    pub session_id: String,
    pub ws_url: String,
    pub config: CallConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallConfig {
    pub silence_threshold: f64,
    pub audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub channels: u32,
    pub format: String,
}

/// `POST /api/voice/start` — mint a call session.
///
/// Returns the relay WebSocket URL (scheme matched to how this server is
/// serving) plus the audio configuration the client should capture with.
pub async fn start_call(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<StartCallRequest>,
) -> AppResult<Json<StartCallResponse>> {
    let quality = request.audio_quality.unwrap_or(AudioQuality::Medium);
    let silence_detection = request.silence_detection.unwrap_or(true);

    let session_id = Uuid::new_v4().to_string();

    let host = headers
        .get(http::header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.address());
    let scheme = if state.config.is_tls_enabled() {
        "wss"
    } else {
        "ws"
    };
    let ws_url = format!("{scheme}://{host}/api/voice/realtime?sessionId={session_id}");

    let (input_sample_rate, output_sample_rate) = quality.sample_rates();

    state.calls.register(&session_id);
    info!(%session_id, ?quality, %ws_url, "call session created");

    Ok(Json(StartCallResponse {
        success: true,
        session_id,
        ws_url,
        config: CallConfig {
            silence_threshold: if silence_detection { 0.01 } else { 0.0 },
            audio_config: AudioConfig {
                input_sample_rate,
                output_sample_rate,
                channels: 1,
                format: "pcm".to_string(),
            },
        },
    }))
}

// =============================================================================
// Capabilities
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesResponse {
    pub available: bool,
    pub audio_qualities: Vec<QualityInfo>,
    pub features: Features,
    pub limits: Limits,
}

#[derive(Debug, Serialize)]
pub struct QualityInfo {
    pub id: AudioQuality,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub silence_detection: bool,
    pub realtime_transcript: bool,
    pub audio_visualization: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub max_call_duration: u64,
    pub max_concurrent_calls: u32,
}

/// `GET /api/voice/start` — advertise voice-call capabilities.
pub async fn voice_capabilities(
    State(state): State<Arc<AppState>>,
) -> Json<CapabilitiesResponse> {
    Json(CapabilitiesResponse {
        available: state.config.dialog_configured(),
        audio_qualities: vec![
            QualityInfo {
                id: AudioQuality::Low,
                name: "Low".to_string(),
                description: "8kHz input, minimal bandwidth".to_string(),
            },
            QualityInfo {
                id: AudioQuality::Medium,
                name: "Medium".to_string(),
                description: "16kHz input, recommended".to_string(),
            },
            QualityInfo {
                id: AudioQuality::High,
                name: "High".to_string(),
                description: "24kHz input, best quality".to_string(),
            },
        ],
        features: Features {
            silence_detection: true,
            realtime_transcript: true,
            audio_visualization: true,
        },
        limits: Limits {
            max_call_duration: state.config.max_call_duration_ms,
            max_concurrent_calls: state.config.max_concurrent_calls,
        },
    })
}

// =============================================================================
// End call
// =============================================================================

/// Why a call ended, as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    UserHangup,
    Timeout,
    SilenceTimeout,
    Error,
}

impl EndReason {
    fn message(self) -> &'static str {
        match self {
            EndReason::UserHangup => "call ended normally",
            EndReason::Timeout => "call ended after timeout",
            EndReason::SilenceTimeout => "call ended after prolonged silence",
            EndReason::Error => "call ended due to an error",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndCallRequest {
    pub session_id: Option<String>,
    pub reason: Option<EndReason>,
    pub duration: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndCallResponse {
    pub success: bool,
    pub message: String,
    pub session_summary: SessionSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub duration: u64,
    pub end_reason: EndReason,
    /// Unix epoch milliseconds.
    pub timestamp: u64,
}

/// `POST /api/voice/end` — record the outcome of a call.
///
/// Bookkeeping only: the relay tears sockets down on its own when either
/// side disconnects.
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EndCallRequest>,
) -> AppResult<Json<EndCallResponse>> {
    let session_id = request
        .session_id
        .filter(|sid| !sid.is_empty())
        .ok_or_else(|| AppError::BadRequest("session id is required".to_string()))?;

    let reason = request.reason.unwrap_or(EndReason::UserHangup);
    let duration = request.duration.unwrap_or(0);

    state.calls.remove(&session_id);
    info!(%session_id, ?reason, duration_ms = duration, "call session ended");

    Ok(Json(EndCallResponse {
        success: true,
        message: reason.message().to_string(),
        session_summary: SessionSummary {
            session_id,
            duration,
            end_reason: reason,
            timestamp: epoch_millis(),
        },
    }))
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_sample_rates() {
        assert_eq!(AudioQuality::Low.sample_rates(), (8000, 16000));
        assert_eq!(AudioQuality::Medium.sample_rates(), (16000, 24000));
        assert_eq!(AudioQuality::High.sample_rates(), (24000, 24000));
    }

    #[test]
    fn test_start_request_defaults() {
        let request: StartCallRequest = serde_json::from_str("{}").unwrap();
        assert!(request.audio_quality.is_none());
        assert!(request.silence_detection.is_none());
    }

    #[test]
    fn test_end_reason_wire_format() {
        let reason: EndReason = serde_json::from_str(r#""user_hangup""#).unwrap();
        assert_eq!(reason, EndReason::UserHangup);
        let reason: EndReason = serde_json::from_str(r#""silence_timeout""#).unwrap();
        assert_eq!(reason, EndReason::SilenceTimeout);
    }
}

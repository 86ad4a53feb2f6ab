//! Dialogue service WebSocket client.
//!
//! Owns the outbound socket to the speech-dialogue service and drives the
//! protocol handshake required before audio can flow:
//!
//! 1. connect (vendor auth headers, fresh connect id)
//! 2. StartConnection (event 1)
//! 3. configured delay — the service exposes no StartConnection ack
//! 4. StartSession (event 100, session-scoped)
//! 5. session marked ready
//!
//! Incoming frames are decoded for logging only and handed to the registered
//! frame callback together with the untouched wire bytes; the relay stays
//! transparent for server → client traffic. Teardown is a strict sequence
//! (FinishSession → FinishConnection → close) with a configured gap between
//! steps; a failed step is logged and never blocks the next one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use super::config::{DialogConfig, generate_connect_id};
use super::protocol::{
    self, EVENT_CLEAR_AUDIO_CACHE, MessageType, ProtocolError, ServerFrame,
};

/// Channel capacity for outbound WebSocket messages.
const WS_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Errors
// =============================================================================

/// Dialogue client error.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    /// Connection to the dialogue service failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// A handshake step failed at the transport level
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Operation timed out
    #[error("timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("not connected")]
    NotConnected,

    /// Frame codec error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type DialogResult<T> = Result<T, DialogError>;

// =============================================================================
// Callbacks
// =============================================================================

/// Called for every message received from the service: the untouched wire
/// bytes plus the decoded view when decoding succeeded.
pub type FrameCallback = Arc<
    dyn Fn(Bytes, Option<ServerFrame>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
>;

/// Called when the remote socket reports an error.
pub type ErrorCallback =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Called once when the remote socket is gone, however it went.
pub type ClosedCallback = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of a dialogue session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection attempted yet.
    Idle,
    /// Outbound socket being established.
    Connecting,
    /// StartConnection sent, waiting out the handshake delay.
    ConnectionStarted,
    /// StartSession sent; audio may flow.
    SessionStarted,
    /// Finish sequence in progress.
    Ending,
    /// Socket gone, session over.
    Closed,
}

// =============================================================================
// DialogClient
// =============================================================================

/// WebSocket client for one dialogue session.
///
/// One instance per relay session; the instance owns its socket and its
/// spawned socket task for the session's lifetime. All mutable state is
/// behind `Arc` so the socket task and the relay handler share it safely.
pub struct DialogClient {
    config: DialogConfig,
    session_id: String,

    /// Remote socket is up.
    connected: Arc<AtomicBool>,
    /// StartConnection and StartSession have both been sent.
    ready: Arc<AtomicBool>,
    /// Coarse lifecycle state, for introspection and logging.
    state: Arc<RwLock<ConnectionState>>,

    ws_sender: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
    connection_handle: Arc<Mutex<Option<JoinHandle<()>>>>,

    frame_callback: Arc<Mutex<Option<FrameCallback>>>,
    error_callback: Arc<Mutex<Option<ErrorCallback>>>,
    closed_callback: Arc<Mutex<Option<ClosedCallback>>>,
}

impl DialogClient {
    pub fn new(config: DialogConfig, session_id: String) -> Self {
        Self {
            config,
            session_id,
            connected: Arc::new(AtomicBool::new(false)),
            ready: Arc::new(AtomicBool::new(false)),
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            ws_sender: Arc::new(Mutex::new(None)),
            connection_handle: Arc::new(Mutex::new(None)),
            frame_callback: Arc::new(Mutex::new(None)),
            error_callback: Arc::new(Mutex::new(None)),
            closed_callback: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Remote socket is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Protocol handshake has completed; audio may be forwarded.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Register the frame callback. Must happen before `connect`.
    pub async fn on_frame(&self, callback: FrameCallback) {
        *self.frame_callback.lock().await = Some(callback);
    }

    /// Register the error callback. Must happen before `connect`.
    pub async fn on_error(&self, callback: ErrorCallback) {
        *self.error_callback.lock().await = Some(callback);
    }

    /// Register the closed callback. Must happen before `connect`.
    pub async fn on_closed(&self, callback: ClosedCallback) {
        *self.closed_callback.lock().await = Some(callback);
    }

    /// Connect to the dialogue service and run the session handshake.
    ///
    /// On success the session is ready and audio may be forwarded. A
    /// transport failure at any step aborts initialization; the session is
    /// never marked ready in that case.
    pub async fn connect(&self) -> DialogResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let request = self.build_request()?;
        info!(session_id = %self.session_id, url = %self.config.url, "connecting to dialogue service");
        *self.state.write().await = ConnectionState::Connecting;

        let (ws_stream, _response) = timeout(
            self.config.connect_timeout(),
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| DialogError::Timeout("dialogue service connect".to_string()))?
        .map_err(|e| DialogError::ConnectionFailed(e.to_string()))?;

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let (tx, mut rx) = mpsc::channel::<Message>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock().await = Some(tx);
        self.connected.store(true, Ordering::SeqCst);

        let frame_cb = self.frame_callback.clone();
        let error_cb = self.error_callback.clone();
        let closed_cb = self.closed_callback.clone();
        let connected = self.connected.clone();
        let ready = self.ready.clone();
        let state = self.state.clone();
        let ws_sender = self.ws_sender.clone();
        let session_id = self.session_id.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(msg) = outgoing else {
                            // Sender dropped: local teardown finished.
                            break;
                        };
                        if let Err(e) = ws_sink.send(msg).await {
                            warn!(session_id = %session_id, "dialogue send failed: {e}");
                            if let Some(cb) = error_cb.lock().await.as_ref() {
                                cb(e.to_string()).await;
                            }
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Binary(data))) => {
                                let parsed = inspect_frame(&session_id, &data);
                                if let Some(cb) = frame_cb.lock().await.as_ref() {
                                    cb(data, parsed).await;
                                }
                            }
                            Some(Ok(Message::Text(text))) => {
                                // The service is binary-framed; pass text
                                // through opaquely like everything else.
                                debug!(session_id = %session_id, "text message from dialogue service");
                                if let Some(cb) = frame_cb.lock().await.as_ref() {
                                    cb(Bytes::from(text.as_bytes().to_vec()), None).await;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    warn!(session_id = %session_id, "pong failed: {e}");
                                }
                            }
                            Some(Ok(Message::Close(close))) => {
                                info!(session_id = %session_id, ?close, "dialogue service closed the connection");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(session_id = %session_id, "dialogue socket error: {e}");
                                if let Some(cb) = error_cb.lock().await.as_ref() {
                                    cb(e.to_string()).await;
                                }
                                break;
                            }
                            None => {
                                info!(session_id = %session_id, "dialogue stream ended");
                                break;
                            }
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            ready.store(false, Ordering::SeqCst);
            *state.write().await = ConnectionState::Closed;
            *ws_sender.lock().await = None;
            if let Some(cb) = closed_cb.lock().await.as_ref() {
                cb().await;
            }
            debug!(session_id = %session_id, "dialogue socket task ended");
        });

        *self.connection_handle.lock().await = Some(handle);

        self.run_handshake().await
    }

    /// StartConnection → delay → StartSession, then mark the session ready.
    async fn run_handshake(&self) -> DialogResult<()> {
        self.send_frame(protocol::start_connection_frame()?)
            .await
            .map_err(|e| DialogError::HandshakeFailed(format!("StartConnection: {e}")))?;
        *self.state.write().await = ConnectionState::ConnectionStarted;
        debug!(session_id = %self.session_id, "sent StartConnection");

        tokio::time::sleep(self.config.handshake_delay()).await;

        if !self.is_connected() {
            return Err(DialogError::HandshakeFailed(
                "connection lost before StartSession".to_string(),
            ));
        }

        let payload = self.config.start_session_payload();
        self.send_frame(protocol::start_session_frame(&self.session_id, &payload)?)
            .await
            .map_err(|e| DialogError::HandshakeFailed(format!("StartSession: {e}")))?;
        debug!(session_id = %self.session_id, "sent StartSession");

        self.ready.store(true, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::SessionStarted;
        info!(session_id = %self.session_id, "dialogue session ready");
        Ok(())
    }

    /// Forward an already-framed client message verbatim.
    pub async fn forward(&self, data: Bytes) -> DialogResult<()> {
        if !self.is_connected() {
            return Err(DialogError::NotConnected);
        }
        self.send_raw(Message::Binary(data)).await
    }

    /// Orderly teardown: FinishSession → FinishConnection → close, with the
    /// configured gap between steps. Send failures are logged and never
    /// prevent the subsequent steps; each step re-checks that the socket is
    /// still there before sending.
    pub async fn shutdown(&self) {
        let step_delay = self.config.teardown_step_delay();
        *self.state.write().await = ConnectionState::Ending;

        if self.is_connected() {
            match protocol::finish_session_frame(&self.session_id) {
                Ok(frame) => {
                    if let Err(e) = self.send_frame(frame).await {
                        warn!(session_id = %self.session_id, "FinishSession send failed: {e}");
                    }
                }
                Err(e) => warn!(session_id = %self.session_id, "FinishSession encode failed: {e}"),
            }
        }

        tokio::time::sleep(step_delay).await;

        if self.is_connected() {
            match protocol::finish_connection_frame() {
                Ok(frame) => {
                    if let Err(e) = self.send_frame(frame).await {
                        warn!(session_id = %self.session_id, "FinishConnection send failed: {e}");
                    }
                }
                Err(e) => warn!(session_id = %self.session_id, "FinishConnection encode failed: {e}"),
            }
        }

        tokio::time::sleep(step_delay).await;

        self.close().await;
    }

    /// Close the remote socket without the finish sequence. Used when the
    /// client socket errored out and there is nothing left to flush.
    pub async fn abort(&self) {
        *self.ws_sender.lock().await = None;
        if let Some(handle) = self.connection_handle.lock().await.take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Closed;
    }

    /// Ask the socket task to close the connection and wind down.
    async fn close(&self) {
        // Take the sender so the lock is not held across the send; dropping
        // it afterwards lets the socket task finish once the close frame is
        // flushed.
        let sender = self.ws_sender.lock().await.take();
        if let Some(sender) = sender {
            let _ = sender.send(Message::Close(None)).await;
        }
    }

    async fn send_frame(&self, frame: Vec<u8>) -> DialogResult<()> {
        self.send_raw(Message::Binary(frame.into())).await
    }

    async fn send_raw(&self, msg: Message) -> DialogResult<()> {
        let sender = self
            .ws_sender
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(DialogError::NotConnected)?;
        sender.send(msg).await.map_err(|_| DialogError::NotConnected)
    }

    /// Build the upgrade request with the vendor auth headers.
    fn build_request(&self) -> DialogResult<http::Request<()>> {
        let url = url::Url::parse(&self.config.url)
            .map_err(|e| DialogError::ConnectionFailed(format!("invalid dialogue url: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| DialogError::ConnectionFailed("dialogue url has no host".to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        http::Request::builder()
            .uri(self.config.url.as_str())
            .header("X-Api-App-ID", &self.config.app_id)
            .header("X-Api-Access-Key", &self.config.access_key)
            .header("X-Api-Resource-Id", &self.config.resource_id)
            .header("X-Api-App-Key", &self.config.app_key)
            .header("X-Api-Connect-Id", generate_connect_id())
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| DialogError::ConnectionFailed(e.to_string()))
    }
}

/// Decode a service frame for logging. Returns the parsed view when decoding
/// succeeds; the caller forwards the raw bytes either way.
fn inspect_frame(session_id: &str, data: &Bytes) -> Option<ServerFrame> {
    match protocol::decode_frame(data) {
        Ok(frame) => {
            if frame.is_audio() {
                debug!(session_id, len = data.len(), "audio chunk from dialogue service");
            } else if frame.event == Some(EVENT_CLEAR_AUDIO_CACHE) {
                info!(session_id, "dialogue service requested audio cache clear");
            } else if frame.message_type == MessageType::ErrorResponse {
                warn!(
                    session_id,
                    code = frame.error_code,
                    "error frame from dialogue service"
                );
            } else {
                debug!(session_id, event = ?frame.event, ?frame.message_type, "dialogue frame");
            }
            Some(frame)
        }
        Err(e) => {
            warn!(session_id, "undecodable frame from dialogue service: {e}");
            None
        }
    }
}

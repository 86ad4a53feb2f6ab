pub mod dialog;

// Re-export commonly used types for convenience
pub use dialog::{
    ConnectionState, DialogClient, DialogConfig, DialogError, DialogResult, FramePayload,
    MessageType, ProtocolError, ServerFrame,
};

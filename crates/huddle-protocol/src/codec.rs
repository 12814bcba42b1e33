//! Codec for encoding and decoding Huddle events.
//!
//! Events travel as JSON text frames over the realtime transport. The codec
//! enforces a size ceiling on inbound frames so a single client cannot feed
//! the server unbounded payloads.

use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Maximum inbound event size (64 KiB).
pub const MAX_EVENT_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound event exceeds maximum size.
    #[error("Event size {0} exceeds maximum {MAX_EVENT_SIZE}")]
    EventTooLarge(usize),

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding error.
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a server event to a JSON text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Decode a client event from a JSON text frame.
///
/// # Errors
///
/// Returns an error if the frame is too large or not a known event.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    if text.len() > MAX_EVENT_SIZE {
        return Err(ProtocolError::EventTooLarge(text.len()));
    }
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

/// Encode a client event to a JSON text frame.
///
/// Servers never send these; this exists for test harnesses and clients.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_client(event: &ClientEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Decode a server event from a JSON text frame.
///
/// # Errors
///
/// Returns an error if the frame is not a known event.
pub fn decode_server(text: &str) -> Result<ServerEvent, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

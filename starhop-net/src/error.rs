//! Network error types

use starhop_core::CoreError;
use starhop_search::ControllerError;
use thiserror::Error;

/// Errors raised while speaking the game protocol
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("expected {expected}, got {got}")]
    Unexpected { expected: &'static str, got: String },

    #[error("host is not accepting players")]
    Rejected,

    #[error("host did not understand the handshake")]
    BadHandshake,

    #[error("no legal move for player {0}")]
    NoLegalMove(usize),

    #[error("search failed: {0}")]
    Search(#[from] ControllerError),

    #[error("bad game setup: {0}")]
    Setup(#[from] CoreError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

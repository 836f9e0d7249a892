//! STARHOP Net - game host and agent client over TCP
//!
//! This crate provides the networked game:
//! - Line-delimited JSON protocol
//! - Authoritative host (ids, turn order, move validation, wins)
//! - Agent client driving a background search tree

pub mod agent;
pub mod error;
pub mod host;
pub mod protocol;

pub use agent::{Agent, GameSummary};
pub use error::ProtocolError;
pub use host::{run_host, serve, GameReport, HostConfig};
pub use protocol::{Connection, Message, DEFAULT_PORT, HELLO_TOKEN};

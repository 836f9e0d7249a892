//! Wire protocol
//!
//! Every message is one JSON object per line, `{"msg": <tag>, "payload": ...}`.
//! Messages without a payload omit the field.

use serde::{Deserialize, Serialize};
use starhop_core::{Board, HopChain};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::ProtocolError;

/// Token a client must send with `hello`
pub const HELLO_TOKEN: u32 = 12345;

/// Default host port
pub const DEFAULT_PORT: u16 = 41047;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", content = "payload", rename_all = "snake_case")]
pub enum Message {
    /// Client handshake carrying [`HELLO_TOKEN`]
    Hello(u32),
    AssignId(usize),
    /// Host is not accepting players
    No,
    /// Host did not understand the handshake
    What,
    /// Player 1 asks the host to start the game
    Ready(bool),
    BoardInit(Board),
    StartingPlayer(usize),
    RequestMove,
    MakeMove(HopChain),
    /// A move the host accepted, sent to everyone
    Move(HopChain),
    GameOver,
}

impl Message {
    /// Wire tag, for logs and errors
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Hello(_) => "hello",
            Message::AssignId(_) => "assign_id",
            Message::No => "no",
            Message::What => "what",
            Message::Ready(_) => "ready",
            Message::BoardInit(_) => "board_init",
            Message::StartingPlayer(_) => "starting_player",
            Message::RequestMove => "request_move",
            Message::MakeMove(_) => "make_move",
            Message::Move(_) => "move",
            Message::GameOver => "game_over",
        }
    }

    /// Error for a message that arrived out of turn
    pub fn unexpected(self, expected: &'static str) -> ProtocolError {
        ProtocolError::Unexpected {
            expected,
            got: self.tag().to_string(),
        }
    }
}

// ============================================================================
// LINE CODEC
// ============================================================================

pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode(line: &str) -> Result<Message, ProtocolError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Read the next message; `None` at end of stream. Blank lines are skipped.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, ProtocolError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return decode(&line).map(Some);
        }
    }
}

pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(encode(message)?.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// CONNECTION
// ============================================================================

/// Buffered message stream over one TCP connection
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Bytes of a line not yet terminated
    pending: String,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Self {
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
            pending: String::new(),
        }
    }

    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    /// Next message; `None` once the peer has closed the stream
    ///
    /// Cancel safe: a partly read line stays buffered for the next call, so
    /// this can race a timer in `tokio::select!`.
    pub async fn recv(&mut self) -> Result<Option<Message>, ProtocolError> {
        loop {
            if self.reader.read_line(&mut self.pending).await? == 0 {
                return Ok(None);
            }
            let line = std::mem::take(&mut self.pending);
            if !line.trim().is_empty() {
                return decode(&line).map(Some);
            }
        }
    }

    /// Next message; a closed stream is an error
    pub async fn expect_message(&mut self) -> Result<Message, ProtocolError> {
        self.recv().await?.ok_or(ProtocolError::Closed)
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), ProtocolError> {
        write_message(&mut self.writer, message).await
    }

    pub fn into_split(self) -> (BufReader<OwnedReadHalf>, OwnedWriteHalf) {
        (self.reader, self.writer)
    }
}

//! Authoritative game host
//!
//! Connection tasks speak the protocol and forward player events to a single
//! game task, which owns the board and decides everything: ids, turn order,
//! move legality, wins. Outgoing messages go through one writer task per
//! player so a slow socket never blocks the game.
//!
//! ## Architecture
//! - Level 1: `run_host` / `serve` (bind, accept, run one game)
//! - Level 2: Game task event handling
//! - Level 3: Per-connection handshake, reader and writer

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use starhop_core::{goal_slots, validate_chain, Board, CoreError, HopChain};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ProtocolError;
use crate::protocol::{read_message, write_message, Connection, Message, DEFAULT_PORT, HELLO_TOKEN};

/// How long the host waits for outgoing messages to drain after the game
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Host configuration
#[derive(Clone, Debug)]
pub struct HostConfig {
    pub port: u16,
    /// Start automatically once this many players have joined
    pub players: usize,
    /// Seed for choosing the starting player
    pub seed: Option<u64>,
    /// Pause between an accepted move and the next request
    pub move_delay_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            players: 2,
            seed: None,
            move_delay_ms: 500,
        }
    }
}

impl HostConfig {
    pub fn move_delay(&self) -> Duration {
        Duration::from_millis(self.move_delay_ms)
    }

    /// Reject player counts without a goal table
    pub fn validate(&self) -> Result<(), CoreError> {
        goal_slots(self.players).map(|_| ())
    }
}

/// How a hosted game ended
#[derive(Clone, Debug)]
pub struct GameReport {
    pub num_players: usize,
    pub starting_player: usize,
    /// Accepted moves, in order
    pub moves: Vec<HopChain>,
    /// Players in the order they finished
    pub finish_order: Vec<usize>,
    pub final_board: Board,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Bind the configured port and host one game
pub async fn run_host(config: HostConfig) -> anyhow::Result<GameReport> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("STARHOP host listening on {}", addr);
    serve(listener, config).await
}

/// Host one game on an already bound listener
pub async fn serve(listener: TcpListener, config: HostConfig) -> anyhow::Result<GameReport> {
    config.validate()?;
    let (events, inbox) = mpsc::unbounded_channel();
    let acceptor = tokio::spawn(accept_loop(listener, events));

    let result = GameHost::new(config).run(inbox).await;
    acceptor.abort();
    result
}

async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<Event>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("connection from {}", peer);
                tokio::spawn(handle_connection(stream, peer, events.clone()));
            }
            Err(e) => warn!("accept failed: {}", e),
        }
    }
}

// ============================================================================
// LEVEL 2 - GAME TASK
// ============================================================================

/// Player events forwarded by connection tasks
enum Event {
    Joined {
        outbox: mpsc::UnboundedSender<Message>,
        writer: JoinHandle<()>,
        reply: oneshot::Sender<Option<usize>>,
    },
    Ready { player: usize },
    MakeMove { player: usize, chain: HopChain },
    /// A line from the player that did not decode
    Garbled { player: usize },
    Left { player: usize },
}

struct Game {
    board: Board,
    won: Vec<bool>,
    remaining: usize,
    /// Player asked to move; before the first request, the one before the starter
    current: usize,
    report: GameReport,
}

struct GameHost {
    config: HostConfig,
    rng: ChaCha8Rng,
    /// Outbox per seat, indexed by player id - 1; `None` once a player left before the start
    seats: Vec<Option<mpsc::UnboundedSender<Message>>>,
    writers: Vec<JoinHandle<()>>,
    game: Option<Game>,
}

impl GameHost {
    fn new(config: HostConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            rng,
            seats: Vec::new(),
            writers: Vec::new(),
            game: None,
        }
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Event>) -> anyhow::Result<GameReport> {
        let outcome = loop {
            let Some(event) = inbox.recv().await else {
                break Err(anyhow::anyhow!("event channel closed"));
            };
            match self.handle(event).await {
                Ok(Some(report)) => break Ok(report),
                Ok(None) => {}
                Err(e) => break Err(e),
            }
        };

        // Dropping the outboxes lets each writer drain and exit
        self.seats.clear();
        for writer in self.writers.drain(..) {
            if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
                warn!("gave up flushing a player connection");
            }
        }
        outcome
    }

    async fn handle(&mut self, event: Event) -> anyhow::Result<Option<GameReport>> {
        match event {
            Event::Joined { outbox, writer, reply } => {
                self.writers.push(writer);
                if self.game.is_some() {
                    let _ = reply.send(None);
                    return Ok(None);
                }
                // Lowest free seat, so a seat vacated before the start is refilled
                let seat = match self.seats.iter().position(Option::is_none) {
                    Some(seat) => seat,
                    None => {
                        self.seats.push(None);
                        self.seats.len() - 1
                    }
                };
                let player = seat + 1;
                let _ = outbox.send(Message::AssignId(player));
                self.seats[seat] = Some(outbox);
                let _ = reply.send(Some(player));
                info!("player {} joined", player);

                if self.all_seated() && self.seats.len() == self.config.players {
                    self.start_game().await?;
                }
            }
            Event::Ready { player } => {
                if player != 1 || self.game.is_some() {
                    debug!("ignoring ready from player {}", player);
                } else if !self.all_seated() {
                    warn!("cannot start yet: a seat is empty");
                } else if let Err(e) = goal_slots(self.seats.len()) {
                    warn!("cannot start yet: {}", e);
                } else {
                    self.start_game().await?;
                }
            }
            Event::MakeMove { player, chain } => return self.maybe_do_move(player, chain).await,
            Event::Garbled { player } => match &self.game {
                Some(game) if game.current == player => {
                    warn!("unreadable move from player {}, asking again", player);
                    self.ask(player)?;
                }
                _ => debug!("ignoring unreadable message from player {}", player),
            },
            Event::Left { player } => {
                if self.game.is_some() {
                    self.broadcast(Message::GameOver);
                    anyhow::bail!("player {} disconnected mid-game", player);
                }
                if let Some(seat) = player.checked_sub(1).and_then(|i| self.seats.get_mut(i)) {
                    *seat = None;
                }
                while matches!(self.seats.last(), Some(None)) {
                    self.seats.pop();
                }
                warn!("player {} left before the game started, seat freed", player);
            }
        }
        Ok(None)
    }

    /// Every seat up to the highest assigned id is taken
    fn all_seated(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    async fn start_game(&mut self) -> anyhow::Result<()> {
        let num_players = self.seats.len();
        let board = Board::initial(num_players)?;
        let starter_index = self.rng.gen_range(0..num_players);
        let starting_player = starter_index + 1;

        info!("starting {} player game, player {} moves first", num_players, starting_player);
        self.broadcast(Message::BoardInit(board.clone()));
        self.broadcast(Message::StartingPlayer(starting_player));

        self.game = Some(Game {
            board: board.clone(),
            won: vec![false; num_players + 1],
            remaining: num_players,
            current: starter_index,
            report: GameReport {
                num_players,
                starting_player,
                moves: Vec::new(),
                finish_order: Vec::new(),
                final_board: board,
            },
        });

        tokio::time::sleep(self.config.move_delay()).await;
        self.request_next_move()
    }

    /// Apply a submitted move if it is legal and the sender's turn
    async fn maybe_do_move(&mut self, player: usize, chain: HopChain) -> anyhow::Result<Option<GameReport>> {
        let Some(game) = self.game.as_mut() else {
            warn!("player {} sent a move before the game started", player);
            return Ok(None);
        };
        if player != game.current {
            warn!("player {} moved out of turn (waiting on {})", player, game.current);
            return Ok(None);
        }
        if let Err(e) = validate_chain(&game.board, &chain, player as i8) {
            warn!("rejected move from player {}: {}", player, e);
            self.ask(player)?;
            return Ok(None);
        }

        game.board.apply_chain(&chain);
        game.report.moves.push(chain.clone());
        info!(
            "player {} moved {} -> {} ({} hops)",
            player,
            chain[0],
            chain[chain.len() - 1],
            chain.len() - 1
        );

        let slots = goal_slots(game.won.len() - 1)?;
        for (i, &slot) in slots.iter().enumerate() {
            let id = i + 1;
            if !game.won[id] && game.board.fills_slot(slot, id as i8) {
                game.won[id] = true;
                game.remaining -= 1;
                game.report.finish_order.push(id);
                info!("player {} has finished", id);
            }
        }
        let finished = game.remaining == 0;

        self.broadcast(Message::Move(chain));
        if finished {
            self.broadcast(Message::GameOver);
            info!("game over");
            let report = self.game.take().map(|mut game| {
                game.report.final_board = game.board;
                game.report
            });
            return Ok(report);
        }

        tokio::time::sleep(self.config.move_delay()).await;
        self.request_next_move()?;
        Ok(None)
    }

    /// Advance to the next player who has not finished and ask them to move
    fn request_next_move(&mut self) -> anyhow::Result<()> {
        let Some(game) = self.game.as_mut() else {
            return Ok(());
        };
        let n = game.won.len() - 1;
        loop {
            game.current = game.current % n + 1;
            if !game.won[game.current] {
                break;
            }
        }
        let player = game.current;
        self.ask(player)
    }

    /// Send `request_move`; a player who can no longer be reached ends the game
    fn ask(&self, player: usize) -> anyhow::Result<()> {
        if self.send_to(player, Message::RequestMove) {
            return Ok(());
        }
        self.broadcast(Message::GameOver);
        anyhow::bail!("player {} cannot be reached", player)
    }

    fn send_to(&self, player: usize, message: Message) -> bool {
        player
            .checked_sub(1)
            .and_then(|i| self.seats.get(i))
            .and_then(Option::as_ref)
            .is_some_and(|outbox| outbox.send(message).is_ok())
    }

    fn broadcast(&self, message: Message) {
        for outbox in self.seats.iter().flatten() {
            let _ = outbox.send(message.clone());
        }
    }
}

// ============================================================================
// LEVEL 3 - CONNECTIONS
// ============================================================================

async fn handle_connection(stream: TcpStream, peer: SocketAddr, events: mpsc::UnboundedSender<Event>) {
    let _ = stream.set_nodelay(true);
    let mut conn = Connection::new(stream);

    match conn.recv().await {
        Ok(Some(Message::Hello(HELLO_TOKEN))) => {}
        other => {
            debug!("bad handshake from {}: {:?}", peer, other.map(|m| m.map(|m| m.tag())));
            let _ = conn.send(&Message::What).await;
            return;
        }
    }

    let (mut reader, mut write) = conn.into_split();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<Message>();
    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            if let Err(e) = write_message(&mut write, &message).await {
                debug!("write to {} failed: {}", peer, e);
                break;
            }
        }
    });

    let (reply, assigned) = oneshot::channel();
    let rejected = outbox.clone();
    if events.send(Event::Joined { outbox, writer, reply }).is_err() {
        return;
    }
    let player = match assigned.await {
        Ok(Some(player)) => player,
        _ => {
            let _ = rejected.send(Message::No);
            return;
        }
    };
    drop(rejected);

    loop {
        let event = match read_message(&mut reader).await {
            Ok(Some(Message::Ready(true))) => Event::Ready { player },
            Ok(Some(Message::MakeMove(chain))) => Event::MakeMove { player, chain },
            Ok(Some(other)) => {
                debug!("ignoring {} from player {}", other.tag(), player);
                continue;
            }
            Ok(None) => Event::Left { player },
            Err(ProtocolError::Codec(e)) => {
                warn!("bad message from player {}: {}", player, e);
                Event::Garbled { player }
            }
            Err(e) => {
                warn!("lost player {}: {}", player, e);
                Event::Left { player }
            }
        };
        let left = matches!(event, Event::Left { .. });
        if events.send(event).is_err() || left {
            return;
        }
    }
}

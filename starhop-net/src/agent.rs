//! Autonomous agent client
//!
//! The socket side runs on tokio; the search tree lives on its own worker
//! thread behind a [`ControllerClient`]. Every accepted move, ours included,
//! re-roots the tree; a move request opens the exploration window.

use starhop_core::{Board, HopChain};
use starhop_search::{spawn, ControllerClient, SearchConfig, SearchStats, SearchTree};
use tokio::net::ToSocketAddrs;
use tracing::{debug, info};

use crate::error::ProtocolError;
use crate::protocol::{Connection, Message, HELLO_TOKEN};

/// What an agent saw of a finished game
#[derive(Clone, Debug)]
pub struct GameSummary {
    pub player_id: usize,
    pub moves_made: usize,
    pub moves_seen: usize,
    pub final_board: Board,
    pub stats: SearchStats,
}

pub struct Agent {
    conn: Connection,
    player_id: usize,
    config: SearchConfig,
}

impl Agent {
    /// Connect and complete the handshake
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: SearchConfig) -> Result<Self, ProtocolError> {
        let mut conn = Connection::connect(addr).await?;
        conn.send(&Message::Hello(HELLO_TOKEN)).await?;

        let player_id = match conn.expect_message().await? {
            Message::AssignId(id) => id,
            Message::No => return Err(ProtocolError::Rejected),
            Message::What => return Err(ProtocolError::BadHandshake),
            other => return Err(other.unexpected("assign_id")),
        };
        info!("joined as player {} ({} evaluator)", player_id, config.evaluator);

        Ok(Self {
            conn,
            player_id,
            config,
        })
    }

    pub fn player_id(&self) -> usize {
        self.player_id
    }

    /// Ask the host to start with the players joined so far (player 1 only)
    pub async fn ready(&mut self) -> Result<(), ProtocolError> {
        self.conn.send(&Message::Ready(true)).await
    }

    /// Play until the host announces the end of the game
    pub async fn play(mut self) -> Result<GameSummary, ProtocolError> {
        let board = match self.conn.expect_message().await? {
            Message::BoardInit(board) => board,
            other => return Err(other.unexpected("board_init")),
        };
        let starting_player = match self.conn.expect_message().await? {
            Message::StartingPlayer(player) => player,
            other => return Err(other.unexpected("starting_player")),
        };

        let tree = SearchTree::new(board, &self.config, self.player_id, starting_player)?;
        let (search, worker) = spawn(tree)?;
        info!("player {} ready, player {} starts", self.player_id, starting_player);

        let mut moves_made = 0;
        let mut moves_seen = 0;
        loop {
            match self.conn.expect_message().await? {
                Message::Move(chain) => {
                    let (Some(&source), Some(&dest)) = (chain.first(), chain.last()) else {
                        return Err(Message::Move(chain).unexpected("non-empty move"));
                    };
                    search.commit_move(source, dest)?;
                    moves_seen += 1;
                }
                Message::RequestMove => {
                    let Some(chain) = self.decide(&search).await? else {
                        info!("player {}: game ended while deciding", self.player_id);
                        break;
                    };
                    debug!("player {} plays {:?}", self.player_id, chain);
                    self.conn.send(&Message::MakeMove(chain)).await?;
                    moves_made += 1;
                }
                Message::GameOver => break,
                other => return Err(other.unexpected("move, request_move or game_over")),
            }
        }

        let final_board = blocking(&search, |c| c.snapshot()).await?.board;
        search.game_over()?;
        let stats = tokio::task::spawn_blocking(move || worker.join())
            .await?
            .unwrap_or_default();
        info!(
            "player {} done: {} moves made, {} nodes expanded",
            self.player_id, moves_made, stats.expanded
        );

        Ok(GameSummary {
            player_id: self.player_id,
            moves_made,
            moves_seen,
            final_board,
            stats,
        })
    }

    /// Explore for the decision window, then take the best move found
    ///
    /// `None` when the host ends the game before the window closes; the
    /// pending decision is dropped unanswered.
    async fn decide(&mut self, search: &ControllerClient) -> Result<Option<HopChain>, ProtocolError> {
        search.start_exploring()?;
        tokio::select! {
            _ = tokio::time::sleep(self.config.decision_window()) => {}
            message = self.conn.recv() => {
                search.stop_exploring()?;
                return match message? {
                    Some(Message::GameOver) | None => Ok(None),
                    Some(other) => Err(other.unexpected("game_over")),
                };
            }
        }
        search.stop_exploring()?;

        blocking(search, |c| c.best_move())
            .await?
            .ok_or(ProtocolError::NoLegalMove(self.player_id))
            .map(Some)
    }
}

/// Run a blocking controller query off the async runtime
async fn blocking<T, F>(search: &ControllerClient, query: F) -> Result<T, ProtocolError>
where
    T: Send + 'static,
    F: FnOnce(&ControllerClient) -> Result<T, starhop_search::ControllerError> + Send + 'static,
{
    let search = search.clone();
    Ok(tokio::task::spawn_blocking(move || query(&search)).await??)
}

#[cfg(test)]
mod tests {
    use super::*;
    use starhop_core::{validate_chain, Point};
    use starhop_search::EvaluatorKind;
    use std::time::{Duration, Instant};
    use tokio::net::TcpListener;

    fn quick() -> SearchConfig {
        SearchConfig::default()
            .with_evaluator(EvaluatorKind::Distance)
            .with_window_ms(20)
    }

    /// Accept one agent and return the host side of its connection
    async fn scripted_host(listener: &TcpListener, id: usize) -> Connection {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = Connection::new(stream);
        assert_eq!(conn.expect_message().await.unwrap(), Message::Hello(HELLO_TOKEN));
        conn.send(&Message::AssignId(id)).await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_handshake_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let host = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream);
            conn.expect_message().await.unwrap();
            conn.send(&Message::No).await.unwrap();
        });

        let result = Agent::connect(addr, quick()).await;
        assert!(matches!(result, Err(ProtocolError::Rejected)));
        host.await.unwrap();
    }

    #[tokio::test]
    async fn test_plays_legal_moves_and_tracks_opponent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let host = tokio::spawn(async move {
            let mut conn = scripted_host(&listener, 1).await;
            let mut board = Board::initial(2).unwrap();
            conn.send(&Message::BoardInit(board.clone())).await.unwrap();
            conn.send(&Message::StartingPlayer(2)).await.unwrap();

            // Opponent opens
            let opening = vec![Point::new(7, 13), Point::new(7, 12)];
            board.apply_chain(&opening);
            conn.send(&Message::Move(opening)).await.unwrap();

            for _ in 0..2 {
                conn.send(&Message::RequestMove).await.unwrap();
                let chain = match conn.expect_message().await.unwrap() {
                    Message::MakeMove(chain) => chain,
                    other => panic!("unexpected {:?}", other),
                };
                assert_eq!(validate_chain(&board, &chain, 1), Ok(()));
                board.apply_chain(&chain);
                conn.send(&Message::Move(chain)).await.unwrap();

                // Opponent shuffles a piece back and forth
                let reply = match board.get(Point::new(7, 12)) {
                    2 => vec![Point::new(7, 12), Point::new(7, 13)],
                    _ => vec![Point::new(7, 13), Point::new(7, 12)],
                };
                board.apply_chain(&reply);
                conn.send(&Message::Move(reply)).await.unwrap();
            }
            conn.send(&Message::GameOver).await.unwrap();
            board
        });

        let agent = Agent::connect(addr, quick()).await.unwrap();
        assert_eq!(agent.player_id(), 1);
        let summary = agent.play().await.unwrap();
        let host_board = host.await.unwrap();

        assert_eq!(summary.moves_made, 2);
        assert_eq!(summary.moves_seen, 5);
        assert_eq!(summary.final_board, host_board);
        assert_eq!(summary.stats.reroots, 5);
    }

    #[tokio::test]
    async fn test_game_over_cuts_decision_short() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let host = tokio::spawn(async move {
            let mut conn = scripted_host(&listener, 1).await;
            conn.send(&Message::BoardInit(Board::initial(2).unwrap())).await.unwrap();
            conn.send(&Message::StartingPlayer(1)).await.unwrap();
            conn.send(&Message::RequestMove).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            conn.send(&Message::GameOver).await.unwrap();
            // Whatever the agent sends before closing
            conn.recv().await.unwrap()
        });

        let agent = Agent::connect(addr, quick().with_window_ms(5_000)).await.unwrap();
        let started = Instant::now();
        let summary = agent.play().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(summary.moves_made, 0);
        assert_eq!(summary.final_board, Board::initial(2).unwrap());
        assert_eq!(host.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_out_of_order_message_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let host = tokio::spawn(async move {
            let mut conn = scripted_host(&listener, 2).await;
            conn.send(&Message::RequestMove).await.unwrap();
            conn
        });

        let agent = Agent::connect(addr, quick()).await.unwrap();
        let result = agent.play().await;
        assert!(matches!(result, Err(ProtocolError::Unexpected { expected: "board_init", .. })));
        drop(host.await.unwrap());
    }
}

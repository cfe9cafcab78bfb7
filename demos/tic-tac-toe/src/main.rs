use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use sackson::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const GAME: &str = "tic-tac-toe";

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Mark {
    X,
    O,
}

impl Mark {
    /// Player 0 plays X.
    fn of(player_number: usize) -> Self {
        if player_number == 0 { Mark::X } else { Mark::O }
    }
}

type Board = [[Option<Mark>; 3]; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Win(Mark),
    Draw,
}

/// What each player receives after every move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Status {
    board: Board,
    you: Mark,
    turn: Mark,
    over: bool,
    winner: Option<Mark>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Move {
    row: usize,
    col: usize,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TicTacToe {
    players: Vec<String>,
    board: Board,
    turn: usize,
    started: bool,
    outcome: Option<Outcome>,
}

impl Driver for TicTacToe {
    fn execute(&mut self, _client_name: &str, kind: &str, content: &Value) -> Result<(), DriverError> {
        if kind != "mov" {
            return Err(DriverError::rule("unknown_move"));
        }
        let Move { row, col } =
            Move::deserialize(content).map_err(|_| DriverError::rule("invalid_move"))?;
        if row >= 3 || col >= 3 {
            return Err(DriverError::rule("out_of_bounds"));
        }
        if self.board[row][col].is_some() {
            return Err(DriverError::rule("cell_occupied"));
        }

        let mark = Mark::of(self.turn);
        self.board[row][col] = Some(mark);
        if check_winner(&self.board, mark) {
            self.outcome = Some(Outcome::Win(mark));
        } else if board_full(&self.board) {
            self.outcome = Some(Outcome::Draw);
        } else {
            self.turn = 1 - self.turn;
        }
        tracing::debug!(row, col, ?mark, outcome = ?self.outcome, "move played");
        Ok(())
    }

    fn current_player_number(&self) -> Result<usize, DriverError> {
        Ok(self.turn)
    }

    fn status(&self, player_number: usize) -> Result<Value, DriverError> {
        let status = Status {
            board: self.board,
            you: Mark::of(player_number),
            turn: Mark::of(self.turn),
            over: self.is_game_over(),
            winner: match self.outcome {
                Some(Outcome::Win(mark)) => Some(mark),
                _ => None,
            },
        };
        serde_json::to_value(status).map_err(|e| DriverError::Inconsistent(e.to_string()))
    }

    fn add_player(&mut self, name: &str) -> Result<(), DriverError> {
        if self.players.len() == 2 {
            return Err(DriverError::RoomFull);
        }
        self.players.push(name.to_string());
        Ok(())
    }

    fn remove_player(&mut self, player_number: usize) -> Result<(), DriverError> {
        if player_number >= self.players.len() {
            return Err(DriverError::Inconsistent(format!("no player {player_number}")));
        }
        self.players.remove(player_number);
        Ok(())
    }

    /// Leaving a running game forfeits it.
    fn deactivate_player(&mut self, player_number: usize) -> Result<(), DriverError> {
        if player_number >= 2 {
            return Err(DriverError::Inconsistent(format!("no player {player_number}")));
        }
        if self.outcome.is_none() {
            self.outcome = Some(Outcome::Win(Mark::of(1 - player_number)));
        }
        Ok(())
    }

    fn create_ai(&self, level: &str) -> Result<Box<dyn Ai>, DriverError> {
        match level {
            "" | "random" => Ok(Box::new(RandomAi::new())),
            _ => Err(DriverError::rule("unknown_level")),
        }
    }

    fn start_game(&mut self, players: &BTreeMap<usize, String>) -> Result<(), DriverError> {
        if players.len() != 2 {
            return Err(DriverError::rule("need_two_players"));
        }
        self.started = true;
        Ok(())
    }

    fn game_started(&self) -> bool {
        self.started
    }

    fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }
}

fn check_winner(b: &Board, m: Mark) -> bool {
    let m = Some(m);
    (0..3).any(|i| (0..3).all(|j| b[i][j] == m))
        || (0..3).any(|j| (0..3).all(|i| b[i][j] == m))
        || (0..3).all(|i| b[i][i] == m)
        || (0..3).all(|i| b[i][2 - i] == m)
}

fn board_full(b: &Board) -> bool {
    b.iter().all(|row| row.iter().all(Option::is_some))
}

// ---------------------------------------------------------------------------
// AI
// ---------------------------------------------------------------------------

/// Plays a uniformly random free cell.
struct RandomAi {
    status: Option<Status>,
    rng: StdRng,
}

impl RandomAi {
    fn new() -> Self {
        Self {
            status: None,
            rng: StdRng::from_os_rng(),
        }
    }
}

impl Ai for RandomAi {
    fn feed_game_status(&mut self, status: &Value) -> Result<(), AiError> {
        let status = Status::deserialize(status).map_err(|e| AiError::new(e.to_string()))?;
        self.status = Some(status);
        Ok(())
    }

    fn is_in_turn(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| !s.over && s.turn == s.you)
    }

    fn play(&mut self) -> Action {
        let free: Vec<(usize, usize)> = self
            .status
            .iter()
            .flat_map(|s| {
                (0..3).flat_map(move |row| {
                    (0..3).filter_map(move |col| s.board[row][col].is_none().then_some((row, col)))
                })
            })
            .collect();
        let (row, col) = free.choose(&mut self.rng).copied().unwrap_or((0, 0));
        Action::new("mov", json!({ "row": row, "col": col }))
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), SacksonError> {
    let config = ServerConfig {
        bind: std::env::args()
            .nth(1)
            .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        default_game: GAME.to_string(),
        ..ServerConfig::default()
    };
    init_logging(config.log_level())?;

    let server = SacksonServer::builder()
        .config(config)
        .driver(GAME, || Box::new(TicTacToe::default()))
        .build()
        .await?;
    tracing::info!(addr = ?server.local_addr(), "tic-tac-toe server ready");

    server.run().await
}

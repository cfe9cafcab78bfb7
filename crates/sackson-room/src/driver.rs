//! The `Driver` trait: the extension point game authors implement.
//!
//! A driver owns the rules and state of one game instance. The room
//! calls it from the hub loop, one call at a time, and never looks inside
//! the statuses it produces.

use std::collections::BTreeMap;

use sackson_client::Ai;
use serde_json::Value;

use crate::DriverError;

/// Rules engine for one game instance.
///
/// Player numbers are slot indices, starting at 0, in join order. Once
/// the game has started a player that leaves is deactivated rather than
/// removed, so numbers stay stable for the rest of the game.
pub trait Driver: Send + 'static {
    /// Applies a game message sent by the player in turn.
    ///
    /// # Errors
    /// `DriverError::Rule` when the move is illegal. Only the sender is
    /// told; the room carries on.
    fn execute(&mut self, client_name: &str, kind: &str, content: &Value)
    -> Result<(), DriverError>;

    /// Number of the player expected to move next.
    fn current_player_number(&self) -> Result<usize, DriverError>;

    /// The game as seen by `player_number`.
    fn status(&self, player_number: usize) -> Result<Value, DriverError>;

    /// Seats a new player. Fails with `DriverError::RoomFull` when the
    /// game can't take more.
    fn add_player(&mut self, name: &str) -> Result<(), DriverError>;

    /// Unseats a player before the game has started. Later numbers shift
    /// down by one.
    fn remove_player(&mut self, player_number: usize) -> Result<(), DriverError>;

    /// Takes a player out of a running game without renumbering.
    fn deactivate_player(&mut self, player_number: usize) -> Result<(), DriverError>;

    /// Builds an AI for a bot of the given difficulty.
    ///
    /// The default refuses, for games without bots.
    fn create_ai(&self, _level: &str) -> Result<Box<dyn Ai>, DriverError> {
        Err(DriverError::NoAi)
    }

    /// Starts the game with the seated players, keyed by player number.
    fn start_game(&mut self, players: &BTreeMap<usize, String>) -> Result<(), DriverError>;

    fn game_started(&self) -> bool;

    fn is_game_over(&self) -> bool;
}

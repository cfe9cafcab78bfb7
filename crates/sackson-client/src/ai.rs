//! The AI interface game drivers implement for bots.

use serde_json::Value;

/// A message an AI wants to send, as if typed by a player.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Message type tag understood by the game driver.
    pub kind: String,
    pub content: Value,
}

impl Action {
    pub fn new(kind: impl Into<String>, content: Value) -> Self {
        Self {
            kind: kind.into(),
            content,
        }
    }
}

/// The AI rejected a status it was fed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct AiError(pub String);

impl AiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Decision engine behind a bot client.
///
/// The bot feeds every status update to the AI in sequence order, asks
/// whether the AI now holds the turn, and if so calls [`play`](Ai::play).
pub trait Ai: Send + 'static {
    /// Updates the AI's model of the game with one status snapshot.
    ///
    /// # Errors
    /// An error here means the AI's model is broken; the bot stops and is
    /// reported as panicked.
    fn feed_game_status(&mut self, status: &Value) -> Result<(), AiError>;

    /// Whether the last status fed hands this AI the turn.
    fn is_in_turn(&self) -> bool;

    /// Picks the next move.
    fn play(&mut self) -> Action;
}

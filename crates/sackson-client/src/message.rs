//! Inbound messages tagged with their author.

use std::fmt;

use sackson_protocol::{Control, IncomingFrame};
use serde_json::Value;

use crate::ClientRef;

/// A decoded client → server message together with the client that sent
/// it.
#[derive(Clone)]
pub struct IncomingMessage {
    pub author: ClientRef,
    /// Type tag (`typ` on the wire).
    pub kind: String,
    /// Raw content (`cnt` on the wire).
    pub content: Value,
}

impl IncomingMessage {
    pub fn new(author: ClientRef, kind: impl Into<String>, content: Value) -> Self {
        Self {
            author,
            kind: kind.into(),
            content,
        }
    }

    /// Tags a decoded wire frame with its author.
    pub fn from_frame(author: ClientRef, frame: IncomingFrame) -> Self {
        Self {
            author,
            kind: frame.kind,
            content: frame.content,
        }
    }

    /// The control type of this message, if it is one.
    pub fn control(&self) -> Option<Control> {
        Control::from_tag(&self.kind)
    }
}

impl fmt::Debug for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingMessage")
            .field("author", &self.author.id())
            .field("kind", &self.kind)
            .field("content", &self.content)
            .finish()
    }
}

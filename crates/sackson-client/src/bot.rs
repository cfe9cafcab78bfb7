//! Bot clients: an [`Ai`] sitting in a room slot.
//!
//! A bot has no connection. Its write pump decodes what the hub would
//! have sent a person, reorders status updates by sequence number and
//! feeds them to the AI. Whenever the AI ends up holding the turn, the
//! write pump nudges the read pump, which asks the AI for a move and
//! pushes it to the hub as if a player had typed it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use sackson_protocol::{Codec, JsonCodec, OutgoingMessage};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::client::lock;
use crate::{
    Action, Ai, AiError, Client, ClientCore, ClientError, ClientRef, Emitter, Event, IncomingMessage,
    MessageSender, UnregisterSender, UpdateBuffer,
};

/// Renders a panic payload for logs and events.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A client driven by an AI.
pub struct BotClient {
    core: ClientCore,
    ai: Mutex<Box<dyn Ai>>,
    turn_tx: Mutex<Option<mpsc::Sender<()>>>,
    turn_rx: Mutex<Option<mpsc::Receiver<()>>>,
    emitter: Emitter,
    codec: JsonCodec,
}

impl BotClient {
    /// Wraps `ai`. Failures inside the AI are reported on `emitter` as
    /// [`Event::BotPanicked`].
    pub fn new(
        ai: Box<dyn Ai>,
        game: impl Into<String>,
        capacity: usize,
        emitter: Emitter,
    ) -> Arc<Self> {
        let (turn_tx, turn_rx) = mpsc::channel(1);
        Arc::new(Self {
            core: ClientCore::new(game, capacity),
            ai: Mutex::new(ai),
            turn_tx: Mutex::new(Some(turn_tx)),
            turn_rx: Mutex::new(Some(turn_rx)),
            emitter,
            codec: JsonCodec,
        })
    }

    /// Feeds released statuses in order and reports whether the AI holds
    /// the turn afterwards.
    fn feed(&self, statuses: &[Value]) -> Result<bool, ClientError> {
        let mut ai = lock(&self.ai);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            for status in statuses {
                ai.feed_game_status(status)?;
            }
            Ok::<bool, AiError>(ai.is_in_turn())
        }));
        match outcome {
            Ok(result) => result.map_err(ClientError::Ai),
            Err(payload) => Err(ClientError::AiPanicked(panic_message(payload.as_ref()))),
        }
    }

    fn play(&self) -> Result<Action, ClientError> {
        let mut ai = lock(&self.ai);
        panic::catch_unwind(AssertUnwindSafe(|| ai.play()))
            .map_err(|payload| ClientError::AiPanicked(panic_message(payload.as_ref())))
    }

    fn report(&self, me: ClientRef, error: ClientError) {
        tracing::warn!(client = %self.id(), error = %error, "bot stopped");
        self.emitter.emit(Event::BotPanicked {
            client: me,
            cause: error.to_string(),
        });
    }
}

impl Client for BotClient {
    fn core(&self) -> &ClientCore {
        &self.core
    }

    fn is_bot(&self) -> bool {
        true
    }

    fn read_pump(
        self: Arc<Self>,
        messages: MessageSender,
        unregister: UnregisterSender,
    ) -> BoxFuture<'static, ()> {
        async move {
            let me: ClientRef = self.clone();
            let turns = lock(&self.turn_rx).take();
            if let Some(mut turns) = turns {
                while turns.recv().await.is_some() {
                    let action = match self.play() {
                        Ok(action) => action,
                        Err(e) => {
                            self.report(me.clone(), e);
                            break;
                        }
                    };
                    let message = IncomingMessage::new(me.clone(), action.kind, action.content);
                    if messages.send(message).await.is_err() {
                        break;
                    }
                }
            }
            let _ = unregister.send(me).await;
        }
        .boxed()
    }

    fn write_pump(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let Some(mut outbound) = self.core.take_outbound() else {
                return;
            };
            let Some(turn) = lock(&self.turn_tx).take() else {
                return;
            };
            let me: ClientRef = self.clone();
            let mut buffer = UpdateBuffer::new();

            // Dropping `turn` on exit ends the read pump.
            while let Some(bytes) = outbound.recv().await {
                let message: OutgoingMessage<Value> = match self.codec.decode(&bytes) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!(client = %self.id(), error = %e, "bot skipped message");
                        continue;
                    }
                };
                // Only status updates carry a sequence; the rest is
                // addressed to people.
                let Some(sequence) = message.sequence else {
                    continue;
                };
                let released = buffer.push(sequence, message.content);
                if released.is_empty() {
                    continue;
                }
                match self.feed(&released) {
                    Ok(true) => {
                        if turn.send(()).await.is_err() {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        self.report(me, e);
                        return;
                    }
                }
            }
        }
        .boxed()
    }
}

//! The `Client` capability trait and the state every variant shares.
//!
//! A client is anything that occupies a room slot: a human behind a
//! WebSocket, a bot driven by an AI, or a null client used in tests. The
//! hub and rooms only ever see `Arc<dyn Client>`; variant-specific
//! behaviour lives behind the two pump methods.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::future::BoxFuture;
use sackson_protocol::RoomId;
use tokio::sync::mpsc;

use crate::{ClientError, IncomingMessage, Timer};

/// Counter for generating unique client IDs.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to a client of any variant.
pub type ClientRef = Arc<dyn Client>;

/// Where read pumps push decoded messages (the hub's inbox).
pub type MessageSender = mpsc::Sender<IncomingMessage>;

/// Where read pumps report that their session ended.
pub type UnregisterSender = mpsc::Sender<ClientRef>;

/// Process-unique identity of a client.
///
/// Never reused, so a stale timer can't act on a newer client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Allocates the next id.
    pub fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// Locks a std mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// The client's outbound byte channel.
///
/// The sender half is dropped exactly once, by [`Outbox::close`]; the
/// receiver half is taken exactly once, by the write pump.
struct Outbox {
    sender: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    receiver: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
}

impl Outbox {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
        }
    }

    fn deliver(&self, id: ClientId, bytes: Vec<u8>) -> Result<(), ClientError> {
        let sender = lock(&self.sender);
        let Some(tx) = sender.as_ref() else {
            return Err(ClientError::Closed(id));
        };
        tx.try_send(bytes).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ClientError::Full(id),
            mpsc::error::TrySendError::Closed(_) => ClientError::Closed(id),
        })
    }

    fn close(&self) -> bool {
        lock(&self.sender).take().is_some()
    }

    fn take_receiver(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        lock(&self.receiver).take()
    }
}

// ---------------------------------------------------------------------------
// ClientCore
// ---------------------------------------------------------------------------

/// Identity, membership, timer and outbox shared by every client variant.
pub struct ClientCore {
    id: ClientId,
    game: String,
    name: RwLock<String>,
    room: RwLock<Option<RoomId>>,
    timer: Mutex<Option<Timer>>,
    outbox: Outbox,
}

impl ClientCore {
    /// Creates the shared state for a client of `game` whose outbound
    /// channel holds up to `capacity` messages.
    pub fn new(game: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: ClientId::next(),
            game: game.into(),
            name: RwLock::new(String::new()),
            room: RwLock::new(None),
            timer: Mutex::new(None),
            outbox: Outbox::new(capacity),
        }
    }

    /// Takes the outbound receiver. Returns `None` after the first call.
    pub fn take_outbound(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.outbox.take_receiver()
    }
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// A participant in the hub: human, bot or null.
///
/// Implementors provide [`core`](Client::core), [`is_bot`](Client::is_bot)
/// and the two pumps; everything else has a default built on the core.
pub trait Client: Send + Sync + 'static {
    /// Shared identity and channel state.
    fn core(&self) -> &ClientCore;

    /// Whether an AI, not a person, drives this client.
    fn is_bot(&self) -> bool;

    /// Converts client input into [`IncomingMessage`]s on `messages` until
    /// the session ends, then reports itself on `unregister`.
    fn read_pump(
        self: Arc<Self>,
        messages: MessageSender,
        unregister: UnregisterSender,
    ) -> BoxFuture<'static, ()>;

    /// Drains the outbound channel until the client is closed.
    fn write_pump(self: Arc<Self>) -> BoxFuture<'static, ()>;

    fn id(&self) -> ClientId {
        self.core().id
    }

    fn name(&self) -> String {
        self.core()
            .name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_name(&self, name: &str) {
        *self
            .core()
            .name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = name.to_string();
    }

    /// Game-type tag the client connected for.
    fn game(&self) -> &str {
        &self.core().game
    }

    /// Id of the room the client currently sits in.
    fn room(&self) -> Option<RoomId> {
        self.core()
            .room
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_room(&self, room: Option<RoomId>) {
        *self
            .core()
            .room
            .write()
            .unwrap_or_else(PoisonError::into_inner) = room;
    }

    /// Installs a turn timer, stopping any previous one. The new timer is
    /// left unarmed until [`start_timer`](Client::start_timer).
    fn set_timer(&self, timer: Timer) {
        let mut slot = lock(&self.core().timer);
        if let Some(mut previous) = slot.replace(timer) {
            previous.stop();
        }
    }

    /// Arms (or re-arms) the installed turn timer.
    fn start_timer(&self) {
        if let Some(timer) = lock(&self.core().timer).as_mut() {
            timer.start();
        }
    }

    fn stop_timer(&self) {
        if let Some(timer) = lock(&self.core().timer).as_mut() {
            timer.stop();
        }
    }

    /// Whether the turn timer is armed and hasn't fired yet.
    fn timer_running(&self) -> bool {
        lock(&self.core().timer)
            .as_ref()
            .is_some_and(Timer::is_running)
    }

    /// Queues encoded bytes without waiting.
    ///
    /// # Errors
    /// `ClientError::Full` when the outbound buffer is at capacity,
    /// `ClientError::Closed` once the client has been closed.
    fn deliver(&self, bytes: Vec<u8>) -> Result<(), ClientError> {
        self.core().outbox.deliver(self.id(), bytes)
    }

    /// Releases the outbound channel and disarms the timer. Idempotent.
    fn close(&self) {
        self.stop_timer();
        if self.core().outbox.close() {
            tracing::debug!(client = %self.id(), name = %self.name(), "client closed");
        }
    }

    /// Whether [`close`](Client::close) has been called.
    fn is_closed(&self) -> bool {
        lock(&self.core().outbox.sender).is_none()
    }
}

impl fmt::Debug for dyn Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("bot", &self.is_bot())
            .finish()
    }
}

/// Spawns both pumps of a client on the current runtime.
pub fn spawn_pumps(client: ClientRef, messages: MessageSender, unregister: UnregisterSender) {
    tokio::spawn(Arc::clone(&client).write_pump());
    tokio::spawn(client.read_pump(messages, unregister));
}

//! The hub: registry of clients and rooms, and the event loop that owns
//! them.
//!
//! One task runs [`Hub::run`]. It owns [`HubState`] outright, so every
//! registry mutation, whether caused by a client message, a disconnect or
//! a timer, happens on that task in the order it was received. Timers
//! don't touch the registry; they post an [`Expiry`] back to the loop.
//!
//! After each input the loop drains the event channel through the
//! [`Observer`], whose callbacks (see `handlers.rs`) encode and deliver
//! messages.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sackson_client::{
    panic_message, ClientRef, Emitter, Event, EventReceiver, IncomingMessage, MessageSender,
    Observer, UnregisterSender,
};
use sackson_protocol::{
    decode_params, outgoing, Codec, Control, CreateRoomParams, JoinRoomParams, JsonCodec,
    OutgoingMessage, Reason, RoomId, RoomsList,
};
use sackson_room::{DriverRegistry, Expiry, Room, RoomError, RoomInfo, RoomLinks};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::handlers::register_events;
use crate::{HubConfig, HubError};

const ROOM_ID_LEN: usize = 5;
const ROOM_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Requests answered by the loop itself.
enum Command {
    Rooms(oneshot::Sender<Vec<RoomInfo>>),
    Shutdown(oneshot::Sender<()>),
}

// ---------------------------------------------------------------------------
// HubHandle
// ---------------------------------------------------------------------------

/// Cheap, cloneable front door to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    register: mpsc::Sender<ClientRef>,
    unregister: UnregisterSender,
    messages: MessageSender,
    commands: mpsc::Sender<Command>,
}

impl HubHandle {
    /// Tracks a newly connected client.
    pub async fn register(&self, client: ClientRef) -> Result<(), HubError> {
        self.register.send(client).await.map_err(|_| HubError::Closed)
    }

    /// Forgets a client. Unknown clients are ignored.
    pub async fn unregister(&self, client: ClientRef) -> Result<(), HubError> {
        self.unregister.send(client).await.map_err(|_| HubError::Closed)
    }

    /// Submits a message as if its author's read pump had produced it.
    pub async fn send(&self, message: IncomingMessage) -> Result<(), HubError> {
        self.messages.send(message).await.map_err(|_| HubError::Closed)
    }

    /// Inbox for client read pumps.
    pub fn messages(&self) -> MessageSender {
        self.messages.clone()
    }

    /// Where client read pumps report that they're done.
    pub fn unregister_sender(&self) -> UnregisterSender {
        self.unregister.clone()
    }

    /// Snapshot of every live room, sorted by id.
    pub async fn rooms(&self) -> Result<Vec<RoomInfo>, HubError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Rooms(tx))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Destroys every room with reason "terminated", closes every client
    /// and stops the loop. Resolves once that is done.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(tx))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }
}

// ---------------------------------------------------------------------------
// HubState
// ---------------------------------------------------------------------------

/// Everything the hub loop owns.
pub struct HubState {
    config: HubConfig,
    /// Connected humans, by game.
    clients: HashMap<String, Vec<ClientRef>>,
    rooms: HashMap<RoomId, Room>,
    drivers: DriverRegistry,
    rng: StdRng,
    codec: JsonCodec,
    links: RoomLinks,
}

impl HubState {
    fn new(config: HubConfig, drivers: DriverRegistry, links: RoomLinks) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            clients: HashMap::new(),
            rooms: HashMap::new(),
            drivers,
            rng,
            codec: JsonCodec,
            links,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Connected clients of `game`, in registration order.
    pub fn clients_of(&self, game: &str) -> &[ClientRef] {
        self.clients.get(game).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_tracked(&self, client: &ClientRef) -> bool {
        self.clients_of(client.game())
            .iter()
            .any(|c| c.id() == client.id())
    }

    /// Ids of the rooms of `game` still waiting for players, sorted.
    pub fn waiting_rooms(&self, game: &str) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self
            .rooms
            .values()
            .filter(|room| room.game() == game && room.state().is_joinable())
            .map(|room| room.id().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn room_infos(&self) -> Vec<RoomInfo> {
        let mut infos: Vec<RoomInfo> = self.rooms.values().map(Room::info).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    pub(crate) fn register(&mut self, client: ClientRef) {
        let bucket = self.clients.entry(client.game().to_string()).or_default();
        bucket.push(client.clone());
        client.set_name(&format!("Player {}", bucket.len()));
        tracing::info!(client = %client.id(), game = client.game(), name = %client.name(), "client registered");
        self.links.events.emit(Event::ClientRegistered { client });
    }

    pub(crate) fn unregister(&mut self, client: &ClientRef) {
        if self.is_tracked(client) {
            self.remove_client(client);
        }
    }

    /// Forgets a tracked client: out of its bucket, out of its room, closed.
    pub(crate) fn remove_client(&mut self, client: &ClientRef) {
        let game = client.game().to_string();
        if let Some(bucket) = self.clients.get_mut(&game) {
            bucket.retain(|c| c.id() != client.id());
            if bucket.is_empty() {
                self.clients.remove(&game);
            }
        }
        if let Some(room) = client.room() {
            self.guarded(&room, |r| r.remove_client(client, None));
        }
        tracing::info!(client = %client.id(), game = %game, "client unregistered");
        self.links.events.emit(Event::ClientUnregistered {
            client: client.clone(),
        });
        client.close();
    }

    /// Gets rid of a client whose outbound channel is full or closed.
    pub(crate) fn drop_unreachable(&mut self, client: &ClientRef) {
        if self.is_tracked(client) {
            self.remove_client(client);
            return;
        }
        if let Some(room) = client.room() {
            self.guarded(&room, |r| r.remove_client(client, None));
        }
        client.close();
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// Encodes `message` once and queues it for each of `clients`.
    pub(crate) fn broadcast<T: Serialize>(&mut self, clients: &[ClientRef], message: &OutgoingMessage<T>) {
        let bytes = match self.codec.encode(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(kind = %message.kind, error = %e, "failed to encode message");
                return;
            }
        };
        for client in clients {
            if let Err(e) = client.deliver(bytes.clone()) {
                tracing::debug!(client = %client.id(), error = %e, "dropping unreachable client");
                self.drop_unreachable(client);
            }
        }
    }

    pub(crate) fn send<T: Serialize>(&mut self, client: &ClientRef, message: &OutgoingMessage<T>) {
        self.broadcast(std::slice::from_ref(client), message);
    }

    /// Sends the waiting-room list of `game` to every client of `game`.
    pub(crate) fn broadcast_rooms(&mut self, game: &str) {
        let list = OutgoingMessage::new(
            outgoing::ROOMS_LIST,
            RoomsList {
                rooms: self.waiting_rooms(game),
            },
        );
        let recipients = self.clients_of(game).to_vec();
        self.broadcast(&recipients, &list);
    }

    fn emit_error(&self, client: &ClientRef, code: &str) {
        self.links.events.emit(Event::Error {
            client: client.clone(),
            code: code.to_string(),
        });
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    /// Runs `op` on a room behind the panic boundary.
    ///
    /// A panic or a fatal error destroys the room with reason "game
    /// panicked" and yields `None`, as does a missing room. Ordinary
    /// errors are handed back.
    pub(crate) fn guarded<T>(
        &mut self,
        id: &RoomId,
        op: impl FnOnce(&mut Room) -> Result<T, RoomError>,
    ) -> Option<Result<T, RoomError>> {
        let room = self.rooms.get_mut(id)?;
        let cause = match panic::catch_unwind(AssertUnwindSafe(|| op(room))) {
            Ok(Err(e)) if e.is_fatal() => e.to_string(),
            Ok(result) => return Some(result),
            Err(payload) => panic_message(payload.as_ref()),
        };
        tracing::error!(room = %id, cause = %cause, "room failed, destroying it");
        self.destroy_room(id, Reason::GamePanicked);
        None
    }

    /// Tears a room down: timer stopped, humans told `reason`, bots
    /// closed, room forgotten. A no-op for unknown ids.
    pub(crate) fn destroy_room(&mut self, id: &RoomId, reason: Reason) {
        let Some(mut room) = self.rooms.remove(id) else {
            return;
        };
        room.shutdown(reason);
        tracing::info!(room = %id, %reason, "room destroyed");
        self.links.events.emit(Event::RoomDestroyed {
            room: id.clone(),
            game: room.game().to_string(),
            reason,
        });
    }

    /// Destroys the room if no human is left in it.
    pub(crate) fn destroy_if_abandoned(&mut self, id: &RoomId) {
        if self.rooms.get(id).is_some_and(|room| room.human_count() == 0) {
            self.destroy_room(id, Reason::NoClients);
        }
    }

    fn fresh_room_id(&mut self) -> RoomId {
        loop {
            let code: String = (0..ROOM_ID_LEN)
                .map(|_| {
                    let i = self.rng.random_range(0..ROOM_ID_ALPHABET.len());
                    char::from(ROOM_ID_ALPHABET[i])
                })
                .collect();
            let id = RoomId(code);
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub(crate) fn handle_message(&mut self, message: IncomingMessage) {
        if message.author.is_closed() {
            tracing::debug!(client = %message.author.id(), "message from closed client, ignoring");
            return;
        }
        let result = match message.control() {
            Some(Control::CreateRoom) => self.create_room_action(&message),
            Some(Control::JoinRoom) => self.join_room_action(&message),
            Some(Control::TerminateRoom) => self.terminate_room_action(&message),
            _ => self.room_action(&message),
        };
        if let Err(e) = result {
            tracing::warn!(
                client = %message.author.id(),
                kind = %message.kind,
                error = %e,
                "request rejected"
            );
            self.emit_error(&message.author, e.code());
        }
    }

    fn rename(client: &ClientRef, name: Option<&str>) {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            client.set_name(name);
        }
    }

    fn create_room_action(&mut self, message: &IncomingMessage) -> Result<(), HubError> {
        let params: CreateRoomParams = decode_params(&message.content)?;
        let author = &message.author;
        if author.room().is_some() {
            return Err(HubError::AlreadyInARoom);
        }
        let game = params
            .driver
            .unwrap_or_else(|| author.game().to_string());
        let driver = self
            .drivers
            .create(&game)
            .ok_or_else(|| HubError::InexistentDriver(game.clone()))?;
        Self::rename(author, params.name.as_deref());

        let id = self.fresh_room_id();
        let room = Room::new(id.clone(), game.clone(), driver, self.links.clone());
        self.rooms.insert(id.clone(), room);
        match self.guarded(&id, |room| room.add_human(author.clone())) {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                self.rooms.remove(&id);
                return Err(e.into());
            }
            None => {
                return Err(RoomError::Fatal("room failed while seating its owner".into()).into());
            }
        }
        if let Some(room) = self.rooms.get_mut(&id) {
            room.arm_timer(self.config.room_timeout);
        }
        tracing::info!(room = %id, game = %game, owner = %author.id(), "room created");
        self.links.events.emit(Event::RoomCreated { room: id, game });
        Ok(())
    }

    fn join_room_action(&mut self, message: &IncomingMessage) -> Result<(), HubError> {
        let params: JoinRoomParams = decode_params(&message.content)?;
        let author = &message.author;
        if author.room().is_some() {
            return Err(HubError::AlreadyInARoom);
        }
        if !self.rooms.contains_key(&params.room) {
            return Err(HubError::InexistentRoom(params.room));
        }
        Self::rename(author, params.name.as_deref());
        match self.guarded(&params.room, |room| room.add_human(author.clone())) {
            Some(Err(e)) => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn terminate_room_action(&mut self, message: &IncomingMessage) -> Result<(), HubError> {
        let author = &message.author;
        let id = author.room().ok_or(HubError::NotInARoom)?;
        let room = self.rooms.get(&id).ok_or(HubError::NotInARoom)?;
        if !room.is_owner(author) {
            return Err(HubError::Forbidden);
        }
        self.destroy_room(&id, Reason::Terminated);
        Ok(())
    }

    fn room_action(&mut self, message: &IncomingMessage) -> Result<(), HubError> {
        let author = &message.author;
        let id = author.room().ok_or(HubError::NotInARoom)?;
        if !self.rooms.contains_key(&id) {
            author.set_room(None);
            return Err(HubError::NotInARoom);
        }
        self.guarded(&id, |room| room.parse(message));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Timers and shutdown
    // -----------------------------------------------------------------------

    pub(crate) fn handle_expiry(&mut self, expiry: Expiry) {
        match expiry {
            Expiry::Room(id) => {
                if self.rooms.contains_key(&id) {
                    tracing::info!(room = %id, "room timed out");
                    self.destroy_room(&id, Reason::RoomTimeout);
                }
            }
            Expiry::Player { room, client } => {
                self.guarded(&room, |r| r.timeout_player(client));
            }
        }
    }

    fn shutdown(&mut self) {
        let ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        for id in ids {
            self.destroy_room(&id, Reason::Terminated);
        }
    }

    fn close_all(&mut self) {
        for client in self.clients.drain().flat_map(|(_, bucket)| bucket) {
            client.close();
        }
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// The hub event loop.
pub struct Hub {
    state: HubState,
    observer: Observer<HubState>,
    events: EventReceiver,
    expiries: mpsc::UnboundedReceiver<Expiry>,
    register_rx: mpsc::Receiver<ClientRef>,
    unregister_rx: mpsc::Receiver<ClientRef>,
    messages_rx: mpsc::Receiver<IncomingMessage>,
    commands_rx: mpsc::Receiver<Command>,
}

impl Hub {
    /// Builds a hub and the handle to drive it. Nothing runs until
    /// [`run`](Hub::run) is polled.
    pub fn new(config: HubConfig, drivers: DriverRegistry) -> (Self, HubHandle) {
        let capacity = config.channel_capacity.max(1);
        let (register_tx, register_rx) = mpsc::channel(capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(capacity);
        let (messages_tx, messages_rx) = mpsc::channel(capacity);
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (emitter, events) = Emitter::channel();
        let (expiries_tx, expiries) = mpsc::unbounded_channel();

        let links = RoomLinks {
            events: emitter,
            expiries: expiries_tx,
            messages: messages_tx.clone(),
            unregister: unregister_tx.clone(),
            bot_capacity: config.outbound_capacity,
        };
        let mut observer = Observer::new();
        register_events(&mut observer);

        let hub = Self {
            state: HubState::new(config, drivers, links),
            observer,
            events,
            expiries,
            register_rx,
            unregister_rx,
            messages_rx,
            commands_rx,
        };
        let handle = HubHandle {
            register: register_tx,
            unregister: unregister_tx,
            messages: messages_tx,
            commands: commands_tx,
        };
        (hub, handle)
    }

    /// Builds a hub and runs it on a new task.
    pub fn spawn(config: HubConfig, drivers: DriverRegistry) -> HubHandle {
        let (hub, handle) = Self::new(config, drivers);
        tokio::spawn(hub.run());
        handle
    }

    /// Direct access to the state, for tests driving the hub by hand.
    pub fn state(&self) -> &HubState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut HubState {
        &mut self.state
    }

    /// Delivers every pending event.
    pub fn flush(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.observer.trigger(&mut self.state, &event);
        }
    }

    /// Processes one message and its consequences.
    pub fn dispatch(&mut self, message: IncomingMessage) {
        self.state.handle_message(message);
        self.flush();
    }

    /// Runs the loop until [`HubHandle::shutdown`] is called or every
    /// handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("hub running");
        loop {
            tokio::select! {
                biased;

                Some(client) = self.register_rx.recv() => self.state.register(client),
                Some(message) = self.messages_rx.recv() => self.state.handle_message(message),
                Some(client) = self.unregister_rx.recv() => self.state.unregister(&client),
                Some(expiry) = self.expiries.recv() => self.state.handle_expiry(expiry),
                Some(event) = self.events.recv() => self.observer.trigger(&mut self.state, &event),
                command = self.commands_rx.recv() => match command {
                    Some(Command::Rooms(reply)) => {
                        let _ = reply.send(self.state.room_infos());
                    }
                    Some(Command::Shutdown(reply)) => {
                        self.stop();
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.stop();
                        break;
                    }
                },
            }
            self.flush();
        }
        tracing::info!("hub stopped");
    }

    fn stop(&mut self) {
        self.state.shutdown();
        self.flush();
        self.state.close_all();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use sackson_client::{Action, Ai, AiError, Client, NullClient};
    use sackson_room::{Driver, DriverError};
    use serde_json::{json, Value};

    use super::*;

    type AiFactory = Arc<dyn Fn() -> Box<dyn Ai> + Send + Sync>;

    /// Three seats. "mov" passes the turn, "boom" panics, three moves end it.
    /// Bots are available only when `ai` is set.
    #[derive(Default)]
    struct Duel {
        seats: Vec<(String, bool)>,
        started: bool,
        turn: usize,
        moves: usize,
        ai: Option<AiFactory>,
    }

    impl Driver for Duel {
        fn execute(&mut self, _client_name: &str, kind: &str, _content: &Value) -> Result<(), DriverError> {
            match kind {
                "mov" => {
                    self.moves += 1;
                    self.turn = (self.turn + 1) % self.seats.len();
                    Ok(())
                }
                "boom" => panic!("board on fire"),
                _ => Err(DriverError::rule("illegal_move")),
            }
        }

        fn current_player_number(&self) -> Result<usize, DriverError> {
            Ok(self.turn)
        }

        fn status(&self, player_number: usize) -> Result<Value, DriverError> {
            Ok(json!({ "you": player_number, "moves": self.moves }))
        }

        fn add_player(&mut self, name: &str) -> Result<(), DriverError> {
            if self.seats.len() == 3 {
                return Err(DriverError::RoomFull);
            }
            self.seats.push((name.to_string(), true));
            Ok(())
        }

        fn remove_player(&mut self, player_number: usize) -> Result<(), DriverError> {
            self.seats.remove(player_number);
            Ok(())
        }

        fn deactivate_player(&mut self, player_number: usize) -> Result<(), DriverError> {
            self.seats[player_number].1 = false;
            Ok(())
        }

        fn start_game(&mut self, _players: &BTreeMap<usize, String>) -> Result<(), DriverError> {
            self.started = true;
            Ok(())
        }

        fn game_started(&self) -> bool {
            self.started
        }

        fn is_game_over(&self) -> bool {
            self.moves >= 3
        }

        fn create_ai(&self, _level: &str) -> Result<Box<dyn Ai>, DriverError> {
            match &self.ai {
                Some(make) => Ok(make()),
                None => Err(DriverError::NoAi),
            }
        }
    }

    /// Never in turn. Records the move count of every status it is fed.
    struct RecordingAi {
        seen: Arc<Mutex<Vec<Value>>>,
    }

    impl Ai for RecordingAi {
        fn feed_game_status(&mut self, status: &Value) -> Result<(), AiError> {
            self.seen.lock().unwrap().push(status["moves"].clone());
            Ok(())
        }

        fn is_in_turn(&self) -> bool {
            false
        }

        fn play(&mut self) -> Action {
            Action::new("mov", Value::Null)
        }
    }

    struct PanickyAi;

    impl Ai for PanickyAi {
        fn feed_game_status(&mut self, _status: &Value) -> Result<(), AiError> {
            panic!("ai lost the plot")
        }

        fn is_in_turn(&self) -> bool {
            false
        }

        fn play(&mut self) -> Action {
            Action::new("mov", Value::Null)
        }
    }

    fn hub_with(config: HubConfig) -> Hub {
        let mut drivers = DriverRegistry::new();
        drivers.register("duel", || Box::new(Duel::default()));
        Hub::new(config, drivers).0
    }

    fn hub() -> Hub {
        hub_with(HubConfig::default())
    }

    fn hub_with_ai(make: AiFactory) -> Hub {
        let mut drivers = DriverRegistry::new();
        drivers.register("duel", move || {
            Box::new(Duel {
                ai: Some(make.clone()),
                ..Duel::default()
            })
        });
        Hub::new(HubConfig::default(), drivers).0
    }

    /// Lets bot pumps run, flushing the hub in between, until `done` holds.
    async fn settle(hub: &mut Hub, mut done: impl FnMut(&Hub) -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                hub.flush();
                if done(hub) {
                    return;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("hub should settle");
    }

    struct Peer {
        client: ClientRef,
        outbound: mpsc::Receiver<Vec<u8>>,
    }

    impl Peer {
        fn connect(hub: &mut Hub) -> Self {
            let null = NullClient::new("duel");
            let outbound = null.core().take_outbound().unwrap();
            let client: ClientRef = null;
            hub.state_mut().register(client.clone());
            hub.flush();
            Self { client, outbound }
        }

        fn say(&self, hub: &mut Hub, kind: &str, content: Value) {
            hub.dispatch(IncomingMessage::new(self.client.clone(), kind, content));
        }

        fn inbox(&mut self) -> Vec<OutgoingMessage<Value>> {
            let mut out = Vec::new();
            while let Ok(bytes) = self.outbound.try_recv() {
                out.push(serde_json::from_slice(&bytes).unwrap());
            }
            out
        }

        fn kinds(&mut self) -> Vec<String> {
            self.inbox().into_iter().map(|m| m.kind).collect()
        }
    }

    fn find<'a>(inbox: &'a [OutgoingMessage<Value>], kind: &str) -> Vec<&'a Value> {
        inbox
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| &m.content)
            .collect()
    }

    /// Alice creates a room, Bob joins and Alice starts the game.
    fn started_duel(hub: &mut Hub) -> (Peer, Peer, RoomId) {
        let mut alice = Peer::connect(hub);
        let mut bob = Peer::connect(hub);
        alice.say(hub, "cre", Value::Null);
        let id = alice.client.room().unwrap();
        bob.say(hub, "joi", json!({ "rom": id.as_str() }));
        alice.say(hub, "ini", json!({ "pto": 0 }));
        alice.inbox();
        bob.inbox();
        (alice, bob, id)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn test_register_names_clients_and_sends_room_list() {
        let mut hub = hub();
        let mut first = Peer::connect(&mut hub);
        let mut second = Peer::connect(&mut hub);

        assert_eq!(first.client.name(), "Player 1");
        assert_eq!(second.client.name(), "Player 2");
        let inbox = first.inbox();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, "rms");
        assert_eq!(inbox[0].content, json!({ "val": [] }));
        assert_eq!(second.kinds(), vec!["rms"]);
        assert_eq!(hub.state().clients_of("duel").len(), 2);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut hub = hub();
        let peer = Peer::connect(&mut hub);

        hub.state_mut().unregister(&peer.client);
        hub.state_mut().unregister(&peer.client);
        hub.flush();

        assert!(!hub.state().is_tracked(&peer.client));
        assert!(peer.client.is_closed());
        assert!(hub.state().clients_of("duel").is_empty());
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    #[test]
    fn test_join_unknown_room_is_rejected() {
        let mut hub = hub();
        let mut peer = Peer::connect(&mut hub);
        peer.inbox();

        peer.say(&mut hub, "joi", json!({ "rom": "NOPE" }));

        let inbox = peer.inbox();
        assert_eq!(find(&inbox, "err"), vec![&json!({ "des": "inexistent_room" })]);
    }

    #[tokio::test]
    async fn test_create_room_errors() {
        let mut hub = hub();
        let mut peer = Peer::connect(&mut hub);

        peer.say(&mut hub, "cre", json!({ "drv": "chess" }));
        peer.say(&mut hub, "cre", json!({ "nam": "Ann" }));
        peer.say(&mut hub, "cre", Value::Null);

        let inbox = peer.inbox();
        assert_eq!(
            find(&inbox, "err"),
            vec![
                &json!({ "des": "inexistent_driver" }),
                &json!({ "des": "already_in_a_room" })
            ]
        );
        assert_eq!(peer.client.name(), "Ann");
        assert_eq!(hub.state().room_count(), 1);
    }

    #[tokio::test]
    async fn test_create_join_start_and_play() {
        let mut hub = hub();
        let mut alice = Peer::connect(&mut hub);
        let mut bob = Peer::connect(&mut hub);
        alice.inbox();
        bob.inbox();

        alice.say(&mut hub, "cre", Value::Null);
        let id = alice.client.room().unwrap();
        let inbox = alice.inbox();
        assert_eq!(
            find(&inbox, "joi"),
            vec![&json!({ "num": 0, "id": id.as_str(), "own": true })]
        );
        assert_eq!(find(&bob.inbox(), "rms"), vec![&json!({ "val": [id.as_str()] })]);

        bob.say(&mut hub, "joi", json!({ "rom": id.as_str() }));
        let inbox = bob.inbox();
        assert_eq!(
            find(&inbox, "joi"),
            vec![&json!({ "num": 1, "id": id.as_str(), "own": false })]
        );
        assert_eq!(find(&inbox, "pls").len(), 1);
        assert_eq!(alice.kinds(), vec!["pls"]);

        alice.say(&mut hub, "ini", json!({ "pto": 0, "gpa": { "board": 3 } }));
        for peer in [&mut alice, &mut bob] {
            let inbox = peer.inbox();
            let updates: Vec<Option<u64>> = inbox
                .iter()
                .filter(|m| m.kind == "upd")
                .map(|m| m.sequence)
                .collect();
            assert_eq!(updates, vec![Some(1)]);
            assert_eq!(
                find(&inbox, "gst"),
                vec![&json!({ "pto": 0, "gpa": { "board": 3 } })]
            );
            assert_eq!(find(&inbox, "rms"), vec![&json!({ "val": [] })]);
        }

        // Bob is not in turn: ignored.
        bob.say(&mut hub, "mov", Value::Null);
        assert!(bob.inbox().is_empty());

        alice.say(&mut hub, "mov", Value::Null);
        let inbox = bob.inbox();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sequence, Some(2));
        assert_eq!(inbox[0].content, json!({ "you": 1, "moves": 1 }));
        assert_eq!(hub.state().room(&id).unwrap().sequence(), 2);
    }

    #[tokio::test]
    async fn test_game_panic_tears_down_room_once() {
        let mut hub = hub();
        let (mut alice, mut bob, id) = started_duel(&mut hub);

        alice.say(&mut hub, "boom", Value::Null);

        for peer in [&mut alice, &mut bob] {
            let inbox = peer.inbox();
            assert_eq!(find(&inbox, "out"), vec![&json!({ "rea": "pan" })]);
            assert!(peer.client.room().is_none());
        }
        assert!(hub.state().room(&id).is_none());
        assert!(hub.state().room_infos().is_empty());
        assert!(hub.state().is_tracked(&alice.client));
    }

    #[tokio::test]
    async fn test_move_reaches_bots_with_one_new_sequence() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let make: AiFactory = Arc::new(move || -> Box<dyn Ai> {
            Box::new(RecordingAi {
                seen: recorded.clone(),
            })
        });
        let mut hub = hub_with_ai(make);
        let mut alice = Peer::connect(&mut hub);
        let mut bob = Peer::connect(&mut hub);
        alice.say(&mut hub, "cre", Value::Null);
        let id = alice.client.room().unwrap();
        bob.say(&mut hub, "joi", json!({ "rom": id.as_str() }));
        alice.say(&mut hub, "bot", json!({}));
        alice.say(&mut hub, "ini", json!({ "pto": 0 }));
        alice.inbox();
        bob.inbox();

        alice.say(&mut hub, "mov", Value::Null);

        for peer in [&mut alice, &mut bob] {
            let inbox = peer.inbox();
            let updates: Vec<_> = inbox.iter().filter(|m| m.kind == "upd").collect();
            assert_eq!(updates.len(), 1);
            assert_eq!(updates[0].sequence, Some(2));
        }
        settle(&mut hub, |_| seen.lock().unwrap().len() == 2).await;
        assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(1)]);

        let room = hub.state().room(&id).unwrap();
        assert_eq!(room.sequence(), 2);
        assert_eq!(room.clients().count(), 3);
    }

    #[tokio::test]
    async fn test_bot_panic_drops_only_the_bot() {
        let make: AiFactory = Arc::new(|| -> Box<dyn Ai> { Box::new(PanickyAi) });
        let mut hub = hub_with_ai(make);
        let mut alice = Peer::connect(&mut hub);
        alice.say(&mut hub, "cre", Value::Null);
        let id = alice.client.room().unwrap();
        alice.say(&mut hub, "bot", json!({}));
        alice.say(&mut hub, "ini", json!({ "pto": 0 }));
        alice.inbox();

        settle(&mut hub, |hub| {
            hub.state()
                .room(&id)
                .is_some_and(|room| room.clients().count() == 1)
        })
        .await;

        let room = hub.state().room(&id).expect("room should survive the bot");
        assert_eq!(room.slot_count(), 2);
        assert_eq!(room.human_count(), 1);
        let kinds = alice.kinds();
        assert!(kinds.contains(&"pls".to_string()), "{kinds:?}");
        assert!(kinds.contains(&"upd".to_string()), "{kinds:?}");
        assert!(!kinds.contains(&"out".to_string()), "{kinds:?}");
        assert_eq!(alice.client.room(), Some(id));
    }

    #[tokio::test]
    async fn test_terminate_requires_owner() {
        let mut hub = hub();
        let (mut alice, mut bob, id) = started_duel(&mut hub);

        bob.say(&mut hub, "ter", Value::Null);
        assert_eq!(find(&bob.inbox(), "err"), vec![&json!({ "des": "forbidden" })]);
        assert!(hub.state().room(&id).is_some());

        alice.say(&mut hub, "ter", Value::Null);
        assert_eq!(find(&alice.inbox(), "out"), vec![&json!({ "rea": "ter" })]);
        assert_eq!(find(&bob.inbox(), "out"), vec![&json!({ "rea": "ter" })]);
        assert_eq!(hub.state().room_count(), 0);
    }

    #[tokio::test]
    async fn test_room_message_outside_room_is_rejected() {
        let mut hub = hub();
        let mut peer = Peer::connect(&mut hub);

        peer.say(&mut hub, "ini", Value::Null);
        peer.say(&mut hub, "ter", Value::Null);

        let inbox = peer.inbox();
        assert_eq!(find(&inbox, "err").len(), 2);
        assert!(find(&inbox, "err")
            .iter()
            .all(|c| **c == json!({ "des": "not_in_a_room" })));
    }

    #[tokio::test]
    async fn test_last_human_leaving_destroys_room() {
        let mut hub = hub();
        let (alice, mut bob, id) = started_duel(&mut hub);

        hub.state_mut().unregister(&alice.client);
        hub.flush();
        assert!(hub.state().room(&id).is_some());
        assert_eq!(find(&bob.inbox(), "upd").len(), 1);

        bob.say(&mut hub, "qui", Value::Null);
        assert_eq!(find(&bob.inbox(), "out"), vec![&json!({ "rea": "qui" })]);
        assert!(hub.state().room(&id).is_none());
    }

    #[tokio::test]
    async fn test_messages_from_closed_clients_are_ignored() {
        let mut hub = hub();
        let peer = Peer::connect(&mut hub);
        peer.client.close();

        peer.say(&mut hub, "cre", Value::Null);

        assert_eq!(hub.state().room_count(), 0);
    }

    #[tokio::test]
    async fn test_seeded_room_ids_repeat() {
        let config = HubConfig {
            seed: Some(7),
            ..HubConfig::default()
        };
        let ids: Vec<RoomId> = (0..2)
            .map(|_| {
                let mut hub = hub_with(config.clone());
                let peer = Peer::connect(&mut hub);
                peer.say(&mut hub, "cre", Value::Null);
                peer.client.room().unwrap()
            })
            .collect();

        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[0].as_str().len(), ROOM_ID_LEN);
        assert!(ids[0].as_str().chars().all(|c| c.is_ascii_alphabetic()));
    }

    // -----------------------------------------------------------------------
    // Timers and delivery
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_room_timeout_destroys_room() {
        let mut hub = hub_with(HubConfig {
            room_timeout: Duration::from_secs(5),
            ..HubConfig::default()
        });
        let mut peer = Peer::connect(&mut hub);
        peer.say(&mut hub, "cre", Value::Null);
        peer.inbox();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let expiry = hub.expiries.try_recv().unwrap();
        hub.state_mut().handle_expiry(expiry);
        hub.flush();

        let inbox = peer.inbox();
        assert_eq!(find(&inbox, "out"), vec![&json!({ "rea": "tim" })]);
        assert_eq!(hub.state().room_count(), 0);
    }

    #[tokio::test]
    async fn test_full_outbox_drops_client() {
        let mut hub = hub();
        let slow: ClientRef = NullClient::with_capacity("duel", 1);
        hub.state_mut().register(slow.clone());
        hub.flush();
        assert!(hub.state().is_tracked(&slow));

        let creator = Peer::connect(&mut hub);
        creator.say(&mut hub, "cre", Value::Null);

        assert!(!hub.state().is_tracked(&slow));
        assert!(slow.is_closed());
        assert!(hub.state().is_tracked(&creator.client));
    }

    #[tokio::test]
    async fn test_run_answers_rooms_and_shuts_down() {
        let (hub, handle) = Hub::new(HubConfig::default(), DriverRegistry::new());
        let task = tokio::spawn(hub.run());

        let null = NullClient::new("duel");
        let client: ClientRef = null.clone();
        handle.register(client.clone()).await.unwrap();
        assert!(handle.rooms().await.unwrap().is_empty());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(client.is_closed());
        assert!(matches!(handle.rooms().await, Err(HubError::Closed)));
    }
}

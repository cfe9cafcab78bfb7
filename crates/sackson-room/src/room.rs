//! The room: slots, owner, driver and turn bookkeeping for one game.
//!
//! A room owns no task. The hub calls into it from its event loop, so
//! every method runs to completion before the next message is looked at.
//! Rooms report what happened by emitting [`Event`]s; they never write to
//! clients directly.

use std::collections::BTreeMap;
use std::time::Duration;

use sackson_client::{
    spawn_pumps, BotClient, ClientId, ClientRef, Emitter, Event, IncomingMessage, MessageSender,
    Timer, UnregisterSender,
};
use sackson_protocol::{
    decode_params, AddBotParams, Control, KickPlayerParams, PlayerData, Reason, RoomId,
    SetClientDataParams, StartGameParams,
};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{Driver, RoomError, RoomState};

/// A fired timer, reported back to the hub loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    /// The room's idle timer fired.
    Room(RoomId),
    /// A player's turn timer fired.
    Player { room: RoomId, client: ClientId },
}

/// Where timers report their expiries.
pub type ExpirySender = mpsc::UnboundedSender<Expiry>;

/// Channels a room needs to talk to the rest of the server.
#[derive(Debug, Clone)]
pub struct RoomLinks {
    pub events: Emitter,
    pub expiries: ExpirySender,
    /// Hub inbox, handed to bot read pumps.
    pub messages: MessageSender,
    pub unregister: UnregisterSender,
    /// Outbound buffer size for bots.
    pub bot_capacity: usize,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomInfo {
    pub id: RoomId,
    /// Driver name.
    pub game: String,
    pub state: RoomState,
    /// Occupied slots, bots included.
    pub player_count: usize,
    pub owner: Option<String>,
}

pub struct Room {
    id: RoomId,
    game: String,
    /// Slot per player number. `None` marks a player who left a started
    /// game.
    clients: Vec<Option<ClientRef>>,
    owner: Option<ClientRef>,
    driver: Box<dyn Driver>,
    timer: Option<Timer>,
    player_timeout: Duration,
    client_in_turn: Option<ClientRef>,
    sequence: u64,
    bots_added: usize,
    destroyed: bool,
    links: RoomLinks,
}

impl Room {
    pub fn new(id: RoomId, game: impl Into<String>, driver: Box<dyn Driver>, links: RoomLinks) -> Self {
        Self {
            id,
            game: game.into(),
            clients: Vec::new(),
            owner: None,
            driver,
            timer: None,
            player_timeout: Duration::ZERO,
            client_in_turn: None,
            sequence: 0,
            bots_added: 0,
            destroyed: false,
            links,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Name of the driver this room runs.
    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn owner(&self) -> Option<&ClientRef> {
        self.owner.as_ref()
    }

    pub fn is_owner(&self, client: &ClientRef) -> bool {
        self.owner.as_ref().is_some_and(|o| o.id() == client.id())
    }

    /// Present clients in slot order, tombstones skipped.
    pub fn clients(&self) -> impl Iterator<Item = &ClientRef> {
        self.clients.iter().flatten()
    }

    /// Number of slots, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.clients.len()
    }

    pub fn human_count(&self) -> usize {
        self.clients().filter(|c| !c.is_bot()).count()
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.position(client).is_some()
    }

    pub fn client_in_turn(&self) -> Option<&ClientRef> {
        self.client_in_turn.as_ref()
    }

    /// Sequence number of the last status broadcast.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn player_timeout(&self) -> Duration {
        self.player_timeout
    }

    pub fn state(&self) -> RoomState {
        if self.destroyed {
            RoomState::Destroyed
        } else if self.driver.is_game_over() {
            RoomState::Over
        } else if self.driver.game_started() {
            RoomState::InProgress
        } else {
            RoomState::Waiting
        }
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id.clone(),
            game: self.game.clone(),
            state: self.state(),
            player_count: self.clients().count(),
            owner: self.owner.as_ref().map(|o| o.name()),
        }
    }

    fn position(&self, client: ClientId) -> Option<usize> {
        self.clients
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|c| c.id() == client))
    }

    // -----------------------------------------------------------------------
    // Room timer
    // -----------------------------------------------------------------------

    /// Arms the idle timer. When it fires the hub destroys the room with
    /// reason "room timeout".
    pub fn arm_timer(&mut self, after: Duration) {
        let expiries = self.links.expiries.clone();
        let id = self.id.clone();
        let mut timer = Timer::new(after, move || {
            let _ = expiries.send(Expiry::Room(id.clone()));
        });
        timer.start();
        if let Some(mut previous) = self.timer.replace(timer) {
            previous.stop();
        }
    }

    pub fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer.stop();
        }
    }

    // -----------------------------------------------------------------------
    // Message dispatch
    // -----------------------------------------------------------------------

    /// Handles one message from a member.
    ///
    /// Ordinary failures are reported to the author as an error event and
    /// swallowed.
    ///
    /// # Errors
    /// Only fatal errors are returned; the caller must destroy the room.
    pub fn parse(&mut self, message: &IncomingMessage) -> Result<(), RoomError> {
        let result = match message.control() {
            Some(Control::StartGame) => self.start_game_action(message),
            Some(Control::AddBot) => self.add_bot_action(message),
            Some(Control::KickPlayer) => self.kick_player_action(message),
            Some(Control::PlayerQuits) => self.quit_action(message),
            Some(Control::SetClientData) => self.set_client_data_action(message),
            Some(other) => {
                tracing::debug!(room = %self.id, control = %other, "hub control reached a room, ignoring");
                Ok(())
            }
            None => self.game_action(message),
        };
        match result {
            Err(e) if !e.is_fatal() => {
                tracing::warn!(
                    room = %self.id,
                    client = %message.author.id(),
                    kind = %message.kind,
                    error = %e,
                    "action rejected"
                );
                self.emit_error(&message.author, &e);
                Ok(())
            }
            other => other,
        }
    }

    fn emit_error(&self, client: &ClientRef, error: &RoomError) {
        self.links.events.emit(Event::Error {
            client: client.clone(),
            code: error.code().to_string(),
        });
    }

    fn require_owner(&self, client: &ClientRef) -> Result<(), RoomError> {
        if self.is_owner(client) {
            Ok(())
        } else {
            Err(RoomError::Forbidden)
        }
    }

    fn game_action(&mut self, message: &IncomingMessage) -> Result<(), RoomError> {
        if self.driver.is_game_over() {
            return Err(RoomError::GameOver);
        }
        let in_turn = self
            .client_in_turn
            .as_ref()
            .is_some_and(|c| c.id() == message.author.id());
        if !in_turn {
            tracing::debug!(room = %self.id, client = %message.author.id(), "out of turn, ignoring");
            return Ok(());
        }
        self.driver
            .execute(&message.author.name(), &message.kind, &message.content)?;
        self.broadcast_status()?;
        self.change_client_in_turn()
    }

    fn start_game_action(&mut self, message: &IncomingMessage) -> Result<(), RoomError> {
        self.require_owner(&message.author)?;
        if self.driver.game_started() {
            return Err(RoomError::GameAlreadyStarted);
        }
        let params: StartGameParams = decode_params(&message.content)?;

        let players: BTreeMap<usize, String> = self
            .clients
            .iter()
            .enumerate()
            .filter_map(|(n, slot)| slot.as_ref().map(|c| (n, c.name())))
            .collect();
        self.driver.start_game(&players)?;

        self.player_timeout = Duration::from_secs(params.player_timeout);
        if !self.player_timeout.is_zero() {
            for client in self.clients.iter().flatten().filter(|c| !c.is_bot()) {
                let expiries = self.links.expiries.clone();
                let room = self.id.clone();
                let id = client.id();
                client.set_timer(Timer::new(self.player_timeout, move || {
                    let _ = expiries.send(Expiry::Player {
                        room: room.clone(),
                        client: id,
                    });
                }));
            }
        }
        tracing::info!(
            room = %self.id,
            players = players.len(),
            player_timeout = params.player_timeout,
            "game started"
        );

        self.broadcast_status()?;
        self.change_client_in_turn()?;
        self.links.events.emit(Event::GameStarted {
            room: self.id.clone(),
            game: self.game.clone(),
            clients: self.clients().cloned().collect(),
            player_timeout: params.player_timeout,
            game_params: params.game_params,
        });
        Ok(())
    }

    fn add_bot_action(&mut self, message: &IncomingMessage) -> Result<(), RoomError> {
        self.require_owner(&message.author)?;
        let params: AddBotParams = decode_params(&message.content)?;
        let ai = self.driver.create_ai(&params.level)?;

        let bot: ClientRef = BotClient::new(
            ai,
            self.game.clone(),
            self.links.bot_capacity,
            self.links.events.clone(),
        );
        bot.set_name(&format!("Bot {}", self.bots_added + 1));
        self.add_client(bot.clone())?;
        self.bots_added += 1;
        spawn_pumps(bot, self.links.messages.clone(), self.links.unregister.clone());
        Ok(())
    }

    fn kick_player_action(&mut self, message: &IncomingMessage) -> Result<(), RoomError> {
        self.require_owner(&message.author)?;
        let params: KickPlayerParams = decode_params(&message.content)?;
        let target = self
            .clients
            .get(params.player_number)
            .and_then(Option::clone)
            .ok_or(RoomError::InexistentClient(params.player_number))?;
        if self.is_owner(&target) {
            return Err(RoomError::OwnerNotRemovable);
        }
        self.remove_client(&target, Some(Reason::Kicked))?;
        if target.is_bot() {
            target.close();
        }
        Ok(())
    }

    fn quit_action(&mut self, message: &IncomingMessage) -> Result<(), RoomError> {
        self.remove_client(&message.author, Some(Reason::Quit))
    }

    fn set_client_data_action(&mut self, message: &IncomingMessage) -> Result<(), RoomError> {
        let params: SetClientDataParams = decode_params(&message.content)?;
        let name = params.name.trim();
        if !name.is_empty() {
            message.author.set_name(name);
            self.emit_roster();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Seats a human. The first human to join owns the room.
    pub fn add_human(&mut self, client: ClientRef) -> Result<(), RoomError> {
        self.add_client(client)
    }

    fn add_client(&mut self, client: ClientRef) -> Result<(), RoomError> {
        if self.driver.game_started() {
            return Err(RoomError::GameAlreadyStarted);
        }
        if client.room().is_some() {
            return Err(RoomError::AlreadyInRoom);
        }
        self.driver.add_player(&client.name())?;

        self.clients.push(Some(client.clone()));
        let number = self.clients.len() - 1;
        if self.owner.is_none() && !client.is_bot() {
            self.owner = Some(client.clone());
        }
        client.set_room(Some(self.id.clone()));
        tracing::info!(room = %self.id, client = %client.id(), number, bot = client.is_bot(), "client joined");

        self.links.events.emit(Event::ClientJoined {
            owner: self.is_owner(&client),
            client,
            room: self.id.clone(),
            number,
        });
        self.emit_roster();
        Ok(())
    }

    /// Detaches `client` from the room. A no-op for non-members.
    ///
    /// `reason` is `None` when the client disconnected and can't be told.
    ///
    /// # Errors
    /// Fails fatally when the driver refuses to let the player go: slots
    /// and driver would disagree from then on.
    pub fn remove_client(&mut self, client: &ClientRef, reason: Option<Reason>) -> Result<(), RoomError> {
        let Some(number) = self.position(client.id()) else {
            return Ok(());
        };
        let started = self.driver.game_started();
        let detached = if started {
            self.driver.deactivate_player(number)
        } else {
            self.driver.remove_player(number)
        };
        detached.map_err(|e| RoomError::Fatal(format!("driver kept player {number}: {e}")))?;
        if started {
            self.clients[number] = None;
        } else {
            self.clients.remove(number);
        }

        client.stop_timer();
        client.set_room(None);
        tracing::info!(room = %self.id, client = %client.id(), number, ?reason, "client left");
        self.links.events.emit(Event::ClientOut {
            client: client.clone(),
            room: self.id.clone(),
            reason,
        });

        if self.is_owner(client) {
            let next_owner = self.clients().find(|c| !c.is_bot()).cloned();
            self.owner = next_owner;
            if let Some(owner) = &self.owner {
                tracing::debug!(room = %self.id, owner = %owner.id(), "ownership handed over");
            }
        }
        self.emit_roster();

        if started && !self.driver.is_game_over() {
            self.broadcast_status()?;
            self.change_client_in_turn()?;
        } else if self
            .client_in_turn
            .as_ref()
            .is_some_and(|c| c.id() == client.id())
        {
            self.client_in_turn = None;
        }
        Ok(())
    }

    /// Removes a player whose turn timer fired. Expiries that lost a race
    /// with a move or a departure are ignored.
    pub fn timeout_player(&mut self, client: ClientId) -> Result<(), RoomError> {
        let Some(target) = self
            .client_in_turn
            .as_ref()
            .filter(|c| c.id() == client)
            .cloned()
        else {
            tracing::debug!(room = %self.id, client = %client, "stale turn expiry");
            return Ok(());
        };
        tracing::info!(room = %self.id, client = %client, "player timed out");
        self.remove_client(&target, Some(Reason::PlayerTimedOut))
    }

    /// Detaches everyone: humans hear `reason`, bots are closed.
    pub fn shutdown(&mut self, reason: Reason) {
        self.stop_timer();
        for client in self.clients.drain(..).flatten() {
            client.stop_timer();
            client.set_room(None);
            if client.is_bot() {
                client.close();
            } else {
                self.links.events.emit(Event::ClientOut {
                    client,
                    room: self.id.clone(),
                    reason: Some(reason),
                });
            }
        }
        self.owner = None;
        self.client_in_turn = None;
        self.destroyed = true;
    }

    // -----------------------------------------------------------------------
    // Broadcasts
    // -----------------------------------------------------------------------

    fn emit_roster(&self) {
        let players = self
            .clients
            .iter()
            .enumerate()
            .filter_map(|(n, slot)| {
                slot.as_ref().map(|c| {
                    let data = PlayerData {
                        name: c.name(),
                        owner: self.is_owner(c),
                        bot: c.is_bot(),
                    };
                    (n, data)
                })
            })
            .collect();
        self.links.events.emit(Event::ClientsUpdated {
            room: self.id.clone(),
            clients: self.clients().cloned().collect(),
            players,
        });
    }

    /// Sends every member its view of the game under a fresh sequence
    /// number. Once the game is over bots are skipped.
    ///
    /// Runs after the driver has already changed state, so any driver
    /// failure here is fatal. Nothing is emitted and the sequence is left
    /// alone unless every status could be built.
    fn broadcast_status(&mut self) -> Result<(), RoomError> {
        let over = self.driver.is_game_over();
        let mut statuses = Vec::with_capacity(self.clients.len());
        for (n, slot) in self.clients.iter().enumerate() {
            let Some(client) = slot else { continue };
            if over && client.is_bot() {
                continue;
            }
            let status = self
                .driver
                .status(n)
                .map_err(|e| RoomError::Fatal(format!("no status for player {n}: {e}")))?;
            statuses.push((client.clone(), status));
        }

        self.sequence += 1;
        for (client, status) in statuses {
            self.links.events.emit(Event::GameStatusUpdated {
                client,
                status,
                sequence: self.sequence,
            });
        }
        Ok(())
    }

    /// Moves the turn timer to whoever the driver says plays next. A
    /// driver failure is fatal for the same reason as in
    /// [`broadcast_status`](Self::broadcast_status).
    fn change_client_in_turn(&mut self) -> Result<(), RoomError> {
        let next = if self.driver.is_game_over() {
            None
        } else {
            let number = self
                .driver
                .current_player_number()
                .map_err(|e| RoomError::Fatal(format!("no current player: {e}")))?;
            match self.clients.get(number) {
                Some(slot) => slot.clone(),
                None => {
                    return Err(RoomError::Fatal(format!(
                        "current player {number} has no slot"
                    )));
                }
            }
        };

        let unchanged = match (&self.client_in_turn, &next) {
            (Some(current), Some(next)) => current.id() == next.id(),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }
        if let Some(previous) = &self.client_in_turn {
            previous.stop_timer();
        }
        if let Some(next) = &next {
            if !next.is_bot() && !self.player_timeout.is_zero() {
                next.start_timer();
            }
        }
        self.client_in_turn = next;
        Ok(())
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("game", &self.game)
            .field("state", &self.state())
            .field("slots", &self.clients.len())
            .field("sequence", &self.sequence)
            .finish()
    }
}

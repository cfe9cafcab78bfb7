//! Event delivery: turns room and hub events into outbound messages.
//!
//! Every [`EventKind`] gets a callback here; the observer treats a kind
//! without one as a wiring bug.

use sackson_client::{Event, EventKind, Observer};
use sackson_protocol::{
    outgoing, ClientOut, CurrentPlayers, ErrorMessage, GameStarted, JoinedRoom, OutgoingMessage,
};

use crate::hub::HubState;

pub(crate) fn register_events(observer: &mut Observer<HubState>) {
    observer.on(EventKind::GameStatusUpdated, |hub, event| {
        if let Event::GameStatusUpdated {
            client,
            status,
            sequence,
        } = event
        {
            hub.send(client, &OutgoingMessage::update(*sequence, status));
        }
    });

    observer.on(EventKind::ClientOut, |hub, event| {
        if let Event::ClientOut {
            client,
            room,
            reason,
        } = event
        {
            if let Some(reason) = reason {
                hub.send(
                    client,
                    &OutgoingMessage::new(outgoing::CLIENT_OUT, ClientOut { reason: *reason }),
                );
            }
            hub.destroy_if_abandoned(room);
        }
    });

    observer.on(EventKind::ClientJoined, |hub, event| {
        if let Event::ClientJoined {
            client,
            room,
            number,
            owner,
        } = event
        {
            let joined = JoinedRoom {
                number: *number,
                room: room.clone(),
                owner: *owner,
            };
            hub.send(client, &OutgoingMessage::new(outgoing::JOINED_ROOM, joined));
        }
    });

    observer.on(EventKind::ClientsUpdated, |hub, event| {
        if let Event::ClientsUpdated {
            clients, players, ..
        } = event
        {
            let roster = CurrentPlayers {
                players: players.clone(),
            };
            hub.broadcast(clients, &OutgoingMessage::new(outgoing::CURRENT_PLAYERS, roster));
        }
    });

    observer.on(EventKind::GameStarted, |hub, event| {
        if let Event::GameStarted {
            game,
            clients,
            player_timeout,
            game_params,
            ..
        } = event
        {
            let started = GameStarted {
                player_timeout: *player_timeout,
                game_params: game_params.clone(),
            };
            hub.broadcast(clients, &OutgoingMessage::new(outgoing::GAME_STARTED, started));
            // The room is no longer joinable.
            hub.broadcast_rooms(game);
        }
    });

    observer.on(EventKind::RoomCreated, |hub, event| {
        if let Event::RoomCreated { game, .. } = event {
            hub.broadcast_rooms(game);
        }
    });

    observer.on(EventKind::RoomDestroyed, |hub, event| {
        if let Event::RoomDestroyed { game, .. } = event {
            hub.broadcast_rooms(game);
        }
    });

    observer.on(EventKind::ClientRegistered, |hub, event| {
        if let Event::ClientRegistered { client } = event {
            let list = sackson_protocol::RoomsList {
                rooms: hub.waiting_rooms(client.game()),
            };
            hub.send(client, &OutgoingMessage::new(outgoing::ROOMS_LIST, list));
        }
    });

    observer.on(EventKind::ClientUnregistered, |_, event| {
        if let Event::ClientUnregistered { client } = event {
            tracing::debug!(client = %client.id(), "unregistration delivered");
        }
    });

    observer.on(EventKind::Error, |hub, event| {
        if let Event::Error { client, code } = event {
            let error = ErrorMessage { code: code.clone() };
            hub.send(client, &OutgoingMessage::new(outgoing::ERROR, error));
        }
    });

    observer.on(EventKind::BotPanicked, |hub, event| {
        if let Event::BotPanicked { client, cause } = event {
            tracing::error!(client = %client.id(), name = %client.name(), cause = %cause, "bot panicked");
            hub.drop_unreachable(client);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_event_kind_is_handled() {
        let mut observer = Observer::new();
        register_events(&mut observer);
        for kind in EventKind::ALL {
            assert!(observer.handles(kind), "{kind:?} has no handler");
        }
    }
}

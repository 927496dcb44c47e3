use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use uuid::Uuid;

use crate::protocol::{ClientMsg, ServerMsg};

pub type ClientId = Uuid;

pub const ROOM_CAPACITY: usize = 2;
pub const ROOM_CODE_LEN: usize = 6;

/// A message to deliver to one connected client.
pub type Delivery = (ClientId, ServerMsg);

#[derive(Debug, Default)]
pub struct Room {
    pub members: Vec<ClientId>,
}

/// Rooms and their members. Pure bookkeeping: every call returns the
/// messages to send and the server does the sending.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn fresh_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(ROOM_CODE_LEN)
                .map(char::from)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn handle(&mut self, from: ClientId, msg: ClientMsg) -> Vec<Delivery> {
        match msg {
            ClientMsg::CreateRoom => {
                let room_id = self.fresh_code();
                self.rooms.insert(room_id.clone(), Room { members: vec![from] });
                vec![(from, ServerMsg::RoomCreated { room_id })]
            }

            ClientMsg::JoinRoom { room_id } => self.join(from, room_id),

            ClientMsg::DeleteRoom { room_id } => self.delete(from, room_id),

            ClientMsg::UpdateInput { room_id, payload } => {
                self.forward(from, &room_id, ServerMsg::ReceiveInput { payload })
            }

            ClientMsg::UpdatePos { room_id, payload } => {
                self.forward(from, &room_id, ServerMsg::ReceivePos { payload })
            }

            ClientMsg::Ping { t } => vec![(from, ServerMsg::Pong { t })],
        }
    }

    fn join(&mut self, from: ClientId, room_id: String) -> Vec<Delivery> {
        let refuse = |reason: &str| {
            vec![(
                from,
                ServerMsg::JoinResult { success: false, error_message: Some(reason.to_string()) },
            )]
        };

        let Some(room) = self.rooms.get_mut(&room_id) else {
            return refuse("Room not found");
        };
        if room.members.contains(&from) {
            return vec![(from, ServerMsg::JoinResult { success: true, error_message: None })];
        }
        if room.members.len() >= ROOM_CAPACITY {
            return refuse("Room is full");
        }

        let mut out: Vec<Delivery> = room
            .members
            .iter()
            .map(|other| (*other, ServerMsg::SomebodyJoined { room_id: room_id.clone() }))
            .collect();
        room.members.push(from);
        out.insert(0, (from, ServerMsg::JoinResult { success: true, error_message: None }));
        out
    }

    /// Only a member may delete a room. Deleting a room that is already gone
    /// is acknowledged.
    fn delete(&mut self, from: ClientId, room_id: String) -> Vec<Delivery> {
        match self.rooms.get(&room_id) {
            Some(room) if !room.members.contains(&from) => vec![(
                from,
                ServerMsg::Error { message: "Not a member of this room".to_string() },
            )],
            _ => {
                self.rooms.remove(&room_id);
                vec![(from, ServerMsg::RoomDeleted { room_id })]
            }
        }
    }

    /// Copy `msg` to every other member. Non-members are ignored.
    fn forward(&self, from: ClientId, room_id: &str, msg: ServerMsg) -> Vec<Delivery> {
        let Some(room) = self.rooms.get(room_id) else { return Vec::new() };
        if !room.members.contains(&from) {
            return Vec::new();
        }
        room.members
            .iter()
            .filter(|m| **m != from)
            .map(|m| (*m, msg.clone()))
            .collect()
    }

    /// Drop `client` from every room and discard rooms left empty.
    pub fn disconnect(&mut self, client: ClientId) {
        for room in self.rooms.values_mut() {
            room.members.retain(|m| *m != client);
        }
        self.rooms.retain(|_, room| !room.members.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PoseBundle;

    fn created(registry: &mut RoomRegistry, host: ClientId) -> String {
        match registry.handle(host, ClientMsg::CreateRoom).pop() {
            Some((_, ServerMsg::RoomCreated { room_id })) => room_id,
            other => panic!("expected room-created, got {other:?}"),
        }
    }

    #[test]
    fn room_codes_are_six_alphanumerics() {
        let mut registry = RoomRegistry::new();
        let code = created(&mut registry, Uuid::new_v4());
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn join_notifies_host_and_confirms_guest() {
        let mut registry = RoomRegistry::new();
        let (host, guest) = (Uuid::new_v4(), Uuid::new_v4());
        let room = created(&mut registry, host);

        let out = registry.handle(guest, ClientMsg::JoinRoom { room_id: room.clone() });
        assert_eq!(
            out,
            vec![
                (guest, ServerMsg::JoinResult { success: true, error_message: None }),
                (host, ServerMsg::SomebodyJoined { room_id: room.clone() }),
            ]
        );
        assert_eq!(registry.room(&room).unwrap().members, vec![host, guest]);
    }

    #[test]
    fn join_refuses_missing_and_full_rooms() {
        let mut registry = RoomRegistry::new();
        let (host, guest, third) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let out = registry.handle(guest, ClientMsg::JoinRoom { room_id: "nope00".into() });
        assert_eq!(
            out,
            vec![(guest, ServerMsg::JoinResult {
                success: false,
                error_message: Some("Room not found".into())
            })]
        );

        let room = created(&mut registry, host);
        registry.handle(guest, ClientMsg::JoinRoom { room_id: room.clone() });
        let out = registry.handle(third, ClientMsg::JoinRoom { room_id: room.clone() });
        assert_eq!(
            out,
            vec![(third, ServerMsg::JoinResult {
                success: false,
                error_message: Some("Room is full".into())
            })]
        );
        assert_eq!(registry.room(&room).unwrap().members.len(), ROOM_CAPACITY);
    }

    #[test]
    fn updates_reach_the_peer_but_never_echo() {
        let mut registry = RoomRegistry::new();
        let (host, guest, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let room = created(&mut registry, host);
        registry.handle(guest, ClientMsg::JoinRoom { room_id: room.clone() });

        let out = registry.handle(
            host,
            ClientMsg::UpdatePos { room_id: room.clone(), payload: PoseBundle::default() },
        );
        assert_eq!(out, vec![(guest, ServerMsg::ReceivePos { payload: PoseBundle::default() })]);

        let out = registry.handle(
            guest,
            ClientMsg::UpdateInput { room_id: room.clone(), payload: "{}".into() },
        );
        assert_eq!(out, vec![(host, ServerMsg::ReceiveInput { payload: "{}".into() })]);

        let out = registry.handle(
            stranger,
            ClientMsg::UpdateInput { room_id: room, payload: "{}".into() },
        );
        assert!(out.is_empty());
    }

    #[test]
    fn only_members_can_delete_a_room() {
        let mut registry = RoomRegistry::new();
        let (host, guest, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let room = created(&mut registry, host);
        registry.handle(guest, ClientMsg::JoinRoom { room_id: room.clone() });

        let out = registry.handle(stranger, ClientMsg::DeleteRoom { room_id: room.clone() });
        assert_eq!(
            out,
            vec![(stranger, ServerMsg::Error { message: "Not a member of this room".into() })]
        );
        assert_eq!(registry.room(&room).unwrap().members, vec![host, guest]);

        let out = registry.handle(guest, ClientMsg::DeleteRoom { room_id: room.clone() });
        assert_eq!(out, vec![(guest, ServerMsg::RoomDeleted { room_id: room })]);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn disconnect_drops_empty_rooms() {
        let mut registry = RoomRegistry::new();
        let (host, guest) = (Uuid::new_v4(), Uuid::new_v4());
        let room = created(&mut registry, host);
        registry.handle(guest, ClientMsg::JoinRoom { room_id: room.clone() });

        registry.disconnect(host);
        assert_eq!(registry.room(&room).unwrap().members, vec![guest]);
        registry.disconnect(guest);
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn delete_and_ping() {
        let mut registry = RoomRegistry::new();
        let host = Uuid::new_v4();
        let room = created(&mut registry, host);

        let out = registry.handle(host, ClientMsg::DeleteRoom { room_id: room.clone() });
        assert_eq!(out, vec![(host, ServerMsg::RoomDeleted { room_id: room })]);
        assert_eq!(registry.room_count(), 0);

        assert_eq!(registry.handle(host, ClientMsg::Ping { t: 42 }), vec![(host, ServerMsg::Pong { t: 42 })]);
    }
}

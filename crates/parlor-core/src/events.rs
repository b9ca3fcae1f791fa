use serde::{Deserialize, Serialize};

use crate::code::RoomCode;
use crate::game::GameId;
use crate::player::UserId;

/// Outbound notifications fanned out to a room's channel.
///
/// Every variant names the originating room so the broadcast layer
/// can route it without inspecting the payload. Delivery is
/// at-least-once with no ordering guarantee across rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    RoomCreated {
        room: RoomCode,
    },
    GameCreated {
        room: RoomCode,
        game: GameId,
    },
    GameStarted {
        room: RoomCode,
        game: GameId,
    },
    PlayerJoinedGame {
        room: RoomCode,
        game: GameId,
        user: UserId,
    },
    GameAbandoned {
        room: RoomCode,
        game: GameId,
    },
    GameComplete {
        room: RoomCode,
        game: GameId,
    },
    /// Human-readable narration of the above ("X has finished their
    /// prompts.").
    System {
        room: RoomCode,
        text: String,
    },
}

impl Notification {
    pub fn system(room: RoomCode, text: impl Into<String>) -> Self {
        Self::System {
            room,
            text: text.into(),
        }
    }

    /// The room this notification belongs to.
    pub fn room(&self) -> &RoomCode {
        match self {
            Self::RoomCreated { room }
            | Self::GameCreated { room, .. }
            | Self::GameStarted { room, .. }
            | Self::PlayerJoinedGame { room, .. }
            | Self::GameAbandoned { room, .. }
            | Self::GameComplete { room, .. }
            | Self::System { room, .. } => room,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::RoomCode;

    fn room() -> RoomCode {
        RoomCode::parse("AB12CD").unwrap()
    }

    #[test]
    fn notifications_are_internally_tagged() {
        let n = Notification::GameComplete {
            room: room(),
            game: GameId::new(),
        };
        let json: serde_json::Value = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "GameComplete");
        assert_eq!(json["room"], "AB12CD");
    }

    #[test]
    fn every_variant_reports_its_room() {
        let game = GameId::new();
        let user = UserId::new();
        let all = [
            Notification::RoomCreated { room: room() },
            Notification::GameCreated { room: room(), game },
            Notification::GameStarted { room: room(), game },
            Notification::PlayerJoinedGame {
                room: room(),
                game,
                user,
            },
            Notification::GameAbandoned { room: room(), game },
            Notification::GameComplete { room: room(), game },
            Notification::system(room(), "hello"),
        ];
        for n in all {
            assert_eq!(n.room(), &room());
        }
    }

    #[test]
    fn system_round_trip() {
        let n = Notification::system(room(), "Everyone has finished");
        let bytes = serde_json::to_vec(&n).unwrap();
        let back: Notification = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, n);
    }
}

use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::seq::IteratorRandom;

use parlor_core::code::{self, CodeError, RoomCode};
use parlor_core::game::{GameId, GameSession};
use parlor_core::player::{PlayerProfile, UserId};

#[derive(Debug, PartialEq, Eq)]
pub enum RegistryError {
    RoomNotFound(RoomCode),
    GameNotFound(GameId),
    UserAlreadyInRoom(UserId, RoomCode),
    UserNotInRoom(UserId, RoomCode),
    RoomFull(RoomCode),
    /// No registered room has free capacity.
    NoAvailableRoom,
    Code(CodeError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomNotFound(room) => write!(f, "room {room} not found"),
            Self::GameNotFound(game) => write!(f, "game {game} not found"),
            Self::UserAlreadyInRoom(user, room) => {
                write!(f, "user {user} is already in room {room}")
            },
            Self::UserNotInRoom(user, room) => {
                write!(f, "user {user} is not a member of room {room}")
            },
            Self::RoomFull(room) => write!(f, "room {room} is full"),
            Self::NoAvailableRoom => write!(f, "no room with free capacity"),
            Self::Code(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Code(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodeError> for RegistryError {
    fn from(e: CodeError) -> Self {
        Self::Code(e)
    }
}

/// A lobby of up to `max_users_per_room` users and the game sessions
/// they own. Rooms exclusively own their games; games never outlive
/// their room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    members: HashMap<UserId, PlayerProfile>,
    games: HashMap<GameId, GameSession>,
}

impl Room {
    fn new(code: RoomCode) -> Self {
        Self {
            code,
            members: HashMap::new(),
            games: HashMap::new(),
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, user: UserId) -> Option<&PlayerProfile> {
        self.members.get(&user)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.members.keys().copied()
    }
}

/// Owns every room and is the single mutation authority over room and
/// game state. Not thread-safe on its own: the coordinator wraps it
/// in an `RwLock` and takes the write side for every read-decide-write
/// sequence.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    max_users_per_room: usize,
}

impl RoomRegistry {
    pub fn new(max_users_per_room: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            max_users_per_room,
        }
    }

    /// Allocate a fresh room code and insert an empty room.
    pub fn create_room(&mut self) -> Result<RoomCode, RegistryError> {
        let existing: HashSet<RoomCode> = self.rooms.keys().cloned().collect();
        let room_code = code::generate_room_code(&existing)?;
        self.rooms
            .insert(room_code.clone(), Room::new(room_code.clone()));
        tracing::info!(room = %room_code, "room created");
        Ok(room_code)
    }

    /// Add a user to a room, enforcing uniqueness and capacity.
    pub fn join_room(
        &mut self,
        room_code: &RoomCode,
        profile: PlayerProfile,
    ) -> Result<(), RegistryError> {
        let room = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| RegistryError::RoomNotFound(room_code.clone()))?;
        if room.members.contains_key(&profile.user_id) {
            return Err(RegistryError::UserAlreadyInRoom(
                profile.user_id,
                room_code.clone(),
            ));
        }
        if room.members.len() >= self.max_users_per_room {
            return Err(RegistryError::RoomFull(room_code.clone()));
        }
        let user = profile.user_id;
        room.members.insert(user, profile);
        tracing::info!(
            room = %room_code,
            %user,
            members = room.members.len(),
            "user joined room"
        );
        Ok(())
    }

    /// Remove a user from a room. A no-op when the room or membership
    /// is absent. Deletes the room in the same operation when the last
    /// member leaves. Returns `true` if the room was deleted.
    pub fn leave_room(&mut self, room_code: &RoomCode, user: UserId) -> bool {
        let Some(room) = self.rooms.get_mut(room_code) else {
            return false;
        };
        if room.members.remove(&user).is_none() {
            return false;
        }
        tracing::info!(
            room = %room_code,
            %user,
            members = room.members.len(),
            "user left room"
        );
        self.remove_room_check(room_code)
    }

    /// Delete the room if it exists and has no members. Idempotent;
    /// exposed for cleanup after membership changes performed
    /// elsewhere. Returns `true` if a room was deleted.
    pub fn remove_room_check(&mut self, room_code: &RoomCode) -> bool {
        let empty = self
            .rooms
            .get(room_code)
            .is_some_and(|r| r.members.is_empty());
        if empty {
            self.rooms.remove(room_code);
            tracing::info!(room = %room_code, "empty room destroyed");
        }
        empty
    }

    /// Pick uniformly among rooms that still have free capacity.
    /// Pre-filtering keeps this bounded even when every room is full.
    pub fn random_room(&self) -> Result<RoomCode, RegistryError> {
        self.rooms
            .values()
            .filter(|r| r.members.len() < self.max_users_per_room)
            .map(|r| r.code.clone())
            .choose(&mut rand::rng())
            .ok_or(RegistryError::NoAvailableRoom)
    }

    pub fn get_users_in_room(
        &self,
        room_code: &RoomCode,
    ) -> Result<Vec<PlayerProfile>, RegistryError> {
        let room = self
            .rooms
            .get(room_code)
            .ok_or_else(|| RegistryError::RoomNotFound(room_code.clone()))?;
        Ok(room.members.values().cloned().collect())
    }

    pub fn is_user_in_any_room(&self, user: UserId) -> bool {
        self.rooms
            .values()
            .any(|r| r.members.contains_key(&user))
    }

    pub fn get_room(&self, room_code: &RoomCode) -> Result<&Room, RegistryError> {
        self.rooms
            .get(room_code)
            .ok_or_else(|| RegistryError::RoomNotFound(room_code.clone()))
    }

    pub fn contains_room(&self, room_code: &RoomCode) -> bool {
        self.rooms.contains_key(room_code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Look up a member's profile, distinguishing a missing room from
    /// a non-member user.
    pub fn member_profile(
        &self,
        room_code: &RoomCode,
        user: UserId,
    ) -> Result<PlayerProfile, RegistryError> {
        let room = self.get_room(room_code)?;
        room.members
            .get(&user)
            .cloned()
            .ok_or_else(|| RegistryError::UserNotInRoom(user, room_code.clone()))
    }

    /// Register a session with its owning room.
    pub fn add_game_to_room(
        &mut self,
        room_code: &RoomCode,
        game: GameSession,
    ) -> Result<GameId, RegistryError> {
        debug_assert_eq!(game.room(), room_code);
        let room = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| RegistryError::RoomNotFound(room_code.clone()))?;
        let game_id = game.id();
        room.games.insert(game_id, game);
        tracing::info!(room = %room_code, game = %game_id, "game added to room");
        Ok(game_id)
    }

    pub fn get_game(
        &self,
        room_code: &RoomCode,
        game_id: GameId,
    ) -> Result<&GameSession, RegistryError> {
        let room = self.get_room(room_code)?;
        room.games
            .get(&game_id)
            .ok_or(RegistryError::GameNotFound(game_id))
    }

    /// Mutate a game in place under the registry's exclusive access.
    /// The in-place analogue of a fetch/update pair: the closure runs
    /// with the game borrowed, so no concurrent operation can observe
    /// an intermediate state.
    pub fn with_game_mut<R>(
        &mut self,
        room_code: &RoomCode,
        game_id: GameId,
        f: impl FnOnce(&mut GameSession) -> R,
    ) -> Result<R, RegistryError> {
        let room = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| RegistryError::RoomNotFound(room_code.clone()))?;
        let game = room
            .games
            .get_mut(&game_id)
            .ok_or(RegistryError::GameNotFound(game_id))?;
        Ok(f(game))
    }

    /// Remove a finished game from its room, returning it for final
    /// hand-off.
    pub fn remove_game_from_room(
        &mut self,
        room_code: &RoomCode,
        game_id: GameId,
    ) -> Result<GameSession, RegistryError> {
        let room = self
            .rooms
            .get_mut(room_code)
            .ok_or_else(|| RegistryError::RoomNotFound(room_code.clone()))?;
        room.games
            .remove(&game_id)
            .ok_or(RegistryError::GameNotFound(game_id))
    }
}

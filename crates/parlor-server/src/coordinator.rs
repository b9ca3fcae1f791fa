use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use parlor_core::code::RoomCode;
use parlor_core::events::Notification;
use parlor_core::game::{GameError, GameId, GameSession, GameSolution, GameStatus};
use parlor_core::player::{AssignedPrompt, PlayerProfile, UserId};
use parlor_core::template::GameTemplate;

use crate::collaborators::{
    Broadcaster, PersistError, PersistenceSink, TemplateError, TemplateProvider,
};
use crate::config::ServerConfig;
use crate::registry::{RegistryError, RoomRegistry};

/// The registry behind its lock. The write side is the one critical
/// section all read-decide-write sequences share, which serializes
/// aggregate checks per (room, game) pair.
pub type SharedRegistry = Arc<RwLock<RoomRegistry>>;

#[derive(Debug)]
pub enum CoordinatorError {
    Registry(RegistryError),
    Game(GameError),
    Template(TemplateError),
    Persist(PersistError),
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "{e}"),
            Self::Game(e) => write!(f, "{e}"),
            Self::Template(e) => write!(f, "{e}"),
            Self::Persist(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CoordinatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Registry(e) => Some(e),
            Self::Game(e) => Some(e),
            Self::Template(e) => Some(e),
            Self::Persist(e) => Some(e),
        }
    }
}

impl From<RegistryError> for CoordinatorError {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<GameError> for CoordinatorError {
    fn from(e: GameError) -> Self {
        Self::Game(e)
    }
}

impl From<TemplateError> for CoordinatorError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}

impl From<PersistError> for CoordinatorError {
    fn from(e: PersistError) -> Self {
        Self::Persist(e)
    }
}

/// What a join-game notification did.
enum JoinOutcome {
    /// Player added; the room roster is not yet complete.
    Joined,
    /// This join completed the roster and started the round.
    Started,
    /// Re-delivered join for a player already in a running session.
    AlreadyInGame,
}

/// Mediates between inbound notifications and the registry/session
/// state, deciding aggregate transitions and emitting outbound
/// notifications.
///
/// Every mutating handler runs its read-decide-write sequence under
/// one registry write lock, so two concurrent "last player" events
/// cannot both observe an incomplete aggregate and double-fire a
/// terminal notification.
pub struct SessionCoordinator {
    registry: SharedRegistry,
    templates: Arc<dyn TemplateProvider>,
    sink: Arc<dyn PersistenceSink>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl SessionCoordinator {
    pub fn new(
        config: &ServerConfig,
        templates: Arc<dyn TemplateProvider>,
        sink: Arc<dyn PersistenceSink>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            registry: Arc::new(RwLock::new(RoomRegistry::new(
                config.rooms.max_users_per_room,
            ))),
            templates,
            sink,
            broadcaster,
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    // -- Room lifecycle --

    pub async fn create_room(&self) -> Result<RoomCode, CoordinatorError> {
        let room = self.registry.write().await.create_room()?;
        self.broadcaster
            .publish(Notification::RoomCreated { room: room.clone() });
        Ok(room)
    }

    pub async fn join_room(
        &self,
        room: &RoomCode,
        profile: PlayerProfile,
    ) -> Result<(), CoordinatorError> {
        let name = profile.display_name.clone();
        self.registry.write().await.join_room(room, profile)?;
        self.broadcaster.publish(Notification::system(
            room.clone(),
            format!("{name} has joined the room."),
        ));
        Ok(())
    }

    /// Remove a user from a room; deletes the room when it empties.
    /// No-op (without notification) when the membership was absent.
    pub async fn leave_room(&self, room: &RoomCode, user: UserId) -> Result<(), CoordinatorError> {
        let name = {
            let mut reg = self.registry.write().await;
            let name = reg
                .member_profile(room, user)
                .ok()
                .map(|p| p.display_name);
            reg.leave_room(room, user);
            name
        };
        if let Some(name) = name {
            self.broadcaster.publish(Notification::system(
                room.clone(),
                format!("{name} has left the room."),
            ));
        }
        Ok(())
    }

    pub async fn random_room(&self) -> Result<RoomCode, CoordinatorError> {
        Ok(self.registry.read().await.random_room()?)
    }

    pub async fn users_in_room(
        &self,
        room: &RoomCode,
    ) -> Result<Vec<PlayerProfile>, CoordinatorError> {
        Ok(self.registry.read().await.get_users_in_room(room)?)
    }

    pub async fn is_user_in_any_room(&self, user: UserId) -> bool {
        self.registry.read().await.is_user_in_any_room(user)
    }

    // -- Game lifecycle --

    /// Create a session for a room, pulling a random template from the
    /// provider.
    pub async fn create_game(&self, room: &RoomCode) -> Result<GameId, CoordinatorError> {
        let template = self.templates.fetch_random_template()?;
        self.create_game_with(room, template).await
    }

    /// Create a session for a room with an explicit template.
    pub async fn create_game_with(
        &self,
        room: &RoomCode,
        template: GameTemplate,
    ) -> Result<GameId, CoordinatorError> {
        let game_id = {
            let mut reg = self.registry.write().await;
            reg.get_room(room)?;
            let game = GameSession::new(room.clone(), template);
            reg.add_game_to_room(room, game)?
        };
        self.broadcaster.publish(Notification::GameCreated {
            room: room.clone(),
            game: game_id,
        });
        Ok(game_id)
    }

    /// A player entered the game screen. Adds them to the session and
    /// starts the round once every room member has joined. Re-delivery
    /// for a player already in a running session is a silent no-op
    /// (the transport is at-least-once).
    pub async fn join_game(
        &self,
        room: &RoomCode,
        game_id: GameId,
        user: UserId,
    ) -> Result<(), CoordinatorError> {
        let (name, outcome) = {
            let mut reg = self.registry.write().await;
            let profile = reg.member_profile(room, user)?;
            let name = profile.display_name.clone();
            let roster: Vec<UserId> = reg.get_room(room)?.member_ids().collect();
            let outcome = reg.with_game_mut(room, game_id, |game| {
                join_and_maybe_start(game, profile, &roster)
            })??;
            (name, outcome)
        };

        match outcome {
            JoinOutcome::Joined => {
                self.broadcaster.publish(Notification::PlayerJoinedGame {
                    room: room.clone(),
                    game: game_id,
                    user,
                });
            },
            JoinOutcome::Started => {
                self.broadcaster.publish(Notification::system(
                    room.clone(),
                    format!("{name} has started the game."),
                ));
                self.broadcaster.publish(Notification::GameStarted {
                    room: room.clone(),
                    game: game_id,
                });
            },
            JoinOutcome::AlreadyInGame => {},
        }
        Ok(())
    }

    pub async fn record_response(
        &self,
        room: &RoomCode,
        game_id: GameId,
        user: UserId,
        original_index: usize,
        response: String,
    ) -> Result<(), CoordinatorError> {
        self.registry
            .write()
            .await
            .with_game_mut(room, game_id, |game| {
                game.record_response(user, original_index, response)
            })??;
        Ok(())
    }

    pub async fn get_user_prompts(
        &self,
        room: &RoomCode,
        game_id: GameId,
        user: UserId,
    ) -> Result<Vec<AssignedPrompt>, CoordinatorError> {
        let reg = self.registry.read().await;
        let game = reg.get_game(room, game_id)?;
        let state = game
            .player(user)
            .ok_or(GameError::PlayerNotFound(user))?;
        Ok(state.prompts_assigned.clone())
    }

    /// A player went inactive (external signal; the core runs no idle
    /// timer). When this leaves every player inactive, the session is
    /// abandoned: persisted once, announced once.
    pub async fn mark_inactive(
        &self,
        room: &RoomCode,
        game_id: GameId,
        user: UserId,
    ) -> Result<(), CoordinatorError> {
        let (name, terminal) = {
            let mut reg = self.registry.write().await;
            reg.with_game_mut(
                room,
                game_id,
                |game| -> Result<(String, Option<GameSession>), GameError> {
                    let tripped = game.mark_inactive(user)?;
                    let name = game
                        .player(user)
                        .map(|p| p.profile.display_name.clone())
                        .unwrap_or_default();
                    Ok((name, tripped.then(|| game.clone())))
                },
            )??
        };

        self.broadcaster.publish(Notification::system(
            room.clone(),
            format!("{name} has been marked inactive."),
        ));
        if let Some(final_state) = terminal {
            // Announce before the persistence hand-off: a sink failure
            // must not swallow the one-shot terminal notification.
            self.broadcaster.publish(Notification::system(
                room.clone(),
                "Everyone has been marked inactive".to_string(),
            ));
            self.broadcaster.publish(Notification::GameAbandoned {
                room: room.clone(),
                game: game_id,
            });
            self.sink.persist_game(&final_state)?;
        }
        Ok(())
    }

    /// A player finished their prompts. When this leaves every player
    /// finished, the session completes: persisted once, announced once.
    pub async fn mark_finished(
        &self,
        room: &RoomCode,
        game_id: GameId,
        user: UserId,
    ) -> Result<(), CoordinatorError> {
        let (name, terminal) = {
            let mut reg = self.registry.write().await;
            reg.with_game_mut(
                room,
                game_id,
                |game| -> Result<(String, Option<GameSession>), GameError> {
                    let tripped = game.mark_finished(user)?;
                    let name = game
                        .player(user)
                        .map(|p| p.profile.display_name.clone())
                        .unwrap_or_default();
                    Ok((name, tripped.then(|| game.clone())))
                },
            )??
        };

        self.broadcaster.publish(Notification::system(
            room.clone(),
            format!("{name} has finished their prompts."),
        ));
        if let Some(final_state) = terminal {
            self.broadcaster.publish(Notification::system(
                room.clone(),
                "Everyone has finished".to_string(),
            ));
            self.broadcaster.publish(Notification::GameComplete {
                room: room.clone(),
                game: game_id,
            });
            self.sink.persist_game(&final_state)?;
        }
        Ok(())
    }

    pub async fn game_status(
        &self,
        room: &RoomCode,
        game_id: GameId,
    ) -> Result<GameStatus, CoordinatorError> {
        Ok(self.registry.read().await.get_game(room, game_id)?.status())
    }

    /// The solution payload of a completed session, for result
    /// retrieval after a `GameComplete` notification.
    pub async fn game_solution(
        &self,
        room: &RoomCode,
        game_id: GameId,
    ) -> Result<Option<GameSolution>, CoordinatorError> {
        Ok(self
            .registry
            .read()
            .await
            .get_game(room, game_id)?
            .solution())
    }

    /// Drop a terminal session after its results have been retrieved.
    /// A session still in play cannot be removed out from under its
    /// players.
    pub async fn remove_game(
        &self,
        room: &RoomCode,
        game_id: GameId,
    ) -> Result<(), CoordinatorError> {
        let mut reg = self.registry.write().await;
        let status = reg.get_game(room, game_id)?.status();
        if !status.is_terminal() {
            return Err(GameError::InvalidState {
                op: "remove",
                status,
            }
            .into());
        }
        reg.remove_game_from_room(room, game_id)?;
        Ok(())
    }
}

/// Session-side half of `join_game`, run under the registry write
/// lock.
fn join_and_maybe_start(
    game: &mut GameSession,
    profile: PlayerProfile,
    roster: &[UserId],
) -> Result<JoinOutcome, GameError> {
    let user = profile.user_id;
    if game.status() != GameStatus::Created {
        if game.contains_player(user) {
            return Ok(JoinOutcome::AlreadyInGame);
        }
        return Err(GameError::InvalidState {
            op: "join",
            status: game.status(),
        });
    }

    if !game.contains_player(user) {
        game.add_player(profile)?;
    }

    let all_joined = roster.iter().all(|m| game.contains_player(*m));
    if all_joined {
        game.start()?;
        return Ok(JoinOutcome::Started);
    }
    Ok(JoinOutcome::Joined)
}

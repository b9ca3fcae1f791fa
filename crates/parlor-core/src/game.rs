use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::RoomCode;
use crate::player::{ActivityStatus, AssignedPrompt, PlayerProfile, PlayerState, UserId};
use crate::template::{GameTemplate, TemplateId};
use crate::time::unix_millis;

/// Unique identifier for a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub Uuid);

impl GameId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a game session.
///
/// ```text
/// Created → InProgress → Completed
///                      ↘ Abandoned
/// ```
///
/// `Completed` and `Abandoned` are terminal; no operation leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Created,
    InProgress,
    Completed,
    Abandoned,
}

impl GameStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Completed => write!(f, "Completed"),
            Self::Abandoned => write!(f, "Abandoned"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum GameError {
    PlayerNotFound(UserId),
    AlreadyJoined(UserId),
    PromptIndexInvalid(usize),
    /// The session is not in a state where this operation is legal.
    InvalidState {
        op: &'static str,
        status: GameStatus,
    },
    /// The player already reached a terminal activity status; it
    /// never reverses within a session.
    PlayerTerminal {
        user: UserId,
        status: ActivityStatus,
    },
    /// The template carries no prompts, so no player could receive a
    /// non-empty assignment.
    EmptyTemplate(TemplateId),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlayerNotFound(user) => write!(f, "player {user} is not in this game"),
            Self::AlreadyJoined(user) => write!(f, "player {user} already joined this game"),
            Self::PromptIndexInvalid(idx) => {
                write!(f, "prompt index {idx} is not assigned to this player")
            },
            Self::InvalidState { op, status } => {
                write!(f, "cannot {op} a game in state {status}")
            },
            Self::PlayerTerminal { user, status } => {
                write!(f, "player {user} activity is already terminal ({status:?})")
            },
            Self::EmptyTemplate(id) => write!(f, "template {id} has no prompts"),
        }
    }
}

impl std::error::Error for GameError {}

/// A prompt with the response it received, attributed to the player
/// who answered it. Produced when a session completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilledPrompt {
    pub user_id: UserId,
    pub original_index: usize,
    pub prompt: String,
    pub response: Option<String>,
}

/// The result payload of a completed session, handed to the
/// persistence collaborator. Its stored schema is the collaborator's
/// concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSolution {
    pub template_id: TemplateId,
    pub title: String,
    pub players: Vec<UserId>,
    pub filled_prompts: Vec<FilledPrompt>,
}

/// One round of the prompt game, owned by exactly one room for its
/// entire lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    id: GameId,
    room: RoomCode,
    template: GameTemplate,
    players: HashMap<UserId, PlayerState>,
    status: GameStatus,
    started_at_ms: Option<u64>,
    filled_prompts: Vec<FilledPrompt>,
}

impl GameSession {
    pub fn new(room: RoomCode, template: GameTemplate) -> Self {
        Self {
            id: GameId::new(),
            room,
            template,
            players: HashMap::new(),
            status: GameStatus::Created,
            started_at_ms: None,
            filled_prompts: Vec::new(),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn template_id(&self) -> TemplateId {
        self.template.id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn player(&self, user: UserId) -> Option<&PlayerState> {
        self.players.get(&user)
    }

    pub fn contains_player(&self, user: UserId) -> bool {
        self.players.contains_key(&user)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.players.keys().copied()
    }

    /// Register a player before the round starts. The roster is fixed
    /// once the session leaves `Created`.
    pub fn add_player(&mut self, profile: PlayerProfile) -> Result<(), GameError> {
        if self.status != GameStatus::Created {
            return Err(GameError::InvalidState {
                op: "join",
                status: self.status,
            });
        }
        if self.players.contains_key(&profile.user_id) {
            return Err(GameError::AlreadyJoined(profile.user_id));
        }
        self.players
            .insert(profile.user_id, PlayerState::new(profile));
        Ok(())
    }

    /// Start the round: assign every player a non-empty ordered prompt
    /// sequence and move to `InProgress`. Assignment happens exactly
    /// once per session; a second `start` is an invalid transition.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.status != GameStatus::Created {
            return Err(GameError::InvalidState {
                op: "start",
                status: self.status,
            });
        }
        if self.players.is_empty() {
            return Err(GameError::InvalidState {
                op: "start an empty",
                status: self.status,
            });
        }
        if self.template.prompts.is_empty() {
            return Err(GameError::EmptyTemplate(self.template.id));
        }

        // Stable assignment order regardless of map iteration.
        let mut roster: Vec<UserId> = self.players.keys().copied().collect();
        roster.sort_unstable_by_key(|u| u.0);

        // Round-robin the template's prompts across the roster. When
        // there are fewer prompts than players, keep cycling prompts
        // (with their original indices) so nobody ends up empty.
        let total = self.template.prompts.len().max(roster.len());
        for slot in 0..total {
            let prompt_idx = slot % self.template.prompts.len();
            let user = roster[slot % roster.len()];
            let state = self.players.get_mut(&user).expect("user from roster");
            state.prompts_assigned.push(AssignedPrompt {
                original_index: prompt_idx,
                prompt: self.template.prompts[prompt_idx].clone(),
                response: None,
            });
        }

        self.status = GameStatus::InProgress;
        self.started_at_ms = Some(unix_millis());
        tracing::info!(
            game = %self.id,
            room = %self.room,
            players = self.players.len(),
            prompts = self.template.prompts.len(),
            "game started"
        );
        Ok(())
    }

    /// Record a player's response for one assigned prompt, addressed
    /// by the prompt's original template index. Re-submission
    /// overwrites the prior response (last write wins).
    pub fn record_response(
        &mut self,
        user: UserId,
        original_index: usize,
        response: String,
    ) -> Result<(), GameError> {
        if self.status != GameStatus::InProgress {
            return Err(GameError::InvalidState {
                op: "record a response in",
                status: self.status,
            });
        }
        let state = self
            .players
            .get_mut(&user)
            .ok_or(GameError::PlayerNotFound(user))?;
        let prompt = state
            .prompts_assigned
            .iter_mut()
            .find(|p| p.original_index == original_index)
            .ok_or(GameError::PromptIndexInvalid(original_index))?;
        prompt.response = Some(response);
        Ok(())
    }

    /// Mark a player inactive. Returns `true` when this call made
    /// every player inactive and thereby moved the session to
    /// `Abandoned`; the caller reports that transition exactly once.
    pub fn mark_inactive(&mut self, user: UserId) -> Result<bool, GameError> {
        self.set_activity(user, ActivityStatus::Inactive)?;
        if self.all_players_inactive() {
            self.status = GameStatus::Abandoned;
            tracing::info!(game = %self.id, room = %self.room, "game abandoned");
            return Ok(true);
        }
        Ok(false)
    }

    /// Mark a player finished. Returns `true` when this call made
    /// every player finished and thereby completed the session.
    pub fn mark_finished(&mut self, user: UserId) -> Result<bool, GameError> {
        self.set_activity(user, ActivityStatus::Finished)?;

        let now = unix_millis();
        let state = self.players.get_mut(&user).expect("checked by set_activity");
        state.finish_time_ms = Some(now);
        state.time_taken_ms = self.started_at_ms.map(|start| now.saturating_sub(start));

        if self.all_players_finished() {
            self.complete();
            return Ok(true);
        }
        Ok(false)
    }

    fn set_activity(&mut self, user: UserId, next: ActivityStatus) -> Result<(), GameError> {
        if self.status != GameStatus::InProgress {
            return Err(GameError::InvalidState {
                op: "change player activity in",
                status: self.status,
            });
        }
        let state = self
            .players
            .get_mut(&user)
            .ok_or(GameError::PlayerNotFound(user))?;
        if state.activity.is_terminal() {
            return Err(GameError::PlayerTerminal {
                user,
                status: state.activity,
            });
        }
        state.activity = next;
        Ok(())
    }

    /// True when every player is inactive. Vacuously false for an
    /// empty roster.
    pub fn all_players_inactive(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .values()
                .all(|p| p.activity == ActivityStatus::Inactive)
    }

    /// True when every player has finished. A player who went
    /// inactive blocks completion: a mixed roster stays `InProgress`.
    pub fn all_players_finished(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .values()
                .all(|p| p.activity == ActivityStatus::Finished)
    }

    fn complete(&mut self) {
        self.status = GameStatus::Completed;

        let mut filled: Vec<FilledPrompt> = self
            .players
            .values()
            .flat_map(|state| {
                state.prompts_assigned.iter().map(|p| FilledPrompt {
                    user_id: state.profile.user_id,
                    original_index: p.original_index,
                    prompt: p.prompt.clone(),
                    response: p.response.clone(),
                })
            })
            .collect();
        filled.sort_unstable_by_key(|p| (p.original_index, p.user_id.0));
        self.filled_prompts = filled;

        tracing::info!(game = %self.id, room = %self.room, "game completed");
    }

    pub fn filled_prompts(&self) -> &[FilledPrompt] {
        &self.filled_prompts
    }

    /// The solution payload for a completed session. `None` until the
    /// session reaches `Completed`.
    pub fn solution(&self) -> Option<GameSolution> {
        if self.status != GameStatus::Completed {
            return None;
        }
        let mut players: Vec<UserId> = self.players.keys().copied().collect();
        players.sort_unstable_by_key(|u| u.0);
        Some(GameSolution {
            template_id: self.template.id,
            title: self.template.title.clone(),
            players,
            filled_prompts: self.filled_prompts.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::ActivityStatus;

    fn profile(name: &str) -> PlayerProfile {
        PlayerProfile {
            user_id: UserId::new(),
            display_name: name.into(),
            avatar: "dog".into(),
        }
    }

    fn template(prompts: &[&str]) -> GameTemplate {
        GameTemplate {
            id: TemplateId::new(),
            title: "Test round".into(),
            prompts: prompts.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn room() -> RoomCode {
        RoomCode::parse("AB12CD").unwrap()
    }

    fn started_session(names: &[&str], prompts: &[&str]) -> (GameSession, Vec<UserId>) {
        let mut game = GameSession::new(room(), template(prompts));
        let mut users = Vec::new();
        for name in names {
            let p = profile(name);
            users.push(p.user_id);
            game.add_player(p).unwrap();
        }
        game.start().unwrap();
        (game, users)
    }

    #[test]
    fn start_assigns_every_player_nonempty_prompts() {
        let (game, users) = started_session(&["a", "b", "c"], &["p0", "p1", "p2", "p3"]);
        assert_eq!(game.status(), GameStatus::InProgress);
        for user in users {
            assert!(!game.player(user).unwrap().prompts_assigned.is_empty());
        }
    }

    #[test]
    fn start_wraps_when_fewer_prompts_than_players() {
        let (game, users) = started_session(&["a", "b", "c"], &["only"]);
        for user in users {
            let state = game.player(user).unwrap();
            assert_eq!(state.prompts_assigned.len(), 1);
            assert_eq!(state.prompts_assigned[0].original_index, 0);
        }
    }

    #[test]
    fn start_twice_is_invalid() {
        let (mut game, _) = started_session(&["a"], &["p"]);
        assert!(matches!(
            game.start(),
            Err(GameError::InvalidState { .. })
        ));
    }

    #[test]
    fn start_without_players_is_invalid() {
        let mut game = GameSession::new(room(), template(&["p"]));
        assert!(matches!(
            game.start(),
            Err(GameError::InvalidState { .. })
        ));
    }

    #[test]
    fn start_with_empty_template_fails() {
        let mut game = GameSession::new(room(), template(&[]));
        game.add_player(profile("a")).unwrap();
        assert!(matches!(game.start(), Err(GameError::EmptyTemplate(_))));
    }

    #[test]
    fn add_player_after_start_is_invalid() {
        let (mut game, _) = started_session(&["a"], &["p"]);
        assert!(matches!(
            game.add_player(profile("late")),
            Err(GameError::InvalidState { .. })
        ));
    }

    #[test]
    fn duplicate_add_player_conflicts() {
        let mut game = GameSession::new(room(), template(&["p"]));
        let p = profile("a");
        game.add_player(p.clone()).unwrap();
        assert_eq!(
            game.add_player(p.clone()),
            Err(GameError::AlreadyJoined(p.user_id))
        );
    }

    #[test]
    fn record_response_last_write_wins() {
        let (mut game, users) = started_session(&["a"], &["p0", "p1"]);
        let idx = game.player(users[0]).unwrap().prompts_assigned[0].original_index;
        game.record_response(users[0], idx, "first".into()).unwrap();
        game.record_response(users[0], idx, "second".into()).unwrap();
        let state = game.player(users[0]).unwrap();
        let answered = state
            .prompts_assigned
            .iter()
            .find(|p| p.original_index == idx)
            .unwrap();
        assert_eq!(answered.response.as_deref(), Some("second"));
    }

    #[test]
    fn record_response_out_of_range_leaves_state_untouched() {
        let (mut game, users) = started_session(&["a"], &["p0"]);
        game.record_response(users[0], 0, "kept".into()).unwrap();
        let err = game.record_response(users[0], 99, "lost".into());
        assert_eq!(err, Err(GameError::PromptIndexInvalid(99)));
        let state = game.player(users[0]).unwrap();
        assert_eq!(state.prompts_assigned[0].response.as_deref(), Some("kept"));
    }

    #[test]
    fn record_response_unknown_player() {
        let (mut game, _) = started_session(&["a"], &["p0"]);
        let stranger = UserId::new();
        assert_eq!(
            game.record_response(stranger, 0, "hi".into()),
            Err(GameError::PlayerNotFound(stranger))
        );
    }

    #[test]
    fn completes_only_when_every_player_finished() {
        let (mut game, users) = started_session(&["a", "b", "c"], &["p0", "p1", "p2"]);
        assert!(!game.mark_finished(users[0]).unwrap());
        assert!(!game.mark_finished(users[1]).unwrap());
        assert_eq!(game.status(), GameStatus::InProgress);
        assert!(game.mark_finished(users[2]).unwrap());
        assert_eq!(game.status(), GameStatus::Completed);
    }

    #[test]
    fn abandons_only_when_every_player_inactive() {
        let (mut game, users) = started_session(&["a", "b"], &["p0", "p1"]);
        assert!(!game.mark_inactive(users[0]).unwrap());
        assert_eq!(game.status(), GameStatus::InProgress);
        assert!(game.mark_inactive(users[1]).unwrap());
        assert_eq!(game.status(), GameStatus::Abandoned);
    }

    #[test]
    fn mixed_finished_and_inactive_stays_in_progress() {
        let (mut game, users) = started_session(&["a", "b"], &["p0", "p1"]);
        assert!(!game.mark_finished(users[0]).unwrap());
        assert!(!game.mark_inactive(users[1]).unwrap());
        assert_eq!(game.status(), GameStatus::InProgress);
        assert!(!game.all_players_finished());
        assert!(!game.all_players_inactive());
    }

    #[test]
    fn terminal_activity_never_reverses() {
        let (mut game, users) = started_session(&["a", "b"], &["p0", "p1"]);
        game.mark_finished(users[0]).unwrap();
        assert!(matches!(
            game.mark_inactive(users[0]),
            Err(GameError::PlayerTerminal { .. })
        ));
        assert!(matches!(
            game.mark_finished(users[0]),
            Err(GameError::PlayerTerminal { .. })
        ));
        assert_eq!(
            game.player(users[0]).unwrap().activity,
            ActivityStatus::Finished
        );
    }

    #[test]
    fn operations_rejected_after_completion() {
        let (mut game, users) = started_session(&["a"], &["p0"]);
        game.mark_finished(users[0]).unwrap();
        assert_eq!(game.status(), GameStatus::Completed);
        assert!(matches!(
            game.record_response(users[0], 0, "late".into()),
            Err(GameError::InvalidState { .. })
        ));
        assert!(matches!(
            game.mark_inactive(users[0]),
            Err(GameError::InvalidState { .. })
        ));
    }

    #[test]
    fn completion_fills_prompts_and_solution() {
        let (mut game, users) = started_session(&["a", "b"], &["p0", "p1"]);
        for &user in &users {
            let indices: Vec<usize> = game
                .player(user)
                .unwrap()
                .prompts_assigned
                .iter()
                .map(|p| p.original_index)
                .collect();
            for idx in indices {
                game.record_response(user, idx, format!("answer-{idx}")).unwrap();
            }
        }
        game.mark_finished(users[0]).unwrap();
        assert!(game.solution().is_none());
        game.mark_finished(users[1]).unwrap();

        assert_eq!(game.filled_prompts().len(), 2);
        let solution = game.solution().unwrap();
        assert_eq!(solution.players.len(), 2);
        assert!(solution
            .filled_prompts
            .iter()
            .all(|p| p.response.is_some()));
    }

    #[test]
    fn finish_records_timing() {
        let (mut game, users) = started_session(&["a"], &["p0"]);
        game.mark_finished(users[0]).unwrap();
        let state = game.player(users[0]).unwrap();
        assert!(state.finish_time_ms.is_some());
        assert!(state.time_taken_ms.is_some());
    }
}

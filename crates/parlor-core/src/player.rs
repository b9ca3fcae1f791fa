use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The public profile a user carries into rooms and games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar: String,
}

impl PlayerProfile {
    /// Fresh profile with a generated id and a default avatar.
    pub fn with_name(display_name: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(),
            display_name: display_name.into(),
            avatar: String::new(),
        }
    }
}

/// A player's activity status within one game session.
///
/// `Finished` and `Inactive` are terminal: once a player leaves
/// `Active` their status never changes again for that session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityStatus {
    Active,
    Finished,
    Inactive,
}

impl ActivityStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Inactive)
    }
}

/// One prompt handed to a player, addressed by its index in the
/// session's template. `response` is overwritten on re-submission
/// (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedPrompt {
    pub original_index: usize,
    pub prompt: String,
    pub response: Option<String>,
}

/// Per-player progress within a game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub profile: PlayerProfile,
    pub prompts_assigned: Vec<AssignedPrompt>,
    pub activity: ActivityStatus,
    /// Milliseconds from session start to this player finishing.
    pub time_taken_ms: Option<u64>,
    /// Unix-epoch milliseconds when the player finished.
    pub finish_time_ms: Option<u64>,
}

impl PlayerState {
    pub fn new(profile: PlayerProfile) -> Self {
        Self {
            profile,
            prompts_assigned: Vec::new(),
            activity: ActivityStatus::Active,
            time_taken_ms: None,
            finish_time_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_terminality() {
        assert!(!ActivityStatus::Active.is_terminal());
        assert!(ActivityStatus::Finished.is_terminal());
        assert!(ActivityStatus::Inactive.is_terminal());
    }

    #[test]
    fn new_player_starts_active_and_unassigned() {
        let state = PlayerState::new(PlayerProfile {
            user_id: UserId::new(),
            display_name: "Alice".into(),
            avatar: "cat".into(),
        });
        assert_eq!(state.activity, ActivityStatus::Active);
        assert!(state.prompts_assigned.is_empty());
        assert!(state.finish_time_ms.is_none());
    }
}

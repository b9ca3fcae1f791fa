pub mod code;
pub mod events;
pub mod game;
pub mod player;
pub mod template;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{PlayerProfile, UserId};
    use crate::template::{GameTemplate, TemplateId};

    /// Create `n` test profiles named Player1..PlayerN.
    pub fn make_profiles(n: usize) -> Vec<PlayerProfile> {
        (0..n)
            .map(|i| PlayerProfile {
                user_id: UserId::new(),
                display_name: format!("Player{}", i + 1),
                avatar: format!("avatar-{}", i + 1),
            })
            .collect()
    }

    /// Create a template with `n` numbered prompts.
    pub fn make_template(n: usize) -> GameTemplate {
        GameTemplate {
            id: TemplateId::new(),
            title: "Test template".to_string(),
            prompts: (0..n).map(|i| format!("Prompt {i}")).collect(),
        }
    }
}

use std::sync::Arc;

use parlor_core::code::RoomCode;
use parlor_core::game::GameId;
use parlor_core::player::PlayerProfile;
use parlor_core::test_helpers::{make_profiles, make_template};

use parlor_server::collaborators::{
    Broadcaster, FixedTemplates, MemoryBroadcaster, MemorySink, PersistenceSink,
};
use parlor_server::config::ServerConfig;
use parlor_server::coordinator::SessionCoordinator;

/// A coordinator wired to in-memory collaborators, so tests can
/// inspect exactly what was persisted and broadcast.
pub struct TestPlatform {
    pub coordinator: Arc<SessionCoordinator>,
    pub broadcaster: Arc<MemoryBroadcaster>,
    pub sink: Arc<MemorySink>,
}

impl TestPlatform {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let broadcaster = Arc::new(MemoryBroadcaster::new());
        let sink = Arc::new(MemorySink::new());
        let coordinator = parlor_server::build_coordinator(
            &config,
            Arc::new(FixedTemplates::new(vec![make_template(8)])),
            Arc::clone(&sink) as Arc<dyn PersistenceSink>,
            Arc::clone(&broadcaster) as Arc<dyn Broadcaster>,
        );
        Self {
            coordinator,
            broadcaster,
            sink,
        }
    }

    /// Room with `n` members, all joined into one running game.
    pub async fn running_game(&self, n: usize) -> (RoomCode, GameId, Vec<PlayerProfile>) {
        let room = self.coordinator.create_room().await.unwrap();
        let profiles = make_profiles(n);
        for p in &profiles {
            self.coordinator.join_room(&room, p.clone()).await.unwrap();
        }
        let game = self.coordinator.create_game(&room).await.unwrap();
        for p in &profiles {
            self.coordinator
                .join_game(&room, game, p.user_id)
                .await
                .unwrap();
        }
        (room, game, profiles)
    }
}

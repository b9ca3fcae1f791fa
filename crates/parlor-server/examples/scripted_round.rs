//! Scripted walkthrough of one full round: create a room, fill it,
//! play a game to completion, and print every notification the
//! platform fans out along the way.
//!
//! Run with `RUST_LOG=debug cargo run --example scripted_round` to
//! also see the registry's structured logs.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use parlor_core::player::PlayerProfile;
use parlor_core::template::{GameTemplate, TemplateId};
use parlor_server::collaborators::{
    Broadcaster, ChannelBroadcaster, FixedTemplates, MemorySink, PersistenceSink,
};
use parlor_server::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::load();
    config.validate();
    let template = GameTemplate {
        id: TemplateId::new(),
        title: "A Day at the Office".to_string(),
        prompts: vec![
            "The coffee machine finally ___".to_string(),
            "My manager walked in holding ___".to_string(),
            "The standup lasted ___ hours".to_string(),
        ],
    };
    let sink = Arc::new(MemorySink::new());
    let (broadcaster, mut rx) = ChannelBroadcaster::new(config.limits.notification_buffer);
    let coordinator = parlor_server::build_coordinator(
        &config,
        Arc::new(FixedTemplates::new(vec![template])),
        Arc::clone(&sink) as Arc<dyn PersistenceSink>,
        Arc::new(broadcaster) as Arc<dyn Broadcaster>,
    );

    let printer = tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            println!("[{}] {notification:?}", notification.room());
        }
    });

    let room = coordinator.create_room().await?;
    let players: Vec<PlayerProfile> = ["alice", "bert", "carol"]
        .into_iter()
        .map(PlayerProfile::with_name)
        .collect();
    for p in &players {
        coordinator.join_room(&room, p.clone()).await?;
    }

    let game = coordinator.create_game(&room).await?;
    for p in &players {
        coordinator.join_game(&room, game, p.user_id).await?;
    }

    for p in &players {
        for prompt in coordinator.get_user_prompts(&room, game, p.user_id).await? {
            coordinator
                .record_response(
                    &room,
                    game,
                    p.user_id,
                    prompt.original_index,
                    format!("{}'s answer", p.display_name),
                )
                .await?;
        }
        coordinator.mark_finished(&room, game, p.user_id).await?;
    }

    let solution = coordinator
        .game_solution(&room, game)
        .await?
        .expect("round finished, solution exists");
    println!("--- {} ---", solution.title);
    for filled in &solution.filled_prompts {
        println!(
            "  {} -> {}",
            filled.prompt,
            filled.response.as_deref().unwrap_or("(no answer)")
        );
    }
    println!("persisted games: {}", sink.persisted().len());

    drop(coordinator);
    printer.await?;
    Ok(())
}

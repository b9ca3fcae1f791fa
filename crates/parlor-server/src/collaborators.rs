use std::fmt;
use std::sync::Mutex;

use rand::seq::IndexedRandom;
use tokio::sync::mpsc;

use parlor_core::events::Notification;
use parlor_core::game::GameSession;
use parlor_core::template::GameTemplate;

/// Supplies round content. The coordinator asks for a random template
/// when a game is created without an explicit one.
pub trait TemplateProvider: Send + Sync {
    fn fetch_random_template(&self) -> Result<GameTemplate, TemplateError>;
}

/// Receives terminal sessions (completed or abandoned) for storage.
/// The stored schema is the sink's concern.
pub trait PersistenceSink: Send + Sync {
    fn persist_game(&self, game: &GameSession) -> Result<(), PersistError>;
}

/// Fans a notification out to every subscriber of a room's channel.
/// Delivery is at-least-once; no ordering is promised across rooms.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, notification: Notification);
}

#[derive(Debug)]
pub enum TemplateError {
    Unavailable(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(m) => write!(f, "template provider unavailable: {m}"),
        }
    }
}

#[derive(Debug)]
pub enum PersistError {
    Unavailable(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(m) => write!(f, "persistence sink unavailable: {m}"),
        }
    }
}

impl std::error::Error for TemplateError {}
impl std::error::Error for PersistError {}

// ---------------------------------------------------------------------
// In-memory implementations (tests, demos)
// ---------------------------------------------------------------------

/// Serves templates from a fixed list, picking uniformly at random.
pub struct FixedTemplates {
    templates: Vec<GameTemplate>,
}

impl FixedTemplates {
    pub fn new(templates: Vec<GameTemplate>) -> Self {
        Self { templates }
    }
}

impl TemplateProvider for FixedTemplates {
    fn fetch_random_template(&self) -> Result<GameTemplate, TemplateError> {
        self.templates
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| TemplateError::Unavailable("no templates loaded".into()))
    }
}

/// Records every persisted session in memory.
#[derive(Default)]
pub struct MemorySink {
    games: Mutex<Vec<GameSession>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persisted(&self) -> Vec<GameSession> {
        self.games.lock().expect("sink lock poisoned").clone()
    }
}

impl PersistenceSink for MemorySink {
    fn persist_game(&self, game: &GameSession) -> Result<(), PersistError> {
        self.games
            .lock()
            .expect("sink lock poisoned")
            .push(game.clone());
        Ok(())
    }
}

/// Records every published notification in memory.
#[derive(Default)]
pub struct MemoryBroadcaster {
    published: Mutex<Vec<Notification>>,
}

impl MemoryBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published
            .lock()
            .expect("broadcaster lock poisoned")
            .clone()
    }
}

impl Broadcaster for MemoryBroadcaster {
    fn publish(&self, notification: Notification) {
        self.published
            .lock()
            .expect("broadcaster lock poisoned")
            .push(notification);
    }
}

/// Forwards notifications into a bounded channel. A full channel drops
/// the notification with a debug log rather than blocking the
/// coordinator on a slow consumer.
pub struct ChannelBroadcaster {
    tx: mpsc::Sender<Notification>,
}

impl ChannelBroadcaster {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn publish(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            tracing::debug!(error = %e, "dropping notification for slow consumer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_core::code::RoomCode;
    use parlor_core::test_helpers::make_template;

    #[test]
    fn fixed_templates_serve_from_the_list() {
        let provider = FixedTemplates::new(vec![make_template(3), make_template(5)]);
        let t = provider.fetch_random_template().unwrap();
        assert!(t.prompts.len() == 3 || t.prompts.len() == 5);
    }

    #[test]
    fn empty_provider_reports_unavailable() {
        let provider = FixedTemplates::new(Vec::new());
        assert!(provider.fetch_random_template().is_err());
    }

    #[test]
    fn memory_broadcaster_records_in_order() {
        let b = MemoryBroadcaster::new();
        let room = RoomCode::parse("AB12CD").unwrap();
        b.publish(Notification::system(room.clone(), "one"));
        b.publish(Notification::system(room, "two"));
        let seen = b.published();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0], Notification::System { text, .. } if text == "one"));
    }

    #[tokio::test]
    async fn channel_broadcaster_drops_when_full() {
        let room = RoomCode::parse("AB12CD").unwrap();
        let (b, mut rx) = ChannelBroadcaster::new(1);
        b.publish(Notification::system(room.clone(), "kept"));
        b.publish(Notification::system(room, "dropped"));
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, Notification::System { text, .. } if text == "kept"));
        assert!(rx.try_recv().is_err());
    }
}

pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod registry;

use std::sync::Arc;

use collaborators::{Broadcaster, PersistenceSink, TemplateProvider};
use config::ServerConfig;
use coordinator::SessionCoordinator;

/// Wire a coordinator from a config and the three collaborator
/// handles. The coordinator is the whole application state; handlers
/// share it behind one `Arc`.
pub fn build_coordinator(
    config: &ServerConfig,
    templates: Arc<dyn TemplateProvider>,
    sink: Arc<dyn PersistenceSink>,
    broadcaster: Arc<dyn Broadcaster>,
) -> Arc<SessionCoordinator> {
    Arc::new(SessionCoordinator::new(config, templates, sink, broadcaster))
}

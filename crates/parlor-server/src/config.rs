use serde::Deserialize;

/// Top-level server configuration, loaded from `parlor.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub rooms: RoomsConfig,
    pub limits: LimitsConfig,
}

/// Room and code-generation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub max_users_per_room: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            max_users_per_room: 6,
        }
    }
}

/// Infrastructure limits (channel buffer sizes).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Per-room notification channel capacity for channel-backed
    /// broadcasters.
    pub notification_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            notification_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `parlor.toml` in the working directory,
    /// falling back to defaults when the file is absent or malformed.
    pub fn load() -> Self {
        match std::fs::read_to_string("parlor.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse parlor.toml, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("no parlor.toml found, using defaults");
                ServerConfig::default()
            },
        }
    }

    /// Validate configuration, logging problems. Nonsense values that
    /// would wedge the coordinator are fatal.
    pub fn validate(&self) {
        if self.rooms.max_users_per_room == 0 {
            tracing::error!("rooms.max_users_per_room must be > 0");
            std::process::exit(1);
        }
        if self.limits.notification_buffer == 0 {
            tracing::warn!(
                "limits.notification_buffer is 0, channel broadcasters will drop everything"
            );
        }
    }
}

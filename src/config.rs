use crate::error::{ConfigError, Result as AppResult};
use crate::game::Phase;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordSourceType {
    Builtin,
    File,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordsConfig {
    pub source_type: WordSourceType,
    pub file_path: Option<String>,
    pub http_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    JsonFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: String,
}

/// What happens to a player whose last realtime connection to a game goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    Never,
    LobbyOnly,
    Always,
}

impl DisconnectPolicy {
    pub fn allows_drop(self, phase: Phase) -> bool {
        match self {
            DisconnectPolicy::Never => false,
            DisconnectPolicy::LobbyOnly => phase == Phase::Lobby,
            DisconnectPolicy::Always => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GamesConfig {
    pub public_id_length: usize,
    pub disconnect_policy: DisconnectPolicy,
    pub client_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    pub server: ServerConfig,
    pub words: WordsConfig,
    pub storage: StorageConfig,
    pub games: GamesConfig,
}

impl AppSettings {
    fn validate(self) -> Result<Self, ConfigError> {
        if !(4..=16).contains(&self.games.public_id_length) {
            return Err(ConfigError::InvalidValue(format!(
                "games.public_id_length must be between 4 and 16, got {}",
                self.games.public_id_length
            )));
        }
        if self.games.client_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "games.client_buffer must be positive".to_string(),
            ));
        }
        match self.words.source_type {
            WordSourceType::File if self.words.file_path.is_none() => {
                return Err(ConfigError::Missing("words.file_path".to_string()));
            }
            WordSourceType::Http if self.words.http_url.is_none() => {
                return Err(ConfigError::Missing("words.http_url".to_string()));
            }
            _ => {}
        }
        Ok(self)
    }
}

fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.port", 8000)
        .and_then(|b| b.set_default("server.cors_origins", Vec::<String>::new()))
        .and_then(|b| b.set_default("words.source_type", "builtin"))
        .and_then(|b| b.set_default("storage.backend", "memory"))
        .and_then(|b| b.set_default("storage.data_dir", "data/games"))
        .and_then(|b| b.set_default("games.public_id_length", 6))
        .and_then(|b| b.set_default("games.disconnect_policy", "lobby_only"))
        .and_then(|b| b.set_default("games.client_buffer", 32))
        .map_err(|e| ConfigError::Load(e.to_string()))
}

/// Builds, deserializes and validates. Every `config` crate failure becomes `ConfigError::Load`.
fn finish(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<AppSettings, ConfigError> {
    builder
        .build()
        .and_then(|settings| settings.try_deserialize::<AppSettings>())
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .validate()
}

pub fn load_settings() -> AppResult<AppSettings> {
    let builder = builder()?
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("UNDERCOVER")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        );
    Ok(finish(builder)?)
}

//! Application layer errors

use thiserror::Error;

/// General bot errors
///
/// Everything raised during the one-time startup sequence ends up here and is
/// fatal for the process.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection failed: {0}")]
    Connection(#[source] TransportError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Plugin '{plugin}' failed to set up: {source}")]
    PluginSetup {
        plugin: String,
        #[source]
        source: PluginError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command '{0}' is registered by more than one provider")]
    DuplicateCommand(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid arguments, expected: {0}")]
    InvalidArgs(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TransportError> for CommandError {
    fn from(e: TransportError) -> Self {
        CommandError::Internal(e.to_string())
    }
}

/// Chat platform transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Not connected")]
    NotConnected,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Parse(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Plugin setup errors
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin '{0}' already registered")]
    Duplicate(String),

    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema resource not found: {0}")]
    NotFound(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

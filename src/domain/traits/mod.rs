//! Domain traits - Abstractions for infrastructure implementations

pub mod transport;
pub mod store;

pub use transport::{BotInfo, Connection, ConnectOptions, Emoji, Presence, PresenceKind, Transport};
pub use store::PersistenceConfigurator;

//! Domain entities - Core business objects

pub mod user;
pub mod message;
pub mod command;
pub mod role;

pub use user::User;
pub use message::{Message, Scope};
pub use command::{Command, CommandHandler, CommandProvider, CommandResult, CommandTable};
pub use role::Role;

//! Plugins shipped with the bot

mod core_commands;

pub use core_commands::CorePlugin;

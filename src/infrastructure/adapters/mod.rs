//! Platform adapters implementing [`Transport`](crate::domain::traits::Transport)

pub mod cache;
pub mod console;
pub mod memory;
pub mod telegram;

pub use cache::MessageCache;
pub use console::ConsoleAdapter;
pub use memory::MemoryTransport;
pub use telegram::TelegramAdapter;

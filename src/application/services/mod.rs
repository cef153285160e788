//! Application services - Lifecycle orchestration and the debug-log sink

pub mod debug_log;
pub mod lifecycle;

pub use debug_log::DebugLog;
pub use lifecycle::{BotLifecycleOrchestrator, LifecycleState, DISCONNECT_GRACE_PERIOD};

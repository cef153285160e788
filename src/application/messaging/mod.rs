//! Message handling - Command routing and dispatch
//!
//! Incoming messages are parsed, resolved against the routing table,
//! permission-checked and run on their own tasks.

pub mod context;
pub mod kernel;
pub mod outcome;
pub mod parser;
pub mod pending;
pub mod permissions;

pub use context::CommandContext;
pub use kernel::{CommandKernel, CommandKernelBuilder};
pub use outcome::{Dispatch, DispatchOutcome, IgnoreReason};
pub use parser::{MessageParser, ParsedCommand};
pub use pending::{PendingReply, PendingReplyRegistry};
pub use permissions::{OwnerSource, PermissionChecker, RoleGrant};

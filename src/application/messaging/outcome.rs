//! Dispatch outcomes and their user-facing messages

use tokio::task::JoinHandle;

use crate::application::errors::CommandError;
use crate::domain::entities::CommandResult;

pub const PERMISSION_DENIED_MESSAGE: &str =
    ":negative_squared_cross_mark: You don't have permission to use this command";

pub const INTERNAL_ERROR_MESSAGE: &str =
    "An internal error occurred while running the command. Please try again later.";

/// Result of running one command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran to completion, possibly with a reply
    Completed { reply: Option<String> },
    /// The actor lacks a required role; the handler never ran
    PermissionDenied,
    /// A business error the user can act on
    ExecutionFailure(String),
    /// Unexpected failure; the detail is logged, never shown
    InternalError(String),
}

impl DispatchOutcome {
    pub fn from_result(result: CommandResult) -> Self {
        match result {
            Ok(reply) => DispatchOutcome::Completed { reply },
            Err(CommandError::PermissionDenied) => DispatchOutcome::PermissionDenied,
            Err(e @ CommandError::Failed(_)) | Err(e @ CommandError::InvalidArgs(_)) => {
                DispatchOutcome::ExecutionFailure(e.to_string())
            }
            Err(CommandError::Internal(detail)) => DispatchOutcome::InternalError(detail),
        }
    }

    /// What gets posted back to the channel, if anything
    pub fn user_message(&self) -> Option<String> {
        match self {
            DispatchOutcome::Completed { reply } => reply.clone(),
            DispatchOutcome::PermissionDenied => Some(PERMISSION_DENIED_MESSAGE.to_string()),
            DispatchOutcome::ExecutionFailure(msg) => {
                Some(format!(":negative_squared_cross_mark: {}", msg))
            }
            DispatchOutcome::InternalError(_) => Some(INTERNAL_ERROR_MESSAGE.to_string()),
        }
    }
}

/// Why a message did not lead to a command invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AutomatedSender,
    NoPrefix,
    NotStarted,
    UnknownCommand,
}

/// What [`CommandKernel::dispatch`](super::CommandKernel::dispatch) did with a message
#[derive(Debug)]
pub enum Dispatch {
    Ignored(IgnoreReason),
    /// The invocation runs on its own task
    Spawned(JoinHandle<DispatchOutcome>),
}

impl Dispatch {
    pub fn ignored_because(&self) -> Option<IgnoreReason> {
        match self {
            Dispatch::Ignored(reason) => Some(*reason),
            Dispatch::Spawned(_) => None,
        }
    }

    /// Waits for a spawned invocation; `None` when the message was ignored.
    pub async fn outcome(self) -> Option<DispatchOutcome> {
        match self {
            Dispatch::Ignored(_) => None,
            Dispatch::Spawned(handle) => Some(
                handle
                    .await
                    .unwrap_or_else(|e| DispatchOutcome::InternalError(e.to_string())),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_is_concise() {
        let outcome = DispatchOutcome::from_result(Err(CommandError::Failed("Level not found".into())));
        assert_eq!(
            outcome.user_message().as_deref(),
            Some(":negative_squared_cross_mark: Level not found")
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let outcome = DispatchOutcome::from_result(Err(CommandError::Internal("db exploded".into())));
        let shown = outcome.user_message().unwrap();
        assert_eq!(shown, INTERNAL_ERROR_MESSAGE);
        assert!(!shown.contains("db exploded"));
    }

    #[test]
    fn test_invalid_args_show_usage() {
        let outcome = DispatchOutcome::from_result(Err(CommandError::InvalidArgs("!level <id>".into())));
        assert!(outcome.user_message().unwrap().contains("!level <id>"));
    }

    #[test]
    fn test_completed_without_reply_sends_nothing() {
        assert_eq!(DispatchOutcome::from_result(Ok(None)).user_message(), None);
        assert_eq!(
            DispatchOutcome::from_result(Err(CommandError::PermissionDenied)),
            DispatchOutcome::PermissionDenied
        );
    }
}

//! Command kernel - routes incoming messages to plugin-provided commands

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use super::context::CommandContext;
use super::outcome::{Dispatch, DispatchOutcome, IgnoreReason};
use super::parser::MessageParser;
use crate::application::errors::BotError;
use crate::application::state::BotState;
use crate::domain::entities::{Command, CommandProvider, CommandTable, Message};
use crate::infrastructure::config::DuplicateCommands;

/// Collects command providers into a routing table before the kernel exists
pub struct CommandKernelBuilder {
    bot: Arc<BotState>,
    table: CommandTable,
    parser: MessageParser,
    duplicates: DuplicateCommands,
}

impl CommandKernelBuilder {
    pub fn with_duplicate_policy(mut self, duplicates: DuplicateCommands) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Routes every command of the provider. With the `override` policy the
    /// last registration of a name wins.
    pub fn register_provider(&mut self, provider: &CommandProvider) -> Result<(), BotError> {
        for command in provider.commands() {
            for replaced in self.table.insert(Arc::clone(command)) {
                match self.duplicates {
                    DuplicateCommands::Override => {
                        warn!(command = %replaced, by = %command.name, "Command registered twice, last registration wins");
                    }
                    DuplicateCommands::Reject => return Err(BotError::DuplicateCommand(replaced)),
                }
            }
        }
        Ok(())
    }

    pub fn build(self) -> Arc<CommandKernel> {
        info!("Command kernel built with {} commands", self.table.len());
        Arc::new(CommandKernel {
            bot: self.bot,
            table: Arc::new(self.table),
            parser: self.parser,
            started: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }
}

/// Owns the routing table and dispatches incoming messages
pub struct CommandKernel {
    bot: Arc<BotState>,
    table: Arc<CommandTable>,
    parser: MessageParser,
    started: AtomicBool,
    in_flight: Arc<AtomicUsize>,
}

impl CommandKernel {
    pub fn builder(bot: Arc<BotState>) -> CommandKernelBuilder {
        let parser = MessageParser::new(bot.config().bot.prefix.clone());
        let duplicates = bot.config().startup.duplicate_commands;
        CommandKernelBuilder {
            bot,
            table: CommandTable::new(),
            parser,
            duplicates,
        }
    }

    /// Opens dispatch to everyone; until then only the owner is served.
    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        info!("Command kernel started");
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> &Arc<CommandTable> {
        &self.table
    }

    /// Invocations spawned and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Consumes the incoming message stream until it closes.
    pub async fn run(self: Arc<Self>, mut incoming: mpsc::Receiver<Message>) {
        while let Some(message) = incoming.recv().await {
            if let Dispatch::Ignored(reason) = self.dispatch(message).await {
                trace!(?reason, "Message ignored");
            }
        }
        debug!("Incoming message stream closed");
    }

    /// Routes one message. Never waits for the command itself to finish.
    pub async fn dispatch(self: &Arc<Self>, message: Message) -> Dispatch {
        let info = self.bot.info();
        if message.author.is_bot || info.map_or(false, |i| i.id == message.author.id) {
            return Dispatch::Ignored(IgnoreReason::AutomatedSender);
        }

        let Some(parsed) = self.parser.parse(&message.content, info) else {
            return Dispatch::Ignored(IgnoreReason::NoPrefix);
        };

        if !self.is_started() && !self.bot.permissions().is_owner(&message.author).await {
            return Dispatch::Ignored(IgnoreReason::NotStarted);
        }

        let Some(command) = self.table.get(&parsed.name).cloned() else {
            return Dispatch::Ignored(IgnoreReason::UnknownCommand);
        };

        // A new command supersedes any open interactive dialogue.
        self.bot
            .pending_replies()
            .cancel_if_present(message.channel_id(), &message.author.id);

        let span = info_span!(
            "command",
            name = %command.name,
            channel = %message.channel_id(),
            user = %message.author.id,
        );
        let kernel = Arc::clone(self);
        let guard = InFlight::enter(&self.in_flight);
        let handle = tokio::spawn(
            async move {
                let _guard = guard;
                kernel.supervise(command, parsed.name, message, parsed.args).await
            }
            .instrument(span),
        );
        Dispatch::Spawned(handle)
    }

    /// Runs one invocation. A panic anywhere in it, permission check and
    /// response delivery included, is reported as an internal error.
    async fn supervise(
        &self,
        command: Arc<Command>,
        invoked_as: String,
        message: Message,
        args: Vec<String>,
    ) -> DispatchOutcome {
        let name = command.name.clone();
        let invocation = self.execute(command, invoked_as, message, args);
        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = panic_message("command task panicked", panic);
                error!("Internal error while running command: {}", detail);
                self.bot
                    .log(&format!(":warning: Internal error in command `{}`: {}", name, detail))
                    .await;
                DispatchOutcome::InternalError(detail)
            }
        }
    }

    async fn execute(
        &self,
        command: Arc<Command>,
        invoked_as: String,
        message: Message,
        args: Vec<String>,
    ) -> DispatchOutcome {
        let channel_id = message.channel_id().to_string();

        let granted = self
            .bot
            .permissions()
            .is_granted(&message.author, &message.scope, &command.required_roles)
            .await;

        let outcome = if !granted {
            debug!("Permission denied");
            DispatchOutcome::PermissionDenied
        } else {
            match &command.handler {
                None => DispatchOutcome::ExecutionFailure(format!(
                    "Command {} is not implemented",
                    command.name
                )),
                Some(handler) => {
                    let ctx = CommandContext::new(
                        message,
                        invoked_as,
                        Arc::clone(&self.bot),
                        Arc::clone(&self.table),
                    );
                    match AssertUnwindSafe(handler(ctx, args)).catch_unwind().await {
                        Ok(result) => DispatchOutcome::from_result(result),
                        Err(panic) => {
                            DispatchOutcome::InternalError(panic_message("handler panicked", panic))
                        }
                    }
                }
            }
        };

        if let DispatchOutcome::InternalError(detail) = &outcome {
            error!("Internal error while running command: {}", detail);
            self.bot
                .log(&format!(
                    ":warning: Internal error in command `{}`: {}",
                    command.name, detail
                ))
                .await;
        }

        if let Some(text) = outcome.user_message() {
            if let Err(e) = self.bot.transport().send_message(&channel_id, &text).await {
                warn!("Failed to deliver command response: {}", e);
            }
        }

        outcome
    }
}

/// Counts an invocation as in flight until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(what: &str, panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("{}: {}", what, s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("{}: {}", what, s)
    } else {
        what.to_string()
    }
}

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use super::Role;
use crate::application::errors::CommandError;
use crate::application::messaging::CommandContext;

/// What a handler returns: an optional reply for the originating channel
pub type CommandResult = Result<Option<String>, CommandError>;

/// Command handler function type
pub type CommandHandler =
    Arc<dyn Fn(CommandContext, Vec<String>) -> BoxFuture<'static, CommandResult> + Send + Sync>;

/// Represents a bot command
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: BTreeSet<String>,
    pub usage: Option<String>,
    pub handler: Option<CommandHandler>,
    pub required_roles: BTreeSet<Role>,
}

impl Command {
    /// Names are stored lowercase; lookups are case-insensitive.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            description: None,
            aliases: BTreeSet::new(),
            usage: None,
            handler: None,
            required_roles: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into().to_lowercase());
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.required_roles.insert(role);
        self
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(CommandContext, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |ctx, args| handler(ctx, args).boxed()));
        self
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name == input_lower || self.aliases.contains(&input_lower)
    }

    /// Every name this command can be invoked by
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("required_roles", &self.required_roles)
            .finish_non_exhaustive()
    }
}

/// The set of commands a plugin contributes
#[derive(Default, Clone)]
pub struct CommandProvider {
    commands: Vec<Arc<Command>>,
}

impl CommandProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, command: Command) -> Self {
        self.add(command);
        self
    }

    pub fn add(&mut self, command: Command) {
        self.commands.push(Arc::new(command));
    }

    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Display for CommandProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.commands.iter().map(|c| c.name.as_str()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

impl fmt::Debug for CommandProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandProvider{}", self)
    }
}

/// Name -> command routing table
///
/// Filled once at startup, then only read.
#[derive(Default)]
pub struct CommandTable {
    routes: HashMap<String, Arc<Command>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes the command under its name and aliases. Last registration
    /// wins per route: only the routes the new command claims are taken over,
    /// other routes of an earlier command keep resolving to it. Returns the
    /// names of the commands that lost a route.
    pub fn insert(&mut self, command: Arc<Command>) -> Vec<String> {
        let mut replaced: Vec<String> = Vec::new();
        for route in command.routes() {
            if let Some(previous) = self.routes.insert(route.to_string(), Arc::clone(&command)) {
                if !Arc::ptr_eq(&previous, &command) && !replaced.contains(&previous.name) {
                    replaced.push(previous.name.clone());
                }
            }
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Command>> {
        self.routes.get(&name.to_lowercase())
    }

    /// Distinct routable commands, sorted by name
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let mut unique: Vec<Arc<Command>> = Vec::new();
        for command in self.routes.values() {
            if !unique.iter().any(|c| Arc::ptr_eq(c, command)) {
                unique.push(Arc::clone(command));
            }
        }
        unique.sort_by(|a, b| a.name.cmp(&b.name));
        unique
    }

    pub fn len(&self) -> usize {
        self.commands().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_case_insensitive() {
        let cmd = Command::new("PING").with_alias("P");
        assert_eq!(cmd.name, "ping");
        assert!(cmd.matches("Ping"));
        assert!(cmd.matches("p"));
        assert!(!cmd.matches("pong"));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut table = CommandTable::new();
        let first = Arc::new(Command::new("stats").with_alias("s"));
        let second = Arc::new(Command::new("stats"));

        assert!(table.insert(Arc::clone(&first)).is_empty());
        let replaced = table.insert(Arc::clone(&second));

        assert_eq!(replaced, vec!["stats".to_string()]);
        assert!(Arc::ptr_eq(table.get("STATS").unwrap(), &second));
        // routes the new command doesn't claim stay with the old one
        assert!(Arc::ptr_eq(table.get("s").unwrap(), &first));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_alias_collision_keeps_primary_name() {
        let mut table = CommandTable::new();
        let stats = Arc::new(Command::new("stats").with_alias("s"));
        let search = Arc::new(Command::new("s"));

        table.insert(Arc::clone(&stats));
        let replaced = table.insert(Arc::clone(&search));

        assert_eq!(replaced, vec!["stats".to_string()]);
        assert!(Arc::ptr_eq(table.get("stats").unwrap(), &stats));
        assert!(Arc::ptr_eq(table.get("s").unwrap(), &search));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_provider_display_lists_names() {
        let provider = CommandProvider::new()
            .with(Command::new("ping"))
            .with(Command::new("help"));
        assert_eq!(provider.to_string(), "[ping, help]");
        assert_eq!(provider.len(), 2);
    }
}

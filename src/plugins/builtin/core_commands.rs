//! The `core` plugin: ping, help and plugin listing

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::application::errors::{CommandError, PluginError};
use crate::application::messaging::CommandContext;
use crate::application::state::BotState;
use crate::domain::entities::{Command, CommandProvider, CommandResult};
use crate::plugins::{Plugin, PluginBootstrap};

pub struct CorePlugin;

#[async_trait]
impl PluginBootstrap for CorePlugin {
    fn id(&self) -> &str {
        "core"
    }

    async fn setup(&self, bot: Arc<BotState>) -> Result<Plugin, PluginError> {
        let commands = CommandProvider::new()
            .with(
                Command::new("ping")
                    .with_description("Check that the bot is responsive")
                    .with_handler(ping),
            )
            .with(
                Command::new("help")
                    .with_description("List commands, or describe one")
                    .with_usage("help [command]")
                    .with_handler(help),
            )
            .with(
                Command::new("plugins")
                    .with_alias("modules")
                    .with_description("List the active plugins")
                    .with_handler(list_plugins),
            );

        // Weak: the plugin ends up owned by the state it points to.
        let bot = Arc::downgrade(&bot);
        Ok(Plugin::new("core").with_commands(commands).on_ready(move || {
            let active = bot.upgrade().map_or(0, |b| b.plugins().len());
            async move {
                info!("Core plugin ready, {} plugins active", active);
            }
        }))
    }
}

async fn ping(_ctx: CommandContext, _args: Vec<String>) -> CommandResult {
    Ok(Some("Pong! :ping_pong:".to_string()))
}

async fn help(ctx: CommandContext, args: Vec<String>) -> CommandResult {
    let prefix = &ctx.bot().config().bot.prefix;

    if let Some(name) = args.first() {
        let Some(cmd) = ctx.commands().get(name) else {
            return Err(CommandError::Failed(format!("Command {}{} not found", prefix, name)));
        };
        let mut text = format!(
            "{}{} - {}",
            prefix,
            cmd.name,
            cmd.description.as_deref().unwrap_or("No description")
        );
        if let Some(usage) = &cmd.usage {
            text.push_str(&format!("\nUsage: {}{}", prefix, usage));
        }
        if !cmd.aliases.is_empty() {
            let aliases: Vec<&str> = cmd.aliases.iter().map(String::as_str).collect();
            text.push_str(&format!("\nAliases: {}", aliases.join(", ")));
        }
        if !cmd.required_roles.is_empty() {
            let roles: Vec<&str> = cmd.required_roles.iter().map(|r| r.as_str()).collect();
            text.push_str(&format!("\nRequires: {}", roles.join(", ")));
        }
        return Ok(Some(text));
    }

    let mut text = "Available commands:\n".to_string();
    for cmd in ctx.commands().commands() {
        text.push_str(&format!(
            "  {}{} - {}\n",
            prefix,
            cmd.name,
            cmd.description.as_deref().unwrap_or("")
        ));
    }
    Ok(Some(text.trim_end().to_string()))
}

async fn list_plugins(ctx: CommandContext, _args: Vec<String>) -> CommandResult {
    let plugins = ctx.bot().plugins();
    if plugins.is_empty() {
        return Ok(Some("No plugins are active.".to_string()));
    }
    let mut text = format!("{} active plugins:\n", plugins.len());
    for plugin in plugins {
        text.push_str(&format!("  {} {}\n", plugin.name(), plugin.command_provider()));
    }
    Ok(Some(text.trim_end().to_string()))
}

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use ultimate_bot::domain::traits::{PersistenceConfigurator, Transport};
use ultimate_bot::infrastructure::adapters::{ConsoleAdapter, TelegramAdapter};
use ultimate_bot::infrastructure::config::{AdapterKind, Config};
use ultimate_bot::infrastructure::database::{NullPersistence, SqliteDatabase};
use ultimate_bot::{BotError, BotLifecycleOrchestrator, BotState, PluginCatalog};

#[derive(Parser)]
#[command(name = "ultimate-bot")]
#[command(about = "A plugin based chat bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config, selects the Telegram adapter)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            if let Err(e) = run_bot(&cli.config, cli.token) {
                tracing::error!("Bot stopped: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("ultimate-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => match Config::default().to_yaml() {
            Ok(yaml) => {
                println!("{}", yaml);
                println!("\nSave this to config.yaml and adjust as needed.");
            }
            Err(e) => {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        },
    }
}

fn load_config(config_path: &str, token_override: Option<String>) -> Result<Config, BotError> {
    let mut config = if Path::new(config_path).exists() {
        Config::load(config_path)?
    } else {
        tracing::warn!("Config file {} not found, using defaults", config_path);
        Config::default()
    };
    config.apply_env();

    if let Some(token) = token_override {
        config.bot.token = Some(token);
        config.adapter = AdapterKind::Telegram;
    }
    config.validate()?;
    Ok(config)
}

fn run_bot(config_path: &str, token_override: Option<String>) -> Result<(), BotError> {
    let config = load_config(config_path, token_override)?;

    let transport: Arc<dyn Transport> = match config.adapter {
        AdapterKind::Console => Arc::new(ConsoleAdapter::new()),
        AdapterKind::Telegram => {
            let token = config.bot.token.clone().unwrap_or_default();
            Arc::new(TelegramAdapter::new(token))
        }
    };

    let persistence: Arc<dyn PersistenceConfigurator> = match &config.database {
        Some(db) => {
            tracing::info!("Using database at {}", db.path.display());
            Arc::new(SqliteDatabase::open(&db.path, db.schema_dir.clone())?)
        }
        None => Arc::new(NullPersistence),
    };

    tracing::info!("Starting ultimate-bot with the {:?} adapter", config.adapter);
    let bot = BotState::new(config, transport);
    let orchestrator = BotLifecycleOrchestrator::new(bot, PluginCatalog::builtin(), persistence);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| BotError::Internal(format!("Failed to start runtime: {}", e)))?;
    rt.block_on(orchestrator.run())
}

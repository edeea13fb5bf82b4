use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{RelayConfig, StateBackend};
use relaybot_core::{
    HttpConnector, HttpSkillClient, MemoryStorage, RootBot, SkillConversationIdFactory,
    SqliteStorage, StateStore,
};
use relaybot_gateway::{GatewayServer, GatewayState};

#[derive(Parser)]
#[command(name = "relaybot")]
#[command(version)]
#[command(about = "relaybot — a root bot that hands conversations to skills")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the root bot gateway
    Start,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// List configured skills
    Skills,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Skills => cmd_skills(&cli.config).await,
        Commands::Start => cmd_start(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("relaybot initialized at {}", config_dir.display());
    println!("Edit {} to configure your skills.", config_path.display());
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}

async fn cmd_skills(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path)?;
    let table = cfg.skills_table()?;

    println!("Host endpoint: {}", table.host_endpoint());
    for skill in table.list() {
        let marker = if skill.id == cfg.bot.default_skill { "*" } else { " " };
        println!("{} {:<20} {}", marker, skill.id, skill.skill_endpoint);
    }
    if !table.contains(&cfg.bot.default_skill) {
        warn!("Default skill '{}' is not configured", cfg.bot.default_skill);
    }
    Ok(())
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = RelayConfig::load(config_path)?;
    info!("Starting relaybot...");

    let store: Arc<dyn StateStore> = match cfg.state.backend {
        StateBackend::Memory => {
            info!("Using in-memory conversation state");
            Arc::new(MemoryStorage::new())
        }
        StateBackend::Sqlite => {
            let db_path = shellexpand(&cfg.state.db_path);
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(SqliteStorage::open(&db_path)?)
        }
    };

    let skills = Arc::new(cfg.skills_table()?);
    info!(
        "Loaded {} skills (host endpoint: {})",
        skills.len(),
        skills.host_endpoint()
    );

    let timeout = Duration::from_secs(cfg.transport.timeout_secs);
    let client = Arc::new(HttpSkillClient::new(timeout)?);
    let connector = Arc::new(HttpConnector::new(timeout)?);
    let id_factory = Arc::new(SkillConversationIdFactory::new());

    let bot = RootBot::new(
        cfg.router_settings(),
        skills,
        store,
        id_factory.clone(),
        client,
    )
    .context("Failed to build router")?;

    let state = GatewayState::new(Arc::new(bot), id_factory, connector);
    let server = GatewayServer::new(cfg.bind_addr()?, state);

    println!("relaybot is running on {}. Press Ctrl+C to stop.", cfg.gateway.bind);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Received Ctrl+C, shutting down...");
        })
        .await
}

fn shellexpand(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

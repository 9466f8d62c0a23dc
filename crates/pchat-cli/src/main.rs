use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pchat_client::api::{ApiClient, ChatApi};
use pchat_client::paths::settings_path;
use pchat_client::validation::{DeviceProvider, FrameDirectory, NoCamera};
use pchat_client::{ChatEngine, ClientSettings, Intent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod commands;
mod render;

use crate::commands::{parse_line, HELP};
use crate::render::{format_line, TerminalPresenter};

#[derive(Parser, Debug)]
#[command(name = "pchat", version, about = "Privacy Chat terminal client", long_about = None)]
struct Cli {
    /// Settings file (JSON). Defaults to the per-user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// HTTP base URL of the chat server
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Chat WebSocket URL
    #[arg(long, global = true)]
    ws_url: Option<String>,

    /// Liveness WebSocket URL
    #[arg(long, global = true)]
    video_ws_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Join the chat and read commands from stdin
    Join {
        #[arg(long)]
        username: String,

        /// Directory of JPEG frames used as the camera
        #[arg(long)]
        camera_dir: Option<PathBuf>,

        /// Show own messages before the server confirms them
        #[arg(long)]
        optimistic: bool,
    },
    /// Print message history as a user would see it on joining
    History {
        #[arg(long)]
        username: String,
    },
    /// List users currently connected
    Users,
    /// Print the effective settings
    Config,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pchat_client=info,pchat_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<ClientSettings> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => settings_path()?,
    };
    let mut settings = ClientSettings::load(Some(&path))
        .with_context(|| format!("loading settings from {}", path.display()))?;
    if let Some(url) = &cli.api_url {
        settings.endpoints.api_url = url.clone();
    }
    if let Some(url) = &cli.ws_url {
        settings.endpoints.ws_url = url.clone();
    }
    if let Some(url) = &cli.video_ws_url {
        settings.endpoints.video_ws_url = url.clone();
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    match cli.command {
        Commands::Join {
            username,
            camera_dir,
            optimistic,
        } => join_command(settings, username, camera_dir, optimistic).await,
        Commands::History { username } => history_command(settings, username).await,
        Commands::Users => users_command(settings).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

async fn join_command(
    mut settings: ClientSettings,
    username: String,
    camera_dir: Option<PathBuf>,
    optimistic: bool,
) -> Result<()> {
    settings.optimistic_echo |= optimistic;
    let devices: Arc<dyn DeviceProvider> = match camera_dir {
        Some(dir) => Arc::new(FrameDirectory::new(dir)),
        None => Arc::new(NoCamera),
    };
    let mut engine = ChatEngine::with_defaults(username.trim(), settings, devices)?;
    engine
        .connect()
        .await
        .context("connecting to chat server")?;
    info!(identity = engine.identity(), "joined");
    println!("joined as {}; /help for commands", engine.identity());

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(read_stdin(tx));

    let mut presenter = TerminalPresenter::default();
    tokio::select! {
        _ = engine.run(rx, &mut presenter) => {}
        _ = signal::ctrl_c() => info!("interrupted"),
    }
    engine.shutdown();
    Ok(())
}

/// Feed parsed stdin lines to the engine until EOF or `/quit`.
async fn read_stdin(intents: mpsc::Sender<Intent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "stdin read failed");
                break;
            }
        };
        if line.trim() == "/help" {
            println!("{HELP}");
            continue;
        }
        match parse_line(&line) {
            Ok(Some(intent)) => {
                let quit = intent == Intent::Quit;
                if intents.send(intent).await.is_err() || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(err) => eprintln!("! {err}"),
        }
    }
    let _ = intents.send(Intent::Quit).await;
}

async fn history_command(settings: ClientSettings, username: String) -> Result<()> {
    let api = ApiClient::new(settings.api_base())?;
    let records = api.fetch_history(&username).await?;
    let mut store = pchat_client::MessageStore::new();
    store.replace_all(records);
    let unlocks = pchat_client::validation::TransientUnlockSet::default();
    for record in store.iter() {
        let visibility = pchat_client::visibility::decide(record, &username, None, &unlocks);
        let row = pchat_client::RenderedMessage {
            record,
            visibility,
            own: record.is_from(&username),
            addressed_to_me: record.receiver.as_deref() == Some(username.as_str()),
            can_toggle: false,
            can_validate: false,
            being_validated: false,
            pending: false,
        };
        println!("{}", format_line(&row));
    }
    Ok(())
}

async fn users_command(settings: ClientSettings) -> Result<()> {
    let api = ApiClient::new(settings.api_base())?;
    for user in api.fetch_users().await? {
        println!("{user}");
    }
    Ok(())
}

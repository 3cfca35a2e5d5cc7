use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use firefingers::config::{UrlSource, API_URL_ENV};
use firefingers::scene::{Scene, VENUS_SPLAT};
use firefingers::tui::{self, EventHandler, Tui};
use firefingers::{handler, logging, ui, App, ChatClient, Config};

#[derive(Parser)]
#[command(name = "firefingers", version)]
#[command(about = "Chat with the Firefingers cultural heritage assistant")]
struct Cli {
    /// Base URL of the chat backend (requests go to <URL>/chat)
    #[arg(long, env = "FIREFINGERS_API_URL", global = true)]
    api_url: Option<String>,
    /// Log file (defaults to the user cache directory)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat (default)
    Chat,
    /// Write the static VR page for the 3D exhibit
    Scene {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Gaussian splat to show
        #[arg(long, default_value_t = VENUS_SPLAT.to_string())]
        splat: String,
    },
    /// Show the effective configuration
    Config {
        /// Save a backend URL to the config file
        #[arg(long)]
        set_api_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Chat) => {
            logging::initialize(cli.log_file.as_deref(), cli.verbose);
            run_chat(cli.api_url.as_deref()).await
        }
        Some(Commands::Scene { output, splat }) => write_scene(output.as_deref(), &splat),
        Some(Commands::Config { set_api_url }) => show_config(cli.api_url.as_deref(), set_api_url.as_deref()),
    }
}

async fn run_chat(cli_url: Option<&str>) -> Result<()> {
    let config_path = Config::get_config_path().ok();
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable config file: {:#}", e);
        Config::new()
    });

    let (api_url, source) = config.resolve_api_url(cli_url);
    match source {
        UrlSource::Unset => warn!(
            "No chat backend configured; set {} or pass --api-url. Requests will fail.",
            API_URL_ENV
        ),
        _ => info!("Using chat backend {} ({:?})", api_url, source),
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(ChatClient::new(&api_url), config, config_path, events.sender());

    let result = event_loop(&mut terminal, &mut events, &mut app).await;
    tui::restore()?;
    result
}

async fn event_loop(terminal: &mut Tui, events: &mut EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    info!("Chat closed with {} messages", app.conversation.len());
    Ok(())
}

fn write_scene(output: Option<&Path>, splat: &str) -> Result<()> {
    let html = Scene::venus(splat).to_html();
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, html).with_context(|| format!("could not write {}", path.display()))?;
            eprintln!("VR page written to {}", path.display());
        }
        None => print!("{}", html),
    }
    Ok(())
}

fn show_config(cli_url: Option<&str>, set_api_url: Option<&str>) -> Result<()> {
    if let Some(url) = set_api_url {
        Config::save_api_url(url)?;
    }

    let config = Config::load()?;
    let (api_url, source) = config.resolve_api_url(cli_url);

    println!("Config file: {}", Config::get_config_path()?.display());
    match source {
        UrlSource::Unset => println!("Backend URL: (not set, use --api-url or {})", API_URL_ENV),
        UrlSource::CommandLine => println!("Backend URL: {} (command line / {})", api_url, API_URL_ENV),
        UrlSource::ConfigFile => println!("Backend URL: {} (config file)", api_url),
    }
    println!("Theme:       {}", config.theme.as_str());
    if let Some(path) = logging::default_log_path() {
        println!("Log file:    {}", path.display());
    }
    Ok(())
}

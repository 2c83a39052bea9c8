//! CLI command definitions, routing, and tracing setup.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use cybvector_core::DialogueController;
use cybvector_intel::{ReputationGateway, detect_entities};
use cybvector_shared::{
    AppConfig, ChatRequest, Credentials, SessionId, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// CybVector: a cybersecurity analyst you can chat with.
#[derive(Parser)]
#[command(
    name = "cybvector",
    version,
    about = "Security hygiene checks, IP/URL/domain reputation, and security Q&A.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.cybvector/cybvector.toml.
    #[arg(long, global = true, env = "CYBVECTOR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the chat API over HTTP.
    Serve {
        /// Bind address (overrides `server.host`).
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides `server.port`).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat in the terminal.
    Chat,

    /// Look up every IP, URL, or domain in TEXT and print the raw reports.
    Lookup {
        /// Free text to scan for indicators.
        text: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "cybvector=info",
        1 => "cybvector=debug",
        _ => "cybvector=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `lookup` output stays pipeable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Serve { host, port } => {
            cmd_serve(resolve_config(config_path.as_deref())?, host, port).await
        }
        Command::Chat => cmd_chat(resolve_config(config_path.as_deref())?).await,
        Command::Lookup { text } => {
            cmd_lookup(resolve_config(config_path.as_deref())?, &text).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(resolve_config(config_path.as_deref())?).await,
        },
    }
}

fn resolve_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let credentials = Credentials::from_env(&config);
    let controller = Arc::new(DialogueController::from_config(&config, &credentials)?);
    crate::server::serve(controller, &config).await
}

async fn cmd_chat(config: AppConfig) -> Result<()> {
    let credentials = Credentials::from_env(&config);
    let controller = DialogueController::from_config(&config, &credentials)?;
    let session_id = SessionId::new();
    info!(session = %session_id, "terminal chat started");

    println!("CybVector ready. Ask a security question, paste an IP/URL/domain,");
    println!("or type \"security hygiene\" for a quick check. \"exit\" to leave.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let spinner = thinking_spinner();
        let reply = controller
            .handle(ChatRequest::new(message, Some(&session_id)))
            .await;
        spinner.finish_and_clear();

        println!("\ncybvector> {}\n", reply.response);
    }

    Ok(())
}

async fn cmd_lookup(config: AppConfig, text: &str) -> Result<()> {
    let entities = detect_entities(text);
    if entities.is_empty() {
        return Err(eyre!("no IP address, URL, or domain found in '{text}'"));
    }

    let credentials = Credentials::from_env(&config);
    let gateway = ReputationGateway::from_config(&config.reputation, &credentials)?;

    let spinner = thinking_spinner();
    let evidence = gateway.investigate(&entities).await;
    spinner.finish_and_clear();

    println!("{}", evidence.render());
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");

    let credentials = Credentials::from_env(&config);
    println!("# credentials");
    println!("#   model:      {}", availability(credentials.completion.is_available()));
    println!("#   virustotal: {}", availability(credentials.virustotal.is_available()));
    println!("#   abuseipdb:  {}", availability(credentials.abuseipdb.is_available()));
    Ok(())
}

fn availability(available: bool) -> &'static str {
    if available { "configured" } else { "not configured" }
}

/// Spinner shown while a turn waits on the network.
fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    spinner.set_style(style);
    spinner.set_message("analyzing...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

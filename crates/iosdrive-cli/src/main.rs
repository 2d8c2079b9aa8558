//! CLI client for driving iOS sessions on an Appium server.
//!
//! `start` creates a session and prints its id; every other command attaches
//! to an existing session by id and issues a single command.
//!
//! # Usage
//!
//! ```bash
//! # Create a session (capabilities from a JSON file, merged over the config)
//! export IOSDRIVE_SESSION=$(iosdrive start --caps caps.json)
//!
//! # Background the app for two and a half seconds
//! iosdrive background 2.5
//!
//! # Work with the open alert
//! iosdrive alert text
//! iosdrive alert send-keys "hunter2"
//! iosdrive alert accept
//!
//! # Keyboard, lock, touch-ID
//! iosdrive hide-keyboard --strategy pressKey --key Done
//! iosdrive lock --seconds 3
//! iosdrive touch-id --no-match
//!
//! # Driver settings
//! iosdrive settings
//! iosdrive set-setting snapshotMaxDepth 62
//!
//! # End the session
//! iosdrive quit
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use iosdrive_core::alert::Alert;
use iosdrive_core::capabilities::Capabilities;
use iosdrive_core::command::SessionId;
use iosdrive_core::config::IosDriveConfig;
use iosdrive_core::executor::CommandError;
use iosdrive_core::http::{HttpCommandExecutor, Url};
use iosdrive_core::ios::{DriverConfig, DriverError, IosDriver, KeyboardStrategy, SessionTarget};
use iosdrive_core::session::TargetLocator;
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:4723";

/// CLI client for driving iOS sessions on an Appium server.
#[derive(Parser)]
#[command(name = "iosdrive")]
#[command(about = "Drive iOS devices and simulators through an Appium server")]
#[command(version)]
struct Cli {
    /// Appium server URL (defaults to the config file, then http://127.0.0.1:4723)
    #[arg(short, long, env = "IOSDRIVE_URL")]
    url: Option<String>,

    /// Id of the session to attach to
    #[arg(short, long, env = "IOSDRIVE_SESSION")]
    session_id: Option<String>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new iOS session and print its id
    Start {
        /// JSON file with capabilities
        #[arg(long)]
        caps: Option<PathBuf>,
    },

    #[command(flatten)]
    Session(SessionCommand),
}

/// Commands issued against an existing session.
#[derive(Subcommand)]
enum SessionCommand {
    /// End the session
    Quit,

    /// Send the app to the background for a number of seconds
    Background {
        /// Seconds (fractions allowed)
        seconds: f64,
    },

    /// Hide the on-screen keyboard
    HideKeyboard {
        /// Name of the key to press
        #[arg(short, long)]
        key: Option<String>,
        /// Strategy: press, pressKey, tapOutside, tapOut
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Shake the device
    Shake,

    /// Lock the device, optionally unlocking after a number of seconds
    Lock {
        #[arg(long, default_value = "0")]
        seconds: u64,
    },

    /// Unlock the device
    Unlock,

    /// Print whether the device is locked
    IsLocked,

    /// Simulate a touch-ID scan
    TouchId {
        /// Simulate a non-matching finger
        #[arg(long)]
        no_match: bool,
    },

    /// Enroll or un-enroll touch-ID on a simulator
    TouchIdEnrollment {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Print the driver settings
    Settings,

    /// Update one driver setting
    SetSetting {
        name: String,
        /// JSON value (bare words are sent as strings)
        value: String,
    },

    /// Interact with the open alert
    Alert {
        #[command(subcommand)]
        action: AlertCommand,
    },
}

#[derive(Subcommand)]
enum AlertCommand {
    /// Press the accept button
    Accept,
    /// Press the dismiss button
    Dismiss,
    /// Print the alert text
    Text,
    /// Type into the alert's text field
    SendKeys { text: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    Connection(String),
    CommandFailed(String),
    Usage(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Connection(_) => ExitCode::from(2),
            CliError::CommandFailed(_) => ExitCode::from(1),
            CliError::Usage(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::CommandFailed(msg) => write!(f, "Command failed: {}", msg),
            CliError::Usage(msg) => write!(f, "Usage error: {}", msg),
        }
    }
}

impl From<CommandError> for CliError {
    fn from(e: CommandError) -> Self {
        if e.is_connection_error() {
            CliError::Connection(e.to_string())
        } else {
            CliError::CommandFailed(e.to_string())
        }
    }
}

impl From<DriverError> for CliError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Command(e) => e.into(),
            DriverError::Service(e) => CliError::CommandFailed(e.to_string()),
        }
    }
}

fn server_url(cli: &Cli, config: &IosDriveConfig) -> Result<Url, CliError> {
    let raw = cli
        .url
        .clone()
        .or_else(|| config.server_url.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    raw.parse()
        .map_err(|e| CliError::Usage(format!("invalid server URL '{}': {}", raw, e)))
}

fn load_capabilities(path: &Path) -> Result<Capabilities, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::Usage(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CliError::Usage(format!("{} is not a JSON object: {}", path.display(), e)))
}

fn emit(cli: &Cli, json: Value, text: Option<String>) {
    if cli.format == OutputFormat::Json {
        println!("{}", json);
    } else if let Some(text) = text {
        println!("{}", text);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = IosDriveConfig::load();
    let url = server_url(&cli, &config)?;

    match cli.command {
        Command::Start { ref caps } => start_session(&cli, &config, url, caps.as_deref()).await,
        Command::Session(ref command) => {
            let driver = attach_session(&cli, url)?;
            run_session_command(&cli, driver, command).await
        }
    }
}

async fn start_session(
    cli: &Cli,
    config: &IosDriveConfig,
    url: Url,
    caps: Option<&Path>,
) -> Result<(), CliError> {
    let mut capabilities = config.default_capabilities.clone();
    if let Some(path) = caps {
        capabilities = capabilities.merge(&load_capabilities(path)?);
    }
    debug!(%url, "starting session");

    let driver: IosDriver =
        IosDriver::new(DriverConfig::new(SessionTarget::Remote(url)), capabilities).await?;
    let id = driver.session_id().to_string();
    emit(cli, json!({ "success": true, "session_id": id }), Some(id.clone()));
    Ok(())
}

fn attach_session(cli: &Cli, url: Url) -> Result<IosDriver, CliError> {
    let session_id = cli
        .session_id
        .clone()
        .ok_or_else(|| CliError::Usage("no session id (use --session-id or IOSDRIVE_SESSION)".into()))?;
    let executor = HttpCommandExecutor::new(url)?;
    Ok(IosDriver::attach(Arc::new(executor), SessionId::new(session_id)))
}

async fn run_session_command(
    cli: &Cli,
    driver: IosDriver,
    command: &SessionCommand,
) -> Result<(), CliError> {
    match command {
        SessionCommand::Quit => {
            driver.quit().await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::Background { seconds } => {
            let duration = Duration::try_from_secs_f64(*seconds)
                .map_err(|e| CliError::Usage(format!("invalid duration {}: {}", seconds, e)))?;
            driver.run_app_in_background(duration).await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::HideKeyboard { key, strategy } => {
            match strategy {
                Some(strategy) => {
                    let strategy: KeyboardStrategy = strategy.parse().map_err(CliError::Usage)?;
                    driver
                        .hide_keyboard_with_strategy(strategy, key.as_deref())
                        .await?;
                }
                None => match key {
                    Some(key) => driver.hide_keyboard_with_key(key).await?,
                    None => driver.hide_keyboard().await?,
                },
            }
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::Shake => {
            driver.shake().await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::Lock { seconds } => {
            driver.lock_device(Duration::from_secs(*seconds)).await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::Unlock => {
            driver.unlock_device().await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::IsLocked => {
            let locked = driver.is_device_locked().await?;
            emit(cli, json!({ "locked": locked }), Some(locked.to_string()));
        }
        SessionCommand::TouchId { no_match } => {
            driver.perform_touch_id(!*no_match).await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::TouchIdEnrollment { enabled } => {
            driver.toggle_touch_id_enrollment(*enabled).await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::Settings => {
            let settings = Value::Object(driver.settings().await?);
            let text = serde_json::to_string_pretty(&settings)
                .map_err(|e| CliError::CommandFailed(e.to_string()))?;
            emit(cli, settings, Some(text));
        }
        SessionCommand::SetSetting { name, value } => {
            let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
            driver.set_setting(name, value).await?;
            emit(cli, json!({ "success": true }), None);
        }
        SessionCommand::Alert { action } => {
            let alert = driver.switch_to().alert();
            match action {
                AlertCommand::Accept => {
                    alert.accept().await?;
                    emit(cli, json!({ "success": true }), None);
                }
                AlertCommand::Dismiss => {
                    alert.dismiss().await?;
                    emit(cli, json!({ "success": true }), None);
                }
                AlertCommand::Text => {
                    let text = alert.text().await?;
                    emit(cli, json!({ "text": text }), Some(text.clone()));
                }
                AlertCommand::SendKeys { text } => {
                    alert.send_keys(text).await?;
                    emit(cli, json!({ "success": true }), None);
                }
            }
        }
    }

    Ok(())
}

//! Lifecycle management for a locally launched Appium server.
//!
//! [`AppiumServiceBuilder`] assembles the command line for the `appium`
//! executable; [`AppiumService`] spawns it, polls its `/status` endpoint until
//! it answers, and kills the process on [`stop`](AppiumService::stop) or drop.
//!
//! # Overview
//!
//! 1. **Build** the service from a builder (address, port, base path, extra
//!    server arguments, environment)
//! 2. **Start** the process
//! 3. **Wait for ready** by polling `GET <url>/status` every 500 ms
//! 4. **Stop** by killing the child process
//!
//! # Example
//!
//! ```no_run
//! use iosdrive_core::service::AppiumServiceBuilder;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut service = AppiumServiceBuilder::new()
//!     .using_any_free_port()
//!     .with_argument("--relaxed-security", None)
//!     .build()?;
//!
//! service.start().await?;
//! println!("Appium listening at {}", service.url());
//! service.stop();
//! # Ok(())
//! # }
//! ```

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::IosDriveConfig;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Executable launched when no other binary is configured.
pub const DEFAULT_APPIUM_BINARY: &str = "appium";

/// Interface the server binds to by default.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Port the server listens on by default.
pub const DEFAULT_PORT: u16 = 4723;

/// Maximum time to wait for the server to answer `/status`.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors specific to local server lifecycle operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The server executable could not be found.
    #[error("Appium executable not found: {0}")]
    BinaryNotFound(PathBuf),

    /// The server process exited before it became ready.
    #[error("Appium server exited before becoming ready: {0}")]
    ExitedEarly(String),

    /// The server did not answer `/status` within the startup timeout.
    #[error("Appium server failed to become ready within {0:?}")]
    StartupTimeout(Duration),

    /// The configured address, port and base path do not form a valid URL.
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// AppiumServiceBuilder
// ---------------------------------------------------------------------------

/// Builder for an [`AppiumService`].
#[derive(Debug, Clone)]
pub struct AppiumServiceBuilder {
    binary: PathBuf,
    address: String,
    port: Option<u16>,
    base_path: String,
    log_file: Option<PathBuf>,
    arguments: Vec<(String, Option<String>)>,
    environment: Vec<(String, String)>,
    startup_timeout: Duration,
}

impl Default for AppiumServiceBuilder {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_APPIUM_BINARY),
            address: DEFAULT_ADDRESS.to_string(),
            port: Some(DEFAULT_PORT),
            base_path: "/".to_string(),
            log_file: None,
            arguments: Vec::new(),
            environment: Vec::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }
}

impl AppiumServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder seeded from the persisted configuration.
    ///
    /// Only the executable path is taken from the config; everything else
    /// keeps its default.
    pub fn from_config(config: &IosDriveConfig) -> Self {
        let mut builder = Self::default();
        if let Some(binary) = &config.appium_binary {
            builder.binary = binary.clone();
        }
        builder
    }

    /// Path (or bare name, resolved via `PATH`) of the Appium executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn using_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Picks an unused local port when the service is built.
    pub fn using_any_free_port(mut self) -> Self {
        self.port = None;
        self
    }

    /// Base path the server mounts its routes under (e.g. `/wd/hub`).
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        let mut path = base_path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        self.base_path = path;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Adds a server flag, with an optional value (`--flag value`).
    pub fn with_argument(mut self, flag: impl Into<String>, value: Option<&str>) -> Self {
        self.arguments
            .push((flag.into(), value.map(str::to_string)));
        self
    }

    pub fn with_environment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.push((key.into(), value.into()));
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    fn command_line(&self, port: u16) -> Vec<String> {
        let mut args = vec![
            "--address".to_string(),
            self.address.clone(),
            "--port".to_string(),
            port.to_string(),
            "--base-path".to_string(),
            self.base_path.clone(),
        ];
        if let Some(log) = &self.log_file {
            args.push("--log".to_string());
            args.push(log.to_string_lossy().into_owned());
        }
        for (flag, value) in &self.arguments {
            args.push(flag.clone());
            if let Some(value) = value {
                args.push(value.clone());
            }
        }
        args
    }

    /// Resolves the port and produces a service that has not been started.
    pub fn build(self) -> Result<AppiumService, ServiceError> {
        let port = match self.port {
            Some(port) => port,
            None => free_port()?,
        };

        // 0.0.0.0 is a bind address, not something a client can connect to.
        let host = match self.address.as_str() {
            "0.0.0.0" => "127.0.0.1",
            "::" => "[::1]",
            other => other,
        };
        let raw = format!("http://{host}:{port}{}", self.base_path);
        let url = Url::parse(&raw).map_err(|e| ServiceError::InvalidUrl(format!("{raw}: {e}")))?;

        Ok(AppiumService {
            args: self.command_line(port),
            binary: self.binary,
            environment: self.environment,
            startup_timeout: self.startup_timeout,
            url,
            child: None,
        })
    }
}

fn free_port() -> Result<u16, ServiceError> {
    let listener = TcpListener::bind((DEFAULT_ADDRESS, 0))?;
    Ok(listener.local_addr()?.port())
}

// ---------------------------------------------------------------------------
// AppiumService
// ---------------------------------------------------------------------------

/// A locally launched Appium server process.
///
/// The process is killed when the service is stopped or dropped.
#[derive(Debug)]
pub struct AppiumService {
    binary: PathBuf,
    args: Vec<String>,
    environment: Vec<(String, String)>,
    startup_timeout: Duration,
    url: Url,
    child: Option<Child>,
}

impl AppiumService {
    /// The service built from [`AppiumServiceBuilder::from_config`] with the
    /// persisted configuration.
    pub fn build_default_service() -> Result<Self, ServiceError> {
        AppiumServiceBuilder::from_config(&IosDriveConfig::load()).build()
    }

    /// The URL clients should use to reach the server.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The arguments passed to the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    /// Returns `true` if the process was started and has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawns the server and waits until it answers `/status`.
    ///
    /// Does nothing if the process is already running.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::BinaryNotFound`] if the executable does not exist
    /// - [`ServiceError::ExitedEarly`] if the process dies during startup
    /// - [`ServiceError::StartupTimeout`] if `/status` never succeeds
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.is_running() {
            return Ok(());
        }

        debug!(binary = %self.binary.display(), args = ?self.args, "spawning appium");
        let child = Command::new(&self.binary)
            .args(&self.args)
            .envs(self.environment.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ServiceError::BinaryNotFound(self.binary.clone()),
                _ => ServiceError::Io(e),
            })?;
        self.child = Some(child);

        match self.wait_for_ready().await {
            Ok(()) => {
                info!(url = %self.url, "appium server started");
                Ok(())
            }
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    /// Kills the server process, if one is running.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!(error = %e, "appium process already gone");
            }
            let _ = child.wait();
            info!(url = %self.url, "appium server stopped");
        }
    }

    /// Quick reachability check: `GET /status` with a short timeout.
    pub async fn is_reachable(&self) -> bool {
        let client = match reqwest::Client::builder().timeout(STATUS_TIMEOUT).build() {
            Ok(client) => client,
            Err(_) => return false,
        };
        client
            .get(self.status_url())
            .send()
            .await
            .is_ok_and(|reply| reply.status().is_success())
    }

    fn status_url(&self) -> String {
        format!("{}/status", self.url.as_str().trim_end_matches('/'))
    }

    async fn wait_for_ready(&mut self) -> Result<(), ServiceError> {
        let deadline = tokio::time::Instant::now() + self.startup_timeout;

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    self.child = None;
                    return Err(ServiceError::ExitedEarly(status.to_string()));
                }
            }

            if self.is_reachable().await {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(url = %self.url, "appium server did not become ready");
                return Err(ServiceError::StartupTimeout(self.startup_timeout));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for AppiumService {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Shared test helpers for iosdrive-core integration tests.
//!
//! Provides a recording [`CommandExecutor`] for driver-level tests, a
//! recording [`Alert`] for forwarding tests, a counting
//! [`HttpClientFactory`], and a stand-in `appium` executable. The mock HTTP
//! server lives in `iosdrive-testkit` and is re-exported here.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use iosdrive_core::alert::{Alert, Credentials};
use iosdrive_core::capabilities::Capabilities;
use iosdrive_core::command::Command;
use iosdrive_core::executor::{CommandError, CommandExecutor, Response};
use iosdrive_core::http::HttpClientFactory;
use iosdrive_core::ios::{DriverConfig, IosDriver, SessionTarget};

pub use iosdrive_testkit::{error, mock_http_server, ok, recorded, RecordedRequest};

// ---------------------------------------------------------------------------
// Recording executor
// ---------------------------------------------------------------------------

/// An executor that records every command and replies from a script.
///
/// When the script runs out, commands succeed with a `null` value.
#[derive(Default)]
pub struct RecordingExecutor {
    commands: Mutex<Vec<Command>>,
    replies: Mutex<VecDeque<Result<Response, CommandError>>>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the reply for the next unanswered command.
    pub fn reply(&self, reply: Result<Response, CommandError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn reply_value(&self, value: Value) {
        self.reply(Ok(Response::with_value(value)));
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn last(&self) -> Command {
        self.commands
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no command recorded")
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn execute(&self, command: Command) -> Result<Response, CommandError> {
        self.commands.lock().unwrap().push(command);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Response::default()))
    }
}

/// A W3C `newSession` reply for the given session id.
pub fn new_session_reply(session_id: &str) -> Response {
    Response::with_value(json!({
        "sessionId": session_id,
        "capabilities": {"platformName": "iOS"}
    }))
}

/// Creates a driver over a fresh recording executor, with the `newSession`
/// command already consumed and cleared from the record.
pub async fn connected_driver() -> (IosDriver, Arc<RecordingExecutor>) {
    let executor = RecordingExecutor::new();
    executor.reply(Ok(new_session_reply("session-1")));

    let config = DriverConfig::new(SessionTarget::Executor(executor.clone()));
    let driver = IosDriver::new(config, Capabilities::new()).await.unwrap();
    executor.clear();
    (driver, executor)
}

// ---------------------------------------------------------------------------
// Recording alert
// ---------------------------------------------------------------------------

/// An alert that records which operations were called on it.
#[derive(Default, Clone)]
pub struct MockAlert {
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockAlert {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Alert for MockAlert {
    async fn dismiss(&self) -> Result<(), CommandError> {
        self.record("dismiss".into());
        Ok(())
    }

    async fn accept(&self) -> Result<(), CommandError> {
        self.record("accept".into());
        Ok(())
    }

    async fn text(&self) -> Result<String, CommandError> {
        self.record("text".into());
        Ok("mock".into())
    }

    async fn send_keys(&self, text: &str) -> Result<(), CommandError> {
        self.record(format!("send_keys:{text}"));
        Ok(())
    }

    async fn set_credentials(&self, credentials: &Credentials) -> Result<(), CommandError> {
        self.record(format!("set_credentials:{}", credentials.username));
        Ok(())
    }

    async fn authenticate_using(&self, credentials: &Credentials) -> Result<(), CommandError> {
        self.record(format!("authenticate_using:{}", credentials.username));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Counting client factory
// ---------------------------------------------------------------------------

/// An [`HttpClientFactory`] that counts how many clients it built.
#[derive(Debug, Default)]
pub struct CountingClientFactory {
    created: AtomicUsize,
}

impl CountingClientFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl HttpClientFactory for CountingClientFactory {
    fn create_client(&self) -> Result<reqwest::Client, CommandError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        reqwest::Client::builder()
            .build()
            .map_err(|e| CommandError::Transport(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Stand-in appium executable
// ---------------------------------------------------------------------------

/// Path to an executable shell script that ignores its arguments and stays
/// alive, standing in for `appium` while a mock server answers its port.
///
/// The script is written once per test binary.
#[cfg(unix)]
pub fn stub_appium() -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::OnceLock;

    static STUB: OnceLock<std::path::PathBuf> = OnceLock::new();
    STUB.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("iosdrive-stub-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("appium");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    })
    .clone()
}

//! Command executor abstraction.
//!
//! This module defines the [`CommandExecutor`] trait, the seam between the
//! session-level API (sessions, alerts, elements, the iOS driver) and the
//! transport that actually reaches the server. The bundled implementation is
//! [`HttpCommandExecutor`](crate::http::HttpCommandExecutor); tests and
//! embedders can supply their own.
//!
//! Executors own every failure mode of a remote call. Callers above this
//! layer propagate [`CommandError`] unchanged.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::command::{Command, DriverCommand};

/// Errors raised while executing a remote command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// The request could not be delivered or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the transport's timeout.
    #[error("request timed out")]
    Timeout,

    /// The server rejected the command.
    ///
    /// `error` is the W3C error code (e.g. `no such alert`,
    /// `unknown command`) or a synthesized `status N` for legacy responses.
    #[error("server error ({error}): {message}")]
    Server {
        status: Option<u16>,
        error: String,
        message: String,
    },

    /// The server answered with a body that could not be interpreted.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A session-scoped command was issued without a session id.
    #[error("command {0} requires a session")]
    MissingSession(DriverCommand),

    /// A path parameter required by the command route was not supplied.
    #[error("command {command} is missing path parameter '{param}'")]
    MissingParameter {
        command: DriverCommand,
        param: String,
    },

    /// A path parameter cannot be used as a single path segment.
    #[error("command {command} has invalid path parameter '{param}'")]
    InvalidParameter {
        command: DriverCommand,
        param: String,
    },
}

impl CommandError {
    /// Returns the W3C error code for server-side failures.
    pub fn server_error_code(&self) -> Option<&str> {
        match self {
            CommandError::Server { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns `true` for failures where the server was never reached or
    /// never answered.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, CommandError::Transport(_) | CommandError::Timeout)
    }
}

/// The decoded result of a remote command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    /// Session id echoed by the server, when present.
    pub session_id: Option<String>,
    /// The `value` field of the response body.
    pub value: Value,
}

impl Response {
    /// A response carrying only a value.
    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            session_id: None,
            value: value.into(),
        }
    }

    /// Textual form of the value.
    ///
    /// Strings are returned verbatim, `null` becomes an empty string, and
    /// anything else is rendered as JSON text.
    pub fn value_as_string(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Interprets the value as a boolean.
    pub fn value_as_bool(&self) -> Result<bool, CommandError> {
        self.value.as_bool().ok_or_else(|| {
            CommandError::MalformedResponse(format!("expected boolean value, got {}", self.value))
        })
    }
}

/// Sends commands to a remote automation server.
///
/// Implementations serialize the command, deliver it, and decode the reply.
/// They are shared between a session and every alert, element and target
/// locator derived from it, hence `Send + Sync` and `&self` receivers.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executes one command and returns the decoded response.
    async fn execute(&self, command: Command) -> Result<Response, CommandError>;
}

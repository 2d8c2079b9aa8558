//! HTTP transport for the WebDriver wire protocol.
//!
//! [`HttpCommandExecutor`] turns a [`Command`] into an HTTP request against an
//! Appium server using the route table in [`crate::command`], and decodes the
//! JSON reply into a [`Response`]. Both W3C replies (error signalled by HTTP
//! status plus `value.error`) and legacy JSON wire protocol replies (error
//! signalled by a non-zero `status` field) are understood.
//!
//! The underlying [`reqwest::Client`] comes from an [`HttpClientFactory`],
//! which is the transport override accepted by
//! [`DriverConfig`](crate::ios::DriverConfig).
//!
//! # Example
//!
//! ```no_run
//! use iosdrive_core::http::HttpCommandExecutor;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = HttpCommandExecutor::new("http://127.0.0.1:4723".parse()?)?;
//! assert_eq!(executor.base_url().port(), Some(4723));
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
pub use reqwest::Url;
use serde_json::{Map, Value};
use tracing::{debug, debug_span, trace, Instrument};

use crate::command::{Command, DriverCommand, HttpMethod, SessionId};
use crate::executor::{CommandError, CommandExecutor, Response};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Timeout for establishing a TCP connection to the server.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for a complete request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Client factory
// ---------------------------------------------------------------------------

/// Produces the HTTP client used to talk to the server.
///
/// Supplying a custom factory is how callers override transport settings
/// (timeouts, proxies, TLS roots) without touching the executor.
pub trait HttpClientFactory: Send + Sync + fmt::Debug {
    fn create_client(&self) -> Result<reqwest::Client, CommandError>;
}

/// Factory producing a client with fixed connect and request timeouts.
#[derive(Debug, Clone)]
pub struct DefaultHttpClientFactory {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for DefaultHttpClientFactory {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HttpClientFactory for DefaultHttpClientFactory {
    fn create_client(&self) -> Result<reqwest::Client, CommandError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| CommandError::Transport(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HttpCommandExecutor
// ---------------------------------------------------------------------------

/// A [`CommandExecutor`] speaking JSON over HTTP to an Appium server.
#[derive(Debug, Clone)]
pub struct HttpCommandExecutor {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpCommandExecutor {
    /// Creates an executor with the [`DefaultHttpClientFactory`].
    pub fn new(base_url: Url) -> Result<Self, CommandError> {
        Self::with_factory(base_url, &DefaultHttpClientFactory::default())
    }

    /// Creates an executor whose client comes from the given factory.
    pub fn with_factory(
        base_url: Url,
        factory: &dyn HttpClientFactory,
    ) -> Result<Self, CommandError> {
        Ok(Self {
            base_url,
            client: factory.create_client()?,
        })
    }

    /// The server address commands are sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl CommandExecutor for HttpCommandExecutor {
    async fn execute(&self, command: Command) -> Result<Response, CommandError> {
        let Command {
            session_id,
            name,
            mut parameters,
        } = command;
        let route = name.route();
        let path = expand_path(route.path, name, session_id.as_ref(), &mut parameters)?;
        let url = self.endpoint(&path);

        let span = debug_span!("http_execute", command = name.name());
        async {
            debug!(method = ?route.method, %url, "sending command");

            let request = match route.method {
                HttpMethod::Get => self.client.get(&url),
                HttpMethod::Delete => self.client.delete(&url),
                HttpMethod::Post => self.client.post(&url).json(&Value::Object(parameters)),
            };

            let reply = request.send().await.map_err(map_reqwest_error)?;
            let status = reply.status().as_u16();
            let body = reply.text().await.map_err(map_reqwest_error)?;
            trace!(status, body_bytes = body.len(), "received reply");

            decode_response(status, &body)
        }
        .instrument(span)
        .await
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn map_reqwest_error(err: reqwest::Error) -> CommandError {
    if err.is_timeout() {
        CommandError::Timeout
    } else {
        CommandError::Transport(err.to_string())
    }
}

/// Fills the placeholders of a route template.
///
/// `:sessionId` comes from `session_id`; every other `:name` segment is
/// removed from `parameters` and must be a string or number. Substituted
/// values are percent-encoded as a single path segment; empty values and the
/// dot segments `.` and `..` are rejected.
pub fn expand_path(
    template: &str,
    command: DriverCommand,
    session_id: Option<&SessionId>,
    parameters: &mut Map<String, Value>,
) -> Result<String, CommandError> {
    let mut path = String::with_capacity(template.len() + 32);

    for segment in template.split('/').filter(|s| !s.is_empty()) {
        path.push('/');
        let Some(param) = segment.strip_prefix(':') else {
            path.push_str(segment);
            continue;
        };

        if param == "sessionId" {
            let id = session_id.ok_or(CommandError::MissingSession(command))?;
            push_segment(&mut path, command, param, id.as_str())?;
            continue;
        }

        let value = parameters
            .remove(param)
            .ok_or_else(|| CommandError::MissingParameter {
                command,
                param: param.to_string(),
            })?;
        match value {
            Value::String(s) => push_segment(&mut path, command, param, &s)?,
            Value::Number(n) => path.push_str(&n.to_string()),
            _ => {
                return Err(CommandError::InvalidParameter {
                    command,
                    param: param.to_string(),
                })
            }
        }
    }

    Ok(path)
}

fn push_segment(
    path: &mut String,
    command: DriverCommand,
    param: &str,
    raw: &str,
) -> Result<(), CommandError> {
    if matches!(raw, "" | "." | "..") {
        return Err(CommandError::InvalidParameter {
            command,
            param: param.to_string(),
        });
    }
    path.push_str(&urlencoding::encode(raw));
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

/// Decodes an HTTP reply into a [`Response`] or a [`CommandError`].
pub fn decode_response(status: u16, body: &str) -> Result<Response, CommandError> {
    let success = (200..300).contains(&status);

    if body.trim().is_empty() {
        return if success {
            Ok(Response::default())
        } else {
            Err(CommandError::Server {
                status: Some(status),
                error: "unknown error".to_string(),
                message: format!("HTTP {status} with empty body"),
            })
        };
    }

    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) if success => return Err(CommandError::MalformedResponse(e.to_string())),
        Err(_) => {
            return Err(CommandError::Server {
                status: Some(status),
                error: "unknown error".to_string(),
                message: body.trim().to_string(),
            })
        }
    };

    let mut obj = match json {
        Value::Object(obj) => obj,
        other => {
            return Err(CommandError::MalformedResponse(format!(
                "expected JSON object, got {other}"
            )))
        }
    };

    let session_id = obj
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string);
    let value = obj.remove("value").unwrap_or(Value::Null);

    // Legacy JSON wire protocol: non-zero status means failure, regardless of
    // the HTTP status line.
    if let Some(code) = obj.get("status").and_then(Value::as_i64) {
        if code != 0 {
            return Err(CommandError::Server {
                status: Some(status),
                error: format!("status {code}"),
                message: error_message(&value),
            });
        }
    }

    if !success {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(CommandError::Server {
            status: Some(status),
            error,
            message: error_message(&value),
        });
    }

    Ok(Response { session_id, value })
}

fn error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

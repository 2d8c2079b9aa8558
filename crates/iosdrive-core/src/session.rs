//! Generic remote sessions.
//!
//! [`RemoteSession`] is the platform-neutral base the iOS driver composes:
//! it creates (or attaches to) a session through a [`CommandExecutor`] and
//! hands out [`SessionHandle`]s, the clonable command path shared by alerts,
//! elements and target locators.
//!
//! [`TargetLocator`] models context switching (alerts, frames, windows). The
//! base implementation is [`RemoteTargetLocator`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument};

use crate::alert::{Alert, RemoteAlert};
use crate::capabilities::Capabilities;
use crate::command::{prepare_arguments, Command, DriverCommand, SessionId};
use crate::element::{element_id_from_value, element_reference, RemoteElement};
use crate::executor::{CommandError, CommandExecutor, Response};

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// A session id bound to the executor that reaches it.
///
/// This is the only way anything above the executor issues commands.
#[derive(Clone)]
pub struct SessionHandle {
    executor: Arc<dyn CommandExecutor>,
    session_id: SessionId,
}

impl SessionHandle {
    pub fn new(executor: Arc<dyn CommandExecutor>, session_id: SessionId) -> Self {
        Self {
            executor,
            session_id,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn executor(&self) -> &Arc<dyn CommandExecutor> {
        &self.executor
    }

    /// Executes a command against this session.
    pub async fn execute(
        &self,
        name: DriverCommand,
        parameters: Map<String, Value>,
    ) -> Result<Response, CommandError> {
        debug!(command = name.name(), session = %self.session_id, "executing command");
        self.executor
            .execute(Command::new(Some(self.session_id.clone()), name, parameters))
            .await
    }

    /// Executes a command that takes no arguments.
    pub async fn execute_empty(&self, name: DriverCommand) -> Result<Response, CommandError> {
        self.execute(name, Map::new()).await
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RemoteSession
// ---------------------------------------------------------------------------

/// Builds the `newSession` payload.
///
/// Capabilities are sent both as W3C `alwaysMatch` and as legacy
/// `desiredCapabilities` so older servers accept the request too.
pub fn new_session_parameters(capabilities: &Capabilities) -> Map<String, Value> {
    let caps = capabilities.clone().into_value();
    let mut params = Map::new();
    params.insert(
        "capabilities".to_string(),
        json!({ "alwaysMatch": caps, "firstMatch": [{}] }),
    );
    params.insert("desiredCapabilities".to_string(), caps);
    params
}

/// Extracts the session id and negotiated capabilities from a `newSession`
/// reply. Falls back to `requested` when the server echoes no capabilities.
fn parse_new_session(
    response: Response,
    requested: Capabilities,
) -> Result<(SessionId, Capabilities), CommandError> {
    let Response { session_id, value } = response;

    // W3C: {"value": {"sessionId": ..., "capabilities": {...}}}
    if let Some(id) = value.get("sessionId").and_then(Value::as_str) {
        let caps = match value.get("capabilities") {
            Some(Value::Object(map)) => Capabilities::from(map.clone()),
            _ => requested,
        };
        return Ok((SessionId::new(id), caps));
    }

    // Legacy: {"sessionId": ..., "value": {...capabilities}}
    if let Some(id) = session_id {
        let caps = match value {
            Value::Object(map) => Capabilities::from(map),
            _ => requested,
        };
        return Ok((SessionId::new(id), caps));
    }

    Err(CommandError::MalformedResponse(
        "newSession reply carries no session id".to_string(),
    ))
}

/// A live session on a remote automation server.
#[derive(Debug, Clone)]
pub struct RemoteSession {
    handle: SessionHandle,
    capabilities: Capabilities,
}

impl RemoteSession {
    /// Creates a new session with the given capabilities.
    #[instrument(skip_all, level = "debug")]
    pub async fn start(
        executor: Arc<dyn CommandExecutor>,
        capabilities: Capabilities,
    ) -> Result<Self, CommandError> {
        let params = new_session_parameters(&capabilities);
        let response = executor
            .execute(Command::new(None, DriverCommand::NewSession, params))
            .await?;
        let (session_id, capabilities) = parse_new_session(response, capabilities)?;

        info!(session = %session_id, "session started");
        Ok(Self {
            handle: SessionHandle::new(executor, session_id),
            capabilities,
        })
    }

    /// Binds to a session that already exists on the server.
    pub fn attach(
        executor: Arc<dyn CommandExecutor>,
        session_id: SessionId,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            handle: SessionHandle::new(executor, session_id),
            capabilities,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        self.handle.session_id()
    }

    /// Capabilities negotiated at session creation.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub async fn execute(
        &self,
        name: DriverCommand,
        parameters: Map<String, Value>,
    ) -> Result<Response, CommandError> {
        self.handle.execute(name, parameters).await
    }

    /// Context switching for alerts, frames and windows.
    pub fn switch_to(&self) -> RemoteTargetLocator {
        RemoteTargetLocator::new(self.handle.clone())
    }

    /// Ends the session on the server.
    pub async fn quit(&self) -> Result<(), CommandError> {
        self.handle.execute_empty(DriverCommand::Quit).await?;
        info!(session = %self.session_id(), "session ended");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Target locators
// ---------------------------------------------------------------------------

/// A frame to switch into.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameRef {
    /// The frame at the given index in the current context.
    Index(u16),
    /// The frame backing the element with the given id.
    Element(String),
    /// The top-level browsing context.
    Top,
}

impl FrameRef {
    fn to_json(&self) -> Value {
        match self {
            FrameRef::Index(i) => json!(i),
            FrameRef::Element(id) => element_reference(id),
            FrameRef::Top => Value::Null,
        }
    }
}

/// Context switching on a session.
///
/// Implementors supply [`handle`](TargetLocator::handle) and
/// [`alert`](TargetLocator::alert); frame and window switching have default
/// implementations shared by every platform.
#[async_trait]
pub trait TargetLocator: Send + Sync {
    /// The alert type handed out by [`alert`](TargetLocator::alert).
    type Alert: Alert;

    /// The session this locator switches.
    fn handle(&self) -> &SessionHandle;

    /// Switches to the currently open alert.
    fn alert(&self) -> Self::Alert;

    /// Switches to a frame.
    async fn frame(&self, frame: FrameRef) -> Result<(), CommandError> {
        self.handle()
            .execute(DriverCommand::SwitchToFrame, prepare_arguments("id", frame.to_json()))
            .await?;
        Ok(())
    }

    /// Switches to the parent of the current frame.
    async fn parent_frame(&self) -> Result<(), CommandError> {
        self.handle()
            .execute_empty(DriverCommand::SwitchToParentFrame)
            .await?;
        Ok(())
    }

    /// Switches back to the top-level context.
    async fn default_content(&self) -> Result<(), CommandError> {
        self.frame(FrameRef::Top).await
    }

    /// Switches to the window (or native/web context) with the given handle.
    async fn window(&self, name_or_handle: &str) -> Result<(), CommandError> {
        let mut params = prepare_arguments("handle", name_or_handle);
        params.insert("name".to_string(), json!(name_or_handle));
        self.handle()
            .execute(DriverCommand::SwitchToWindow, params)
            .await?;
        Ok(())
    }

    /// The element that currently has focus.
    async fn active_element(&self) -> Result<RemoteElement, CommandError> {
        let response = self
            .handle()
            .execute_empty(DriverCommand::GetActiveElement)
            .await?;
        let id = element_id_from_value(&response.value)?;
        Ok(RemoteElement::new(id, self.handle().clone()))
    }
}

/// The platform-neutral [`TargetLocator`], producing [`RemoteAlert`]s.
#[derive(Debug, Clone)]
pub struct RemoteTargetLocator {
    handle: SessionHandle,
}

impl RemoteTargetLocator {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl TargetLocator for RemoteTargetLocator {
    type Alert = RemoteAlert;

    fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    fn alert(&self) -> RemoteAlert {
        RemoteAlert::new(self.handle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::W3C_ELEMENT_KEY;

    #[test]
    fn new_session_payload_shape() {
        let caps = Capabilities::new().with("platformName", "iOS");
        let params = new_session_parameters(&caps);
        assert_eq!(
            Value::Object(params),
            json!({
                "capabilities": {"alwaysMatch": {"platformName": "iOS"}, "firstMatch": [{}]},
                "desiredCapabilities": {"platformName": "iOS"},
            })
        );
    }

    #[test]
    fn parse_w3c_new_session() {
        let response = Response::with_value(json!({
            "sessionId": "abc",
            "capabilities": {"platformName": "iOS", "udid": "X"}
        }));
        let (id, caps) = parse_new_session(response, Capabilities::new()).unwrap();
        assert_eq!(id.as_str(), "abc");
        assert_eq!(caps.get("udid"), Some(&json!("X")));
    }

    #[test]
    fn parse_legacy_new_session() {
        let response = Response {
            session_id: Some("legacy".into()),
            value: json!({"platformName": "iOS"}),
        };
        let (id, caps) = parse_new_session(response, Capabilities::new()).unwrap();
        assert_eq!(id.as_str(), "legacy");
        assert_eq!(caps.platform_name(), Some("iOS"));
    }

    #[test]
    fn parse_new_session_falls_back_to_requested_capabilities() {
        let requested = Capabilities::new().with("deviceName", "iPhone");
        let response = Response::with_value(json!({"sessionId": "abc"}));
        let (_, caps) = parse_new_session(response, requested.clone()).unwrap();
        assert_eq!(caps, requested);
    }

    #[test]
    fn parse_new_session_without_id_fails() {
        let response = Response::with_value(json!({"capabilities": {}}));
        let err = parse_new_session(response, Capabilities::new()).unwrap_err();
        assert!(matches!(err, CommandError::MalformedResponse(_)));
    }

    #[test]
    fn frame_ref_json() {
        assert_eq!(FrameRef::Index(2).to_json(), json!(2));
        assert_eq!(FrameRef::Top.to_json(), Value::Null);
        let frame = FrameRef::Element("el-1".into()).to_json();
        assert_eq!(frame[W3C_ELEMENT_KEY], "el-1");
    }
}

//! Remote command registry.
//!
//! Every operation the driver performs is a named [`DriverCommand`] plus a
//! JSON argument map. The command names are the stable identifiers shared
//! with the server-side command registry and must not change. Each command
//! also carries the HTTP [`Route`] used by
//! [`HttpCommandExecutor`](crate::http::HttpCommandExecutor).
//!
//! # Example
//!
//! ```
//! use iosdrive_core::command::{prepare_arguments, DriverCommand, HttpMethod};
//!
//! let cmd = DriverCommand::SetAlertValue;
//! assert_eq!(cmd.name(), "setAlertValue");
//! assert_eq!(cmd.route().method, HttpMethod::Post);
//!
//! let args = prepare_arguments("value", "hello");
//! assert_eq!(args["value"], "hello");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Session id
// ---------------------------------------------------------------------------

/// Opaque identifier of a remote session, as assigned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// HTTP verb used by a command route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// HTTP method plus path template for a command.
///
/// Path segments starting with `:` are placeholders. `:sessionId` is filled
/// from the command's session id; any other placeholder is taken from (and
/// removed from) the command parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub method: HttpMethod,
    pub path: &'static str,
}

const fn get(path: &'static str) -> Route {
    Route { method: HttpMethod::Get, path }
}

const fn post(path: &'static str) -> Route {
    Route { method: HttpMethod::Post, path }
}

const fn delete(path: &'static str) -> Route {
    Route { method: HttpMethod::Delete, path }
}

// ---------------------------------------------------------------------------
// DriverCommand
// ---------------------------------------------------------------------------

/// Error returned when a command name is not in the registry.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

/// Named remote commands understood by an Appium server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCommand {
    // Session
    Status,
    NewSession,
    Quit,

    // Generic alert handling
    DismissAlert,
    AcceptAlert,
    GetAlertText,
    SetAlertValue,
    SetAlertCredentials,

    // Context switching
    SwitchToFrame,
    SwitchToParentFrame,
    SwitchToWindow,
    GetActiveElement,

    // Element lookup and interaction
    FindElement,
    FindElements,
    FindChildElement,
    FindChildElements,
    ClickElement,
    ClearElement,
    SendKeysToElement,
    GetElementText,
    GetElementAttribute,
    SetValue,

    // Mobile
    RunAppInBackground,
    HideKeyboard,
    ShakeDevice,
    LockDevice,
    UnlockDevice,
    IsDeviceLocked,
    TouchId,
    ToggleTouchIdEnrollment,
    GetSettings,
    SetSettings,
}

impl DriverCommand {
    /// All registered commands.
    pub const ALL: &'static [DriverCommand] = &[
        DriverCommand::Status,
        DriverCommand::NewSession,
        DriverCommand::Quit,
        DriverCommand::DismissAlert,
        DriverCommand::AcceptAlert,
        DriverCommand::GetAlertText,
        DriverCommand::SetAlertValue,
        DriverCommand::SetAlertCredentials,
        DriverCommand::SwitchToFrame,
        DriverCommand::SwitchToParentFrame,
        DriverCommand::SwitchToWindow,
        DriverCommand::GetActiveElement,
        DriverCommand::FindElement,
        DriverCommand::FindElements,
        DriverCommand::FindChildElement,
        DriverCommand::FindChildElements,
        DriverCommand::ClickElement,
        DriverCommand::ClearElement,
        DriverCommand::SendKeysToElement,
        DriverCommand::GetElementText,
        DriverCommand::GetElementAttribute,
        DriverCommand::SetValue,
        DriverCommand::RunAppInBackground,
        DriverCommand::HideKeyboard,
        DriverCommand::ShakeDevice,
        DriverCommand::LockDevice,
        DriverCommand::UnlockDevice,
        DriverCommand::IsDeviceLocked,
        DriverCommand::TouchId,
        DriverCommand::ToggleTouchIdEnrollment,
        DriverCommand::GetSettings,
        DriverCommand::SetSettings,
    ];

    /// The registry name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            DriverCommand::Status => "status",
            DriverCommand::NewSession => "newSession",
            DriverCommand::Quit => "quit",
            DriverCommand::DismissAlert => "dismissAlert",
            DriverCommand::AcceptAlert => "acceptAlert",
            DriverCommand::GetAlertText => "getAlertText",
            DriverCommand::SetAlertValue => "setAlertValue",
            DriverCommand::SetAlertCredentials => "setAlertCredentials",
            DriverCommand::SwitchToFrame => "switchToFrame",
            DriverCommand::SwitchToParentFrame => "switchToParentFrame",
            DriverCommand::SwitchToWindow => "switchToWindow",
            DriverCommand::GetActiveElement => "getActiveElement",
            DriverCommand::FindElement => "findElement",
            DriverCommand::FindElements => "findElements",
            DriverCommand::FindChildElement => "findChildElement",
            DriverCommand::FindChildElements => "findChildElements",
            DriverCommand::ClickElement => "clickElement",
            DriverCommand::ClearElement => "clearElement",
            DriverCommand::SendKeysToElement => "sendKeysToElement",
            DriverCommand::GetElementText => "getElementText",
            DriverCommand::GetElementAttribute => "getElementAttribute",
            DriverCommand::SetValue => "setValue",
            DriverCommand::RunAppInBackground => "runAppInBackground",
            DriverCommand::HideKeyboard => "hideKeyboard",
            DriverCommand::ShakeDevice => "shakeDevice",
            DriverCommand::LockDevice => "lockDevice",
            DriverCommand::UnlockDevice => "unlockDevice",
            DriverCommand::IsDeviceLocked => "isDeviceLocked",
            DriverCommand::TouchId => "touchId",
            DriverCommand::ToggleTouchIdEnrollment => "toggleTouchIdEnrollment",
            DriverCommand::GetSettings => "getSettings",
            DriverCommand::SetSettings => "setSettings",
        }
    }

    /// Looks up a command by its registry name.
    pub fn from_name(name: &str) -> Result<Self, UnknownCommand> {
        Self::ALL
            .iter()
            .copied()
            .find(|cmd| cmd.name() == name)
            .ok_or_else(|| UnknownCommand(name.to_string()))
    }

    /// The HTTP route for this command.
    pub fn route(&self) -> Route {
        match self {
            DriverCommand::Status => get("/status"),
            DriverCommand::NewSession => post("/session"),
            DriverCommand::Quit => delete("/session/:sessionId"),
            DriverCommand::DismissAlert => post("/session/:sessionId/alert/dismiss"),
            DriverCommand::AcceptAlert => post("/session/:sessionId/alert/accept"),
            DriverCommand::GetAlertText => get("/session/:sessionId/alert/text"),
            DriverCommand::SetAlertValue => post("/session/:sessionId/alert/text"),
            DriverCommand::SetAlertCredentials => post("/session/:sessionId/alert/credentials"),
            DriverCommand::SwitchToFrame => post("/session/:sessionId/frame"),
            DriverCommand::SwitchToParentFrame => post("/session/:sessionId/frame/parent"),
            DriverCommand::SwitchToWindow => post("/session/:sessionId/window"),
            DriverCommand::GetActiveElement => get("/session/:sessionId/element/active"),
            DriverCommand::FindElement => post("/session/:sessionId/element"),
            DriverCommand::FindElements => post("/session/:sessionId/elements"),
            DriverCommand::FindChildElement => post("/session/:sessionId/element/:id/element"),
            DriverCommand::FindChildElements => post("/session/:sessionId/element/:id/elements"),
            DriverCommand::ClickElement => post("/session/:sessionId/element/:id/click"),
            DriverCommand::ClearElement => post("/session/:sessionId/element/:id/clear"),
            DriverCommand::SendKeysToElement => post("/session/:sessionId/element/:id/value"),
            DriverCommand::GetElementText => get("/session/:sessionId/element/:id/text"),
            DriverCommand::GetElementAttribute => {
                get("/session/:sessionId/element/:id/attribute/:name")
            }
            DriverCommand::SetValue => post("/session/:sessionId/appium/element/:id/value"),
            DriverCommand::RunAppInBackground => post("/session/:sessionId/appium/app/background"),
            DriverCommand::HideKeyboard => post("/session/:sessionId/appium/device/hide_keyboard"),
            DriverCommand::ShakeDevice => post("/session/:sessionId/appium/device/shake"),
            DriverCommand::LockDevice => post("/session/:sessionId/appium/device/lock"),
            DriverCommand::UnlockDevice => post("/session/:sessionId/appium/device/unlock"),
            DriverCommand::IsDeviceLocked => post("/session/:sessionId/appium/device/is_locked"),
            DriverCommand::TouchId => post("/session/:sessionId/appium/simulator/touch_id"),
            DriverCommand::ToggleTouchIdEnrollment => {
                post("/session/:sessionId/appium/simulator/toggle_touch_id_enrollment")
            }
            DriverCommand::GetSettings => get("/session/:sessionId/appium/settings"),
            DriverCommand::SetSettings => post("/session/:sessionId/appium/settings"),
        }
    }
}

impl fmt::Display for DriverCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A command addressed to a session, ready to be handed to an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The target session. `None` only for session-less commands such as
    /// [`DriverCommand::NewSession`] and [`DriverCommand::Status`].
    pub session_id: Option<SessionId>,
    pub name: DriverCommand,
    pub parameters: Map<String, Value>,
}

impl Command {
    pub fn new(
        session_id: Option<SessionId>,
        name: DriverCommand,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            session_id,
            name,
            parameters,
        }
    }
}

/// Builds a single-entry argument map.
pub fn prepare_arguments(key: &str, value: impl Into<Value>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value.into());
    map
}

/// Builds an argument map from parallel key/value lists.
///
/// Entries whose value is `null` are skipped.
pub fn prepare_arguments_from<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in entries {
        if !value.is_null() {
            map.insert(key.to_string(), value);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_round_trip_through_registry() {
        for cmd in DriverCommand::ALL {
            assert_eq!(DriverCommand::from_name(cmd.name()), Ok(*cmd));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = DriverCommand::from_name("launchRocket").unwrap_err();
        assert_eq!(err.to_string(), "unknown command: launchRocket");
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = DriverCommand::ALL.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DriverCommand::ALL.len());
    }

    #[test]
    fn alert_command_names_are_stable() {
        assert_eq!(DriverCommand::DismissAlert.name(), "dismissAlert");
        assert_eq!(DriverCommand::AcceptAlert.name(), "acceptAlert");
        assert_eq!(DriverCommand::GetAlertText.name(), "getAlertText");
        assert_eq!(DriverCommand::SetAlertValue.name(), "setAlertValue");
        assert_eq!(DriverCommand::RunAppInBackground.name(), "runAppInBackground");
    }

    #[test]
    fn alert_text_routes_share_path_with_different_verbs() {
        let get_text = DriverCommand::GetAlertText.route();
        let set_value = DriverCommand::SetAlertValue.route();
        assert_eq!(get_text.path, set_value.path);
        assert_eq!(get_text.method, HttpMethod::Get);
        assert_eq!(set_value.method, HttpMethod::Post);
    }

    #[test]
    fn session_less_routes() {
        assert_eq!(DriverCommand::NewSession.route().path, "/session");
        assert_eq!(DriverCommand::Status.route().path, "/status");
        assert_eq!(DriverCommand::Quit.route().method, HttpMethod::Delete);
    }

    #[test]
    fn prepare_arguments_nests() {
        let args = prepare_arguments("seconds", prepare_arguments("timeout", 2500));
        assert_eq!(Value::Object(args), json!({"seconds": {"timeout": 2500}}));
    }

    #[test]
    fn prepare_arguments_from_skips_nulls() {
        let args = prepare_arguments_from([
            ("strategy", Value::Null),
            ("key", json!("Done")),
        ]);
        assert_eq!(Value::Object(args), json!({"key": "Done"}));
    }

    #[test]
    fn session_id_display() {
        let id = SessionId::new("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }
}

//! Native alert handling.
//!
//! [`Alert`] is the interaction surface for a modal dialog. Two
//! implementations are provided:
//!
//! - [`RemoteAlert`] issues the generic alert commands through its session.
//! - [`IosAlert`] wraps another alert. It reissues dismiss, accept, get-text
//!   and send-keys directly through the owning session and forwards only the
//!   two credential operations to the wrapped alert.
//!
//! The split in [`IosAlert`] is kept as-is even though the reissued commands
//! are the same ones [`RemoteAlert`] would send. Whether that duplication was
//! ever meant to diverge is unknown.

use std::fmt;

use async_trait::async_trait;
use serde_json::{json, Map};
use tracing::{debug, instrument};

use crate::command::{prepare_arguments, DriverCommand};
use crate::executor::CommandError;
use crate::session::SessionHandle;

/// Username and password for an authentication prompt.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Operations on the currently open alert.
#[async_trait]
pub trait Alert: Send + Sync {
    /// Dismisses the alert (the "cancel" button).
    async fn dismiss(&self) -> Result<(), CommandError>;

    /// Accepts the alert (the "OK" button).
    async fn accept(&self) -> Result<(), CommandError>;

    /// Returns the alert's message text.
    async fn text(&self) -> Result<String, CommandError>;

    /// Types into the alert's text field.
    async fn send_keys(&self, text: &str) -> Result<(), CommandError>;

    /// Fills in an authentication prompt.
    async fn set_credentials(&self, credentials: &Credentials) -> Result<(), CommandError>;

    /// Fills in an authentication prompt and accepts it.
    async fn authenticate_using(&self, credentials: &Credentials) -> Result<(), CommandError>;
}

// ---------------------------------------------------------------------------
// Generic alert commands
// ---------------------------------------------------------------------------

async fn dismiss_alert(handle: &SessionHandle) -> Result<(), CommandError> {
    handle.execute_empty(DriverCommand::DismissAlert).await?;
    Ok(())
}

async fn accept_alert(handle: &SessionHandle) -> Result<(), CommandError> {
    handle.execute_empty(DriverCommand::AcceptAlert).await?;
    Ok(())
}

async fn alert_text(handle: &SessionHandle) -> Result<String, CommandError> {
    let response = handle.execute_empty(DriverCommand::GetAlertText).await?;
    Ok(response.value_as_string())
}

async fn set_alert_value(handle: &SessionHandle, text: &str) -> Result<(), CommandError> {
    handle
        .execute(DriverCommand::SetAlertValue, prepare_arguments("value", text))
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// RemoteAlert
// ---------------------------------------------------------------------------

/// The generic alert, driven entirely by the generic alert commands.
#[derive(Debug, Clone)]
pub struct RemoteAlert {
    handle: SessionHandle,
}

impl RemoteAlert {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Alert for RemoteAlert {
    async fn dismiss(&self) -> Result<(), CommandError> {
        dismiss_alert(&self.handle).await
    }

    async fn accept(&self) -> Result<(), CommandError> {
        accept_alert(&self.handle).await
    }

    async fn text(&self) -> Result<String, CommandError> {
        alert_text(&self.handle).await
    }

    async fn send_keys(&self, text: &str) -> Result<(), CommandError> {
        set_alert_value(&self.handle, text).await
    }

    async fn set_credentials(&self, credentials: &Credentials) -> Result<(), CommandError> {
        let mut params = Map::new();
        params.insert("username".to_string(), json!(credentials.username));
        params.insert("password".to_string(), json!(credentials.password));
        self.handle
            .execute(DriverCommand::SetAlertCredentials, params)
            .await?;
        Ok(())
    }

    async fn authenticate_using(&self, credentials: &Credentials) -> Result<(), CommandError> {
        self.set_credentials(credentials).await?;
        self.accept().await
    }
}

// ---------------------------------------------------------------------------
// IosAlert
// ---------------------------------------------------------------------------

/// An alert obtained through the iOS driver.
///
/// Dismiss, accept, get-text and send-keys never touch the wrapped alert; they
/// go straight to the session. Credential operations are forwarded to the
/// wrapped alert unchanged.
pub struct IosAlert {
    alert: Box<dyn Alert>,
    handle: SessionHandle,
}

impl IosAlert {
    /// Wraps `alert`, reissuing commands through `handle`.
    pub fn new(alert: Box<dyn Alert>, handle: SessionHandle) -> Self {
        Self { alert, handle }
    }
}

impl fmt::Debug for IosAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IosAlert")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Alert for IosAlert {
    #[instrument(skip(self), level = "debug")]
    async fn dismiss(&self) -> Result<(), CommandError> {
        dismiss_alert(&self.handle).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn accept(&self) -> Result<(), CommandError> {
        accept_alert(&self.handle).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn text(&self) -> Result<String, CommandError> {
        alert_text(&self.handle).await
    }

    #[instrument(skip(self, text), level = "debug")]
    async fn send_keys(&self, text: &str) -> Result<(), CommandError> {
        set_alert_value(&self.handle, text).await
    }

    async fn set_credentials(&self, credentials: &Credentials) -> Result<(), CommandError> {
        debug!("forwarding credentials to wrapped alert");
        self.alert.set_credentials(credentials).await
    }

    async fn authenticate_using(&self, credentials: &Credentials) -> Result<(), CommandError> {
        debug!("forwarding authentication to wrapped alert");
        self.alert.authenticate_using(credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("alice", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}

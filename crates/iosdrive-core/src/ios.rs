//! The iOS driver.
//!
//! [`IosDriver`] composes a [`RemoteSession`] with the iOS-only commands an
//! Appium server exposes (backgrounding the app, keyboard dismissal, touch-ID,
//! shake, lock, driver settings) and hands out [`IosAlert`]s from
//! [`switch_to`](IosDriver::switch_to).
//!
//! # Reaching the server
//!
//! Use [`DriverConfig`] to say how the session is reached. Whatever the
//! target, `platformName` is forced to `"iOS"` before the session is created.
//!
//! ```no_run
//! use std::time::Duration;
//! use iosdrive_core::capabilities::Capabilities;
//! use iosdrive_core::ios::{DriverConfig, IosDriver, SessionTarget};
//! use iosdrive_core::session::TargetLocator;
//! use iosdrive_core::alert::Alert;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let caps = Capabilities::new()
//!     .with("appium:automationName", "XCUITest")
//!     .with("appium:deviceName", "iPhone 15");
//!
//! let config = DriverConfig::new(SessionTarget::Remote("http://127.0.0.1:4723".parse()?));
//! let driver: IosDriver = IosDriver::new(config, caps).await?;
//!
//! driver.run_app_in_background(Duration::from_secs(2)).await?;
//! driver.switch_to().alert().accept().await?;
//! driver.quit().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::alert::IosAlert;
use crate::capabilities::{Capabilities, IOS_PLATFORM};
use crate::command::{prepare_arguments, prepare_arguments_from, DriverCommand, SessionId};
use crate::element::{find_many, find_one, FromElementId, IosElement};
use crate::executor::{CommandError, CommandExecutor, Response};
use crate::http::{DefaultHttpClientFactory, HttpClientFactory, HttpCommandExecutor};
use crate::locator::{
    By, FindsByAccessibilityId, FindsByIosClassChain, FindsByIosNsPredicate,
    FindsByIosUiAutomation, FindsElements,
};
use crate::service::{AppiumService, AppiumServiceBuilder, ServiceError};
use crate::session::{RemoteSession, RemoteTargetLocator, SessionHandle, TargetLocator};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while constructing a driver.
///
/// Once a driver exists, its operations return the executor's
/// [`CommandError`] unchanged.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Session creation failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The local server could not be started.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the driver reaches its session.
pub enum SessionTarget {
    /// Use a caller-supplied executor as-is.
    Executor(Arc<dyn CommandExecutor>),
    /// Talk HTTP to an already running server.
    Remote(Url),
    /// Use a local server handle, starting it if it is not running.
    Service(AppiumService),
    /// Build and start a local server.
    Builder(AppiumServiceBuilder),
    /// Build and start the default local server (see
    /// [`AppiumService::build_default_service`]).
    DefaultService,
}

impl SessionTarget {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionTarget::Executor(_) => "executor",
            SessionTarget::Remote(_) => "remote",
            SessionTarget::Service(_) => "service",
            SessionTarget::Builder(_) => "builder",
            SessionTarget::DefaultService => "default_service",
        }
    }
}

impl fmt::Debug for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionTarget::Executor(_) => f.write_str("Executor(..)"),
            SessionTarget::Remote(url) => f.debug_tuple("Remote").field(&url.as_str()).finish(),
            SessionTarget::Service(service) => f.debug_tuple("Service").field(service).finish(),
            SessionTarget::Builder(builder) => f.debug_tuple("Builder").field(builder).finish(),
            SessionTarget::DefaultService => f.write_str("DefaultService"),
        }
    }
}

/// Everything [`IosDriver::new`] needs besides capabilities.
#[derive(Debug)]
pub struct DriverConfig {
    pub target: SessionTarget,
    /// Transport override for HTTP targets. Ignored for
    /// [`SessionTarget::Executor`], which brings its own transport.
    pub http_client_factory: Option<Arc<dyn HttpClientFactory>>,
}

impl DriverConfig {
    pub fn new(target: SessionTarget) -> Self {
        Self {
            target,
            http_client_factory: None,
        }
    }

    pub fn with_http_client_factory(mut self, factory: Arc<dyn HttpClientFactory>) -> Self {
        self.http_client_factory = Some(factory);
        self
    }

    /// Resolves the target into an executor, starting a local server when the
    /// target calls for one. The started server is returned so the driver
    /// can own it.
    async fn connect(
        self,
    ) -> Result<(Arc<dyn CommandExecutor>, Option<AppiumService>), DriverError> {
        let DriverConfig {
            target,
            http_client_factory,
        } = self;

        let mut service = match target {
            SessionTarget::Executor(executor) => {
                if http_client_factory.is_some() {
                    warn!("http client factory ignored for a caller-supplied executor");
                }
                return Ok((executor, None));
            }
            SessionTarget::Remote(url) => {
                let executor: Arc<dyn CommandExecutor> =
                    Arc::new(http_executor(url, http_client_factory.as_deref())?);
                return Ok((executor, None));
            }
            SessionTarget::Service(service) => service,
            SessionTarget::Builder(builder) => builder.build()?,
            SessionTarget::DefaultService => AppiumService::build_default_service()?,
        };

        if !service.is_running() {
            service.start().await?;
        }
        let executor: Arc<dyn CommandExecutor> = Arc::new(http_executor(
            service.url().clone(),
            http_client_factory.as_deref(),
        )?);
        Ok((executor, Some(service)))
    }
}

fn http_executor(
    url: Url,
    factory: Option<&dyn HttpClientFactory>,
) -> Result<HttpCommandExecutor, CommandError> {
    match factory {
        Some(factory) => HttpCommandExecutor::with_factory(url, factory),
        None => HttpCommandExecutor::with_factory(url, &DefaultHttpClientFactory::default()),
    }
}

// ---------------------------------------------------------------------------
// Keyboard
// ---------------------------------------------------------------------------

/// How `hideKeyboard` should dismiss the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardStrategy {
    Press,
    PressKey,
    TapOutside,
    TapOut,
}

impl KeyboardStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyboardStrategy::Press => "press",
            KeyboardStrategy::PressKey => "pressKey",
            KeyboardStrategy::TapOutside => "tapOutside",
            KeyboardStrategy::TapOut => "tapOut",
        }
    }
}

impl std::str::FromStr for KeyboardStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "press" => Ok(KeyboardStrategy::Press),
            "pressKey" => Ok(KeyboardStrategy::PressKey),
            "tapOutside" => Ok(KeyboardStrategy::TapOutside),
            "tapOut" => Ok(KeyboardStrategy::TapOut),
            other => Err(format!("unknown keyboard strategy: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// IosDriver
// ---------------------------------------------------------------------------

/// A session on an iOS device or simulator.
///
/// `E` is the type element lookups return (see [`FromElementId`]).
pub struct IosDriver<E = IosElement> {
    session: RemoteSession,
    service: Option<AppiumService>,
    _element: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for IosDriver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IosDriver")
            .field("session", &self.session)
            .field("service", &self.service)
            .finish()
    }
}

impl<E: FromElementId> IosDriver<E> {
    /// Creates a session with `platformName` forced to `"iOS"`.
    ///
    /// A caller-supplied `platformName` is overridden silently; every other
    /// capability is sent unchanged. If session creation fails, a local
    /// server started for this driver is stopped again.
    #[instrument(skip_all, fields(target = config.target.kind()))]
    pub async fn new(config: DriverConfig, capabilities: Capabilities) -> Result<Self, DriverError> {
        let capabilities = capabilities.with_platform(IOS_PLATFORM);
        let (executor, mut service) = config.connect().await?;

        let session = match RemoteSession::start(executor, capabilities).await {
            Ok(session) => session,
            Err(e) => {
                if let Some(service) = service.as_mut() {
                    service.stop();
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            session,
            service,
            _element: PhantomData,
        })
    }

    /// Binds to a session that already exists on the server.
    pub fn attach(executor: Arc<dyn CommandExecutor>, session_id: SessionId) -> Self {
        let capabilities = Capabilities::new().with_platform(IOS_PLATFORM);
        Self {
            session: RemoteSession::attach(executor, session_id, capabilities),
            service: None,
            _element: PhantomData,
        }
    }

    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    pub fn session_id(&self) -> &SessionId {
        self.session.session_id()
    }

    /// Capabilities negotiated at session creation.
    pub fn capabilities(&self) -> &Capabilities {
        self.session.capabilities()
    }

    /// The local server this driver started, if any.
    pub fn service(&self) -> Option<&AppiumService> {
        self.service.as_ref()
    }

    /// Executes an arbitrary command against the session.
    pub async fn execute(
        &self,
        name: DriverCommand,
        parameters: Map<String, Value>,
    ) -> Result<Response, CommandError> {
        self.session.execute(name, parameters).await
    }

    /// Sends the app to the background for `duration`, then restores it.
    ///
    /// The wire argument is named `seconds` but carries milliseconds:
    /// `{"seconds": {"timeout": <ms>}}`. Durations beyond `u64::MAX`
    /// milliseconds saturate.
    #[instrument(skip(self), level = "debug")]
    pub async fn run_app_in_background(&self, duration: Duration) -> Result<(), CommandError> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.execute(
            DriverCommand::RunAppInBackground,
            prepare_arguments("seconds", prepare_arguments("timeout", millis)),
        )
        .await?;
        Ok(())
    }

    /// Context switching whose alerts are [`IosAlert`]s.
    pub fn switch_to(&self) -> IosTargetLocator {
        IosTargetLocator::new(self.session.switch_to())
    }

    /// Hides the keyboard using the server's default strategy.
    #[instrument(skip(self), level = "debug")]
    pub async fn hide_keyboard(&self) -> Result<(), CommandError> {
        self.execute(DriverCommand::HideKeyboard, Map::new()).await?;
        Ok(())
    }

    /// Hides the keyboard by pressing the key with the given name.
    #[instrument(skip(self), level = "debug")]
    pub async fn hide_keyboard_with_key(&self, key_name: &str) -> Result<(), CommandError> {
        self.execute(DriverCommand::HideKeyboard, prepare_arguments("keyName", key_name))
            .await?;
        Ok(())
    }

    /// Hides the keyboard with an explicit strategy.
    ///
    /// `key_name` is only meaningful for the press strategies.
    #[instrument(skip(self), level = "debug")]
    pub async fn hide_keyboard_with_strategy(
        &self,
        strategy: KeyboardStrategy,
        key_name: Option<&str>,
    ) -> Result<(), CommandError> {
        let params = prepare_arguments_from([
            ("strategy", json!(strategy.as_str())),
            ("key", key_name.map_or(Value::Null, |k| json!(k))),
        ]);
        self.execute(DriverCommand::HideKeyboard, params).await?;
        Ok(())
    }

    /// Simulates shaking the device.
    #[instrument(skip(self), level = "debug")]
    pub async fn shake(&self) -> Result<(), CommandError> {
        self.execute(DriverCommand::ShakeDevice, Map::new()).await?;
        Ok(())
    }

    /// Locks the device, unlocking it again after `duration` when the
    /// duration is non-zero. Sub-second parts are dropped.
    #[instrument(skip(self), level = "debug")]
    pub async fn lock_device(&self, duration: Duration) -> Result<(), CommandError> {
        self.execute(
            DriverCommand::LockDevice,
            prepare_arguments("seconds", duration.as_secs()),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn unlock_device(&self) -> Result<(), CommandError> {
        self.execute(DriverCommand::UnlockDevice, Map::new()).await?;
        Ok(())
    }

    pub async fn is_device_locked(&self) -> Result<bool, CommandError> {
        self.execute(DriverCommand::IsDeviceLocked, Map::new())
            .await?
            .value_as_bool()
    }

    /// Simulates a touch-ID scan on a simulator.
    #[instrument(skip(self), level = "debug")]
    pub async fn perform_touch_id(&self, matched: bool) -> Result<(), CommandError> {
        self.execute(DriverCommand::TouchId, prepare_arguments("match", matched))
            .await?;
        Ok(())
    }

    /// Enrolls or un-enrolls touch-ID on a simulator.
    #[instrument(skip(self), level = "debug")]
    pub async fn toggle_touch_id_enrollment(&self, enabled: bool) -> Result<(), CommandError> {
        self.execute(
            DriverCommand::ToggleTouchIdEnrollment,
            prepare_arguments("enabled", enabled),
        )
        .await?;
        Ok(())
    }

    /// Current driver settings.
    pub async fn settings(&self) -> Result<Map<String, Value>, CommandError> {
        match self.execute(DriverCommand::GetSettings, Map::new()).await?.value {
            Value::Object(map) => Ok(map),
            other => Err(CommandError::MalformedResponse(format!(
                "expected settings object, got {other}"
            ))),
        }
    }

    /// Updates one driver setting.
    #[instrument(skip(self, value), level = "debug")]
    pub async fn set_setting(&self, name: &str, value: impl Into<Value>) -> Result<(), CommandError> {
        self.execute(
            DriverCommand::SetSettings,
            prepare_arguments("settings", prepare_arguments(name, value)),
        )
        .await?;
        Ok(())
    }

    /// Ends the session, then stops the local server this driver owns.
    ///
    /// The server is stopped even if the quit command fails.
    pub async fn quit(mut self) -> Result<(), CommandError> {
        let result = self.session.quit().await;
        if let Some(mut service) = self.service.take() {
            debug!("stopping owned appium server");
            service.stop();
        }
        result
    }
}

#[async_trait]
impl<E: FromElementId> FindsElements<E> for IosDriver<E> {
    async fn find_element(&self, by: By) -> Result<E, CommandError> {
        let element = find_one(
            self.session.handle(),
            DriverCommand::FindElement,
            by.to_arguments(),
        )
        .await?;
        Ok(E::from_remote(element))
    }

    async fn find_elements(&self, by: By) -> Result<Vec<E>, CommandError> {
        let elements = find_many(
            self.session.handle(),
            DriverCommand::FindElements,
            by.to_arguments(),
        )
        .await?;
        Ok(elements.into_iter().map(E::from_remote).collect())
    }
}

impl<E: FromElementId> FindsByAccessibilityId<E> for IosDriver<E> {}
impl<E: FromElementId> FindsByIosClassChain<E> for IosDriver<E> {}
impl<E: FromElementId> FindsByIosNsPredicate<E> for IosDriver<E> {}
impl<E: FromElementId> FindsByIosUiAutomation<E> for IosDriver<E> {}

// ---------------------------------------------------------------------------
// IosTargetLocator
// ---------------------------------------------------------------------------

/// A [`TargetLocator`] whose alerts are [`IosAlert`]s.
///
/// Frame and window switching behave exactly like the base locator.
#[derive(Debug, Clone)]
pub struct IosTargetLocator {
    base: RemoteTargetLocator,
}

impl IosTargetLocator {
    pub fn new(base: RemoteTargetLocator) -> Self {
        Self { base }
    }
}

#[async_trait]
impl TargetLocator for IosTargetLocator {
    type Alert = IosAlert;

    fn handle(&self) -> &SessionHandle {
        self.base.handle()
    }

    fn alert(&self) -> IosAlert {
        info!(session = %self.base.handle().session_id(), "switching to alert");
        IosAlert::new(Box::new(self.base.alert()), self.base.handle().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_strategy_names() {
        for strategy in [
            KeyboardStrategy::Press,
            KeyboardStrategy::PressKey,
            KeyboardStrategy::TapOutside,
            KeyboardStrategy::TapOut,
        ] {
            assert_eq!(strategy.as_str().parse::<KeyboardStrategy>(), Ok(strategy));
        }
        assert!("swipeDown".parse::<KeyboardStrategy>().is_err());
    }

    #[test]
    fn session_target_kind_and_debug() {
        let target = SessionTarget::Remote("http://127.0.0.1:4723".parse().unwrap());
        assert_eq!(target.kind(), "remote");
        assert!(format!("{target:?}").contains("127.0.0.1:4723"));

        assert_eq!(SessionTarget::DefaultService.kind(), "default_service");
        let builder = SessionTarget::Builder(AppiumServiceBuilder::new());
        assert_eq!(builder.kind(), "builder");
    }

    #[test]
    fn driver_error_is_transparent() {
        let err: DriverError = CommandError::Timeout.into();
        assert_eq!(err.to_string(), CommandError::Timeout.to_string());

        let err: DriverError = ServiceError::StartupTimeout(Duration::from_secs(1)).into();
        assert!(err.to_string().contains("ready"));
    }
}

//! # iosdrive-core
//!
//! Client library for automating iOS devices and simulators through an
//! Appium (WebDriver) server.
//!
//! The [`ios::IosDriver`] is the entry point: it creates a session with
//! `platformName` set to `"iOS"` and exposes the iOS-only commands (app
//! backgrounding, keyboard, touch-ID, lock, shake, settings) alongside
//! alert handling and element lookup.
//!
//! ## Modules
//!
//! - [`ios`] - The iOS driver facade, its configuration and target locator
//! - [`session`] - Generic remote sessions, session handles, target locators
//! - [`alert`] - The alert trait, the generic alert and the iOS alert
//! - [`element`] - Remote element references and the iOS element
//! - [`locator`] - Lookup strategies (`By`) and the strategy traits
//! - [`command`] - The command registry and argument helpers
//! - [`executor`] - The `CommandExecutor` seam and its error type
//! - [`http`] - HTTP transport for the executor
//! - [`service`] - Launching and stopping a local Appium server
//! - [`capabilities`] - Session capabilities
//! - [`config`] - Persisted user configuration (`~/.iosdrive/config.json`)
//!
//! ## External Dependencies
//!
//! A reachable Appium server with the XCUITest driver installed, or the
//! `appium` executable on `PATH` for the locally launched variants.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use iosdrive_core::capabilities::Capabilities;
//! use iosdrive_core::ios::{DriverConfig, IosDriver, SessionTarget};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let caps = Capabilities::new().with("appium:bundleId", "com.example.app");
//! let driver: IosDriver = IosDriver::new(DriverConfig::new(SessionTarget::DefaultService), caps).await?;
//! driver.run_app_in_background(Duration::from_millis(2500)).await?;
//! driver.quit().await?;
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod capabilities;
pub mod command;
pub mod config;
pub mod element;
pub mod executor;
pub mod http;
pub mod ios;
pub mod locator;
pub mod service;
pub mod session;

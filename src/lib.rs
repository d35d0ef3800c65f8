//! Remote-development host automation.
//!
//! Two independent entry points share one command-execution layer:
//!
//! - [`bootstrap::Bootstrapper`] reconciles a macOS host towards a desired
//!   state (toolchain, power settings, Homebrew, services, mesh VPN).
//! - [`tmux::SessionLauncher`] makes sure a named tmux session exists and
//!   hands the caller over to it.
//!
//! All host access goes through [`host::Host`], which is generic over a
//! [`runner::CommandRunner`].

pub mod bootstrap;
pub mod config;
pub mod converge;
pub mod error;
pub mod host;
pub mod logging;
pub mod runner;
pub mod tmux;

pub use error::{AutomationError, Result};

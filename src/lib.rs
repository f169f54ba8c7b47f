//! Save the window layout of a display as a named workspace and bring it
//! back later: relaunching applications, creating missing windows, moving
//! every window to its saved place and switching to the saved desktop.

#[macro_use]
pub mod macros;

pub mod capture;
pub mod command;
pub mod config;
pub mod conflict;
pub mod desktop;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod host;
pub mod logging;
pub mod matcher;
pub mod restore;
pub mod service;
pub mod shortcuts;
pub mod store;
pub mod workspace;

pub use command::Command;
pub use config::Config;
pub use error::{Result, WorkspaceError};
pub use service::WorkspaceService;
pub use workspace::{WindowDescriptor, Workspace};

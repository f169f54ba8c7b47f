//! Contracts the core needs from the host environment.
//!
//! Everything that touches real windows, desktops, keyboards or dialogs goes
//! through these traits. [`memory::MemoryHost`] implements all of them in
//! process for tests and the console demo.

pub mod memory;
pub mod window;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

pub use window::{LiveWindow, RunningApp, SpaceId, WindowKind};

use crate::{
    error::HostError,
    geometry::{DisplayInfo, Rect},
    workspace::WindowId,
};

/// Window, display and application access.
pub trait WindowSystem: Send + Sync {
    fn displays(&self) -> Vec<DisplayInfo>;
    fn running_apps(&self) -> Vec<RunningApp>;
    fn app_windows(&self, app_id: &str) -> Vec<LiveWindow>;
    fn window(&self, id: WindowId) -> Option<LiveWindow>;

    fn set_frame(&self, id: WindowId, frame: Rect) -> Result<(), HostError>;
    fn set_fullscreen(&self, id: WindowId, fullscreen: bool) -> Result<(), HostError>;
    fn unminimize(&self, id: WindowId) -> Result<(), HostError>;
    fn raise(&self, id: WindowId) -> Result<(), HostError>;
    fn unhide_app(&self, app_id: &str) -> Result<(), HostError>;

    /// Launches the application or focuses it when already running. Completes
    /// asynchronously; callers wait and re-poll.
    fn launch_or_focus(&self, app_id: &str) -> Result<(), HostError>;
    /// Asks the application for one new window. Completes asynchronously.
    fn create_window(&self, app_id: &str) -> Result<(), HostError>;

    fn is_running(&self, app_id: &str) -> bool {
        self.running_apps().iter().any(|app| app.id == app_id)
    }
}

/// Virtual desktops of a display, in the host's presentation order.
pub trait Desktops: Send + Sync {
    fn spaces_supported(&self) -> bool;
    fn spaces(&self, display: &str) -> Vec<SpaceId>;
    fn focused_space(&self, display: &str) -> Option<SpaceId>;
    fn goto_space(&self, space: SpaceId) -> Result<(), HostError>;
    fn add_space(&self, display: &str) -> Result<(), HostError>;
    fn window_spaces(&self, window: WindowId) -> Vec<SpaceId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Cmd,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Vec<Modifier>,
    pub key: char,
}

impl KeyCombo {
    pub fn new(modifiers: &[Modifier], key: char) -> Self {
        let mut modifiers = modifiers.to_vec();
        modifiers.sort();
        modifiers.dedup();
        Self {
            modifiers,
            key: key.to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{m:?}+")?;
        }
        write!(f, "{}", self.key)
    }
}

pub type HotkeyId = u64;
pub type HotkeyAction = Arc<dyn Fn() + Send + Sync>;

pub trait Hotkeys: Send + Sync {
    fn bind(&self, combo: KeyCombo, action: HotkeyAction) -> Result<HotkeyId, HostError>;
    fn unbind(&self, id: HotkeyId);
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// One row of the list-style chooser.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerRow {
    pub text: String,
    pub subtext: String,
}

/// Modal user interaction.
pub trait Prompter: Send + Sync {
    fn text_input(&self, message: &str, default: &str) -> Option<String>;
    /// Shows a modal alert and returns the index of the pressed button.
    fn alert(&self, message: &str, informative: &str, buttons: &[&str]) -> Option<usize>;
    fn choose(&self, rows: &[PickerRow]) -> Option<usize>;
}

/// Everything the service needs besides the prompter.
pub trait Host: WindowSystem + Desktops + Hotkeys + Notifier {}

impl<T: WindowSystem + Desktops + Hotkeys + Notifier> Host for T {}

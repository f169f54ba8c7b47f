use crate::{
    geometry::Rect,
    workspace::{AppId, WindowId},
};

pub type SpaceId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct RunningApp {
    pub id: AppId,
    pub name: String,
    pub pid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowKind {
    #[default]
    Standard,
    Utility,
    Popup,
}

/// Snapshot of one live window as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveWindow {
    pub id: WindowId,
    pub app_id: AppId,
    pub title: String,
    pub frame: Rect,
    pub kind: WindowKind,
    pub visible: bool,
    pub minimized: bool,
    pub fullscreen: bool,
    /// Name of the display the window currently sits on.
    pub display: String,
}

impl LiveWindow {
    pub fn is_standard(&self) -> bool {
        self.kind == WindowKind::Standard
    }

    /// Candidate for capture: shown, standard, on the given display.
    pub fn is_capturable(&self, display: &str) -> bool {
        self.visible && !self.minimized && self.is_standard() && self.display == display
    }

    /// Candidate for restore: like capture, but minimized windows still count.
    pub fn is_restorable(&self, display: &str) -> bool {
        (self.visible || self.minimized) && self.is_standard() && self.display == display
    }
}

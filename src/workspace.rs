use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::UnitFrame;

pub type AppId = String;
pub type WindowId = u64;

/// Identifies one run of the service. Handles captured under another session
/// are never trusted.
pub fn new_session_id() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{stamp:x}-{seq}", std::process::id())
}

/// One captured window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDescriptor {
    pub app_id: AppId,
    #[serde(default)]
    pub title: String,
    pub frame: UnitFrame,
    #[serde(default)]
    pub fullscreen: bool,
    #[serde(default)]
    pub minimized: bool,
    /// Session-local hint, meaningless after the capturing process exits.
    #[serde(default)]
    pub window_id: Option<WindowId>,
}

impl WindowDescriptor {
    pub fn new(app_id: &str, title: &str, frame: UnitFrame) -> Self {
        Self {
            app_id: app_id.to_string(),
            title: title.to_string(),
            frame,
            fullscreen: false,
            minimized: false,
            window_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,
    #[serde(default)]
    pub windows: Vec<WindowDescriptor>,
    #[serde(with = "chrono::serde::ts_seconds", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortcut_key: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_index: Option<usize>,
    #[serde(default)]
    pub space_supported: bool,
    /// Session that captured the window handles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl Workspace {
    pub fn new(name: &str, windows: Vec<WindowDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            windows,
            created_at: Utc::now(),
            shortcut_key: None,
            desktop_index: None,
            space_supported: false,
            session: None,
        }
    }

    pub fn in_session(mut self, session: &str) -> Self {
        self.session = Some(session.to_string());
        self
    }

    /// Clears window handles captured by any session other than `session`.
    pub fn forget_foreign_handles(&mut self, session: &str) {
        if self.session.as_deref() == Some(session) {
            return;
        }
        for desc in &mut self.windows {
            desc.window_id = None;
        }
    }

    pub fn with_shortcut(mut self, key: Option<char>) -> Self {
        self.shortcut_key = key;
        self
    }

    pub fn on_desktop(mut self, ordinal: Option<usize>, supported: bool) -> Self {
        self.desktop_index = ordinal;
        self.space_supported = supported;
        self
    }

    /// Desktop ordinal, only when desktop-indexed placement applies.
    pub fn desktop(&self) -> Option<usize> {
        match self.space_supported {
            true => self.desktop_index,
            false => None,
        }
    }

    pub fn app_groups(&self) -> Vec<AppGroup<'_>> {
        group_by_app(&self.windows)
    }
}

/// Saved descriptors of one application, with their index in the workspace.
#[derive(Debug)]
pub struct AppGroup<'a> {
    pub app_id: &'a str,
    pub descriptors: Vec<&'a WindowDescriptor>,
}

/// Groups descriptors by owning application, in order of first appearance.
pub fn group_by_app(windows: &[WindowDescriptor]) -> Vec<AppGroup<'_>> {
    let mut groups: Vec<AppGroup<'_>> = Vec::new();
    for desc in windows {
        match groups.iter_mut().find(|g| g.app_id == desc.app_id) {
            Some(group) => group.descriptors.push(desc),
            None => groups.push(AppGroup {
                app_id: &desc.app_id,
                descriptors: vec![desc],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_without_optional_fields() {
        let json = r#"{
            "name": "Mail",
            "windows": [
                {"appId": "com.apple.mail", "title": "Inbox",
                 "frame": {"x": 0.0, "y": 0.0, "w": 1.0, "h": 1.0}}
            ],
            "createdAt": 1700000000,
            "someFutureField": [1, 2, 3]
        }"#;
        let ws: Workspace = serde_json::from_str(json).unwrap();
        assert_eq!(ws.shortcut_key, None);
        assert_eq!(ws.desktop_index, None);
        assert!(!ws.space_supported);
        assert_eq!(ws.windows[0].window_id, None);
        assert!(!ws.windows[0].fullscreen);
        assert_eq!(ws.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn serializes_camel_case_fields() {
        let ws = Workspace::new("Work", vec![])
            .with_shortcut(Some('w'))
            .on_desktop(Some(2), true);
        let value = serde_json::to_value(&ws).unwrap();
        assert_eq!(value["shortcutKey"], "w");
        assert_eq!(value["desktopIndex"], 2);
        assert_eq!(value["spaceSupported"], true);
    }

    #[test]
    fn desktop_requires_support_flag() {
        let ws = Workspace::new("Work", vec![]).on_desktop(Some(3), false);
        assert_eq!(ws.desktop(), None);
    }

    #[test]
    fn handles_survive_only_their_own_session() {
        let mut desc = WindowDescriptor::new("term", "a", UnitFrame::default());
        desc.window_id = Some(42);
        let session = new_session_id();
        assert_ne!(session, new_session_id());

        let mut same = Workspace::new("Term", vec![desc.clone()]).in_session(&session);
        same.forget_foreign_handles(&session);
        assert_eq!(same.windows[0].window_id, Some(42));

        let mut earlier = Workspace::new("Term", vec![desc.clone()]).in_session("1-old-0");
        earlier.forget_foreign_handles(&session);
        assert_eq!(earlier.windows[0].window_id, None);

        let mut unmarked = Workspace::new("Term", vec![desc]);
        unmarked.forget_foreign_handles(&session);
        assert_eq!(unmarked.windows[0].window_id, None);
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let frame = UnitFrame::default();
        let ws = Workspace::new(
            "Dev",
            vec![
                WindowDescriptor::new("term", "a", frame),
                WindowDescriptor::new("editor", "b", frame),
                WindowDescriptor::new("term", "c", frame),
            ],
        );
        let groups = ws.app_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].app_id, "term");
        assert_eq!(groups[0].descriptors.len(), 2);
        assert_eq!(groups[1].app_id, "editor");
    }
}

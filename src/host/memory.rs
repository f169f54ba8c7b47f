//! In-process host: windows, desktops and hotkeys kept in plain collections.
//!
//! Host actions take effect immediately; the core still waits after them as
//! it would against a real window server. Every action the core issues is
//! recorded in [`MemoryHost::calls`] so callers can see what was touched.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use super::{
    Desktops, HotkeyAction, HotkeyId, Hotkeys, KeyCombo, LiveWindow, Notifier, PickerRow,
    Prompter, RunningApp, SpaceId, WindowKind, WindowSystem,
};
use crate::{
    error::HostError,
    geometry::{DisplayInfo, Rect},
    workspace::{AppId, WindowId},
};

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    SetFrame(WindowId, Rect),
    SetFullscreen(WindowId, bool),
    Unminimize(WindowId),
    Raise(WindowId),
    UnhideApp(AppId),
    Launch(AppId),
    CreateWindow(AppId),
    AddSpace(String),
    GotoSpace(SpaceId),
}

impl HostCall {
    /// True for calls that change a window's geometry.
    pub fn is_move(&self) -> bool {
        matches!(self, HostCall::SetFrame(..) | HostCall::SetFullscreen(..))
    }
}

struct Installed {
    name: String,
    windows_on_launch: usize,
    can_create: bool,
}

struct StoredWindow {
    info: LiveWindow,
    space: Option<SpaceId>,
}

#[derive(Default)]
struct MemoryState {
    displays: Vec<DisplayInfo>,
    installed: BTreeMap<AppId, Installed>,
    running: Vec<RunningApp>,
    windows: Vec<StoredWindow>,
    spaces: HashMap<String, Vec<SpaceId>>,
    focused: HashMap<String, SpaceId>,
    spaces_supported: bool,
    hotkeys: BTreeMap<HotkeyId, (KeyCombo, HotkeyAction)>,
    rejected_keys: HashSet<char>,
    notifications: Vec<String>,
    calls: Vec<HostCall>,
    next_id: u64,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn snapshot(&self, stored: &StoredWindow) -> LiveWindow {
        let on_focused = match stored.space {
            Some(space) => self.focused.get(&stored.info.display) == Some(&space),
            None => true,
        };
        LiveWindow {
            visible: stored.info.visible && on_focused,
            ..stored.info.clone()
        }
    }

    fn stored_mut(&mut self, id: WindowId) -> Result<&mut StoredWindow, HostError> {
        self.windows
            .iter_mut()
            .find(|w| w.info.id == id)
            .ok_or(HostError::NoSuchWindow(id))
    }

    fn display_for(&self, frame: &Rect) -> String {
        self.displays
            .iter()
            .find(|d| d.frame.contains_point(frame.center()))
            .or_else(|| self.displays.first())
            .map(|d| d.name.clone())
            .unwrap_or_default()
    }

    fn spawn_window(&mut self, app_id: &str, title: &str, frame: Option<Rect>) -> WindowId {
        let count = self.windows.iter().filter(|w| w.info.app_id == app_id).count() as f64;
        let frame = frame.unwrap_or_else(|| {
            let b = self.displays.first().map(|d| d.frame).unwrap_or_default();
            Rect::new(
                b.x + 40.0 * (count + 1.0),
                b.y + 40.0 * (count + 1.0),
                (b.w / 2.0).round(),
                (b.h / 2.0).round(),
            )
        });
        let display = self.display_for(&frame);
        let space = self.focused.get(&display).copied();
        let id = self.next_id();
        self.windows.push(StoredWindow {
            info: LiveWindow {
                id,
                app_id: app_id.to_string(),
                title: title.to_string(),
                frame,
                kind: WindowKind::Standard,
                visible: true,
                minimized: false,
                fullscreen: false,
                display,
            },
            space,
        });
        id
    }

    fn ensure_running(&mut self, app_id: &str) {
        if self.running.iter().any(|a| a.id == app_id) {
            return;
        }
        let name = self
            .installed
            .get(app_id)
            .map(|i| i.name.clone())
            .unwrap_or_else(|| app_id.to_string());
        let pid = 1000 + self.running.len() as u32;
        self.running.push(RunningApp {
            id: app_id.to_string(),
            name,
            pid,
        });
    }
}

pub struct MemoryHost {
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    /// A host with the given displays, one desktop each, desktops supported.
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        let mut state = MemoryState {
            spaces_supported: true,
            ..Default::default()
        };
        for display in &displays {
            let space = state.next_id();
            state.spaces.insert(display.name.clone(), vec![space]);
            state.focused.insert(display.name.clone(), space);
        }
        state.displays = displays;
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn install_app(&self, app_id: &str, name: &str, windows_on_launch: usize) {
        with_lock!(self.state, |st| {
            st.installed.insert(
                app_id.to_string(),
                Installed {
                    name: name.to_string(),
                    windows_on_launch,
                    can_create: true,
                },
            );
        })
    }

    pub fn deny_window_creation(&self, app_id: &str) {
        with_lock!(self.state, |st| {
            if let Some(app) = st.installed.get_mut(app_id) {
                app.can_create = false;
            }
        })
    }

    /// Opens a window as if the user did it; starts the app when needed.
    pub fn open_window(&self, app_id: &str, title: &str, frame: Rect) -> WindowId {
        with_lock!(self.state, |st| {
            st.ensure_running(app_id);
            st.spawn_window(app_id, title, Some(frame))
        })
    }

    pub fn set_kind(&self, id: WindowId, kind: WindowKind) {
        with_lock!(self.state, |st| {
            if let Ok(w) = st.stored_mut(id) {
                w.info.kind = kind;
            }
        })
    }

    pub fn minimize(&self, id: WindowId) {
        with_lock!(self.state, |st| {
            if let Ok(w) = st.stored_mut(id) {
                w.info.minimized = true;
                w.info.visible = false;
            }
        })
    }

    /// Moves a window without recording a host call.
    pub fn drag_window(&self, id: WindowId, frame: Rect) {
        with_lock!(self.state, |st| {
            let display = st.display_for(&frame);
            if let Ok(w) = st.stored_mut(id) {
                w.info.frame = frame;
                w.info.display = display;
            }
        })
    }

    pub fn close_window(&self, id: WindowId) {
        with_lock!(self.state, |st| {
            st.windows.retain(|w| w.info.id != id);
        })
    }

    pub fn quit_app(&self, app_id: &str) {
        with_lock!(self.state, |st| {
            st.running.retain(|a| a.id != app_id);
            st.windows.retain(|w| w.info.app_id != app_id);
        })
    }

    pub fn set_spaces_supported(&self, supported: bool) {
        with_lock!(self.state, |st| {
            st.spaces_supported = supported;
        })
    }

    /// Grows or shrinks the desktop list of `display` to `count` entries.
    pub fn set_space_count(&self, display: &str, count: usize) {
        with_lock!(self.state, |st| {
            let mut list = st.spaces.get(display).cloned().unwrap_or_default();
            while list.len() < count {
                let id = st.next_id();
                list.push(id);
            }
            list.truncate(count.max(1));
            if !st.focused.get(display).is_some_and(|f| list.contains(f)) {
                st.focused.insert(display.to_string(), list[0]);
            }
            st.spaces.insert(display.to_string(), list);
        })
    }

    /// Focuses the desktop at 1-based `ordinal` without recording a call.
    pub fn focus_ordinal(&self, display: &str, ordinal: usize) {
        with_lock!(self.state, |st| {
            let target = st
                .spaces
                .get(display)
                .and_then(|l| l.get(ordinal.wrapping_sub(1)))
                .copied();
            if let Some(space) = target {
                st.focused.insert(display.to_string(), space);
            }
        })
    }

    pub fn space_count(&self, display: &str) -> usize {
        with_lock!(self.state, |st| { st.spaces.get(display).map_or(0, Vec::len) })
    }

    pub fn reject_hotkey(&self, key: char) {
        with_lock!(self.state, |st| {
            st.rejected_keys.insert(key.to_ascii_lowercase());
        })
    }

    /// Fires the action bound to `combo`. Returns false when nothing is bound.
    pub fn press(&self, combo: &KeyCombo) -> bool {
        let action = with_lock!(self.state, |st| {
            st.hotkeys
                .values()
                .find(|(c, _)| c == combo)
                .map(|(_, a)| a.clone())
        });
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    pub fn bound_combos(&self) -> Vec<KeyCombo> {
        with_lock!(self.state, |st| {
            st.hotkeys.values().map(|(c, _)| c.clone()).collect()
        })
    }

    pub fn notifications(&self) -> Vec<String> {
        with_lock!(self.state, |st| { st.notifications.clone() })
    }

    pub fn calls(&self) -> Vec<HostCall> {
        with_lock!(self.state, |st| { st.calls.clone() })
    }

    pub fn clear_calls(&self) {
        with_lock!(self.state, |st| {
            st.calls.clear();
        })
    }

    pub fn all_windows(&self) -> Vec<LiveWindow> {
        with_lock!(self.state, |st| {
            st.windows.iter().map(|w| st.snapshot(w)).collect()
        })
    }
}

impl WindowSystem for MemoryHost {
    fn displays(&self) -> Vec<DisplayInfo> {
        with_lock!(self.state, |st| { st.displays.clone() })
    }

    fn running_apps(&self) -> Vec<RunningApp> {
        with_lock!(self.state, |st| { st.running.clone() })
    }

    fn app_windows(&self, app_id: &str) -> Vec<LiveWindow> {
        with_lock!(self.state, |st| {
            st.windows
                .iter()
                .filter(|w| w.info.app_id == app_id)
                .map(|w| st.snapshot(w))
                .collect()
        })
    }

    fn window(&self, id: WindowId) -> Option<LiveWindow> {
        with_lock!(self.state, |st| {
            st.windows
                .iter()
                .find(|w| w.info.id == id)
                .map(|w| st.snapshot(w))
        })
    }

    fn set_frame(&self, id: WindowId, frame: Rect) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            let display = st.display_for(&frame);
            let w = st.stored_mut(id)?;
            w.info.frame = frame;
            w.info.display = display;
            st.calls.push(HostCall::SetFrame(id, frame));
            Ok(())
        })
    }

    fn set_fullscreen(&self, id: WindowId, fullscreen: bool) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            st.stored_mut(id)?.info.fullscreen = fullscreen;
            st.calls.push(HostCall::SetFullscreen(id, fullscreen));
            Ok(())
        })
    }

    fn unminimize(&self, id: WindowId) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            let w = st.stored_mut(id)?;
            w.info.minimized = false;
            w.info.visible = true;
            st.calls.push(HostCall::Unminimize(id));
            Ok(())
        })
    }

    fn raise(&self, id: WindowId) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            st.stored_mut(id)?;
            st.calls.push(HostCall::Raise(id));
            Ok(())
        })
    }

    fn unhide_app(&self, app_id: &str) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            for w in st.windows.iter_mut().filter(|w| w.info.app_id == app_id) {
                if !w.info.minimized {
                    w.info.visible = true;
                }
            }
            st.calls.push(HostCall::UnhideApp(app_id.to_string()));
            Ok(())
        })
    }

    fn launch_or_focus(&self, app_id: &str) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            let Some(app) = st.installed.get(app_id) else {
                return Err(HostError::NotLaunchable(app_id.to_string()));
            };
            let (name, count) = (app.name.clone(), app.windows_on_launch);
            st.calls.push(HostCall::Launch(app_id.to_string()));
            if st.running.iter().any(|a| a.id == app_id) {
                return Ok(());
            }
            st.ensure_running(app_id);
            for n in 0..count {
                st.spawn_window(app_id, &format!("{name} {}", n + 1), None);
            }
            Ok(())
        })
    }

    fn create_window(&self, app_id: &str) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            st.calls.push(HostCall::CreateWindow(app_id.to_string()));
            let allowed = st.running.iter().any(|a| a.id == app_id)
                && st.installed.get(app_id).is_none_or(|i| i.can_create);
            if !allowed {
                return Err(HostError::CannotCreateWindow(app_id.to_string()));
            }
            st.spawn_window(app_id, "Untitled", None);
            Ok(())
        })
    }
}

impl Desktops for MemoryHost {
    fn spaces_supported(&self) -> bool {
        with_lock!(self.state, |st| { st.spaces_supported })
    }

    fn spaces(&self, display: &str) -> Vec<SpaceId> {
        with_lock!(self.state, |st| {
            st.spaces.get(display).cloned().unwrap_or_default()
        })
    }

    fn focused_space(&self, display: &str) -> Option<SpaceId> {
        with_lock!(self.state, |st| { st.focused.get(display).copied() })
    }

    fn goto_space(&self, space: SpaceId) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            let display = st
                .spaces
                .iter()
                .find(|(_, list)| list.contains(&space))
                .map(|(d, _)| d.clone())
                .ok_or_else(|| HostError::Desktop(format!("unknown space {space}")))?;
            st.focused.insert(display, space);
            st.calls.push(HostCall::GotoSpace(space));
            Ok(())
        })
    }

    fn add_space(&self, display: &str) -> Result<(), HostError> {
        with_lock!(self.state, |st| {
            if !st.spaces.contains_key(display) {
                return Err(HostError::Desktop(format!("unknown display {display}")));
            }
            let id = st.next_id();
            if let Some(list) = st.spaces.get_mut(display) {
                list.push(id);
            }
            st.calls.push(HostCall::AddSpace(display.to_string()));
            Ok(())
        })
    }

    fn window_spaces(&self, window: WindowId) -> Vec<SpaceId> {
        with_lock!(self.state, |st| {
            st.windows
                .iter()
                .find(|w| w.info.id == window)
                .and_then(|w| w.space)
                .into_iter()
                .collect()
        })
    }
}

impl Hotkeys for MemoryHost {
    fn bind(&self, combo: KeyCombo, action: HotkeyAction) -> Result<HotkeyId, HostError> {
        with_lock!(self.state, |st| {
            let taken = st.hotkeys.values().any(|(c, _)| *c == combo);
            if taken || st.rejected_keys.contains(&combo.key) {
                return Err(HostError::BindingFailure(combo.to_string()));
            }
            let id = st.next_id();
            st.hotkeys.insert(id, (combo, action));
            Ok(id)
        })
    }

    fn unbind(&self, id: HotkeyId) {
        with_lock!(self.state, |st| {
            st.hotkeys.remove(&id);
        })
    }
}

impl Notifier for MemoryHost {
    fn notify(&self, message: &str) {
        with_lock!(self.state, |st| {
            st.notifications.push(message.to_string());
        })
    }
}

/// Prompter answering from pre-recorded queues. An empty queue dismisses.
#[derive(Default)]
pub struct ScriptedPrompter {
    inputs: Mutex<VecDeque<Option<String>>>,
    alerts: Mutex<VecDeque<Option<usize>>>,
    choices: Mutex<VecDeque<Option<usize>>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input(&self, answer: Option<&str>) -> &Self {
        self.inputs.lock().push_back(answer.map(str::to_string));
        self
    }

    pub fn push_alert(&self, button: Option<usize>) -> &Self {
        self.alerts.lock().push_back(button);
        self
    }

    pub fn push_choice(&self, row: Option<usize>) -> &Self {
        self.choices.lock().push_back(row);
        self
    }

    /// Messages of every prompt shown so far.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn text_input(&self, message: &str, _default: &str) -> Option<String> {
        self.asked.lock().push(message.to_string());
        self.inputs.lock().pop_front().flatten()
    }

    fn alert(&self, message: &str, _informative: &str, _buttons: &[&str]) -> Option<usize> {
        self.asked.lock().push(message.to_string());
        self.alerts.lock().pop_front().flatten()
    }

    fn choose(&self, _rows: &[PickerRow]) -> Option<usize> {
        self.choices.lock().pop_front().flatten()
    }
}

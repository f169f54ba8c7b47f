use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::{
    error::HostError,
    host::{HotkeyAction, HotkeyId, Hotkeys, KeyCombo, Modifier},
    workspace::Workspace,
};

/// A workspace shortcut the host refused to register.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedShortcut {
    pub workspace: String,
    pub key: char,
    pub error: HostError,
}

/// Runtime key → workspace bindings. Never persisted; rebuilt from the
/// workspaces' `shortcut_key` fields.
pub struct ShortcutTable {
    modifiers: Vec<Modifier>,
    bound: BTreeMap<char, (String, HotkeyId)>,
}

impl ShortcutTable {
    pub fn new(modifiers: &[Modifier]) -> Self {
        Self {
            modifiers: modifiers.to_vec(),
            bound: BTreeMap::new(),
        }
    }

    pub fn combo(&self, key: char) -> KeyCombo {
        KeyCombo::new(&self.modifiers, key)
    }

    /// Drops every binding and registers one per workspace shortcut.
    /// `action` builds the callback fired for a key.
    pub fn rebuild<H, F>(&mut self, host: &H, workspaces: &[Workspace], action: F) -> Vec<RejectedShortcut>
    where
        H: Hotkeys + ?Sized,
        F: Fn(char) -> HotkeyAction,
    {
        self.clear(host);
        let mut rejected = Vec::new();
        for ws in workspaces {
            let Some(key) = ws.shortcut_key.map(|k| k.to_ascii_lowercase()) else {
                continue;
            };
            if let Some((holder, _)) = self.bound.get(&key) {
                warn!(key = %key, holder = %holder, workspace = %ws.name, "shortcut already bound, skipping");
                continue;
            }
            match host.bind(self.combo(key), action(key)) {
                Ok(id) => {
                    self.bound.insert(key, (ws.name.clone(), id));
                }
                Err(error) => {
                    warn!(key = %key, workspace = %ws.name, %error, "shortcut rejected by host");
                    rejected.push(RejectedShortcut {
                        workspace: ws.name.clone(),
                        key,
                        error,
                    });
                }
            }
        }
        debug!(bound = self.bound.len(), "shortcuts rebuilt");
        rejected
    }

    pub fn clear<H: Hotkeys + ?Sized>(&mut self, host: &H) {
        for (_, (_, id)) in std::mem::take(&mut self.bound) {
            host.unbind(id);
        }
    }

    /// Workspace currently bound to `key`.
    pub fn holder(&self, key: char) -> Option<&str> {
        self.bound
            .get(&key.to_ascii_lowercase())
            .map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (char, &str)> {
        self.bound.iter().map(|(key, (name, _))| (*key, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

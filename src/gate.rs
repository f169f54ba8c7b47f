//! Decides whether a workspace is already established, so restoring can be
//! skipped.
//!
//! The quick check compares per-application window counts on the focused
//! desktop. Only when it fails does the detailed check run, which claims one
//! live window within tolerance for every saved descriptor. Claims are greedy
//! (nearest unclaimed window, in saved order).

use std::collections::HashSet;

use tracing::debug;

use crate::{
    desktop::DesktopResolver,
    geometry::DisplayInfo,
    host::{Desktops, SpaceId, WindowSystem},
    workspace::{WindowId, Workspace},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// No desktop ordinal, or the host has no desktop indexing.
    NoDesktop,
    /// The target desktop is gone or not focused.
    OtherDesktop,
    ActiveByCount,
    ActiveByGeometry,
    Mismatch { app_id: String },
}

impl GateVerdict {
    pub fn is_active(&self) -> bool {
        matches!(self, GateVerdict::ActiveByCount | GateVerdict::ActiveByGeometry)
    }
}

pub struct ActivationGate<'a, H: WindowSystem + Desktops + ?Sized> {
    host: &'a H,
    display: &'a DisplayInfo,
    tolerance: f64,
}

impl<'a, H: WindowSystem + Desktops + ?Sized> ActivationGate<'a, H> {
    pub fn new(host: &'a H, display: &'a DisplayInfo, tolerance: f64) -> Self {
        Self {
            host,
            display,
            tolerance,
        }
    }

    pub fn is_already_active(&self, workspace: &Workspace) -> bool {
        self.check(workspace).is_active()
    }

    pub fn check(&self, workspace: &Workspace) -> GateVerdict {
        let resolver = DesktopResolver::new(self.host, &self.display.name);
        let Some(ordinal) = workspace.desktop().filter(|_| resolver.supported()) else {
            return GateVerdict::NoDesktop;
        };
        let target = resolver.space_at(ordinal);
        let focused = resolver.focused();
        let Some(focused) = focused.filter(|f| Some(*f) == target) else {
            debug!(workspace = %workspace.name, ordinal, "target desktop not focused");
            return GateVerdict::OtherDesktop;
        };

        if self.counts_match(workspace, focused) {
            return GateVerdict::ActiveByCount;
        }
        match self.geometry_mismatch(workspace) {
            None => GateVerdict::ActiveByGeometry,
            Some(app_id) => GateVerdict::Mismatch { app_id },
        }
    }

    fn counts_match(&self, workspace: &Workspace, focused: SpaceId) -> bool {
        workspace.app_groups().iter().all(|group| {
            if !self.host.is_running(group.app_id) {
                return false;
            }
            let on_desktop = self
                .host
                .app_windows(group.app_id)
                .iter()
                .filter(|w| w.is_capturable(&self.display.name))
                .filter(|w| self.host.window_spaces(w.id).contains(&focused))
                .count();
            on_desktop == group.descriptors.len()
        })
    }

    /// Detailed check: returns the first application whose saved windows
    /// cannot all be paired with a live window within tolerance.
    pub fn geometry_mismatch(&self, workspace: &Workspace) -> Option<String> {
        for group in workspace.app_groups() {
            if !self.host.is_running(group.app_id) {
                return Some(group.app_id.to_string());
            }
            let live: Vec<_> = self
                .host
                .app_windows(group.app_id)
                .into_iter()
                .filter(|w| w.is_capturable(&self.display.name))
                .collect();
            let mut claimed: HashSet<WindowId> = HashSet::new();
            for desc in &group.descriptors {
                let target = self.display.absolute(&desc.frame);
                let found = live
                    .iter()
                    .filter(|w| !claimed.contains(&w.id) && w.frame.within(&target, self.tolerance))
                    .min_by(|a, b| {
                        a.frame
                            .city_block(&target)
                            .total_cmp(&b.frame.city_block(&target))
                    });
                match found {
                    Some(w) => {
                        claimed.insert(w.id);
                    }
                    None => return Some(group.app_id.to_string()),
                }
            }
        }
        None
    }
}

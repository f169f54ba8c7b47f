//! Translation between user-facing desktop ordinals and host space handles.
//!
//! Space handles change across sessions, so nothing here is cached: every
//! call re-reads the host's current list for the managed display and uses
//! list position + 1 as the ordinal.

use tracing::{debug, info};

use crate::{
    error::DesktopError,
    host::{Desktops, SpaceId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    AlreadyFocused,
    /// A switch was requested; it completes asynchronously.
    Requested(SpaceId),
}

pub struct DesktopResolver<'a, H: Desktops + ?Sized> {
    host: &'a H,
    display: &'a str,
}

impl<'a, H: Desktops + ?Sized> DesktopResolver<'a, H> {
    pub fn new(host: &'a H, display: &'a str) -> Self {
        Self { host, display }
    }

    pub fn supported(&self) -> bool {
        self.host.spaces_supported()
    }

    pub fn count(&self) -> usize {
        self.host.spaces(self.display).len()
    }

    /// Ordinal of the focused desktop.
    pub fn current_ordinal(&self) -> Option<usize> {
        if !self.supported() {
            return None;
        }
        let focused = self.host.focused_space(self.display)?;
        self.ordinal_of(focused)
    }

    pub fn ordinal_of(&self, space: SpaceId) -> Option<usize> {
        self.host
            .spaces(self.display)
            .iter()
            .position(|s| *s == space)
            .map(|i| i + 1)
    }

    /// Handle currently at `ordinal`, absent when the desktop is gone.
    pub fn space_at(&self, ordinal: usize) -> Option<SpaceId> {
        if ordinal == 0 {
            return None;
        }
        self.host.spaces(self.display).get(ordinal - 1).copied()
    }

    pub fn focused(&self) -> Option<SpaceId> {
        self.host.focused_space(self.display)
    }

    /// Adds desktops until `ordinal` exists. Returns how many were requested.
    pub fn ensure_exists(&self, ordinal: usize) -> Result<usize, DesktopError> {
        if !self.supported() {
            return Err(DesktopError::Unsupported);
        }
        if ordinal == 0 {
            return Err(DesktopError::NoSuchOrdinal(0));
        }
        let mut requested = 0;
        let mut count = self.count();
        while count < ordinal {
            self.host.add_space(self.display)?;
            requested += 1;
            let after = self.count();
            if after <= count {
                return Err(DesktopError::CreationStalled { ordinal, count });
            }
            count = after;
        }
        if requested > 0 {
            info!(display_name = self.display, ordinal, requested, "desktops created");
        }
        Ok(requested)
    }

    pub fn switch_to(&self, ordinal: usize) -> Result<SwitchOutcome, DesktopError> {
        if !self.supported() {
            return Err(DesktopError::Unsupported);
        }
        let target = self
            .space_at(ordinal)
            .ok_or(DesktopError::NoSuchOrdinal(ordinal))?;
        if self.focused() == Some(target) {
            return Ok(SwitchOutcome::AlreadyFocused);
        }
        self.host.goto_space(target)?;
        debug!(display_name = self.display, ordinal, space = target, "desktop switch requested");
        Ok(SwitchOutcome::Requested(target))
    }
}

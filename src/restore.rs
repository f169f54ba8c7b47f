//! Restoration of a saved workspace onto the live desktop.
//!
//! Each application runs its own state machine as a tokio task:
//!
//! ```text
//! Idle -> Resolving -> (Launching -> Resolving)* -> CountReconciling
//!      -> (Creating -> CountReconciling)* -> Positioning -> Verified
//! ```
//!
//! Tasks start staggered and only suspend at the fixed waits after a launch,
//! a window-creation request or a desktop switch. Every wait also listens on
//! the run's cancellation token, so a newer restore can supersede this one.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    capture::managed_display,
    config::Timing,
    desktop::{DesktopResolver, SwitchOutcome},
    error::{HostError, Result, WorkspaceError},
    gate::ActivationGate,
    geometry::DisplayInfo,
    host::{Desktops, LiveWindow, WindowSystem},
    matcher::WindowMatcher,
    workspace::{AppId, WindowDescriptor, Workspace},
};

/// Frames closer than this are considered already in place.
const IN_PLACE_PX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Resolving,
    Launching,
    CountReconciling,
    Creating,
    Positioning,
    Verified,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppReport {
    pub app_id: AppId,
    pub state: AppState,
    pub launched: bool,
    /// Windows gained through creation requests.
    pub created: usize,
    pub positioned: usize,
    /// Windows whose frame or fullscreen state was changed.
    pub moved: usize,
    /// Saved slots left without a window.
    pub missing: usize,
    pub skip_reason: Option<String>,
}

impl AppReport {
    fn new(app_id: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            state: AppState::Idle,
            launched: false,
            created: 0,
            positioned: 0,
            moved: 0,
            missing: 0,
            skip_reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub workspace: String,
    pub already_active: bool,
    /// Desktop ordinal the restore ended up on, when one applied.
    pub desktop: Option<usize>,
    pub apps: Vec<AppReport>,
    /// Final geometry check passed.
    pub verified: bool,
}

impl RestoreReport {
    pub fn moved(&self) -> usize {
        self.apps.iter().map(|a| a.moved).sum()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &AppReport> {
        self.apps.iter().filter(|a| a.state == AppState::Skipped)
    }
}

#[derive(Debug, Clone)]
pub struct RestoreSettings {
    pub display_pattern: String,
    pub tolerance: f64,
    pub timing: Timing,
}

pub struct RestoreOrchestrator<H: WindowSystem + Desktops + ?Sized + 'static> {
    host: Arc<H>,
    settings: Arc<RestoreSettings>,
}

impl<H: WindowSystem + Desktops + ?Sized + 'static> RestoreOrchestrator<H> {
    pub fn new(host: Arc<H>, settings: RestoreSettings) -> Self {
        Self {
            host,
            settings: Arc::new(settings),
        }
    }

    fn display(&self) -> Result<DisplayInfo> {
        managed_display(&*self.host, &self.settings.display_pattern)
            .ok_or_else(|| WorkspaceError::NoManagedDisplay(self.settings.display_pattern.clone()))
    }

    pub async fn restore(&self, workspace: &Workspace, token: CancellationToken) -> Result<RestoreReport> {
        let display = self.display()?;
        let already = ActivationGate::new(&*self.host, &display, self.settings.tolerance)
            .is_already_active(workspace);
        if already {
            info!(workspace = %workspace.name, "workspace already active");
            return Ok(RestoreReport {
                workspace: workspace.name.clone(),
                already_active: true,
                desktop: workspace.desktop(),
                apps: Vec::new(),
                verified: true,
            });
        }

        let desktop = self.switch_desktop(workspace, &display, &token).await?;
        let apps = self.restore_apps(workspace, &token).await?;

        let display = self.display()?;
        let mismatch = ActivationGate::new(&*self.host, &display, self.settings.tolerance)
            .geometry_mismatch(workspace);
        if let Some(app_id) = &mismatch {
            warn!(workspace = %workspace.name, app_id = %app_id, "layout not fully restored");
        }
        let report = RestoreReport {
            workspace: workspace.name.clone(),
            already_active: false,
            desktop,
            apps,
            verified: mismatch.is_none(),
        };
        info!(
            workspace = %report.workspace,
            apps = report.apps.len(),
            moved = report.moved(),
            verified = report.verified,
            "workspace restored"
        );
        Ok(report)
    }

    async fn switch_desktop(
        &self,
        workspace: &Workspace,
        display: &DisplayInfo,
        token: &CancellationToken,
    ) -> Result<Option<usize>> {
        let Some(ordinal) = workspace.desktop() else {
            return Ok(None);
        };
        let outcome = DesktopResolver::new(&*self.host, &display.name).switch_to(ordinal);
        match outcome {
            Ok(SwitchOutcome::AlreadyFocused) => Ok(Some(ordinal)),
            Ok(SwitchOutcome::Requested(_)) => {
                pause(token, self.settings.timing.switch_wait()).await?;
                Ok(Some(ordinal))
            }
            Err(err) => {
                warn!(workspace = %workspace.name, ordinal, error = %err, "restoring without desktop switch");
                Ok(None)
            }
        }
    }

    async fn restore_apps(&self, workspace: &Workspace, token: &CancellationToken) -> Result<Vec<AppReport>> {
        let mut tasks = JoinSet::new();
        for (index, group) in workspace.app_groups().into_iter().enumerate() {
            let job = AppRestore {
                host: self.host.clone(),
                settings: self.settings.clone(),
                saved: group.descriptors.into_iter().cloned().collect(),
                report: AppReport::new(group.app_id),
            };
            let token = token.clone();
            let stagger = self.settings.timing.stagger(index);
            tasks.spawn(async move {
                pause(&token, stagger).await?;
                let report = job.run(&token).await?;
                Ok::<_, WorkspaceError>((index, report))
            });
        }

        let mut reports = Vec::new();
        let mut cancelled = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(WorkspaceError::Cancelled)) => cancelled = true,
                Ok(Err(err)) => warn!(error = %err, "application restore failed"),
                Err(err) => warn!(error = %err, "application restore task aborted"),
            }
        }
        if cancelled || token.is_cancelled() {
            info!(workspace = %workspace.name, "restore superseded");
            return Err(WorkspaceError::Cancelled);
        }
        reports.sort_by_key(|(index, _)| *index);
        Ok(reports.into_iter().map(|(_, report)| report).collect())
    }
}

async fn pause(token: &CancellationToken, wait: Duration) -> Result<()> {
    if wait.is_zero() {
        return match token.is_cancelled() {
            true => Err(WorkspaceError::Cancelled),
            false => Ok(()),
        };
    }
    tokio::select! {
        _ = token.cancelled() => Err(WorkspaceError::Cancelled),
        _ = tokio::time::sleep(wait) => Ok(()),
    }
}

struct AppRestore<H: ?Sized> {
    host: Arc<H>,
    settings: Arc<RestoreSettings>,
    saved: Vec<WindowDescriptor>,
    report: AppReport,
}

impl<H: WindowSystem + ?Sized> AppRestore<H> {
    async fn run(mut self, token: &CancellationToken) -> Result<AppReport> {
        let timing = self.settings.timing.clone();
        let mut launches = 0;
        let mut creations = 0;
        let mut state = AppState::Idle;
        loop {
            if token.is_cancelled() {
                return Err(WorkspaceError::Cancelled);
            }
            debug!(app_id = %self.report.app_id, ?state, "restore step");
            state = match state {
                AppState::Idle => AppState::Resolving,
                AppState::Resolving => {
                    if self.host.is_running(&self.report.app_id) {
                        AppState::CountReconciling
                    } else if launches < timing.launch_attempts {
                        AppState::Launching
                    } else {
                        self.report.skip_reason = Some("not running after launch".to_string());
                        AppState::Skipped
                    }
                }
                AppState::Launching => {
                    match self.host.launch_or_focus(&self.report.app_id) {
                        Err(err) => {
                            self.report.skip_reason = Some(err.to_string());
                            AppState::Skipped
                        }
                        Ok(()) => {
                            self.report.launched = true;
                            pause(token, timing.launch_wait(launches)).await?;
                            launches += 1;
                            AppState::Resolving
                        }
                    }
                }
                AppState::CountReconciling => {
                    let live = self.eligible()?.len();
                    if live < self.saved.len() && creations < timing.max_create_attempts {
                        AppState::Creating
                    } else {
                        AppState::Positioning
                    }
                }
                AppState::Creating => {
                    creations += 1;
                    let before = self.eligible()?.len();
                    match self.host.create_window(&self.report.app_id) {
                        Err(err) => {
                            warn!(app_id = %self.report.app_id, error = %err, "window creation refused");
                            AppState::Positioning
                        }
                        Ok(()) => {
                            pause(token, timing.create_wait()).await?;
                            let after = self.eligible()?.len();
                            if after > before {
                                self.report.created += after - before;
                                AppState::CountReconciling
                            } else {
                                warn!(app_id = %self.report.app_id, "window creation made no progress");
                                AppState::Positioning
                            }
                        }
                    }
                }
                AppState::Positioning => {
                    self.position()?;
                    AppState::Verified
                }
                AppState::Verified => {
                    self.verify();
                    self.report.state = AppState::Verified;
                    return Ok(self.report);
                }
                AppState::Skipped => return Ok(self.skip()),
            };
        }
    }

    fn skip(mut self) -> AppReport {
        warn!(app_id = %self.report.app_id, reason = ?self.report.skip_reason, "skipping application");
        self.report.state = AppState::Skipped;
        self.report.missing = self.saved.len();
        self.report
    }

    fn display(&self) -> Result<DisplayInfo> {
        managed_display(&*self.host, &self.settings.display_pattern)
            .ok_or_else(|| WorkspaceError::NoManagedDisplay(self.settings.display_pattern.clone()))
    }

    fn eligible(&self) -> Result<Vec<LiveWindow>> {
        let display = self.display()?;
        Ok(self
            .host
            .app_windows(&self.report.app_id)
            .into_iter()
            .filter(|w| w.is_restorable(&display.name))
            .collect())
    }

    fn position(&mut self) -> Result<()> {
        let display = self.display()?;
        let live = self.eligible()?;
        let saved: Vec<&WindowDescriptor> = self.saved.iter().collect();
        let outcome = WindowMatcher::new(&display, self.settings.tolerance).match_windows(&saved, &live);
        self.report.missing = outcome.needs_creation().len();

        for (index, window_id) in outcome.pairs() {
            let Some(window) = live.iter().find(|w| w.id == window_id) else {
                continue;
            };
            match self.place(&display, saved[index], window) {
                Ok(moved) => {
                    self.report.positioned += 1;
                    if moved {
                        self.report.moved += 1;
                    }
                }
                Err(err) => warn!(app_id = %self.report.app_id, window = window_id, error = %err, "window not positioned"),
            }
        }
        Ok(())
    }

    /// Returns whether the window's geometry had to change.
    fn place(
        &self,
        display: &DisplayInfo,
        desc: &WindowDescriptor,
        window: &LiveWindow,
    ) -> Result<bool, HostError> {
        if window.minimized {
            self.host.unminimize(window.id)?;
        }
        self.host.raise(window.id)?;
        if desc.fullscreen {
            if window.fullscreen {
                return Ok(false);
            }
            self.host.set_fullscreen(window.id, true)?;
            return Ok(true);
        }
        let mut moved = false;
        if window.fullscreen {
            self.host.set_fullscreen(window.id, false)?;
            moved = true;
        }
        let target = display.absolute(&desc.frame);
        if moved || !window.frame.within(&target, IN_PLACE_PX) {
            self.host.set_frame(window.id, target)?;
            moved = true;
        }
        Ok(moved)
    }

    fn verify(&self) {
        for window in self.host.app_windows(&self.report.app_id) {
            if let Err(err) = self.host.raise(window.id) {
                warn!(app_id = %self.report.app_id, window = window.id, error = %err, "raise failed");
            }
        }
        if let Err(err) = self.host.unhide_app(&self.report.app_id) {
            warn!(app_id = %self.report.app_id, error = %err, "unhide failed");
        }
    }
}

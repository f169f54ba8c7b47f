//! The one owned object holding all runtime state: the store, the shortcut
//! table, built-in hotkeys and the in-flight restore.
//!
//! Every entry point funnels into [`WorkspaceService::dispatch`], which never
//! fails. Errors turn into a notification and a `warn!`.

use std::sync::Arc;

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    capture::{capture, managed_display},
    command::{Command, picker_entries},
    config::Config,
    conflict::{ConflictResolver, SaveOutcome, validate_name, validate_shortcut},
    desktop::DesktopResolver,
    error::{Result, WorkspaceError},
    geometry::DisplayInfo,
    host::{Host, HotkeyAction, HotkeyId, KeyCombo, PickerRow, Prompter},
    restore::{RestoreOrchestrator, RestoreReport, RestoreSettings},
    shortcuts::ShortcutTable,
    store::WorkspaceStore,
    workspace::{Workspace, new_session_id},
};

pub type Shared<T> = Arc<Mutex<T>>;

pub struct WorkspaceService<H: Host + ?Sized + 'static> {
    host: Arc<H>,
    prompter: Arc<dyn Prompter>,
    config: Arc<Config>,
    store: Arc<WorkspaceStore>,
    restorer: Arc<RestoreOrchestrator<H>>,
    shortcuts: Shared<ShortcutTable>,
    builtins: Shared<Vec<HotkeyId>>,
    active: Shared<Option<CancellationToken>>,
    commands: (Sender<Command>, Receiver<Command>),
    /// Window handles are only meaningful inside this session.
    session: Arc<str>,
}

impl<H: Host + ?Sized + 'static> Clone for WorkspaceService<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            prompter: self.prompter.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            restorer: self.restorer.clone(),
            shortcuts: self.shortcuts.clone(),
            builtins: self.builtins.clone(),
            active: self.active.clone(),
            commands: self.commands.clone(),
            session: self.session.clone(),
        }
    }
}

impl<H: Host + ?Sized + 'static> WorkspaceService<H> {
    pub fn new(host: Arc<H>, prompter: Arc<dyn Prompter>, config: Config) -> Self {
        let restorer = RestoreOrchestrator::new(
            host.clone(),
            RestoreSettings {
                display_pattern: config.display_pattern.clone(),
                tolerance: config.tolerance_px,
                timing: config.timing.clone(),
            },
        );
        Self {
            store: Arc::new(WorkspaceStore::new(config.store_path.clone())),
            shortcuts: Arc::new(Mutex::new(ShortcutTable::new(&config.hotkeys.modifiers))),
            builtins: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(Mutex::new(None)),
            commands: flume::unbounded(),
            session: Arc::from(new_session_id()),
            restorer: Arc::new(restorer),
            config: Arc::new(config),
            prompter,
            host,
        }
    }

    //==============================================================================//
    // lifecycle
    //==============================================================================//

    /// Registers built-in hotkeys and workspace shortcuts.
    pub fn open(&self) {
        self.unbind_builtins();
        self.bind_builtins();
        self.rebuild_shortcuts();
        info!(
            session = %self.session,
            store = %self.store.path().display(),
            workspaces = self.store.load().len(),
            "workspace service opened"
        );
    }

    /// Unregisters every hotkey and cancels any restore in flight.
    pub fn close(&self) {
        if let Some(token) = with_lock!(self.active, |active| { active.take() }) {
            token.cancel();
        }
        with_lock!(self.shortcuts, |table| {
            table.clear(&*self.host);
        });
        self.unbind_builtins();
        info!("workspace service closed");
    }

    pub fn sender(&self) -> Sender<Command> {
        self.commands.0.clone()
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspaces(&self) -> Vec<Workspace> {
        self.store.load()
    }

    pub fn shortcut_holder(&self, key: char) -> Option<String> {
        with_lock!(self.shortcuts, |table| { table.holder(key).map(str::to_string) })
    }

    //==============================================================================//
    // dispatch
    //==============================================================================//

    /// Consumes queued commands until every sender is gone. Restoring
    /// commands run as their own tasks so a newer one can supersede them.
    pub async fn run(&self) {
        let rx = self.commands.1.clone();
        while let Ok(command) = rx.recv_async().await {
            if command.restores() {
                let service = self.clone();
                tokio::spawn(async move { service.dispatch(command).await });
            } else {
                self.dispatch(command).await;
            }
        }
    }

    /// Runs whatever is queued right now, in order. Returns how many ran.
    pub async fn drain(&self) -> usize {
        let mut count = 0;
        while let Ok(command) = self.commands.1.try_recv() {
            self.dispatch(command).await;
            count += 1;
        }
        count
    }

    pub async fn dispatch(&self, command: Command) {
        let mut next = Some(command);
        while let Some(command) = next.take() {
            debug!(?command, "dispatching");
            match self.execute(command).await {
                Ok(follow_up) => next = follow_up,
                Err(WorkspaceError::Cancelled) => debug!("restore superseded"),
                Err(WorkspaceError::Dismissed) => debug!("prompt dismissed"),
                Err(err) => {
                    warn!(error = %err, "command failed");
                    self.host.notify(&err.to_string());
                }
            }
        }
    }

    /// Runs one command. Some commands answer with a follow-up command.
    pub async fn execute(&self, command: Command) -> Result<Option<Command>> {
        match command {
            Command::SaveCurrent => self.prompt_save().map(Some),
            Command::Save { name, shortcut } => self.save(&name, shortcut).map(|_| None),
            Command::Activate { name } => self.activate(&name).await.map(|_| None),
            Command::Shortcut(key) => match self.shortcut_holder(key) {
                Some(name) => Ok(Some(Command::Activate { name })),
                None => {
                    debug!(key = %key, "no workspace on shortcut");
                    Ok(None)
                }
            },
            Command::OpenDesktop(ordinal) => self.open_desktop(ordinal),
            Command::Update { name } => self.update(&name).map(|_| None),
            Command::Delete { name } => self.delete(&name).map(|_| None),
            Command::ShowPicker => Ok(self.pick()),
            Command::Help => {
                self.host.notify(&self.help_text());
                Ok(None)
            }
            Command::Reload => {
                self.reload();
                Ok(None)
            }
        }
    }

    //==============================================================================//
    // commands
    //==============================================================================//

    fn prompt_save(&self) -> Result<Command> {
        let name = self
            .prompter
            .text_input("Name this workspace", "")
            .ok_or(WorkspaceError::Dismissed)?;
        let name = validate_name(&name)?;
        let key = self
            .prompter
            .text_input(&format!("Shortcut key for \"{name}\" (blank for none)"), "")
            .ok_or(WorkspaceError::Dismissed)?;
        let shortcut = validate_shortcut(&key, &self.config.hotkeys.reserved())?;
        Ok(Command::Save { name, shortcut })
    }

    /// Captures the managed display and stores it under `name`.
    pub fn save(&self, name: &str, shortcut: Option<char>) -> Result<SaveOutcome> {
        let name = validate_name(name)?;
        let reserved = self.config.hotkeys.reserved();
        let shortcut = match shortcut {
            Some(key) => validate_shortcut(&key.to_string(), &reserved)?,
            None => None,
        };
        let display = self.display()?;
        let windows = capture(&*self.host, &display, &self.config.ignored_apps);
        let count = windows.len();
        let resolver = DesktopResolver::new(&*self.host, &display.name);
        let workspace = Workspace::new(&name, windows)
            .with_shortcut(shortcut)
            .on_desktop(resolver.current_ordinal(), resolver.supported())
            .in_session(&self.session);

        let outcome = ConflictResolver::new(&*self.prompter, &reserved).save(&self.store, workspace)?;
        self.rebuild_shortcuts();

        let mut message = format!("Saved \"{name}\" ({count} windows)");
        if !outcome.desktop_taken_from.is_empty() {
            message.push_str(&format!(
                "; desktop taken from {}",
                outcome.desktop_taken_from.join(", ")
            ));
        }
        self.host.notify(&message);
        Ok(outcome)
    }

    /// Restores `name`, cancelling whatever restore was still running.
    pub async fn activate(&self, name: &str) -> Result<RestoreReport> {
        let mut workspace = self
            .store
            .find(name)
            .ok_or_else(|| WorkspaceError::NotFound(name.to_string()))?;
        workspace.forget_foreign_handles(&self.session);
        let token = CancellationToken::new();
        if let Some(previous) = with_lock!(self.active, |active| { active.replace(token.clone()) }) {
            previous.cancel();
        }

        let report = self.restorer.restore(&workspace, token).await?;
        if report.already_active {
            self.host.notify(&format!("\"{name}\" is already active"));
        } else {
            let skipped: Vec<&str> = report.skipped().map(|a| a.app_id.as_str()).collect();
            let mut message = format!("Restored \"{name}\"");
            if !skipped.is_empty() {
                message.push_str(&format!(" (skipped {})", skipped.join(", ")));
            }
            self.host.notify(&message);
        }
        Ok(report)
    }

    /// Makes sure desktop `ordinal` exists, then restores the workspace that
    /// lives there or just switches to it.
    pub fn open_desktop(&self, ordinal: usize) -> Result<Option<Command>> {
        let display = self.display()?;
        let resolver = DesktopResolver::new(&*self.host, &display.name);
        resolver.ensure_exists(ordinal)?;
        let holder = self
            .store
            .load()
            .into_iter()
            .find(|w| w.desktop() == Some(ordinal));
        match holder {
            Some(workspace) => Ok(Some(Command::Activate {
                name: workspace.name,
            })),
            None => {
                resolver.switch_to(ordinal)?;
                self.host.notify(&format!("Desktop {ordinal}"));
                Ok(None)
            }
        }
    }

    /// Replaces the windows of `name` with the current layout. Shortcut and
    /// desktop stay as they are.
    pub fn update(&self, name: &str) -> Result<()> {
        let display = self.display()?;
        let windows = capture(&*self.host, &display, &self.config.ignored_apps);
        let count = windows.len();
        self.store.transact(|list| {
            let workspace = list
                .iter_mut()
                .find(|w| w.name == name)
                .ok_or_else(|| WorkspaceError::NotFound(name.to_string()))?;
            workspace.windows = windows;
            workspace.session = Some(self.session.to_string());
            Ok::<_, WorkspaceError>(())
        })?;
        info!(workspace = name, windows = count, "workspace updated");
        self.host.notify(&format!("Updated \"{name}\" ({count} windows)"));
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.store.transact(|list| {
            let before = list.len();
            list.retain(|w| w.name != name);
            match list.len() < before {
                true => Ok(()),
                false => Err(WorkspaceError::NotFound(name.to_string())),
            }
        })?;
        info!(workspace = name, "workspace deleted");
        self.rebuild_shortcuts();
        self.host.notify(&format!("Deleted \"{name}\""));
        Ok(())
    }

    fn pick(&self) -> Option<Command> {
        let entries = picker_entries(&self.store.load());
        let rows: Vec<PickerRow> = entries.iter().map(|(row, _)| row.clone()).collect();
        let choice = self.prompter.choose(&rows)?;
        entries.into_iter().nth(choice).map(|(_, command)| command)
    }

    pub fn reload(&self) {
        let count = self.store.load().len();
        self.rebuild_shortcuts();
        self.host.notify(&format!("Reloaded {count} workspaces"));
    }

    pub fn help_text(&self) -> String {
        let keys = &self.config.hotkeys;
        let combo = |key| KeyCombo::new(&keys.modifiers, key);
        let mut lines = vec![
            format!("{}  reload workspaces", combo(keys.reload)),
            format!("{}  workspace picker", combo(keys.toggle)),
            format!("{}  save current layout", combo(keys.save)),
            format!("{}  this help", combo(keys.help)),
        ];
        if self.host.spaces_supported() {
            let digits = KeyCombo::new(&keys.desktop_modifiers, '1');
            lines.push(format!("{digits}..9  open desktop"));
        }
        with_lock!(self.shortcuts, |table| {
            for (key, name) in table.entries() {
                lines.push(format!("{}  {name}", table.combo(key)));
            }
        });
        lines.join("\n")
    }

    //==============================================================================//
    // internals
    //==============================================================================//

    fn display(&self) -> Result<DisplayInfo> {
        managed_display(&*self.host, &self.config.display_pattern)
            .ok_or_else(|| WorkspaceError::NoManagedDisplay(self.config.display_pattern.clone()))
    }

    fn action(&self, command: Command) -> HotkeyAction {
        let tx = self.commands.0.clone();
        Arc::new(move || {
            if let Err(err) = tx.send(command.clone()) {
                warn!(error = %err, "hotkey command dropped");
            }
        })
    }

    fn bind_builtins(&self) {
        let keys = &self.config.hotkeys;
        let mut wanted = vec![
            (KeyCombo::new(&keys.modifiers, keys.reload), Command::Reload),
            (KeyCombo::new(&keys.modifiers, keys.toggle), Command::ShowPicker),
            (KeyCombo::new(&keys.modifiers, keys.save), Command::SaveCurrent),
            (KeyCombo::new(&keys.modifiers, keys.help), Command::Help),
        ];
        if self.host.spaces_supported() {
            for digit in 1..=9u8 {
                wanted.push((
                    KeyCombo::new(&keys.desktop_modifiers, char::from(b'0' + digit)),
                    Command::OpenDesktop(usize::from(digit)),
                ));
            }
        }

        let mut bound = Vec::new();
        for (combo, command) in wanted {
            match self.host.bind(combo.clone(), self.action(command)) {
                Ok(id) => bound.push(id),
                Err(err) => warn!(combo = %combo, error = %err, "built-in hotkey not registered"),
            }
        }
        with_lock!(self.builtins, |builtins| {
            builtins.extend(bound);
        });
    }

    fn unbind_builtins(&self) {
        let ids = with_lock!(self.builtins, |builtins| { std::mem::take(&mut *builtins) });
        for id in ids {
            self.host.unbind(id);
        }
    }

    /// Re-registers workspace shortcuts. A shortcut the host rejects is
    /// removed from its workspace; the workspace itself stays.
    fn rebuild_shortcuts(&self) {
        let workspaces = self.store.load();
        let rejected = with_lock!(self.shortcuts, |table| {
            table.rebuild(&*self.host, &workspaces, |key| self.action(Command::Shortcut(key)))
        });
        if rejected.is_empty() {
            return;
        }

        let stripped = self.store.transact(|list| {
            for rejection in &rejected {
                for w in list
                    .iter_mut()
                    .filter(|w| w.name == rejection.workspace && w.shortcut_key == Some(rejection.key))
                {
                    w.shortcut_key = None;
                }
            }
            Ok::<_, WorkspaceError>(())
        });
        if let Err(err) = stripped {
            warn!(error = %err, "could not strip rejected shortcuts");
        }
        for rejection in rejected {
            self.host.notify(&format!(
                "Shortcut \"{}\" could not be registered and was removed from \"{}\"",
                rejection.key, rejection.workspace
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{DisplayInfo, Rect, UnitFrame},
        host::{
            Modifier, WindowSystem,
            memory::{HostCall, MemoryHost, ScriptedPrompter},
        },
        workspace::WindowDescriptor,
    };

    struct Fixture {
        _dir: tempfile::TempDir,
        host: Arc<MemoryHost>,
        prompter: Arc<ScriptedPrompter>,
        service: WorkspaceService<MemoryHost>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MemoryHost::new(vec![DisplayInfo::new(
            "Main",
            Rect::new(0.0, 0.0, 1000.0, 800.0),
        )]));
        host.set_space_count("Main", 2);
        let prompter = Arc::new(ScriptedPrompter::new());
        let config = Config {
            store_path: dir.path().join("workspaces.json"),
            ..Config::default()
        };
        let service = WorkspaceService::new(host.clone(), prompter.clone(), config);
        service.open();
        Fixture {
            _dir: dir,
            host,
            prompter,
            service,
        }
    }

    fn combo(key: char) -> KeyCombo {
        KeyCombo::new(&[Modifier::Ctrl, Modifier::Alt, Modifier::Cmd], key)
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_save_prompts_then_saves() {
        let f = fixture();
        f.host.open_window("term", "shell", Rect::new(0.0, 0.0, 500.0, 800.0));
        f.prompter.push_input(Some(" Work ")).push_input(Some("W"));
        f.service.dispatch(Command::SaveCurrent).await;

        let saved = f.service.workspaces();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, "Work");
        assert_eq!(saved[0].shortcut_key, Some('w'));
        assert_eq!(saved[0].desktop(), Some(1));
        assert_eq!(f.service.shortcut_holder('w').as_deref(), Some("Work"));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_become_notifications() {
        let f = fixture();
        f.prompter.push_input(Some("Work")).push_input(Some("s"));
        f.service.dispatch(Command::SaveCurrent).await;
        f.service
            .dispatch(Command::Activate {
                name: "Nope".to_string(),
            })
            .await;
        assert!(f.service.workspaces().is_empty());
        assert_eq!(
            f.host.notifications(),
            vec![
                "shortcut `s` is reserved".to_string(),
                "no workspace named `Nope`".to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dismissed_prompt_is_silent() {
        let f = fixture();
        f.service.dispatch(Command::SaveCurrent).await;
        assert!(f.host.notifications().is_empty());
        assert!(f.service.workspaces().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_shortcut_is_stripped_but_workspace_kept() {
        let f = fixture();
        f.host.reject_hotkey('q');
        f.service.save("Quiet", Some('q')).unwrap();

        let saved = f.service.workspaces();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].shortcut_key, None);
        let notes = f.host.notifications();
        assert!(notes.iter().any(|n| n.contains("could not be registered")));
        assert!(notes.iter().any(|n| n.starts_with("Saved \"Quiet\"")));
    }

    #[tokio::test(start_paused = true)]
    async fn shortcut_hotkey_restores_its_workspace() {
        let f = fixture();
        let id = f.host.open_window("term", "shell", Rect::new(0.0, 0.0, 500.0, 800.0));
        f.service.save("Left", Some('l')).unwrap();
        f.host.drag_window(id, Rect::new(300.0, 200.0, 400.0, 300.0));
        // Same desktop and same counts would pass the quick check.
        f.host.focus_ordinal("Main", 2);

        assert!(f.host.press(&combo('l')));
        assert_eq!(f.service.drain().await, 1);
        assert_eq!(
            f.host.window(id).unwrap().frame,
            Rect::new(0.0, 0.0, 500.0, 800.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn picker_choice_runs_the_chosen_command() {
        let f = fixture();
        f.service.save("Mail", None).unwrap();
        f.service.save("Chat", None).unwrap();
        // Rows: save-current, then apply/update/delete per workspace.
        f.prompter.push_choice(Some(3));
        f.service.dispatch(Command::ShowPicker).await;
        let names: Vec<String> = f.service.workspaces().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["Chat"]);
    }

    #[tokio::test(start_paused = true)]
    async fn update_keeps_shortcut_and_desktop() {
        let f = fixture();
        f.service.save("Work", Some('w')).unwrap();
        f.host.open_window("term", "shell", Rect::new(0.0, 0.0, 500.0, 800.0));
        f.service.update("Work").unwrap();
        let ws = &f.service.workspaces()[0];
        assert_eq!(ws.windows.len(), 1);
        assert_eq!(ws.shortcut_key, Some('w'));
        assert_eq!(ws.desktop(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn desktop_hotkey_creates_and_switches() {
        let f = fixture();
        assert!(f.host.press(&KeyCombo::new(&[Modifier::Ctrl, Modifier::Alt], '4')));
        f.service.drain().await;
        assert_eq!(f.host.space_count("Main"), 4);
        assert_eq!(f.host.notifications(), vec!["Desktop 4".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn desktop_hotkey_restores_the_workspace_living_there() {
        let f = fixture();
        f.host.focus_ordinal("Main", 2);
        let id = f.host.open_window("term", "shell", Rect::new(0.0, 0.0, 500.0, 800.0));
        f.service.save("Two", None).unwrap();
        f.host.focus_ordinal("Main", 1);
        f.host.drag_window(id, Rect::new(100.0, 100.0, 300.0, 300.0));

        f.service.dispatch(Command::OpenDesktop(2)).await;
        assert!(f.host.calls().iter().any(|c| matches!(c, HostCall::GotoSpace(_))));
        assert_eq!(
            f.host.window(id).unwrap().frame,
            Rect::new(0.0, 0.0, 500.0, 800.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn newer_activation_supersedes_the_running_one() {
        let f = fixture();
        f.host.install_app("mail", "Mail", 1);
        f.host.install_app("chat", "Chat", 1);
        let mail = Workspace::new(
            "Mail",
            vec![WindowDescriptor::new("mail", "", UnitFrame::new(0.0, 0.0, 1.0, 1.0))],
        );
        let chat = Workspace::new(
            "Chat",
            vec![WindowDescriptor::new("chat", "", UnitFrame::new(0.0, 0.0, 1.0, 1.0))],
        );
        f.service
            .store
            .transact(|list| {
                list.extend([mail, chat]);
                Ok::<_, WorkspaceError>(())
            })
            .unwrap();

        let (first, second) = tokio::join!(f.service.activate("Mail"), f.service.activate("Chat"));
        assert!(matches!(first, Err(WorkspaceError::Cancelled)));
        assert!(second.unwrap().verified);
        assert!(!f.host.is_running("mail"));
        assert!(f.host.is_running("chat"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_consumes_hotkey_commands() {
        let f = fixture();
        let service = f.service.clone();
        let runner = tokio::spawn(async move { service.run().await });
        assert!(f.host.press(&combo('i')));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let notes = f.host.notifications();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("open desktop"));
        runner.abort();
    }

    #[test]
    fn close_releases_every_hotkey() {
        let f = fixture();
        f.service.save("Work", Some('w')).unwrap();
        assert!(!f.host.bound_combos().is_empty());
        f.service.close();
        assert!(f.host.bound_combos().is_empty());
    }
}

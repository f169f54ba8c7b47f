//! Save-time validation and collision handling.
//!
//! A save either lands completely or not at all: every prompt is answered
//! inside one store transaction, and a declined or cancelled prompt fails the
//! transaction before anything is written.

use tracing::{info, warn};

use crate::{
    error::{ConflictError, Result, ValidationError, WorkspaceError},
    host::Prompter,
    store::WorkspaceStore,
    workspace::Workspace,
};

pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

/// Parses user input for a shortcut. Blank input means no shortcut.
pub fn validate_shortcut(input: &str, reserved: &[char]) -> Result<Option<char>, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let mut chars = input.chars();
    let key = match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
        _ => return Err(ValidationError::MalformedKey(input.to_string())),
    };
    check_reserved(key, reserved)?;
    Ok(Some(key))
}

fn check_reserved(key: char, reserved: &[char]) -> Result<(), ValidationError> {
    if reserved.contains(&key.to_ascii_lowercase()) {
        return Err(ValidationError::ReservedKey(key));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutResolution {
    /// Delete the workspace currently holding the key.
    Replace,
    /// Strip the key from its holder and keep the holder.
    Reassign,
    Cancel,
}

impl ShortcutResolution {
    const BUTTONS: [&'static str; 3] = ["Replace", "Reassign", "Cancel"];

    fn from_button(button: Option<usize>) -> Self {
        match button {
            Some(0) => Self::Replace,
            Some(1) => Self::Reassign,
            _ => Self::Cancel,
        }
    }
}

/// How the current holder of a requested shortcut gives it up.
enum Freed {
    Removed(String),
    Stripped(String),
}

/// What a successful save changed besides storing the new workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    /// A workspace of the same name was overwritten.
    pub overwrote: bool,
    /// Workspaces deleted to free the shortcut.
    pub removed: Vec<String>,
    /// Workspace that lost its shortcut to the new one.
    pub reassigned_from: Option<String>,
    /// Workspaces that lost their desktop ordinal to the new one.
    pub desktop_taken_from: Vec<String>,
}

pub struct ConflictResolver<'a, P: Prompter + ?Sized> {
    prompter: &'a P,
    reserved: &'a [char],
}

impl<'a, P: Prompter + ?Sized> ConflictResolver<'a, P> {
    pub fn new(prompter: &'a P, reserved: &'a [char]) -> Self {
        Self { prompter, reserved }
    }

    pub fn save(&self, store: &WorkspaceStore, mut workspace: Workspace) -> Result<SaveOutcome> {
        workspace.name = validate_name(&workspace.name)?;
        workspace.shortcut_key = workspace.shortcut_key.map(|key| key.to_ascii_lowercase());
        if let Some(key) = workspace.shortcut_key {
            check_reserved(key, self.reserved)?;
        }

        store.transact(|list| {
            let mut outcome = SaveOutcome::default();

            if list.iter().any(|w| w.name == workspace.name) {
                let answer = self.prompter.alert(
                    &format!("A workspace named \"{}\" already exists.", workspace.name),
                    "Overwrite it with the current layout?",
                    &["Overwrite", "Cancel"],
                );
                if answer != Some(0) {
                    return Err(WorkspaceError::from(ConflictError::NameDeclined(
                        workspace.name.clone(),
                    )));
                }
                outcome.overwrote = true;
            }

            let freed = match workspace.shortcut_key {
                Some(key) => self.resolve_shortcut(list, &workspace.name, key)?,
                None => None,
            };

            // Prompts are done; from here on the transaction only mutates.
            list.retain(|w| w.name != workspace.name);
            match freed {
                Some(Freed::Removed(holder)) => {
                    list.retain(|w| w.name != holder);
                    outcome.removed.push(holder);
                }
                Some(Freed::Stripped(holder)) => {
                    for w in list.iter_mut().filter(|w| w.name == holder) {
                        w.shortcut_key = None;
                    }
                    outcome.reassigned_from = Some(holder);
                }
                None => {}
            }
            if let Some(ordinal) = workspace.desktop() {
                for w in list.iter_mut().filter(|w| w.desktop_index == Some(ordinal)) {
                    warn!(workspace = %w.name, ordinal, "desktop ordinal moved to {}", workspace.name);
                    w.desktop_index = None;
                    outcome.desktop_taken_from.push(w.name.clone());
                }
            }

            info!(
                workspace = %workspace.name,
                windows = workspace.windows.len(),
                shortcut = ?workspace.shortcut_key,
                desktop = ?workspace.desktop(),
                "workspace saved"
            );
            list.push(workspace.clone());
            Ok::<_, WorkspaceError>(outcome)
        })
    }

    fn resolve_shortcut(
        &self,
        list: &[Workspace],
        name: &str,
        key: char,
    ) -> Result<Option<Freed>> {
        let Some(holder) = list
            .iter()
            .find(|w| w.name != name && w.shortcut_key.is_some_and(|k| k.eq_ignore_ascii_case(&key)))
        else {
            return Ok(None);
        };
        let answer = self.prompter.alert(
            &format!("Shortcut \"{key}\" is used by \"{}\".", holder.name),
            "Replace deletes that workspace. Reassign keeps it without a shortcut.",
            &ShortcutResolution::BUTTONS,
        );
        match ShortcutResolution::from_button(answer) {
            ShortcutResolution::Cancel => Err(ConflictError::ShortcutCancelled {
                key,
                holder: holder.name.clone(),
            }
            .into()),
            ShortcutResolution::Replace => Ok(Some(Freed::Removed(holder.name.clone()))),
            ShortcutResolution::Reassign => Ok(Some(Freed::Stripped(holder.name.clone()))),
        }
    }
}

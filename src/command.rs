use crate::{host::PickerRow, workspace::Workspace};

/// Everything the service can be asked to do, from hotkeys, the picker or
/// the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Prompt for a name and an optional shortcut, then save.
    SaveCurrent,
    Save { name: String, shortcut: Option<char> },
    Activate { name: String },
    /// Activate whichever workspace holds this shortcut.
    Shortcut(char),
    /// Go to a desktop, creating it when missing, and restore its workspace.
    OpenDesktop(usize),
    /// Re-capture into an existing workspace.
    Update { name: String },
    Delete { name: String },
    ShowPicker,
    Help,
    Reload,
}

impl Command {
    /// Commands that end in a restore. These may run concurrently with each
    /// other; the newest one wins.
    pub fn restores(&self) -> bool {
        matches!(
            self,
            Command::Activate { .. } | Command::Shortcut(_) | Command::OpenDesktop(_)
        )
    }
}

/// Picker rows with the command each one triggers.
pub fn picker_entries(workspaces: &[Workspace]) -> Vec<(PickerRow, Command)> {
    let mut entries = vec![(
        PickerRow {
            text: "Save current layout…".to_string(),
            subtext: "Capture the windows on the managed display".to_string(),
        },
        Command::SaveCurrent,
    )];
    for ws in workspaces {
        let name = ws.name.clone();
        entries.push((
            PickerRow {
                text: format!("Apply {name}"),
                subtext: summary(ws),
            },
            Command::Activate { name: name.clone() },
        ));
        entries.push((
            PickerRow {
                text: format!("Update {name}"),
                subtext: "Replace with the current layout".to_string(),
            },
            Command::Update { name: name.clone() },
        ));
        entries.push((
            PickerRow {
                text: format!("Delete {name}"),
                subtext: String::new(),
            },
            Command::Delete { name },
        ));
    }
    entries
}

fn summary(ws: &Workspace) -> String {
    let mut parts = vec![format!("{} windows", ws.windows.len())];
    if let Some(key) = ws.shortcut_key {
        parts.push(format!("shortcut {key}"));
    }
    if let Some(ordinal) = ws.desktop() {
        parts.push(format!("desktop {ordinal}"));
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_workspace_gets_apply_update_delete() {
        let workspaces = vec![
            Workspace::new("Work", vec![])
                .with_shortcut(Some('w'))
                .on_desktop(Some(2), true),
            Workspace::new("Mail", vec![]),
        ];
        let entries = picker_entries(&workspaces);
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0].1, Command::SaveCurrent);
        assert_eq!(entries[1].0.subtext, "0 windows · shortcut w · desktop 2");
        assert_eq!(
            entries[6].1,
            Command::Delete {
                name: "Mail".to_string()
            }
        );
    }
}

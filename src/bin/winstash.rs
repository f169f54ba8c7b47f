use std::{
    io::{BufRead, Write},
    sync::Arc,
};

use anyhow::Context;
use winstash::{
    Command, Config, WorkspaceService,
    conflict::validate_shortcut,
    geometry::{DisplayInfo, Rect},
    host::{
        KeyCombo, PickerRow, Prompter,
        memory::MemoryHost,
    },
    logging::init_logging,
};

/// Prompter reading answers from the console.
struct ConsolePrompter;

impl ConsolePrompter {
    fn ask(message: &str) -> Option<String> {
        print!("{message}\n> ");
        std::io::stdout().flush().ok()?;
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl Prompter for ConsolePrompter {
    fn text_input(&self, message: &str, default: &str) -> Option<String> {
        let answer = Self::ask(message)?;
        match answer.is_empty() {
            true => Some(default.to_string()),
            false => Some(answer),
        }
    }

    fn alert(&self, message: &str, informative: &str, buttons: &[&str]) -> Option<usize> {
        let choices = buttons
            .iter()
            .enumerate()
            .map(|(i, b)| format!("[{i}] {b}"))
            .collect::<Vec<_>>()
            .join("  ");
        let answer = Self::ask(&format!("{message}\n{informative}\n{choices}"))?;
        answer.trim().parse().ok().filter(|i| *i < buttons.len())
    }

    fn choose(&self, rows: &[PickerRow]) -> Option<usize> {
        for (i, row) in rows.iter().enumerate() {
            println!("[{i}] {:<24} {}", row.text, row.subtext);
        }
        let answer = Self::ask("pick a row (blank to dismiss)")?;
        answer.trim().parse().ok().filter(|i| *i < rows.len())
    }
}

fn demo_host() -> MemoryHost {
    let host = MemoryHost::new(vec![
        DisplayInfo::new("Built-in Retina", Rect::new(0.0, 0.0, 1440.0, 900.0)),
        DisplayInfo::new("DELL U2720Q", Rect::new(1440.0, 0.0, 2560.0, 1440.0)),
    ]);
    for display in ["Built-in Retina", "DELL U2720Q"] {
        host.set_space_count(display, 3);
    }
    host.install_app("com.apple.Terminal", "Terminal", 1);
    host.install_app("com.apple.Safari", "Safari", 1);
    host.install_app("com.apple.mail", "Mail", 2);
    host.install_app("com.microsoft.VSCode", "Code", 1);
    host.open_window("com.apple.Terminal", "zsh", Rect::new(0.0, 0.0, 720.0, 900.0));
    host.open_window("com.apple.Safari", "Docs", Rect::new(720.0, 0.0, 720.0, 900.0));
    host
}

fn help_command_interface() {
    println!(
        r#"
save                      save current layout (prompts)
save <name> [key]         save current layout
apply <name>              restore a workspace
update <name>             re-capture a workspace
delete <name>             delete a workspace
desktop <n>               open desktop n
pick                      workspace picker
press <key>               press a workspace shortcut
list                      saved workspaces
windows                   live windows
move <id> <x> <y> <w> <h> move a window by hand
quit
    "#
    );
}

const UNKNOWN: &str = "unknown command, `?` for help";

fn parse_command(input: &str) -> Result<Command, String> {
    let mut parts = input.split_whitespace();
    let verb = parts.next().ok_or(UNKNOWN)?;
    let rest: Vec<&str> = parts.collect();
    let name = rest.first().map(|s| s.to_string());
    let command = match (verb, name) {
        ("save", None) => Command::SaveCurrent,
        ("save", Some(name)) => {
            if rest.len() > 2 {
                return Err("usage: save <name> [key]".to_string());
            }
            let key = rest.get(1).copied().unwrap_or_default();
            let shortcut = validate_shortcut(key, &[]).map_err(|err| err.to_string())?;
            Command::Save { name, shortcut }
        }
        ("apply", Some(name)) => Command::Activate { name },
        ("update", Some(name)) => Command::Update { name },
        ("delete", Some(name)) => Command::Delete { name },
        ("desktop", Some(n)) => {
            Command::OpenDesktop(n.parse().map_err(|_| format!("not a desktop number: {n}"))?)
        }
        ("pick", _) => Command::ShowPicker,
        ("reload", _) => Command::Reload,
        ("help", _) => Command::Help,
        _ => return Err(UNKNOWN.to_string()),
    };
    Ok(command)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let config = Config::load().context("loading configuration")?;
    let host = Arc::new(demo_host());
    let service = WorkspaceService::new(host.clone(), Arc::new(ConsolePrompter), config);
    service.open();
    help_command_interface();

    let mut seen = 0;
    loop {
        print!("winstash> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        match input.split_whitespace().collect::<Vec<_>>().as_slice() {
            [] => continue,
            ["quit" | "exit"] => break,
            ["?"] => help_command_interface(),
            ["list"] => {
                for ws in service.workspaces() {
                    println!(
                        "{:<16} windows={} key={:?} desktop={:?}",
                        ws.name,
                        ws.windows.len(),
                        ws.shortcut_key,
                        ws.desktop()
                    );
                }
            }
            ["windows"] => {
                for w in host.all_windows() {
                    println!(
                        "{:>4} {:<24} {:<20} {} on {}{}",
                        w.id,
                        w.app_id,
                        w.title,
                        w.frame,
                        w.display,
                        if w.visible { "" } else { " (hidden)" }
                    );
                }
            }
            ["press", key] => {
                let Some(key) = key.chars().next() else {
                    continue;
                };
                let combo = KeyCombo::new(&service.config().hotkeys.modifiers, key);
                if !host.press(&combo) {
                    println!("nothing bound to {combo}");
                }
                service.drain().await;
            }
            ["move", id, x, y, w, h] => {
                let numbers = [x, y, w, h].map(|v| v.parse::<f64>().ok());
                match (id.parse::<u64>(), numbers) {
                    (Ok(id), [Some(x), Some(y), Some(w), Some(h)]) => {
                        host.drag_window(id, Rect::new(x, y, w, h));
                    }
                    _ => println!("usage: move <id> <x> <y> <w> <h>"),
                }
            }
            _ => match parse_command(input) {
                Ok(command) => service.dispatch(command).await,
                Err(message) => println!("{message}"),
            },
        }

        let notes = host.notifications();
        for note in notes.iter().skip(seen) {
            println!("» {note}");
        }
        seen = notes.len();
    }

    service.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_keys_must_be_a_single_character() {
        assert_eq!(
            parse_command("save Work ab"),
            Err("shortcut `ab` must be a single letter or digit".to_string())
        );
        assert!(parse_command("save Work w extra").is_err());
        assert!(matches!(
            parse_command("save Work W"),
            Ok(Command::Save { shortcut: Some('w'), .. })
        ));
        assert!(matches!(
            parse_command("save Work"),
            Ok(Command::Save { shortcut: None, .. })
        ));
    }
}

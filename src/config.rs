use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::host::Modifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_path: PathBuf,
    /// Case-insensitive substring of the managed display's name.
    pub display_pattern: String,
    pub tolerance_px: f64,
    /// System-shell applications never captured.
    pub ignored_apps: Vec<String>,
    pub hotkeys: HotkeyConfig,
    pub timing: Timing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: Self::config_dir().join("workspaces.json"),
            display_pattern: String::new(),
            tolerance_px: 50.0,
            ignored_apps: vec!["com.apple.dock".to_string(), "com.apple.finder".to_string()],
            hotkeys: HotkeyConfig::default(),
            timing: Timing::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    pub modifiers: Vec<Modifier>,
    pub desktop_modifiers: Vec<Modifier>,
    pub reload: char,
    pub console: char,
    pub toggle: char,
    pub save: char,
    pub hide: char,
    pub help: char,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            modifiers: vec![Modifier::Ctrl, Modifier::Alt, Modifier::Cmd],
            desktop_modifiers: vec![Modifier::Ctrl, Modifier::Alt],
            reload: 'r',
            console: 'c',
            toggle: 't',
            save: 's',
            hide: 'h',
            help: 'i',
        }
    }
}

impl HotkeyConfig {
    /// Keys of the built-in actions. Workspaces may never take these.
    pub fn reserved(&self) -> [char; 6] {
        [
            self.reload,
            self.console,
            self.toggle,
            self.save,
            self.hide,
            self.help,
        ]
        .map(|c| c.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub launch_wait_ms: u64,
    pub launch_attempts: u32,
    pub create_wait_ms: u64,
    pub max_create_attempts: u32,
    pub stagger_ms: u64,
    pub switch_wait_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            launch_wait_ms: 1000,
            launch_attempts: 3,
            create_wait_ms: 500,
            max_create_attempts: 5,
            stagger_ms: 300,
            switch_wait_ms: 500,
        }
    }
}

impl Timing {
    /// Wait after the `attempt`-th launch request (0-based), doubling each time.
    pub fn launch_wait(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.launch_wait_ms.saturating_mul(1 << attempt.min(6)))
    }

    pub fn create_wait(&self) -> Duration {
        Duration::from_millis(self.create_wait_ms)
    }

    pub fn stagger(&self, index: usize) -> Duration {
        Duration::from_millis(self.stagger_ms.saturating_mul(index as u64))
    }

    pub fn switch_wait(&self) -> Duration {
        Duration::from_millis(self.switch_wait_ms)
    }
}

impl Config {
    fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("winstash")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Loads the config file, writing the defaults first when it is missing.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            Self::default().save()?;
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string(self).context("failed to serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }
}

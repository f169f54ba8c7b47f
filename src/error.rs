use std::path::PathBuf;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("workspace name is empty")]
    EmptyName,
    #[error("shortcut `{0}` must be a single letter or digit")]
    MalformedKey(String),
    #[error("shortcut `{0}` is reserved")]
    ReservedKey(char),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("a workspace named `{0}` already exists")]
    NameDeclined(String),
    #[error("shortcut `{key}` stays with `{holder}`")]
    ShortcutCancelled { key: char, holder: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode workspaces: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum HostError {
    #[error("window {0} no longer exists")]
    NoSuchWindow(u64),
    #[error("application `{0}` cannot be launched")]
    NotLaunchable(String),
    #[error("application `{0}` cannot create windows")]
    CannotCreateWindow(String),
    #[error("hotkey `{0}` was rejected")]
    BindingFailure(String),
    #[error("desktop operation failed: {0}")]
    Desktop(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DesktopError {
    #[error("desktop indexing is not supported")]
    Unsupported,
    #[error("desktop {0} does not exist")]
    NoSuchOrdinal(usize),
    #[error("desktop {ordinal} requested but only {count} exist after creation stalled")]
    CreationStalled { ordinal: usize, count: usize },
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Desktop(#[from] DesktopError),
    #[error("no workspace named `{0}`")]
    NotFound(String),
    #[error("no display matches `{0}`")]
    NoManagedDisplay(String),
    #[error("input cancelled")]
    Dismissed,
    #[error("restore was superseded")]
    Cancelled,
}

pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;

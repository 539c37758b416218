//! On-disk layout of a workspace: `.satchel/` holding the config, the
//! SQLite state and an append-only log.

use crate::config::{DEFAULT_SERVER_URL, WorkspaceConfig, load_config, save_config};
use satchel_core::{SatchelError, SatchelResult};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const WORKSPACE_DIR_NAME: &str = ".satchel";
pub const LOG_FILE_NAME: &str = "satchel.log";

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub satchel_dir: PathBuf,
    pub config_path: PathBuf,
    pub state_db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn from_root(root: PathBuf) -> Self {
        let satchel_dir = root.join(WORKSPACE_DIR_NAME);
        Self {
            config_path: satchel_dir.join("config.toml"),
            state_db_path: satchel_dir.join("state.db"),
            logs_dir: satchel_dir.join("logs"),
            root,
            satchel_dir,
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join(LOG_FILE_NAME)
    }

    pub fn is_initialized(&self) -> bool {
        self.satchel_dir.is_dir()
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceInitResult {
    pub paths: WorkspacePaths,
    /// Paths that did not exist before this run.
    pub created: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Dir,
    File,
}

/// Creates whatever part of the layout is missing. An existing config is
/// validated, never rewritten.
pub fn init_workspace(
    target: Option<&Path>,
    server: Option<&str>,
) -> SatchelResult<WorkspaceInitResult> {
    let paths = WorkspacePaths::from_root(root_or_cwd(target)?);
    let mut created = Vec::new();

    for dir in [&paths.root, &paths.satchel_dir, &paths.logs_dir] {
        ensure(dir, Entry::Dir, &mut created)?;
    }
    ensure(&paths.state_db_path, Entry::File, &mut created)?;

    if paths.config_path.exists() {
        load_config(&paths)?;
    } else {
        let config = WorkspaceConfig::with_default_server(server.unwrap_or(DEFAULT_SERVER_URL));
        save_config(&paths, &config)?;
        created.push(paths.config_path.clone());
    }

    Ok(WorkspaceInitResult { paths, created })
}

pub fn resolve_workspace(explicit: Option<&Path>) -> SatchelResult<WorkspacePaths> {
    let paths = WorkspacePaths::from_root(root_or_cwd(explicit)?);
    if !paths.is_initialized() {
        let root = paths.root.display();
        return Err(SatchelError::usage(format!(
            "workspace is not initialized at '{root}'; run `satchel init --workspace {root}` first"
        )));
    }
    Ok(paths)
}

/// Opens the workspace log for appending. `None` until `init` has created
/// the logs directory.
pub fn open_log_file(paths: &WorkspacePaths) -> SatchelResult<Option<File>> {
    if !paths.logs_dir.is_dir() {
        return Ok(None);
    }

    let path = paths.log_path();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map(Some)
        .map_err(|err| SatchelError::io(format!("failed to open log '{}': {err}", path.display())))
}

pub fn absolutize(path: &Path) -> SatchelResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(current_dir()?.join(path))
}

fn root_or_cwd(target: Option<&Path>) -> SatchelResult<PathBuf> {
    match target {
        Some(path) => absolutize(path),
        None => current_dir(),
    }
}

fn current_dir() -> SatchelResult<PathBuf> {
    std::env::current_dir()
        .map_err(|err| SatchelError::io(format!("failed to resolve current directory: {err}")))
}

fn ensure(path: &Path, entry: Entry, created: &mut Vec<PathBuf>) -> SatchelResult<()> {
    if path.exists() {
        let matches = match entry {
            Entry::Dir => path.is_dir(),
            Entry::File => path.is_file(),
        };
        if !matches {
            let expected = if entry == Entry::Dir { "directory" } else { "file" };
            return Err(SatchelError::io(format!(
                "expected '{}' to be a {expected}",
                path.display()
            )));
        }
        return Ok(());
    }

    let result = match entry {
        Entry::Dir => fs::create_dir_all(path),
        Entry::File => fs::write(path, []),
    };
    result.map_err(|err| SatchelError::io(format!("failed to create '{}': {err}", path.display())))?;
    created.push(path.to_path_buf());
    Ok(())
}

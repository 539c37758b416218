use satchel_core::{SatchelError, SatchelResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const CONSUMER_KEY_VAR: &str = "POCKET_CONSUMER_KEY";
const ACCESS_TOKEN_VAR: &str = "POCKET_ACCESS_TOKEN";
const ENV_FILE_VAR: &str = "SATCHEL_ENV_FILE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvCredentials {
    pub consumer_key: Option<String>,
    pub access_token: Option<String>,
}

/// Process environment wins over a `.env` file, per variable.
pub fn resolve_env_credentials(workspace_root: &Path) -> SatchelResult<EnvCredentials> {
    let mut credentials = EnvCredentials {
        consumer_key: non_empty_var(CONSUMER_KEY_VAR),
        access_token: non_empty_var(ACCESS_TOKEN_VAR),
    };

    if credentials.consumer_key.is_some() && credentials.access_token.is_some() {
        return Ok(credentials);
    }

    if let Some(path) = resolve_env_file(workspace_root) {
        let values = load_env_file(&path)?;
        if credentials.consumer_key.is_none() {
            credentials.consumer_key = non_empty(values.get(CONSUMER_KEY_VAR));
        }
        if credentials.access_token.is_none() {
            credentials.access_token = non_empty(values.get(ACCESS_TOKEN_VAR));
        }
    }

    Ok(credentials)
}

fn non_empty_var(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok().as_ref())
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_env_file(workspace_root: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_FILE_VAR) {
        let candidate = PathBuf::from(path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if let Ok(cwd) = std::env::current_dir()
        && let Some(found) = search_upwards_for(&cwd, Path::new(".env"))
    {
        return Some(found);
    }

    search_upwards_for(workspace_root, Path::new(".env"))
}

fn search_upwards_for(start: &Path, relative_path: &Path) -> Option<PathBuf> {
    let mut cursor = Some(start);

    while let Some(path) = cursor {
        let candidate = path.join(relative_path);
        if candidate.is_file() {
            return Some(candidate);
        }
        cursor = path.parent();
    }

    None
}

fn load_env_file(path: &Path) -> SatchelResult<BTreeMap<String, String>> {
    let raw = fs::read_to_string(path).map_err(|err| {
        SatchelError::io(format!(
            "failed to read env file '{}': {}",
            path.display(),
            err
        ))
    })?;

    Ok(parse_env(&raw))
}

fn parse_env(raw: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let mut value = value.trim().to_string();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = value[1..value.len() - 1].to_string();
        }

        vars.insert(key.to_string(), value);
    }

    vars
}

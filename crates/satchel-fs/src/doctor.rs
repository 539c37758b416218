use crate::config::{load_config, resolve_profile};
use crate::workspace::WorkspacePaths;
use satchel_core::SatchelResult;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub ok: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub workspace: String,
    pub healthy: bool,
    pub checks: Vec<DoctorCheck>,
    pub active_profile: Option<String>,
    pub server: Option<String>,
}

/// `env_consumer_key` reports whether a consumer key is available from the
/// environment, which makes a missing profile key acceptable.
pub fn run_doctor(
    paths: &WorkspacePaths,
    profile_override: Option<&str>,
    server_override: Option<&str>,
    env_consumer_key: bool,
) -> SatchelResult<DoctorReport> {
    let mut checks = vec![
        path_check("workspace_root", paths.root.is_dir(), &paths.root),
        path_check(
            "satchel_directory",
            paths.satchel_dir.is_dir(),
            &paths.satchel_dir,
        ),
        path_check("logs_directory", paths.logs_dir.is_dir(), &paths.logs_dir),
        path_check(
            "config_file",
            paths.config_path.is_file(),
            &paths.config_path,
        ),
        path_check(
            "state_db_file",
            paths.state_db_path.is_file(),
            &paths.state_db_path,
        ),
    ];

    let mut active_profile = None;
    let mut server = None;

    if paths.config_path.is_file() {
        match load_config(paths) {
            Ok(config) => match resolve_profile(&config, profile_override, server_override) {
                Ok(resolved) => {
                    checks.push(DoctorCheck {
                        name: "active_profile".to_string(),
                        ok: true,
                        details: format!("{} ({})", resolved.name, resolved.server),
                    });
                    checks.push(DoctorCheck {
                        name: "consumer_key".to_string(),
                        ok: resolved.consumer_key.is_some() || env_consumer_key,
                        details: if resolved.consumer_key.is_some() {
                            "configured in profile".to_string()
                        } else if env_consumer_key {
                            "provided by environment".to_string()
                        } else {
                            "missing; set POCKET_CONSUMER_KEY or `satchel profile set --consumer-key`"
                                .to_string()
                        },
                    });
                    active_profile = Some(resolved.name);
                    server = Some(resolved.server);
                }
                Err(err) => checks.push(DoctorCheck {
                    name: "active_profile".to_string(),
                    ok: false,
                    details: err.message,
                }),
            },
            Err(err) => checks.push(DoctorCheck {
                name: "config_parse".to_string(),
                ok: false,
                details: err.message,
            }),
        }
    }

    let healthy = checks.iter().all(|check| check.ok);

    Ok(DoctorReport {
        workspace: paths.root.display().to_string(),
        healthy,
        checks,
        active_profile,
        server,
    })
}

fn path_check(name: &str, ok: bool, path: &std::path::Path) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        ok,
        details: path.display().to_string(),
    }
}

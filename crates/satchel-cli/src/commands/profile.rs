use satchel_core::{ExitCode, SatchelResult};
use satchel_fs::{
    WORKSPACE_DIR_NAME, init_workspace, list_profiles, load_config, resolve_profile,
    resolve_workspace, run_doctor, save_config, set_active_profile, set_profile,
};
use satchel_store::{SqliteStore, keys, load_json, resolve_env_credentials};
use serde_json::json;

use crate::{
    GlobalOptions, InitOutput, ProfileChangedOutput, ProfileCommand, print_json, workspace_target,
};

pub(crate) fn cmd_init(globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    let target = workspace_target(globals)?;
    let result = init_workspace(Some(&target), globals.server.as_deref())?;

    let output = InitOutput {
        workspace: result.paths.root.display().to_string(),
        created: result
            .created
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
    };

    if globals.json {
        print_json(&json!({"ok": true, "result": output}))?;
    } else {
        println!("Workspace initialized: {}", output.workspace);
        if output.created.is_empty() {
            println!("Created: none");
        } else {
            println!("Created:");
            for path in &output.created {
                println!("  - {path}");
            }
        }
    }

    Ok(ExitCode::Success)
}

pub(crate) fn cmd_doctor(globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    let target = workspace_target(globals)?;
    let paths = resolve_workspace(Some(&target))?;
    let env = resolve_env_credentials(&paths.root)?;

    let report = run_doctor(
        &paths,
        globals.profile.as_deref(),
        globals.server.as_deref(),
        env.consumer_key.is_some(),
    )?;

    let token_stored = match report.active_profile.as_deref() {
        Some(profile) => {
            let store = SqliteStore::from_workspace(&paths, profile)?;
            load_json::<String>(&store, keys::ACCESS_TOKEN)?.is_some()
        }
        None => false,
    };
    let token_env = env.access_token.is_some();
    let auth_ready = token_stored || token_env;

    if globals.json {
        print_json(&json!({
            "ok": report.healthy && auth_ready,
            "result": {
                "workspace": report.workspace,
                "healthy": report.healthy,
                "checks": report.checks,
                "active_profile": report.active_profile,
                "server": report.server,
                "auth": {
                    "stored_token": token_stored,
                    "env_token": token_env,
                    "ready": auth_ready
                }
            }
        }))?;
    } else {
        println!("Workspace: {}", report.workspace);
        println!(
            "Health: {}",
            if report.healthy { "healthy" } else { "degraded" }
        );

        for check in &report.checks {
            let prefix = if check.ok { "OK" } else { "FAIL" };
            println!("[{}] {} -> {}", prefix, check.name, check.details);
        }

        println!(
            "[{}] access_token -> {}",
            if auth_ready { "OK" } else { "FAIL" },
            if token_stored {
                "stored for active profile"
            } else if token_env {
                "POCKET_ACCESS_TOKEN available; run `satchel auth login` to store it"
            } else {
                "missing; run `satchel auth begin` or `satchel auth login --token`"
            }
        );
    }

    Ok(if report.healthy && auth_ready {
        ExitCode::Success
    } else {
        ExitCode::Io
    })
}

pub(crate) fn cmd_profile(command: ProfileCommand, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    let target = workspace_target(globals)?;
    if !target.join(WORKSPACE_DIR_NAME).is_dir() {
        init_workspace(Some(&target), globals.server.as_deref())?;
    }

    let paths = resolve_workspace(Some(&target))?;
    let mut config = load_config(&paths)?;

    match command {
        ProfileCommand::List => {
            let profiles = list_profiles(&config);
            if globals.json {
                print_json(
                    &json!({"ok": true, "result": {"active_profile": config.active_profile, "profiles": profiles}}),
                )?;
            } else {
                println!("Active profile: {}", config.active_profile);
                for profile in profiles {
                    let marker = if profile.active { "*" } else { " " };
                    let key = if profile.has_consumer_key { "" } else { ", no consumer key" };
                    println!("{} {} ({}{})", marker, profile.name, profile.server, key);
                }
            }

            Ok(ExitCode::Success)
        }
        ProfileCommand::Use { name } => {
            set_active_profile(&mut config, &name)?;
            save_config(&paths, &config)?;

            let resolved = resolve_profile(&config, Some(&name), globals.server.as_deref())?;
            let output = ProfileChangedOutput {
                profile: resolved.name,
                server: resolved.server,
                has_consumer_key: resolved.consumer_key.is_some(),
            };

            if globals.json {
                print_json(&json!({"ok": true, "result": output}))?;
            } else {
                println!(
                    "Active profile set to '{}' ({})",
                    output.profile, output.server
                );
            }

            Ok(ExitCode::Success)
        }
        ProfileCommand::Set {
            name,
            server_url,
            consumer_key,
        } => {
            let target_profile = name.unwrap_or_else(|| config.active_profile.clone());
            let server = server_url
                .or_else(|| {
                    config
                        .profiles
                        .get(&target_profile)
                        .map(|profile| profile.server.clone())
                })
                .unwrap_or_else(|| satchel_fs::DEFAULT_SERVER_URL.to_string());
            set_profile(&mut config, &target_profile, &server, consumer_key.as_deref());
            save_config(&paths, &config)?;

            let resolved = resolve_profile(&config, Some(&target_profile), None)?;
            let output = ProfileChangedOutput {
                profile: resolved.name,
                server: resolved.server,
                has_consumer_key: resolved.consumer_key.is_some(),
            };

            if globals.json {
                print_json(&json!({"ok": true, "result": output}))?;
            } else {
                println!(
                    "Profile '{}' set to {}{}",
                    output.profile,
                    output.server,
                    if output.has_consumer_key { " with consumer key" } else { "" }
                );
            }

            Ok(ExitCode::Success)
        }
    }
}

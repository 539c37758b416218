use satchel_core::{ExitCode, SatchelError, SatchelResult};
use satchel_store::{KeyValueStore, keys, load_json, save_json};
use serde_json::json;

use crate::{AuthCommand, EngineContext, GlobalOptions, print_json, with_context};

pub(crate) fn cmd_auth(command: AuthCommand, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    with_context(globals, |ctx| match command {
        AuthCommand::Login { token, username } => {
            let token = token
                .filter(|token| !token.trim().is_empty())
                .or_else(|| ctx.env_access_token.clone())
                .ok_or_else(|| {
                    SatchelError::usage(
                        "missing access token; pass --token or set POCKET_ACCESS_TOKEN, or use `satchel auth begin`",
                    )
                })?;

            save_json(&ctx.store, keys::ACCESS_TOKEN, token.trim())?;
            if let Some(username) = &username {
                save_json(&ctx.store, keys::USERNAME, username)?;
            }
            ctx.store.remove(keys::REQUEST_TOKEN)?;

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "server": ctx.server,
                        "username": username,
                    }
                }))?;
            } else {
                println!("Access token stored for profile '{}'", ctx.profile);
                println!("State: {}", ctx.paths.state_db_path.display());
            }

            Ok(ExitCode::Success)
        }
        AuthCommand::Begin { redirect_uri } => {
            let api = ctx.api()?;
            let code = api.request_token(&redirect_uri)?;
            save_json(&ctx.store, keys::REQUEST_TOKEN, &code)?;
            let authorize_url = api.authorize_url(&code, &redirect_uri);

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "authorize_url": authorize_url,
                    }
                }))?;
            } else {
                println!("Open this URL and approve access:");
                println!("  {authorize_url}");
                println!("Then run `satchel auth complete`.");
            }

            Ok(ExitCode::Success)
        }
        AuthCommand::Complete => {
            let code = load_json::<String>(&ctx.store, keys::REQUEST_TOKEN)?.ok_or_else(|| {
                SatchelError::usage("no pending authorization; run `satchel auth begin` first")
            })?;

            let authorization = ctx.api()?.authorize(&code)?;
            save_json(&ctx.store, keys::ACCESS_TOKEN, &authorization.access_token)?;
            if let Some(username) = &authorization.username {
                save_json(&ctx.store, keys::USERNAME, username)?;
            }
            ctx.store.remove(keys::REQUEST_TOKEN)?;

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "server": ctx.server,
                        "username": authorization.username,
                    }
                }))?;
            } else {
                println!("Authenticated with {}", ctx.server);
                println!("Profile: {}", ctx.profile);
                if let Some(username) = &authorization.username {
                    println!("Username: {username}");
                }
            }

            Ok(ExitCode::Success)
        }
        AuthCommand::Status => status(&ctx, globals),
        AuthCommand::Logout => {
            for key in [
                keys::ACCESS_TOKEN,
                keys::USERNAME,
                keys::REQUEST_TOKEN,
                keys::ITEMS,
                keys::LAST_RETRIEVE,
                keys::LAST_FULL_SYNC_AT_VERSION,
            ] {
                ctx.store.remove(key)?;
            }

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "profile": ctx.profile,
                        "logged_out": true,
                    }
                }))?;
            } else {
                println!("Logged out of profile '{}'; local cache cleared", ctx.profile);
            }

            Ok(ExitCode::Success)
        }
    })
}

fn status(ctx: &EngineContext, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    let token = load_json::<String>(&ctx.store, keys::ACCESS_TOKEN)?;
    let username = load_json::<String>(&ctx.store, keys::USERNAME)?;
    let pending = load_json::<String>(&ctx.store, keys::REQUEST_TOKEN)?.is_some();
    let authenticated = token.is_some();

    if globals.json {
        print_json(&json!({
            "ok": authenticated,
            "result": {
                "profile": ctx.profile,
                "server": ctx.server,
                "authenticated": authenticated,
                "username": username,
                "pending_authorization": pending,
                "consumer_key": ctx.consumer_key.is_some(),
            }
        }))?;
    } else {
        println!("Server: {}", ctx.server);
        println!("Profile: {}", ctx.profile);
        println!("Authenticated: {}", if authenticated { "yes" } else { "no" });
        if let Some(username) = &username {
            println!("Username: {username}");
        }
        if pending {
            println!("Pending authorization: run `satchel auth complete`");
        }
    }

    Ok(if authenticated {
        ExitCode::Success
    } else {
        ExitCode::Auth
    })
}

mod commands;

use clap::{Parser, Subcommand};
use satchel_api::PocketApi;
use satchel_core::{ExitCode, RecordingSink, SatchelError, SatchelResult};
use satchel_fs::{
    Settings, WorkspacePaths, absolutize, init_workspace, load_config, open_log_file,
    resolve_profile, resolve_workspace,
};
use satchel_store::{SqliteStore, resolve_env_credentials};
use satchel_sync::{SyncEngine, SyncSettings, TracingNotifier};
use serde::Serialize;
use serde_json::json;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "satchel",
    version,
    about = "Read-it-later list with a local cache of your Pocket items",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true)]
    profile: Option<String>,

    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Init,
    Doctor,
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Bring the local cache up to date.
    Sync {
        /// Re-download everything instead of fetching changes.
        #[arg(long)]
        force: bool,

        #[command(subcommand)]
        command: Option<SyncCommand>,
    },
    /// Search and page through cached items.
    List {
        query: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long)]
        per_page: Option<usize>,
        /// Show every match on one page.
        #[arg(long, conflicts_with = "per_page")]
        all: bool,
        /// Retrieve items before listing.
        #[arg(long)]
        sync: bool,
    },
    Add {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Mark an item as read.
    Archive {
        id: String,
    },
    Delete {
        id: String,
    },
    Favorite {
        id: String,
    },
    Unfavorite {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Replaces every tag; repeat for several. Omit to keep the current tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },
    /// Run one JSON-encoded command, e.g. '{"action":"retrieve-items"}'.
    Dispatch {
        payload: String,
    },
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    List,
    Use {
        name: String,
    },
    Set {
        #[arg(long)]
        name: Option<String>,

        #[arg(long = "server-url")]
        server_url: Option<String>,

        #[arg(long)]
        consumer_key: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Store an access token given directly or via POCKET_ACCESS_TOKEN.
    Login {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Start the OAuth handshake and print the URL to approve.
    Begin {
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
    },
    /// Exchange the approved request token for an access token.
    Complete,
    Status,
    Logout,
}

#[derive(Debug, Subcommand)]
enum SyncCommand {
    Status,
    /// Drop the cache and cursor, then run a full fetch.
    Reset,
}

const DEFAULT_REDIRECT_URI: &str = "satchel:authorizationFinished";

#[derive(Debug, Clone)]
struct GlobalOptions {
    profile: Option<String>,
    workspace: Option<PathBuf>,
    server: Option<String>,
    json: bool,
    yes: bool,
}

struct EngineContext {
    paths: WorkspacePaths,
    profile: String,
    server: String,
    consumer_key: Option<String>,
    env_access_token: Option<String>,
    settings: Settings,
    store: SqliteStore,
}

impl EngineContext {
    fn api(&self) -> SatchelResult<PocketApi> {
        PocketApi::new(&self.server, self.consumer_key.as_deref().unwrap_or_default())
    }

    fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            retrieve_interval_secs: i64::try_from(self.settings.retrieve_interval_minutes)
                .unwrap_or(i64::MAX / 60)
                .saturating_mul(60),
            page_size: self.settings.page_size,
            close_tab_on_add: self.settings.close_tab_on_add,
            close_tab_on_read: self.settings.close_tab_on_read,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Builds an engine over this profile's store and runs `operation`
    /// with it. Events emitted along the way are collected in `events`.
    fn run_engine<T>(
        &self,
        events: &RecordingSink,
        operation: impl FnOnce(&mut SyncEngine<'_>) -> SatchelResult<T>,
    ) -> SatchelResult<T> {
        let api = self.api()?;
        let mut engine = SyncEngine::new(&api, &self.store, events)
            .with_notifier(&TracingNotifier)
            .with_settings(self.sync_settings());
        operation(&mut engine)
    }
}

#[derive(Debug, Serialize)]
struct InitOutput {
    workspace: String,
    created: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProfileChangedOutput {
    profile: String,
    server: String,
    has_consumer_key: bool,
}

fn main() {
    let cli = Cli::parse();
    let globals = GlobalOptions {
        profile: cli.profile,
        workspace: cli.workspace,
        server: cli.server,
        json: cli.json,
        yes: cli.yes,
    };

    let log_file = workspace_target(&globals)
        .ok()
        .map(WorkspacePaths::from_root)
        .and_then(|paths| open_log_file(&paths).ok().flatten());
    configure_logging(cli.debug, cli.json, cli.no_color, log_file);

    let result = run_command(cli.command, &globals);

    let exit = match result {
        Ok(code) => code,
        Err(error) => {
            render_error(&error, globals.json);
            error.exit_code()
        }
    };

    std::process::exit(exit.as_i32());
}

/// Logs go to stderr, and to `.satchel/logs/satchel.log` as JSON lines once
/// the workspace exists.
fn configure_logging(debug: bool, json: bool, no_color: bool, log_file: Option<File>) {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });
    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);

    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(!no_color)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn run_command(command: Command, globals: &GlobalOptions) -> SatchelResult<ExitCode> {
    match command {
        Command::Init => commands::profile::cmd_init(globals),
        Command::Doctor => commands::profile::cmd_doctor(globals),
        Command::Profile { command } => commands::profile::cmd_profile(command, globals),
        Command::Auth { command } => commands::auth::cmd_auth(command, globals),
        Command::Sync { force, command } => commands::sync::cmd_sync(force, command, globals),
        Command::List {
            query,
            page,
            per_page,
            all,
            sync,
        } => commands::items::cmd_list(&query.join(" "), page, per_page, all, sync, globals),
        Command::Add { urls, title } => commands::items::cmd_add(urls, title, globals),
        Command::Archive { id } => commands::items::cmd_archive(&id, globals),
        Command::Delete { id } => commands::items::cmd_delete(&id, globals),
        Command::Favorite { id } => commands::items::cmd_favorite(&id, true, globals),
        Command::Unfavorite { id } => commands::items::cmd_favorite(&id, false, globals),
        Command::Update {
            id,
            title,
            tags,
            clear_tags,
        } => commands::items::cmd_update(&id, title, tags, clear_tags, globals),
        Command::Dispatch { payload } => commands::items::cmd_dispatch(&payload, globals),
    }
}

fn with_context<F>(globals: &GlobalOptions, run: F) -> SatchelResult<ExitCode>
where
    F: FnOnce(EngineContext) -> SatchelResult<ExitCode>,
{
    let target = workspace_target(globals)?;
    if !target.join(satchel_fs::WORKSPACE_DIR_NAME).is_dir() {
        init_workspace(Some(&target), globals.server.as_deref())?;
    }

    let paths = resolve_workspace(Some(&target))?;
    let config = load_config(&paths)?;
    let resolved = resolve_profile(
        &config,
        globals.profile.as_deref(),
        globals.server.as_deref(),
    )?;
    let env = resolve_env_credentials(&paths.root)?;
    let store = SqliteStore::from_workspace(&paths, &resolved.name)?;

    run(EngineContext {
        paths,
        profile: resolved.name,
        server: resolved.server,
        consumer_key: env.consumer_key.or(resolved.consumer_key),
        env_access_token: env.access_token,
        settings: config.settings,
        store,
    })
}

fn workspace_target(globals: &GlobalOptions) -> SatchelResult<PathBuf> {
    if let Some(path) = &globals.workspace {
        return absolutize(path);
    }

    std::env::current_dir().map_err(|err| {
        SatchelError::io(format!(
            "failed to resolve current directory for default workspace: {err}"
        ))
    })
}

fn render_error(error: &SatchelError, json_output: bool) {
    if json_output {
        let payload = json!({
            "ok": false,
            "error": error,
        });
        let serialized = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"ok\":false,\"error\":{\"kind\":\"io\",\"message\":\"failed to serialize error\"}}".to_string()
        });
        eprintln!("{serialized}");
    } else if let Some(delay) = error.reset_delay {
        eprintln!("error: {} (retry in {delay}s)", error.message);
    } else {
        eprintln!("error: {}", error.message);
    }
}

fn print_json<T: Serialize>(value: &T) -> SatchelResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| SatchelError::io(format!("failed to render JSON output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

use assert_cmd::Command;
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn init_creates_workspace_with_default_profile() {
    let workspace = temp_workspace();
    init_workspace(&workspace.path, "https://pocket.test");

    assert!(workspace.path.join(".satchel").join("config.toml").is_file());

    let output = run_command(&workspace.path, &["profile", "list", "--json"]);
    assert_eq!(output["ok"], true);
    assert_eq!(output["result"]["active_profile"], "default");
    assert_eq!(output["result"]["profiles"][0]["server"], "https://pocket.test");
}

#[test]
fn login_status_and_logout_round_trip() {
    let workspace = temp_workspace();
    init_workspace(&workspace.path, "https://pocket.test");

    let login = run_command(&workspace.path, &["auth", "login", "--token", "tok-1", "--username", "reader", "--json"]);
    assert_eq!(login["result"]["username"], "reader");

    let status = run_command(&workspace.path, &["auth", "status", "--json"]);
    assert_eq!(status["result"]["authenticated"], true);
    assert_eq!(status["result"]["username"], "reader");

    run_command(&workspace.path, &["auth", "logout", "--json"]);

    let mut cmd = base_command(&workspace.path);
    cmd.args(["auth", "status", "--json"]);
    cmd.assert().code(3);
}

#[test]
fn sync_then_list_filters_cached_items() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());
    login(&workspace.path);

    let first_page = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/get")
            .json_body_partial(json!({"offset": 0, "consumer_key": "ck-test", "access_token": "tok-1"}).to_string());
        then.status(200).json_body(json!({
            "status": 1,
            "since": 1_700_000_000,
            "list": {
                "1": {"item_id": "1", "given_url": "https://rust-lang.org", "given_title": "Rust", "favorite": "1", "status": "0", "time_added": "200", "sort_id": 0},
                "2": {"item_id": "2", "given_url": "https://cooking.example", "given_title": "Soup", "status": "0", "time_added": "100", "sort_id": 1}
            }
        }));
    });
    let last_page = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/get")
            .json_body_partial(json!({"offset": 2}).to_string());
        then.status(200).json_body(json!({"status": 2, "since": 1_700_000_100, "list": []}));
    });

    let sync = run_command(&workspace.path, &["sync", "--debug", "--json"]);
    first_page.assert_hits(1);
    last_page.assert_hits(1);
    let log = fs::read_to_string(workspace.path.join(".satchel").join("logs").join("satchel.log"))
        .expect("workspace log");
    assert!(log.contains("retrieve strategy decided"));
    assert_eq!(sync["result"]["strategy"]["kind"], "full");
    assert_eq!(sync["result"]["cached_total"], 2);
    assert_eq!(sync["events"][0]["action"], "retrieved-items");

    let listed = run_command(&workspace.path, &["list", "--json"]);
    assert_eq!(listed["result"]["total"], 2);
    assert_eq!(listed["result"]["items"][0]["id"], "1");

    let faved = run_command(&workspace.path, &["list", "is:faved", "--json"]);
    assert_eq!(faved["result"]["total"], 1);
    assert_eq!(faved["result"]["items"][0]["title"], "Rust");

    let status = run_command(&workspace.path, &["sync", "status", "--json"]);
    assert_eq!(status["result"]["cached_items"], 2);
    assert_eq!(status["result"]["last_retrieve"], 1_700_000_100);
    assert_eq!(status["result"]["status"]["last_strategy"], "full");
}

#[test]
fn add_and_archive_through_the_binary() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());
    login(&workspace.path);

    let add = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/add")
            .json_body_partial(json!({"url": "https://a.com", "title": "A"}).to_string());
        then.status(200).json_body(json!({"item": {"item_id": "31"}, "status": 1}));
    });
    let archive = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/send")
            .json_body_partial(json!({"actions": [{"action": "archive", "item_id": "31"}]}).to_string());
        then.status(200).json_body(json!({"status": 1, "action_results": [true]}));
    });

    let added = run_command(&workspace.path, &["add", "https://a.com", "--title", "A", "--json"]);
    assert_eq!(added["result"]["ids"], json!(["31"]));
    assert_eq!(added["events"][0]["action"], "added-item");

    let again = run_command(&workspace.path, &["add", "https://a.com", "--json"]);
    assert_eq!(again["events"][0]["action"], "already-in-list");
    add.assert_hits(1);

    let archived = run_command(&workspace.path, &["archive", "31", "--json"]);
    assert_eq!(archived["events"][0], json!({"action": "marked-as-read", "id": "31"}));
    archive.assert_hits(1);

    let listed = run_command(&workspace.path, &["list", "--json"]);
    assert_eq!(listed["result"]["total"], 0);
}

#[test]
fn rate_limited_add_exits_with_reset_delay() {
    let server = MockServer::start();
    let workspace = temp_workspace();
    init_workspace(&workspace.path, &server.base_url());
    login(&workspace.path);

    server.mock(|when, then| {
        when.method(POST).path("/v3/add");
        then.status(403)
            .header("X-Limit-User-Remaining", "0")
            .header("X-Limit-User-Reset", "120");
    });

    let mut cmd = base_command(&workspace.path);
    cmd.args(["add", "https://b.com", "--json"]);
    let assert = cmd.assert().code(5);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    let payload = last_json_object(&stderr);

    assert_eq!(payload["ok"], false);
    assert_eq!(payload["error"]["kind"], "rate_limit");
    assert_eq!(payload["error"]["reset_delay"], 120);
}

#[test]
fn dispatch_runs_json_commands() {
    let workspace = temp_workspace();
    init_workspace(&workspace.path, "https://pocket.test");
    login(&workspace.path);

    let reply = run_command(
        &workspace.path,
        &["dispatch", r#"{"action":"read-items","query":"anything"}"#],
    );
    assert_eq!(reply["result"]["kind"], "items");
    assert_eq!(reply["result"]["total"], 0);

    let mut cmd = base_command(&workspace.path);
    cmd.args(["dispatch", r#"{"action":"teleport"}"#]);
    cmd.assert().code(2);
}

#[test]
fn sync_reset_requires_confirmation() {
    let workspace = temp_workspace();
    init_workspace(&workspace.path, "https://pocket.test");

    let mut cmd = base_command(&workspace.path);
    cmd.args(["sync", "reset"]);
    cmd.assert().code(2);
}

fn login(workspace: &Path) {
    run_command(workspace, &["auth", "login", "--token", "tok-1", "--json"]);
}

/// Logs may precede the error payload on stderr; the payload is the last
/// pretty-printed object.
fn last_json_object(stderr: &str) -> Value {
    let start = stderr.rfind("\n{").map_or(0, |index| index + 1);
    serde_json::from_str(stderr[start..].trim()).expect("json error payload")
}

fn init_workspace(workspace: &Path, server_url: &str) {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("satchel");
    cmd.args([
        "init",
        "--workspace",
        workspace.to_str().expect("workspace path"),
        "--server",
        server_url,
        "--json",
    ]);

    cmd.assert().success();
}

fn run_command(workspace: &Path, args: &[&str]) -> Value {
    let mut cmd = base_command(workspace);
    cmd.args(args);

    let assert = cmd.assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    serde_json::from_str(&stdout).expect("json stdout")
}

fn base_command(workspace: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("satchel");
    cmd.current_dir(workspace)
        .env_remove("SATCHEL_ENV_FILE")
        .env_remove("POCKET_ACCESS_TOKEN")
        .env_remove("RUST_LOG")
        .env("POCKET_CONSUMER_KEY", "ck-test")
        .args(["--workspace", workspace.to_str().expect("workspace path")]);
    cmd
}

#[derive(Debug)]
struct TestWorkspace {
    _temp: TempDir,
    path: PathBuf,
}

fn temp_workspace() -> TestWorkspace {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace_path = temp.path().join("workspace");
    fs::create_dir_all(&workspace_path).expect("create workspace dir");
    TestWorkspace {
        _temp: temp,
        path: workspace_path,
    }
}

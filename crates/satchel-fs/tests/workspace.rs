use satchel_core::ExitCode;
use satchel_fs::{
    DEFAULT_PROFILE, WorkspacePaths, init_workspace, load_config, open_log_file,
    resolve_workspace, run_doctor, save_config, set_active_profile, set_profile,
};
use std::io::Write;

#[test]
fn init_workspace_creates_expected_layout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("ws");

    let result =
        init_workspace(Some(&root), Some("https://pocket.example.com")).expect("init workspace");

    assert!(result.paths.root.is_dir());
    assert!(result.paths.satchel_dir.is_dir());
    assert!(result.paths.logs_dir.is_dir());
    assert!(result.paths.config_path.is_file());
    assert!(result.paths.state_db_path.is_file());
    assert!(result.created.contains(&result.paths.config_path));

    let config = load_config(&result.paths).expect("load config");
    assert_eq!(config.active_profile, DEFAULT_PROFILE);
    assert_eq!(
        config
            .profiles
            .get(DEFAULT_PROFILE)
            .map(|p| p.server.as_str()),
        Some("https://pocket.example.com")
    );
    assert_eq!(config.settings.retrieve_interval_minutes, 15);
}

#[test]
fn init_is_idempotent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("ws");

    init_workspace(Some(&root), None).expect("first init");
    let second = init_workspace(Some(&root), None).expect("second init");

    assert!(second.created.is_empty());
}

#[test]
fn resolve_workspace_fails_when_uninitialized() {
    let temp = tempfile::tempdir().expect("tempdir");

    let error =
        resolve_workspace(Some(temp.path())).expect_err("workspace should not be initialized");

    assert_eq!(error.exit_code(), ExitCode::Usage);
}

#[test]
fn profile_mutation_round_trip() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("ws");

    let result = init_workspace(Some(&root), None).expect("init workspace");
    let mut config = load_config(&result.paths).expect("load config");

    set_profile(&mut config, "work", "https://work.example.com", Some("ck-work"));
    set_active_profile(&mut config, "work").expect("set active profile");
    save_config(&result.paths, &config).expect("save config");

    let saved = load_config(&result.paths).expect("reload config");
    assert_eq!(saved.active_profile, "work");
    let work = saved.profiles.get("work").expect("work profile");
    assert_eq!(work.server, "https://work.example.com");
    assert_eq!(work.consumer_key.as_deref(), Some("ck-work"));
}

#[test]
fn doctor_flags_missing_consumer_key() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("ws");
    let result = init_workspace(Some(&root), None).expect("init workspace");

    let report = run_doctor(&result.paths, None, None, false).expect("doctor");
    assert!(!report.healthy);
    assert!(
        report
            .checks
            .iter()
            .any(|check| check.name == "consumer_key" && !check.ok)
    );

    let with_env = run_doctor(&result.paths, None, None, true).expect("doctor");
    assert!(with_env.healthy);
    assert_eq!(with_env.active_profile.as_deref(), Some(DEFAULT_PROFILE));
}

#[test]
fn log_file_opens_only_inside_initialized_workspace_and_appends() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().join("ws");

    let before = WorkspacePaths::from_root(root.clone());
    assert!(open_log_file(&before).expect("no workspace yet").is_none());

    let result = init_workspace(Some(&root), None).expect("init workspace");
    for line in ["first", "second"] {
        let mut file = open_log_file(&result.paths)
            .expect("open log")
            .expect("logs dir exists");
        writeln!(file, "{line}").expect("write log");
    }

    let written = std::fs::read_to_string(result.paths.log_path()).expect("read log");
    assert_eq!(written, "first\nsecond\n");
}

mod config;
mod doctor;
mod workspace;

pub use config::{
    CONFIG_VERSION, DEFAULT_PROFILE, DEFAULT_SERVER_URL, ProfileConfig, ProfileView,
    ResolvedProfile, Settings, WorkspaceConfig, list_profiles, load_config, resolve_profile,
    save_config, set_active_profile, set_profile,
};
pub use doctor::{DoctorCheck, DoctorReport, run_doctor};
pub use workspace::{
    LOG_FILE_NAME, WORKSPACE_DIR_NAME, WorkspaceInitResult, WorkspacePaths, absolutize,
    init_workspace, open_log_file, resolve_workspace,
};

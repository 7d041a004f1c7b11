use crate::infrastructure::config::{ensure_default_configs, read_reflection_schedule};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub database_path: PathBuf,
    pub logs_dir: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join("flowtrack.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    // Surface a malformed schedule at startup rather than on the first gate run.
    let _ = read_reflection_schedule(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        database_path,
        logs_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "flowtrack-bootstrap-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn bootstrap_creates_directories_configs_and_database() {
        let workspace = TempWorkspace::new();
        let result = bootstrap_workspace(&workspace.path).expect("bootstrap");

        assert!(result.config_dir.join("app.json").exists());
        assert!(result.config_dir.join("reflection.json").exists());
        assert!(result.database_path.exists());
        assert!(result.logs_dir.exists());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let workspace = TempWorkspace::new();
        bootstrap_workspace(&workspace.path).expect("first bootstrap");

        let marker = workspace.path.join("config").join("app.json");
        let before = fs::read_to_string(&marker).expect("read config");

        bootstrap_workspace(&workspace.path).expect("second bootstrap");
        let after = fs::read_to_string(&marker).expect("re-read config");
        assert_eq!(before, after);
    }

    #[test]
    fn bootstrap_rejects_broken_reflection_config() {
        let workspace = TempWorkspace::new();
        let config_dir = workspace.path.join("config");
        fs::create_dir_all(&config_dir).expect("create config dir");
        fs::write(
            config_dir.join("reflection.json"),
            "{ \"schema\": 99 }",
        )
        .expect("write broken config");

        assert!(bootstrap_workspace(&workspace.path).is_err());
    }
}

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "GLASSHADER_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "GLASSHADER_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Glasshader";
const APPLICATION: &str = "glasshader";
const SETTINGS_FILE: &str = "glasshader.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let data_override = env_override(ENV_DATA_DIR);
        if let (Some(config_dir), Some(data_dir)) = (config_override.clone(), data_override.clone())
        {
            return Ok(Self {
                config_dir,
                data_dir,
            });
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: config_override.unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir: data_override.unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Where file dialogs start when the current shader has no file.
    pub fn shader_dir(&self) -> PathBuf {
        self.data_dir.join("shaders")
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    pub(crate) fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    pub(crate) struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        pub(crate) fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        pub(crate) fn clear(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let data_dir = root.path().join("data");

        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);
        let _data_guard = EnvGuard::set(ENV_DATA_DIR, &data_dir);

        let paths = AppPaths::discover().unwrap();

        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.data_dir(), data_dir.as_path());
        assert_eq!(paths.settings_file(), config_dir.join("glasshader.toml"));
        assert_eq!(paths.shader_dir(), data_dir.join("shaders"));
    }

    #[test]
    fn empty_override_is_ignored() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let data_dir = root.path().join("data");

        let xdg_config = root.path().join("xdg");

        let _home_guard = EnvGuard::set("HOME", root.path());
        let _xdg_guard = EnvGuard::set("XDG_CONFIG_HOME", &xdg_config);
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, Path::new(""));
        let _data_guard = EnvGuard::set(ENV_DATA_DIR, &data_dir);

        assert_eq!(env_override(ENV_CONFIG_DIR), None);
        let paths = AppPaths::discover().unwrap();
        assert_ne!(paths.config_dir(), Path::new(""));
        assert_eq!(paths.data_dir(), data_dir.as_path());
        #[cfg(target_os = "linux")]
        assert_eq!(paths.config_dir(), xdg_config.join(APPLICATION));
    }

    #[test]
    fn cleared_override_falls_back_to_platform_dirs() {
        let _guard = env_lock().lock().unwrap();
        let _config_guard = EnvGuard::clear(ENV_CONFIG_DIR);
        let _data_guard = EnvGuard::clear(ENV_DATA_DIR);

        assert_eq!(env_override(ENV_CONFIG_DIR), None);
        assert_eq!(env_override(ENV_DATA_DIR), None);
    }
}

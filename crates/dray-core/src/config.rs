use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info, warn};

const CONFIG_ENV_VAR: &str = "DRAY_CONFIG";
const BACKEND_URL_ENV_VAR: &str = "DRAY_BACKEND_URL";
const BACKEND_KEY_ENV_VAR: &str = "DRAY_BACKEND_KEY";
const APP_DIR: &str = "dray";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://abcdefgh.supabase.co`.
    pub url: String,
    /// Publishable anon key; a signed-in session's token replaces it as
    /// the bearer but the `apikey` header always carries it.
    pub anon_key: String,
    #[serde(default = "default_task_table")]
    pub task_table: String,
    #[serde(default = "default_client_table")]
    pub client_table: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// Directory holding the stored session; `~` expands to the home dir.
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_color")]
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
        }
    }
}

fn default_task_table() -> String {
    "Task".to_string()
}

fn default_client_table() -> String {
    "Client".to_string()
}

fn default_color() -> bool {
    true
}

impl Config {
    /// Loads the config file, then lets `DRAY_BACKEND_URL` /
    /// `DRAY_BACKEND_KEY` override its backend values. With no file at
    /// all the two variables must both be set.
    #[tracing::instrument(skip(override_path))]
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<Self> {
        let loaded = load_config_file(override_path)?;

        let url_override = non_empty_env(BACKEND_URL_ENV_VAR);
        let key_override = non_empty_env(BACKEND_KEY_ENV_VAR);

        if let Some(mut cfg) = loaded {
            if let Some(url) = url_override {
                debug!(source = BACKEND_URL_ENV_VAR, "overriding backend url");
                cfg.backend.url = url;
            }
            if let Some(key) = key_override {
                debug!(source = BACKEND_KEY_ENV_VAR, "overriding backend key");
                cfg.backend.anon_key = key;
            }
            return Ok(cfg);
        }

        let (Some(url), Some(anon_key)) = (url_override, key_override) else {
            return Err(anyhow!(
                "no config file found; create {} or set {} and {}",
                default_config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| format!("{APP_DIR}/{CONFIG_FILE} under your config dir")),
                BACKEND_URL_ENV_VAR,
                BACKEND_KEY_ENV_VAR
            ));
        };

        info!("building config from environment variables");
        Ok(Self {
            backend: BackendConfig {
                url,
                anon_key,
                task_table: default_task_table(),
                client_table: default_client_table(),
            },
            data: DataConfig::default(),
            output: OutputConfig::default(),
        })
    }
}

fn load_config_file(override_path: Option<&Path>) -> anyhow::Result<Option<Config>> {
    let Some(path) = resolve_config_path(override_path) else {
        warn!("cannot determine a config directory");
        return Ok(None);
    };

    if !path.exists() {
        debug!(config = %path.display(), "config file not found");
        return Ok(None);
    }

    info!(config = %path.display(), "loading config file");
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(cfg))
}

fn resolve_config_path(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Ok(raw) = std::env::var(CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Resolves (and creates on demand) the directory that holds local state
/// such as the stored session.
#[tracing::instrument(skip(cfg))]
pub fn resolve_data_dir(cfg: &Config) -> anyhow::Result<PathBuf> {
    let dir = match cfg.data.location.as_deref() {
        Some(location) => expand_tilde(Path::new(location)),
        None => dirs::data_dir()
            .ok_or_else(|| anyhow!("cannot determine data directory"))?
            .join(APP_DIR),
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::{Config, resolve_data_dir};

    #[test]
    fn full_config_file_parses() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [backend]
            url = "https://abcdefgh.supabase.co"
            anon_key = "anon-123"
            task_table = "Task"
            client_table = "Client"

            [data]
            location = "/tmp/dray-test-data"

            [output]
            color = false
            "#,
        )
        .expect("write config");

        let cfg = Config::load(Some(&path)).expect("load config");
        assert_eq!(cfg.backend.url, "https://abcdefgh.supabase.co");
        assert_eq!(cfg.backend.anon_key, "anon-123");
        assert_eq!(cfg.backend.task_table, "Task");
        assert!(!cfg.output.color);
        assert_eq!(cfg.data.location.as_deref(), Some("/tmp/dray-test-data"));
    }

    #[test]
    fn table_names_and_output_default() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[backend]\nurl = \"https://x.example\"\nanon_key = \"k\"\n",
        )
        .expect("write config");

        let cfg = Config::load(Some(&path)).expect("load config");
        assert_eq!(cfg.backend.task_table, "Task");
        assert_eq!(cfg.backend.client_table, "Client");
        assert!(cfg.output.color);
        assert!(cfg.data.location.is_none());
    }

    #[test]
    fn malformed_config_file_reports_its_path() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "backend = 5\n").expect("write config");

        let err = Config::load(Some(&path)).expect_err("rejects malformed file");
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn data_dir_is_created_from_configured_location() {
        let dir = tempdir().expect("tempdir");
        let location = dir.path().join("state").join("dray");
        let config_path = dir.path().join("config.toml");
        fs::write(
            &config_path,
            format!(
                "[backend]\nurl = \"https://x.example\"\nanon_key = \"k\"\n\n[data]\nlocation = \"{}\"\n",
                location.display()
            ),
        )
        .expect("write config");

        let cfg = Config::load(Some(&config_path)).expect("load config");
        let resolved = resolve_data_dir(&cfg).expect("resolve data dir");
        assert_eq!(resolved, location);
        assert!(resolved.is_dir());
    }
}

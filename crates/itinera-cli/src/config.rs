//! Configuration file management for itinera.
//!
//! Provides a TOML-based config file at `~/.config/itinera/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use itinera_core::credential::NlsConfig;
use itinera_core::upstream::DashScopeConfig;
use itinera_core::upstream::dashscope::DEFAULT_MODEL;

pub const ENV_DASHSCOPE_API_KEY: &str = "ITINERA_DASHSCOPE_API_KEY";
pub const ENV_DASHSCOPE_MODEL: &str = "ITINERA_DASHSCOPE_MODEL";
pub const ENV_ASR_APP_KEY: &str = "ITINERA_ASR_APP_KEY";
pub const ENV_ASR_ACCESS_KEY_ID: &str = "ITINERA_ASR_ACCESS_KEY_ID";
pub const ENV_ASR_ACCESS_KEY_SECRET: &str = "ITINERA_ASR_ACCESS_KEY_SECRET";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub dashscope: DashScopeSection,
    #[serde(default)]
    pub asr: AsrSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DashScopeSection {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AsrSection {
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub access_key_secret: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the itinera config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/itinera` or `~/.config/itinera`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("itinera");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("itinera")
}

/// Return the path to the itinera config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Show only the ends of a secret.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// -----------------------------------------------------------------------
// Resolution
// -----------------------------------------------------------------------

/// First non-blank value of: CLI flag, env var, config file.
fn pick(cli: Option<&str>, env_var: &str, file: Option<&str>) -> Option<String> {
    let env = std::env::var(env_var).ok();
    [cli, env.as_deref(), file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve the generative backend settings.
///
/// - API key: `cli_api_key` > `ITINERA_DASHSCOPE_API_KEY` > `dashscope.api_key` > error
/// - Model: `cli_model` > `ITINERA_DASHSCOPE_MODEL` > `dashscope.model` > `qwen-max`
pub fn resolve_dashscope(
    cli_api_key: Option<&str>,
    cli_model: Option<&str>,
) -> Result<DashScopeConfig> {
    let file = load_config().ok();
    let section = file.as_ref().map(|f| &f.dashscope);

    let Some(api_key) = pick(
        cli_api_key,
        ENV_DASHSCOPE_API_KEY,
        section.map(|s| s.api_key.as_str()),
    ) else {
        bail!(
            "DashScope API key not found; pass --api-key, set {ENV_DASHSCOPE_API_KEY}, \
             or run `itinera init`"
        );
    };
    let model = pick(
        cli_model,
        ENV_DASHSCOPE_MODEL,
        section.map(|s| s.model.as_str()),
    )
    .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    tracing::debug!(%model, "resolved generative backend settings");
    let mut config = DashScopeConfig::new(api_key);
    config.model = model;
    Ok(config)
}

/// Resolve the speech service settings: env var > `asr.*` in the config
/// file. All three values are required.
pub fn resolve_nls() -> Result<NlsConfig> {
    let file = load_config().ok();
    let section = file.as_ref().map(|f| &f.asr);

    let app_key = pick(None, ENV_ASR_APP_KEY, section.map(|s| s.app_key.as_str()));
    let key_id = pick(
        None,
        ENV_ASR_ACCESS_KEY_ID,
        section.map(|s| s.access_key_id.as_str()),
    );
    let key_secret = pick(
        None,
        ENV_ASR_ACCESS_KEY_SECRET,
        section.map(|s| s.access_key_secret.as_str()),
    );

    match (app_key, key_id, key_secret) {
        (Some(app_key), Some(id), Some(secret)) => Ok(NlsConfig::new(app_key, id, secret)),
        (app_key, id, secret) => {
            let missing: Vec<&str> = [
                (app_key.is_none(), ENV_ASR_APP_KEY),
                (id.is_none(), ENV_ASR_ACCESS_KEY_ID),
                (secret.is_none(), ENV_ASR_ACCESS_KEY_SECRET),
            ]
            .into_iter()
            .filter_map(|(absent, name)| absent.then_some(name))
            .collect();
            bail!(
                "speech service not configured; missing {} (set them or run `itinera init`)",
                missing.join(", ")
            )
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

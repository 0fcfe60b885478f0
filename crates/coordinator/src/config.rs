//! Configuration for the coordinator and everything it wires up.
//!
//! # Security
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-readable files containing API keys
//! - Warns about API keys stored in config files

use serde::{Deserialize, Serialize};
use switchboard_agents::DEFAULT_WINDOW;
use switchboard_llm::LlmSettings;
use switchboard_tools::ToolSettings;
use tracing::warn;

pub const DEFAULT_THRESHOLD: f32 = 0.3;
pub const DEFAULT_FALLBACK: &str = "GeneralAgent";
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Main coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Maximum retained history entries, oldest evicted first
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Chat messages each handler keeps (two per exchange)
    #[serde(default = "default_window")]
    pub conversation_window: usize,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Selection policy knobs.
///
/// The threshold and the handlers' keyword weights are hand-tuned; change
/// them together and re-check routing of representative queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Winning scores below this fall back to `fallback_handler`
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Handler used when nothing clears the threshold; `None` disables fallback
    #[serde(default = "default_fallback")]
    pub fallback_handler: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on a single `/query/text` request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_fallback() -> Option<String> {
    Some(DEFAULT_FALLBACK.into())
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    60_000
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            fallback_handler: default_fallback(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            history_capacity: default_history_capacity(),
            conversation_window: default_window(),
            llm: LlmSettings::default(),
            tools: ToolSettings::default(),
            server: ServerConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    ///
    /// On Unix the file must be a regular file, not world-writable, and not
    /// world-readable if it holds an API key.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        if config.has_inline_secrets() {
            warn!(
                "API key found in config file '{}'. Prefer environment variables \
                 (OPENAI_API_KEY, WEATHER_API_KEY, NEWS_API_KEY).",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.routing.threshold) {
            anyhow::bail!(
                "routing.threshold must be within [0, 1], got {}",
                self.routing.threshold
            );
        }
        if self.history_capacity == 0 {
            anyhow::bail!("history_capacity must be at least 1");
        }
        if self.conversation_window == 0 {
            anyhow::bail!("conversation_window must be at least 1");
        }
        Ok(())
    }

    fn has_inline_secrets(&self) -> bool {
        [
            &self.llm.api_key,
            &self.tools.weather_api_key,
            &self.tools.news_api_key,
        ]
        .iter()
        .any(|key| key.as_deref().is_some_and(|k| !k.is_empty()))
    }
}

/// Validate config file permissions on Unix systems.
///
/// - File must be a regular file (not symlink, directory, etc.)
/// - File must not be world-writable
/// - If the file contains API keys, it must not be world-readable
#[cfg(unix)]
fn validate_config_file_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    let has_api_key = content.lines().any(|line| {
        let line = line.trim_start();
        !line.starts_with('#') && line.contains("api_key") && line.contains('=')
    });

    if has_api_key && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains an API key but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_api_key && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains an API key and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = write_config("");
        let config = CoordinatorConfig::from_file_unchecked(file.path()).unwrap();
        assert_eq!(config.routing.threshold, 0.3);
        assert_eq!(config.routing.fallback_handler.as_deref(), Some("GeneralAgent"));
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.conversation_window, 10);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn sections_override_defaults() {
        let file = write_config(
            r#"
history_capacity = 20

[routing]
threshold = 0.5

[llm]
model = "gpt-4o-mini"
timeout_ms = 5000

[tools]
timeout_ms = 2500

[server]
port = 9090
"#,
        );
        let config = CoordinatorConfig::from_file_unchecked(file.path()).unwrap();
        assert_eq!(config.history_capacity, 20);
        assert_eq!(config.routing.threshold, 0.5);
        assert_eq!(config.routing.fallback_handler.as_deref(), Some("GeneralAgent"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.tools.timeout_ms, 2500);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let file = write_config("[routing]\nthreshold = 1.5\n");
        let err = CoordinatorConfig::from_file_unchecked(file.path()).unwrap_err();
        assert!(err.to_string().contains("routing.threshold"));
    }

    #[test]
    fn inline_secrets_are_detected() {
        let mut config = CoordinatorConfig::default();
        assert!(!config.has_inline_secrets());
        config.tools.news_api_key = Some("n-123".into());
        assert!(config.has_inline_secrets());
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_key_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let file = write_config("[llm]\napi_key = \"sk-test\"\n");
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = CoordinatorConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("world-readable"));

        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        let config = CoordinatorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[cfg(unix)]
    #[test]
    fn world_writable_file_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let file = write_config("");
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o666)).unwrap();
        let err = CoordinatorConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("world-writable"));
    }
}

//! Loads layered TOML config plus environment-variable overrides into a
//! fully resolved, defaulted set of values, grounded on
//! `arawn-config::discovery::load_config`'s XDG-then-project-local layering
//! and `arawn-config::resolver`'s env-var-over-file precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::types::IkigaiConfig;

const APP_NAME: &str = "ikigai";
const PROJECT_CONFIG_FILE: &str = "ikigai.toml";
const USER_CONFIG_FILE: &str = "config.toml";

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_SCROLLBACK_CAPACITY: usize = 10_000;
const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 25;
const DEFAULT_SIGTERM_GRACE_MS: u64 = 200;

/// Fully resolved configuration ready to hand to `ikigai-agent`/`ikigai-llm`.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub database_path: PathBuf,
    pub scrollback_capacity: usize,
    pub max_tool_iterations: u32,
    pub sigterm_grace: Duration,
    pub debug_pipes_enabled: bool,
    pub tool_paths: Vec<PathBuf>,
}

/// Load config from the user's XDG config dir, then a project-local
/// `ikigai.toml` (overriding it), then environment variables (overriding
/// both). `project_dir` defaults to the current directory.
pub fn load(project_dir: Option<&Path>) -> Result<ResolvedConfig> {
    let mut config = IkigaiConfig::default();

    if let Some(path) = user_config_path() {
        if let Some(layer) = read_layer(&path)? {
            tracing::debug!(path = %path.display(), "loaded user config layer");
            config.merge(layer);
        }
    }

    let project_path = project_dir.unwrap_or_else(|| Path::new(".")).join(PROJECT_CONFIG_FILE);
    if let Some(layer) = read_layer(&project_path)? {
        tracing::debug!(path = %project_path.display(), "loaded project config layer");
        config.merge(layer);
    }

    resolve(config)
}

fn user_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("IKIGAI_CONFIG_DIR") {
        return Some(PathBuf::from(dir).join(USER_CONFIG_FILE));
    }
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(USER_CONFIG_FILE))
}

fn read_layer(path: &Path) -> Result<Option<IkigaiConfig>> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let parsed = IkigaiConfig::from_toml(&text)
                .map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })?;
            Ok(Some(parsed))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::ReadFile { path: path.display().to_string(), source }),
    }
}

fn env_override(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match env_override(var) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvValue { var: var.to_string(), value }),
        None => Ok(None),
    }
}

fn resolve(config: IkigaiConfig) -> Result<ResolvedConfig> {
    let llm = config.llm.unwrap_or_default();
    let agent = config.agent.unwrap_or_default();
    let session = config.session.unwrap_or_default();
    let debug = config.debug.unwrap_or_default();

    let model =
        env_override("IKIGAI_MODEL").or(llm.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let base_url = env_override("IKIGAI_LLM_BASE_URL").or(llm.base_url);

    let database_path = env_override("IKIGAI_DATABASE_PATH")
        .map(PathBuf::from)
        .or(session.database_path)
        .unwrap_or_else(default_database_path);

    let scrollback_capacity = env_parsed("IKIGAI_SCROLLBACK_CAPACITY")?
        .or(agent.scrollback_capacity)
        .unwrap_or(DEFAULT_SCROLLBACK_CAPACITY);

    let max_tool_iterations = env_parsed("IKIGAI_MAX_TOOL_ITERATIONS")?
        .or(agent.max_tool_iterations)
        .unwrap_or(DEFAULT_MAX_TOOL_ITERATIONS);

    let sigterm_grace_ms = env_parsed("IKIGAI_SIGTERM_GRACE_MS")?
        .or(agent.sigterm_grace_ms)
        .unwrap_or(DEFAULT_SIGTERM_GRACE_MS);

    let debug_pipes_enabled =
        env_parsed("IKIGAI_DEBUG_PIPES")?.or(debug.pipes_enabled).unwrap_or(false);

    let tool_paths = agent.tool_paths.unwrap_or_default();

    Ok(ResolvedConfig {
        model,
        base_url,
        database_path,
        scrollback_capacity,
        max_tool_iterations,
        sigterm_grace: Duration::from_millis(sigterm_grace_ms),
        debug_pipes_enabled,
        tool_paths,
    })
}

fn default_database_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(std::env::temp_dir).join(APP_NAME).join("sessions.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // the ones `resolve` reads so they don't race under `cargo test`'s
    // default multi-threaded runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let _guard = ENV_LOCK.lock().unwrap();
        let resolved = resolve(IkigaiConfig::default()).unwrap();
        assert_eq!(resolved.model, DEFAULT_MODEL);
        assert_eq!(resolved.scrollback_capacity, DEFAULT_SCROLLBACK_CAPACITY);
        assert_eq!(resolved.max_tool_iterations, DEFAULT_MAX_TOOL_ITERATIONS);
    }

    #[test]
    fn env_var_overrides_file_value() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut config = IkigaiConfig::default();
        config.llm = Some(crate::types::LlmSection {
            model: Some("file-model".to_string()),
            base_url: None,
        });
        unsafe {
            std::env::set_var("IKIGAI_MODEL", "env-model");
        }
        let resolved = resolve(config).unwrap();
        unsafe {
            std::env::remove_var("IKIGAI_MODEL");
        }
        assert_eq!(resolved.model, "env-model");
    }

    #[test]
    fn invalid_numeric_env_var_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::set_var("IKIGAI_MAX_TOOL_ITERATIONS", "not-a-number");
        }
        let result = resolve(IkigaiConfig::default());
        unsafe {
            std::env::remove_var("IKIGAI_MAX_TOOL_ITERATIONS");
        }
        assert!(matches!(result, Err(ConfigError::InvalidEnvValue { .. })));
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        assert!(read_layer(Path::new("/nonexistent/ikigai-config-test.toml")).unwrap().is_none());
    }
}

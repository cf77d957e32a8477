//! Configuration for skillflow.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SKILLFLOW_ENDPOINT, SKILLFLOW_API_KEY_ENV,
//!    SKILLFLOW_POLL_INTERVAL_MS, SKILLFLOW_MAX_WAIT_SECONDS)
//! 2. Config file (.skillflow/config.yaml, then ~/.skillflow/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .skillflow/config.yaml
//! - Falls back to the user-level file in the home directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::pool::MIN_WORKERS;
use crate::domain::{Capability, SkillDefinition};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
const DEFAULT_API_VERSION: &str = "2025-05-01";
const DEFAULT_API_KEY_ENV: &str = "SKILLFLOW_API_KEY";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_MAX_WAIT_SECONDS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const DEFAULT_WORKERS: usize = 3;

/// Placeholder replaced with the retrieval output in stage-2 prompts
pub const RESEARCH_PLACEHOLDER: &str = "{research}";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub conversations: ConversationConfig,
    #[serde(default)]
    pub skills: SkillsConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Upper bound on a single HTTP request
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollingConfig {
    pub interval_ms: Option<u64>,
    pub max_wait_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolConfig {
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationConfig {
    /// Keep conversations on the remote side for inspection
    #[serde(default)]
    pub retain: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillsConfig {
    pub retrieval: Option<SkillDefinition>,
    pub analysis: Option<SkillDefinition>,
    pub synthesis: Option<SkillDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptsConfig {
    pub analysis: Option<String>,
    pub synthesis: Option<String>,
}

/// Connection settings for the remote skill provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub api_version: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

/// Run poller timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSettings {
    /// Delay between status checks
    pub interval: Duration,
    /// Upper bound on the time spent waiting for one job
    pub max_wait: Duration,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECONDS),
        }
    }
}

/// Templates for the fan-out prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub analysis: String,
    pub synthesis: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            analysis: format!("Analyze this: {}", RESEARCH_PLACEHOLDER),
            synthesis: format!(
                "Synthesize a reader-friendly answer from: {}",
                RESEARCH_PLACEHOLDER
            ),
        }
    }
}

impl PromptTemplates {
    /// Render the template for a fan-out capability
    pub fn render(&self, capability: Capability, research: &str) -> String {
        let template = match capability {
            Capability::Analysis => &self.analysis,
            Capability::Synthesis => &self.synthesis,
            Capability::Retrieval => return research.to_string(),
        };
        template.replace(RESEARCH_PLACEHOLDER, research)
    }
}

/// Settings the orchestrator is built from
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub polling: PollingSettings,
    /// Worker pool size for the fan-out stage
    pub workers: usize,
    pub retain_conversations: bool,
    /// Indexed by `Capability::index()`
    pub skills: [SkillDefinition; 3],
    pub prompts: PromptTemplates,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            polling: PollingSettings::default(),
            workers: DEFAULT_WORKERS,
            retain_conversations: false,
            skills: Capability::ALL.map(SkillDefinition::default_for),
            prompts: PromptTemplates::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn skill(&self, capability: Capability) -> &SkillDefinition {
        &self.skills[capability.index()]
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: ProviderSettings,
    /// Name of the environment variable the API key was read from
    pub api_key_env: String,
    pub orchestrator: OrchestratorSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".skillflow").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let user_config = dirs::home_dir()?.join(".skillflow").join("config.yaml");
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_env_u64(env: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    match env(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be an integer, got '{}'", name, value)),
        None => Ok(None),
    }
}

/// Merge a parsed config file with environment overrides and defaults
pub fn resolve_config(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let endpoint = env("SKILLFLOW_ENDPOINT")
        .or(file.provider.endpoint)
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    let api_version = file
        .provider
        .api_version
        .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

    let api_key_env = env("SKILLFLOW_API_KEY_ENV")
        .or(file.provider.api_key_env)
        .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
    let api_key = env(&api_key_env).filter(|k| !k.is_empty());

    let request_timeout_seconds = file
        .provider
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS);
    if request_timeout_seconds == 0 {
        anyhow::bail!("provider.request_timeout_seconds must be greater than zero");
    }

    let interval_ms = parse_env_u64(&env, "SKILLFLOW_POLL_INTERVAL_MS")?
        .or(file.polling.interval_ms)
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if interval_ms == 0 {
        anyhow::bail!("polling.interval_ms must be greater than zero");
    }

    let max_wait_seconds = parse_env_u64(&env, "SKILLFLOW_MAX_WAIT_SECONDS")?
        .or(file.polling.max_wait_seconds)
        .unwrap_or(DEFAULT_MAX_WAIT_SECONDS);

    let workers = file.pool.workers.unwrap_or(DEFAULT_WORKERS);
    if workers < MIN_WORKERS {
        anyhow::bail!(
            "pool.workers must be at least {}, got {}",
            MIN_WORKERS,
            workers
        );
    }

    let defaults = PromptTemplates::default();
    let prompts = PromptTemplates {
        analysis: file.prompts.analysis.unwrap_or(defaults.analysis),
        synthesis: file.prompts.synthesis.unwrap_or(defaults.synthesis),
    };

    let SkillsConfig {
        retrieval,
        analysis,
        synthesis,
    } = file.skills;
    let skills = [
        retrieval.unwrap_or_else(|| SkillDefinition::default_for(Capability::Retrieval)),
        analysis.unwrap_or_else(|| SkillDefinition::default_for(Capability::Analysis)),
        synthesis.unwrap_or_else(|| SkillDefinition::default_for(Capability::Synthesis)),
    ];

    Ok(ResolvedConfig {
        provider: ProviderSettings {
            endpoint,
            api_version,
            api_key,
            request_timeout: Duration::from_secs(request_timeout_seconds),
        },
        api_key_env,
        orchestrator: OrchestratorSettings {
            polling: PollingSettings {
                interval: Duration::from_millis(interval_ms),
                max_wait: Duration::from_secs(max_wait_seconds),
            },
            workers,
            retain_conversations: file.conversations.retain,
            skills,
            prompts,
        },
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();

    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve_config(file, config_file, |name| std::env::var(name).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (bypasses the cache)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve_config(ConfigFile::default(), None, no_env).unwrap();

        assert_eq!(config.provider.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.provider.api_key, None);
        assert_eq!(config.api_key_env, "SKILLFLOW_API_KEY");
        assert_eq!(
            config.orchestrator.polling.interval,
            Duration::from_millis(500)
        );
        assert_eq!(config.orchestrator.polling.max_wait, Duration::from_secs(300));
        assert_eq!(config.provider.request_timeout, Duration::from_secs(60));
        assert_eq!(config.orchestrator.workers, 3);
        assert!(!config.orchestrator.retain_conversations);
        assert_eq!(
            config.orchestrator.skill(Capability::Analysis).name,
            "analysis_skill"
        );
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(".skillflow");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
provider:
  endpoint: https://agents.example.com/api
  api_key_env: AGENTS_KEY
  request_timeout_seconds: 15
polling:
  interval_ms: 250
  max_wait_seconds: 60
pool:
  workers: 4
conversations:
  retain: true
skills:
  retrieval:
    name: healthcare_research
    model: gpt-4o-mini
    instructions: Search the healthcare index.
    tools:
      - type: azure_ai_search
prompts:
  analysis: "Analyze this healthcare research and provide insights:\n\n{{research}}"
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version.as_deref(), Some("1.0"));

        let env: HashMap<&str, &str> = [("AGENTS_KEY", "secret")].into_iter().collect();
        let config = resolve_config(parsed, Some(config_path.clone()), |name| {
            env.get(name).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.provider.endpoint, "https://agents.example.com/api");
        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.provider.request_timeout, Duration::from_secs(15));
        assert_eq!(
            config.orchestrator.polling.interval,
            Duration::from_millis(250)
        );
        assert_eq!(config.orchestrator.polling.max_wait, Duration::from_secs(60));
        assert_eq!(config.orchestrator.workers, 4);
        assert!(config.orchestrator.retain_conversations);

        let retrieval = config.orchestrator.skill(Capability::Retrieval);
        assert_eq!(retrieval.name, "healthcare_research");
        assert_eq!(retrieval.model, "gpt-4o-mini");
        assert_eq!(retrieval.tools.len(), 1);
        // Unconfigured skills keep their defaults
        assert_eq!(
            config.orchestrator.skill(Capability::Synthesis).name,
            "synthesis_skill"
        );

        assert_eq!(
            config
                .orchestrator
                .prompts
                .render(Capability::Analysis, "findings"),
            "Analyze this healthcare research and provide insights:\n\nfindings"
        );
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            provider: ProviderConfig {
                endpoint: Some("http://file".to_string()),
                ..Default::default()
            },
            polling: PollingConfig {
                interval_ms: Some(100),
                max_wait_seconds: Some(10),
            },
            ..Default::default()
        };

        let env: HashMap<&str, &str> = [
            ("SKILLFLOW_ENDPOINT", "http://env"),
            ("SKILLFLOW_POLL_INTERVAL_MS", "20"),
            ("SKILLFLOW_MAX_WAIT_SECONDS", "5"),
        ]
        .into_iter()
        .collect();

        let config =
            resolve_config(file, None, |name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.provider.endpoint, "http://env");
        assert_eq!(
            config.orchestrator.polling.interval,
            Duration::from_millis(20)
        );
        assert_eq!(config.orchestrator.polling.max_wait, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = ConfigFile {
            pool: PoolConfig { workers: Some(1) },
            ..Default::default()
        };
        assert!(resolve_config(file, None, no_env).is_err());

        let file = ConfigFile {
            polling: PollingConfig {
                interval_ms: Some(0),
                max_wait_seconds: None,
            },
            ..Default::default()
        };
        assert!(resolve_config(file, None, no_env).is_err());

        let file = ConfigFile {
            provider: ProviderConfig {
                request_timeout_seconds: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(resolve_config(file, None, no_env).is_err());

        let result = resolve_config(ConfigFile::default(), None, |name| {
            (name == "SKILLFLOW_MAX_WAIT_SECONDS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_default_prompt_rendering() {
        let prompts = PromptTemplates::default();
        assert_eq!(
            prompts.render(Capability::Analysis, "abc"),
            "Analyze this: abc"
        );
        assert_eq!(
            prompts.render(Capability::Synthesis, "abc"),
            "Synthesize a reader-friendly answer from: abc"
        );
    }
}

//! Orchestrator configuration.
//!
//! Resolved once at startup, in increasing precedence: built-in defaults, an
//! optional TOML file, environment variables (a `.env` file is loaded into the
//! environment by the binary), then CLI flags. The result is validated and
//! passed by reference to every component; nothing reads the environment later.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::ProposalMode;

/// Full orchestrator configuration (TOML).
///
/// Missing fields take the values from `Default`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Where pre/post blocks come from.
    pub mode: ProposalMode,

    /// Container the commands run in.
    pub container: String,

    /// Root directory under which one directory per run is created.
    pub runs_dir: PathBuf,

    /// Number of identical consecutive commands that stops the run.
    pub max_repeat: u32,

    /// Echo pre/post blocks to the console after each step.
    pub echo: bool,

    /// Per-command wall-clock budget in seconds.
    pub command_timeout_secs: u64,

    /// Keep at most this many bytes of each of stdout/stderr per command.
    pub output_limit_bytes: usize,

    /// Truncate stdout copied into the run context beyond this many characters.
    pub context_stdout_chars: usize,

    /// Prompt file recorded in `meta.json` and sent as the API system prompt.
    pub prompt_path: Option<PathBuf>,

    /// Run directory or `events.jsonl` to replay in `replay` mode.
    pub replay_path: Option<PathBuf>,

    pub sandbox: SandboxConfig,

    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Container runtime CLI (`docker`, `podman`).
    pub runtime: String,
    /// Login shell used inside the container.
    pub shell: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            shell: "/bin/bash".to_string(),
        }
    }
}

/// Completion API flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    /// OpenAI-compatible `/chat/completions`.
    OpenAi,
    /// Anthropic `/v1/messages`.
    Anthropic,
}

impl ApiProvider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Some(ApiProvider::OpenAi),
            "anthropic" => Some(ApiProvider::Anthropic),
            _ => None,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "https://api.openai.com/v1",
            ApiProvider::Anthropic => "https://api.anthropic.com",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub provider: ApiProvider,
    pub model: String,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub max_tokens: u32,
    /// Only ever taken from the environment; never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            provider: ApiProvider::OpenAi,
            model: String::new(),
            base_url: None,
            timeout_secs: 120,
            max_tokens: 1024,
            api_key: None,
        }
    }
}

impl ApiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: ProposalMode::Manual,
            container: "breakout_agent".to_string(),
            runs_dir: PathBuf::from("runs"),
            max_repeat: 3,
            echo: true,
            command_timeout_secs: 60,
            output_limit_bytes: 1_000_000,
            context_stdout_chars: 2_000,
            prompt_path: None,
            replay_path: None,
            sandbox: SandboxConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.container.trim().is_empty() {
            return Err(anyhow!("container must be non-empty"));
        }
        if self.max_repeat < 2 {
            return Err(anyhow!("max_repeat must be >= 2"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.context_stdout_chars == 0 {
            return Err(anyhow!("context_stdout_chars must be > 0"));
        }
        if self.sandbox.runtime.trim().is_empty() || self.sandbox.shell.trim().is_empty() {
            return Err(anyhow!("sandbox.runtime and sandbox.shell must be non-empty"));
        }
        match self.mode {
            ProposalMode::Manual => {}
            ProposalMode::Replay => {
                if self.replay_path.is_none() {
                    return Err(anyhow!("replay mode requires replay_path (REPLAY_PATH)"));
                }
            }
            ProposalMode::Api => {
                if self.api.model.trim().is_empty() {
                    return Err(anyhow!("api mode requires api.model (LLM_MODEL)"));
                }
                if self
                    .api
                    .api_key
                    .as_deref()
                    .is_none_or(|key| key.trim().is_empty())
                {
                    return Err(anyhow!("api mode requires an API key (LLM_API_KEY)"));
                }
                if self.api.timeout_secs == 0 {
                    return Err(anyhow!("api.timeout_secs must be > 0"));
                }
            }
        }
        Ok(())
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Unset or blank variables leave the current value alone; malformed
    /// values are errors naming the variable.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(raw) = get("LLM_MODE") {
            self.mode = ProposalMode::parse(&raw)
                .ok_or_else(|| anyhow!("LLM_MODE: unknown mode '{raw}'"))?;
        }
        if let Some(raw) = get("AGENT_CONTAINER") {
            self.container = raw.trim().to_string();
        }
        if let Some(raw) = get("RUNS_DIR") {
            self.runs_dir = PathBuf::from(raw.trim());
        }
        if let Some(raw) = get("MAX_REPEAT") {
            self.max_repeat = parse_number("MAX_REPEAT", &raw)?;
        }
        if let Some(raw) = get("ECHO") {
            self.echo = parse_flag("ECHO", &raw)?;
        }
        if let Some(raw) = get("CMD_TIMEOUT") {
            self.command_timeout_secs = parse_number("CMD_TIMEOUT", &raw)?;
        }
        if let Some(raw) = get("PROMPT_PATH") {
            self.prompt_path = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = get("REPLAY_PATH") {
            self.replay_path = Some(PathBuf::from(raw.trim()));
        }
        if let Some(raw) = get("SANDBOX_RUNTIME") {
            self.sandbox.runtime = raw.trim().to_string();
        }
        if let Some(raw) = get("LLM_PROVIDER") {
            self.api.provider = ApiProvider::parse(&raw)
                .ok_or_else(|| anyhow!("LLM_PROVIDER: unknown provider '{raw}'"))?;
        }
        if let Some(raw) = get("LLM_MODEL") {
            self.api.model = raw.trim().to_string();
        }
        if let Some(raw) = get("LLM_BASE_URL") {
            self.api.base_url = Some(raw.trim().to_string());
        }
        if let Some(raw) = get("LLM_TIMEOUT") {
            self.api.timeout_secs = parse_number("LLM_TIMEOUT", &raw)?;
        }
        if let Some(raw) = get("LLM_API_KEY") {
            self.api.api_key = Some(raw.trim().to_string());
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| anyhow!("{name}: invalid number '{raw}': {err}"))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{name}: expected a boolean, got '{raw}'")),
    }
}

/// Load config from an optional TOML file.
///
/// `None` yields `OrchestratorConfig::default()`. The result is not validated
/// yet; overrides still have to be applied.
pub fn load_config(path: Option<&Path>) -> Result<OrchestratorConfig> {
    let Some(path) = path else {
        return Ok(OrchestratorConfig::default());
    };
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: OrchestratorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Resolve the startup configuration from a file plus environment lookup, and validate it.
pub fn resolve_config<F>(path: Option<&Path>, lookup: F) -> Result<OrchestratorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = load_config(path)?;
    cfg.apply_env(lookup)?;
    Ok(cfg)
}

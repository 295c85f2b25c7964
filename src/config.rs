//! Router configuration
//!
//! Built once at process start from the environment and passed by reference
//! to everything that talks to the completion service.

use crate::error::RouterError;
use crate::Result;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 8080;

/// What the gatekeeper does with an answer outside {receptionist, classifier}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContractPolicy {
    /// Fail the turn with an out-of-contract error
    #[default]
    Reject,
    /// Log a warning and take the conversational branch
    FallbackToReceptionist,
}

impl FromStr for ContractPolicy {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "fail" => Ok(ContractPolicy::Reject),
            "receptionist" | "fallback" => Ok(ContractPolicy::FallbackToReceptionist),
            other => Err(RouterError::ConfigError(format!(
                "unknown ROUTER_CONTRACT_POLICY {:?} (expected reject or receptionist)",
                other
            ))),
        }
    }
}

/// Completion service settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// `None` when no API key is present; only offline mode can run then.
    pub llm: Option<LlmConfig>,
    pub contract_policy: ContractPolicy,
    pub port: u16,
}

impl RouterConfig {
    /// Read configuration from the process environment.
    /// Callers load `.env` first (see the binaries).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let llm = match get("OPENAI_API_KEY") {
            Some(api_key) => {
                let mut llm = LlmConfig::new(api_key);
                if let Some(base_url) = get("OPENAI_BASE_URL") {
                    llm.base_url = base_url.trim_end_matches('/').to_string();
                }
                if let Some(model) = get("ROUTER_MODEL") {
                    llm.model = model;
                }
                if let Some(raw) = get("ROUTER_TEMPERATURE") {
                    llm.temperature = parse_value("ROUTER_TEMPERATURE", &raw)?;
                }
                if let Some(raw) = get("ROUTER_MAX_TOKENS") {
                    llm.max_tokens = parse_value("ROUTER_MAX_TOKENS", &raw)?;
                }
                if let Some(raw) = get("ROUTER_TIMEOUT_SECS") {
                    let secs: u64 = parse_value("ROUTER_TIMEOUT_SECS", &raw)?;
                    if secs == 0 {
                        return Err(RouterError::ConfigError(
                            "ROUTER_TIMEOUT_SECS must be at least 1".to_string(),
                        ));
                    }
                    llm.request_timeout = Duration::from_secs(secs);
                }
                Some(llm)
            }
            None => None,
        };

        let contract_policy = match get("ROUTER_CONTRACT_POLICY") {
            Some(raw) => raw.parse()?,
            None => ContractPolicy::default(),
        };

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            llm,
            contract_policy,
            port,
        })
    }

    /// Completion settings, or a config error naming the missing key
    pub fn require_llm(&self) -> Result<&LlmConfig> {
        self.llm.as_ref().ok_or_else(|| {
            RouterError::ConfigError(
                "OPENAI_API_KEY not set. Add it to your environment or .env file".to_string(),
            )
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| RouterError::ConfigError(format!("invalid {} {:?}: {}", key, raw, e)))
}

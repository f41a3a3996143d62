use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// 内置的提供方优先级
pub const DEFAULT_PROVIDER_PRIORITY: [&str; 3] = ["anthropic", "openai", "grok"];

/// 每个提供方在首次尝试之外的重试次数
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// 每个提供方最多重试次数
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 批量模式下同时运行的生成任务数
    pub max_concurrent_jobs: usize,
    /// 生成结果输出目录
    pub output_dir: String,
    /// 失败任务日志文件
    pub failure_log_file: String,
    /// 单次提供方请求超时（秒）
    pub request_timeout_secs: u64,
    /// 是否启用扩展 widget
    pub extended_widgets: bool,
    pub pipeline: PipelineSection,
    pub providers: Vec<ProviderConfig>,
}

/// `[pipeline]` 配置段
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub primary_provider: String,
    pub provider_priority: Vec<String>,
    pub max_retries: u32,
}

/// `[[providers]]` 配置项
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn api_base_or_default(&self) -> Option<String> {
        self.api_base
            .clone()
            .or_else(|| default_api_base(&self.name).map(str::to_string))
    }

    pub fn model_or_default(&self) -> Option<String> {
        self.model
            .clone()
            .or_else(|| default_model(&self.name).map(str::to_string))
    }
}

/// 已知提供方的 OpenAI 兼容端点
pub fn default_api_base(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "grok" => Some("https://api.x.ai/v1"),
        "anthropic" => Some("https://api.anthropic.com/v1/"),
        _ => None,
    }
}

pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("gpt-4o-mini"),
        "grok" => Some("grok-2-latest"),
        "anthropic" => Some("claude-3-5-sonnet-latest"),
        _ => None,
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            primary_provider: "grok".to_string(),
            provider_priority: DEFAULT_PROVIDER_PRIORITY
                .iter()
                .map(|name| name.to_string())
                .collect(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            output_dir: "output".to_string(),
            failure_log_file: "failures.txt".to_string(),
            request_timeout_secs: 120,
            extended_widgets: false,
            pipeline: PipelineSection::default(),
            providers: DEFAULT_PROVIDER_PRIORITY
                .iter()
                .map(|name| ProviderConfig::named(*name))
                .collect(),
        }
    }
}

impl Config {
    /// 默认配置 + 环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 读取 TOML 配置文件，再应用环境变量覆盖
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|provider| provider.name == name)
    }

    fn provider_mut(&mut self, name: &str) -> &mut ProviderConfig {
        let index = match self.providers.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.providers.push(ProviderConfig::named(name));
                self.providers.len() - 1
            }
        };
        &mut self.providers[index]
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(primary) = env_string("LAYOUT_PRIMARY_PROVIDER") {
            self.pipeline.primary_provider = primary;
        }
        if let Some(retries) = env_parse::<u32>("LAYOUT_MAX_RETRIES", "u32")? {
            self.pipeline.max_retries = retries;
        }
        if let Some(extended) = env_bool("LAYOUT_EXTENDED_WIDGETS")? {
            self.extended_widgets = extended;
        }
        if let Some(jobs) = env_parse::<usize>("LAYOUT_MAX_CONCURRENT_JOBS", "usize")? {
            self.max_concurrent_jobs = jobs;
        }
        if let Some(dir) = env_string("LAYOUT_OUTPUT_DIR") {
            self.output_dir = dir;
        }
        if let Some(secs) = env_parse::<u64>("LAYOUT_REQUEST_TIMEOUT_SECS", "u64")? {
            self.request_timeout_secs = secs;
        }

        let mut names: Vec<String> = self.providers.iter().map(|p| p.name.clone()).collect();
        for name in &self.pipeline.provider_priority {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        for name in names {
            let prefix = name.to_uppercase().replace('-', "_");
            let api_key = env_string(&format!("{}_API_KEY", prefix));
            let api_base = env_string(&format!("{}_API_BASE", prefix));
            let model = env_string(&format!("{}_MODEL", prefix));
            if api_key.is_none() && api_base.is_none() && model.is_none() {
                continue;
            }

            let provider = self.provider_mut(&name);
            if let Some(key) = api_key {
                provider.api_key = key;
            }
            if api_base.is_some() {
                provider.api_base = api_base;
            }
            if model.is_some() {
                provider.model = model;
            }
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::RetriesOutOfRange {
                value: self.pipeline.max_retries,
                max: MAX_RETRIES_LIMIT,
            });
        }

        let primary = &self.pipeline.primary_provider;
        let known = self.provider(primary).is_some()
            || self.pipeline.provider_priority.contains(primary);
        if known {
            Ok(())
        } else {
            Err(ConfigError::UnknownProvider {
                name: primary.clone(),
            })
        }
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}

fn env_bool(var_name: &str) -> Result<Option<bool>, ConfigError> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: "bool".to_string(),
            }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// 流水线的不可变配置，构造时确定，运行中不再读取环境
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub primary_provider: String,
    pub provider_priority: Vec<String>,
    /// 提供方 → 是否配置了凭据
    pub credentials: HashMap<String, bool>,
    pub max_retries: u32,
    pub extended_widgets: bool,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let credentials = config
            .providers
            .iter()
            .map(|provider| (provider.name.clone(), provider.has_credentials()))
            .collect();

        Self {
            primary_provider: config.pipeline.primary_provider.clone(),
            provider_priority: config.pipeline.provider_priority.clone(),
            credentials,
            max_retries: config.pipeline.max_retries,
            extended_widgets: config.extended_widgets,
        }
    }

    pub fn has_credentials(&self, provider: &str) -> bool {
        self.credentials.get(provider).copied().unwrap_or(false)
    }

    /// 每个提供方的尝试上限
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// 备用提供方：按优先级排列，排除主提供方和未配置凭据的提供方
    pub fn fallback_providers(&self, primary: &str) -> Vec<String> {
        self.provider_priority
            .iter()
            .filter(|name| name.as_str() != primary && self.has_credentials(name))
            .cloned()
            .collect()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_with_defaults() {
        let config = Config::from_toml_str(
            r#"
max_concurrent_jobs = 8
extended_widgets = true

[pipeline]
primary_provider = "openai"

[[providers]]
name = "openai"
api_key = "sk-test"
model = "gpt-4o"
"#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent_jobs, 8);
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.pipeline.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.pipeline.provider_priority, DEFAULT_PROVIDER_PRIORITY);
        let openai = config.provider("openai").unwrap();
        assert!(openai.has_credentials());
        assert_eq!(
            openai.api_base_or_default().as_deref(),
            Some("https://api.openai.com/v1")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_primary_is_rejected() {
        let mut config = Config::default();
        config.pipeline.primary_provider = "mystery".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn test_fallback_order_skips_primary_and_uncredentialed() {
        let mut config = Config::default();
        config.provider_mut("anthropic").api_key = "a".to_string();
        config.provider_mut("openai").api_key = "b".to_string();

        let pipeline = PipelineConfig::from_config(&config);
        assert_eq!(pipeline.fallback_providers("openai"), vec!["anthropic"]);
        assert_eq!(pipeline.fallback_providers("grok"), vec!["anthropic", "openai"]);
        assert_eq!(pipeline.max_attempts(), 3);
    }

    #[test]
    fn test_retry_budget_is_bounded() {
        let mut config = Config::default();
        config.pipeline.max_retries = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RetriesOutOfRange { value: u32::MAX, .. })
        ));

        config.pipeline.max_retries = MAX_RETRIES_LIMIT;
        assert!(config.validate().is_ok());

        let pipeline = PipelineConfig {
            max_retries: u32::MAX,
            ..PipelineConfig::default()
        };
        assert_eq!(pipeline.max_attempts(), u32::MAX);
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}

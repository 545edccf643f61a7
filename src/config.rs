//! OpenAI 连接配置：显式参数 > 环境变量 > TOML 配置文件
//!
//! 环境变量使用 `OPENAI_*` 前缀：OPENAI_API_KEY、OPENAI_BASE_URL、OPENAI_MODEL、
//! OPENAI_TIMEOUT、OPENAI_MAX_RETRIES、OPENAI_ORG_ID。timeout / max_retries 以字符串读入后
//! 再校验，非法数值在构建任何网络客户端之前就返回 InputValidation。

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::Client;
use serde::Deserialize;

use crate::core::{RetryPolicy, SdkError};

/// 未指定模型时使用
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// 环境变量前缀（OPENAI_API_KEY → api_key）
pub const ENV_PREFIX: &str = "OPENAI";

/// 配置源中读到的原始值（全部为字符串，稍后统一校验）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    org_id: Option<String>,
    timeout: Option<String>,
    max_retries: Option<String>,
}

/// 校验后的连接配置
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub default_model: String,
    pub organization: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

impl OpenAiSettings {
    pub fn builder() -> OpenAiSettingsBuilder {
        OpenAiSettingsBuilder::default()
    }

    /// 仅从进程环境变量构建
    pub fn from_env() -> Result<Self, SdkError> {
        Self::builder().build()
    }

    /// 转为 async-openai 的客户端配置
    pub fn client_config(&self) -> OpenAIConfig {
        let mut config = OpenAIConfig::new().with_api_key(self.api_key.clone());
        if let Some(url) = &self.base_url {
            config = config.with_api_base(url.clone());
        }
        if let Some(org) = &self.organization {
            config = config.with_org_id(org.clone());
        }
        config
    }

    /// 创建 async-openai 客户端；配置了 timeout 时使用带超时的 HTTP 客户端
    pub fn create_client(&self) -> Result<Client<OpenAIConfig>, SdkError> {
        let client = Client::with_config(self.client_config());
        match self.timeout {
            Some(timeout) => {
                let http = reqwest::Client::builder()
                    .timeout(timeout)
                    .build()
                    .map_err(|e| {
                        SdkError::configuration("failed to build HTTP client").with_source(e)
                    })?;
                Ok(client.with_http_client(http))
            }
            None => Ok(client),
        }
    }

    /// 由 max_retries 得到重试策略；未配置时用默认策略
    pub fn retry_policy(&self) -> RetryPolicy {
        self.max_retries
            .map(RetryPolicy::new)
            .unwrap_or_default()
    }
}

/// 配置构建器：每一项都可以被显式参数单独覆盖
#[derive(Debug, Clone, Default)]
pub struct OpenAiSettingsBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    default_model: Option<String>,
    organization: Option<String>,
    timeout: Option<String>,
    max_retries: Option<String>,
    settings_file: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl OpenAiSettingsBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// 秒数，接受 `30`、`45.5`、`"60"` 等形式
    pub fn timeout(mut self, secs: impl ToString) -> Self {
        self.timeout = Some(secs.to_string());
        self
    }

    /// 接受 `3`、`"5"` 等形式
    pub fn max_retries(mut self, retries: impl ToString) -> Self {
        self.max_retries = Some(retries.to_string());
        self
    }

    /// 额外的 TOML 配置文件（优先级最低）
    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    /// 替换进程环境变量作为环境源（变量名含 OPENAI_ 前缀）
    pub fn env_source(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn build(self) -> Result<OpenAiSettings, SdkError> {
        let raw = load_raw_settings(self.settings_file.as_ref(), self.env.clone())?;

        let timeout = parse_timeout(self.timeout.or(raw.timeout))?;
        let max_retries = parse_max_retries(self.max_retries.or(raw.max_retries))?;

        let api_key = self
            .api_key
            .or(raw.api_key)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                SdkError::configuration("Failed to build OpenAI settings: OPENAI_API_KEY is not set")
                    .with_context("env_var", "OPENAI_API_KEY")
            })?;

        let settings = OpenAiSettings {
            api_key,
            base_url: non_empty(self.base_url.or(raw.base_url)),
            default_model: non_empty(self.default_model.or(raw.model))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            organization: non_empty(self.organization.or(raw.org_id)),
            timeout,
            max_retries,
        };
        tracing::debug!(
            model = %settings.default_model,
            base_url = settings.base_url.as_deref().unwrap_or("default"),
            "openai settings resolved"
        );
        Ok(settings)
    }
}

/// 依次叠加：TOML 文件（可选）→ 环境变量
fn load_raw_settings(
    settings_file: Option<&PathBuf>,
    env: Option<HashMap<String, String>>,
) -> Result<RawSettings, SdkError> {
    let mut builder = config::Config::builder();

    if let Some(path) = settings_file {
        if !path.exists() {
            return Err(SdkError::configuration("settings file not found")
                .with_context("path", path.display().to_string()));
        }
        builder = builder.add_source(config::File::from(path.clone()).required(true));
    }

    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).source(env));

    let c = builder.build().map_err(|e| {
        SdkError::configuration("failed to load OpenAI settings sources").with_source(e)
    })?;
    c.try_deserialize().map_err(|e| {
        SdkError::configuration("failed to deserialize OpenAI settings").with_source(e)
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_timeout(raw: Option<String>) -> Result<Option<Duration>, SdkError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };
    let secs: f64 = raw.trim().parse().map_err(|e| {
        SdkError::input_validation(format!("Invalid timeout value: {raw}"))
            .with_context("field", "timeout")
            .with_source(e)
    })?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(SdkError::input_validation(format!("Invalid timeout value: {raw}"))
            .with_context("field", "timeout")
            .with_context("reason", "must be a positive number of seconds"));
    }
    Ok(Some(Duration::from_secs_f64(secs)))
}

fn parse_max_retries(raw: Option<String>) -> Result<Option<u32>, SdkError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };
    raw.trim().parse::<u32>().map(Some).map_err(|e| {
        SdkError::input_validation(format!("Invalid max_retries value: {raw}"))
            .with_context("field", "max_retries")
            .with_source(e)
    })
}

//! OpenAI 兼容提供方 - 基础设施层
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 同一个适配器服务所有 OpenAI 兼容端点（OpenAI、xAI Grok、Anthropic 兼容层等）
//! - 通过 `n` 参数一次请求多个候选布局

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderErrorCode};
use crate::infrastructure::provider::{ProviderAdapter, ProviderRequest, RawResponse};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// OpenAI 兼容提供方
pub struct OpenAiCompatibleProvider {
    name: String,
    client: Client<OpenAIConfig>,
    model_name: String,
    has_api_key: bool,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleProvider {
    pub fn new(settings: &ProviderConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(settings.api_key.trim());
        if let Some(api_base) = settings.api_base_or_default() {
            openai_config = openai_config.with_api_base(api_base);
        }

        Self {
            name: settings.name.clone(),
            client: Client::with_config(openai_config),
            model_name: settings
                .model_or_default()
                .unwrap_or_else(|| settings.name.clone()),
            has_api_key: settings.has_credentials(),
            temperature: settings.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn build_messages(
        &self,
        request: &ProviderRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let mut messages = Vec::new();

        if !request.system.trim().is_empty() {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.as_str())
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.as_str())
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: &ProviderRequest) -> Result<RawResponse, ProviderError> {
        if !self.has_api_key {
            return Err(ProviderError::missing_api_key(&self.name));
        }

        let choices = request.options.variation_count();
        debug!(
            "调用 {} API，模型: {}，候选数: {}",
            self.name, self.model_name, choices
        );
        debug!("用户消息长度: {} 字符", request.prompt.len());

        let messages = self.build_messages(request).map_err(classify_openai_error)?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(request.options.temperature.unwrap_or(self.temperature))
            .max_tokens(request.options.max_tokens.unwrap_or(self.max_tokens))
            .n(choices)
            .build()
            .map_err(classify_openai_error)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| {
                warn!("{} API 调用失败: {}", self.name, e);
                classify_openai_error(e)
            })?;

        let messages: Vec<String> = response
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .collect();

        if messages.is_empty() {
            return Err(ProviderError::empty_response());
        }

        debug!("{} API 调用成功，收到 {} 条消息", self.name, messages.len());

        Ok(RawResponse {
            kind: request.options.kind,
            messages,
            rate_limit: None,
        })
    }
}

/// 将 async-openai 错误映射为提供方错误分类
fn classify_openai_error(err: OpenAIError) -> ProviderError {
    let code = match &err {
        OpenAIError::ApiError(api) => classify_error_text(&format!(
            "{:?} {:?} {}",
            api.r#type, api.code, api.message
        )),
        OpenAIError::JSONDeserialize(..) => ProviderErrorCode::InvalidResponse,
        other => classify_error_text(&other.to_string()),
    };
    ProviderError::new(code, err.to_string())
}

/// 按错误文本关键字分类
pub fn classify_error_text(text: &str) -> ProviderErrorCode {
    let text = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|needle| text.contains(needle));

    if has(&["invalid_api_key", "incorrect api key", "unauthorized", "authentication", "401", "403"]) {
        ProviderErrorCode::Unauthorized
    } else if has(&["missing api key", "no api key"]) {
        ProviderErrorCode::MissingApiKey
    } else if has(&["rate limit", "rate_limit", "429", "quota", "too many requests"]) {
        ProviderErrorCode::RateLimited
    } else if has(&["timed out", "timeout"]) {
        ProviderErrorCode::Timeout
    } else if has(&["500", "502", "503", "504", "server error", "server_error", "overloaded", "bad gateway"]) {
        ProviderErrorCode::Server
    } else if has(&["error sending request", "connection", "dns", "network"]) {
        ProviderErrorCode::Network
    } else if has(&["deserialize", "invalid json", "unexpected response"]) {
        ProviderErrorCode::InvalidResponse
    } else {
        ProviderErrorCode::Other
    }
}

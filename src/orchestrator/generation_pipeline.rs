//! 生成流水线 - 编排层
//!
//! ## 职责
//!
//! 驱动一次完整的 `generate()` 调用：
//!
//! 1. 构建提示词（只构建一次）
//! 2. 主提供方最多尝试 `max_retries + 1` 次，每次重试携带上次失败的反馈
//! 3. 主提供方耗尽后按优先级依次尝试备用提供方，首个成功即返回
//! 4. 全部失败时返回完整的步骤日志和最后一次的部分结果
//!
//! ## 终止条件
//!
//! - 不可重试错误（认证失败 / 缺少凭据 / 限流）立即终止整个流程，备用提供方也不再尝试
//! - 取消信号在每次调用提供方之前检查，并与进行中的调用竞争
//!
//! 每次调用独占自己的步骤日志和计数器，多个调用可以并发执行。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{Config, PipelineConfig};
use crate::error::{PipelineError, ProviderError};
use crate::infrastructure::{
    CancelSignal, OpenAiCompatibleProvider, ProviderAdapter, ProviderRequest, RawResponse,
    RequestOptions,
};
use crate::models::document::Document;
use crate::models::issue::{Issue, IssueCode, RepairEntry};
use crate::models::pipeline_log::{PartialResult, PipelineLog, PipelineStep};
use crate::services::{LayoutPromptBuilder, PromptBuilder, PromptContext, PromptParts, ROOT_PATH};
use crate::workflow::{ProcessedMessage, RejectedMessage, ResponseProcessor};

/// 提供方调用失败时反馈问题的路径
const API_PATH: &str = "api";

/// 单次生成的调用参数
#[derive(Debug, Clone, Default)]
pub struct GenerationArgs {
    pub context: PromptContext,
    /// 覆盖构建出的系统提示词
    pub system: Option<String>,
    pub options: RequestOptions,
    pub cancel: Option<CancelSignal>,
    /// 单次提供方调用的超时，缺省使用流水线配置
    pub timeout: Option<Duration>,
}

/// 成功的生成结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub document: Document,
    pub repairs: Vec<RepairEntry>,
    pub warnings: Vec<Issue>,
    /// 成功的提供方上的尝试次数
    pub attempt_count: u32,
    pub provider: String,
    pub fallback_used: Option<String>,
    pub original_provider: Option<String>,
    pub pipeline_log: PipelineLog,
}

/// 一次运行的局部状态
#[derive(Default)]
struct RunState {
    log: PipelineLog,
    last_result: Option<PartialResult>,
    last_error: Option<ProviderError>,
}

/// 单个提供方的尝试结果
enum ProviderRun {
    Succeeded { processed: ProcessedMessage, attempt: u32 },
    /// 预算耗尽，携带切换到备用提供方的原因
    Exhausted(String),
}

/// 生成流水线
pub struct GenerationPipeline {
    config: PipelineConfig,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    prompt_builder: Arc<dyn PromptBuilder>,
    processor: ResponseProcessor,
    request_timeout: Option<Duration>,
}

impl GenerationPipeline {
    pub fn new(config: PipelineConfig, prompt_builder: Arc<dyn PromptBuilder>) -> Self {
        let processor = ResponseProcessor::new(config.extended_widgets);
        Self {
            config,
            providers: HashMap::new(),
            prompt_builder,
            processor,
            request_timeout: None,
        }
    }

    /// 按程序配置创建：每个配置的提供方注册一个 OpenAI 兼容适配器
    pub fn from_config(config: &Config) -> Self {
        let pipeline_config = PipelineConfig::from_config(config);
        let prompt_builder = Arc::new(LayoutPromptBuilder::new(config.extended_widgets));
        let mut pipeline = Self::new(pipeline_config, prompt_builder)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs));

        for settings in &config.providers {
            pipeline.register(Arc::new(OpenAiCompatibleProvider::new(settings)));
        }
        pipeline
    }

    pub fn with_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.register(provider);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn ProviderAdapter>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 执行一次完整的生成
    pub async fn generate(
        &self,
        goal: &str,
        args: GenerationArgs,
        provider: Option<&str>,
    ) -> Result<GenerationOutcome, PipelineError> {
        let primary = provider
            .map(str::to_string)
            .unwrap_or_else(|| self.config.primary_provider.clone());

        let mut run = RunState::default();

        let parts = self.prompt_builder.build_prompt(goal, &args.context);
        let base = PromptParts {
            system: args
                .system
                .clone()
                .filter(|system| !system.trim().is_empty())
                .unwrap_or(parts.system),
            prompt: parts.prompt,
        };
        run.log.record(PipelineStep::PromptBuilt {
            provider: primary.clone(),
        });
        info!("🚀 开始生成，主提供方: {}", primary);

        let mut reason = match self
            .run_provider(&primary, goal, &base, &args, &mut run)
            .await?
        {
            ProviderRun::Succeeded { processed, attempt } => {
                return Ok(finish(processed, attempt, &primary, None, run.log));
            }
            ProviderRun::Exhausted(reason) => reason,
        };

        let mut providers_tried = vec![primary.clone()];

        for fallback in self.config.fallback_providers(&primary) {
            warn!("⚠️ 切换到备用提供方 {} (原因: {})", fallback, reason);
            run.log.record(PipelineStep::FallbackAttempt {
                provider: fallback.clone(),
                reason: reason.clone(),
            });
            providers_tried.push(fallback.clone());

            match self
                .run_provider(&fallback, goal, &base, &args, &mut run)
                .await?
            {
                ProviderRun::Succeeded { processed, attempt } => {
                    return Ok(finish(
                        processed,
                        attempt,
                        &fallback,
                        Some(primary.clone()),
                        run.log,
                    ));
                }
                ProviderRun::Exhausted(next_reason) => reason = next_reason,
            }
        }

        error!("❌ 所有提供方均失败: {}", providers_tried.join(", "));
        run.log
            .record(PipelineStep::AllFailed { providers_tried });

        Err(PipelineError::Exhausted {
            log: run.log,
            last_result: run.last_result.map(Box::new),
            last_error: run.last_error,
        })
    }

    /// 在单个提供方上执行重试循环
    async fn run_provider(
        &self,
        name: &str,
        goal: &str,
        base: &PromptParts,
        args: &GenerationArgs,
        run: &mut RunState,
    ) -> Result<ProviderRun, PipelineError> {
        let Some(adapter) = self.providers.get(name) else {
            warn!("⚠️ 提供方 {} 未注册", name);
            run.log.record(PipelineStep::ProviderUnavailable {
                provider: name.to_string(),
            });
            return Ok(ProviderRun::Exhausted("provider_unavailable".to_string()));
        };

        let mut feedback: Vec<Issue> = Vec::new();
        let mut reason = "validation_failed".to_string();

        for attempt in 1..=self.config.max_attempts() {
            if args.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                return Err(cancelled(name, attempt, run));
            }

            run.log.record(PipelineStep::Attempt {
                provider: name.to_string(),
                attempt,
            });
            info!("[{}] 第 {}/{} 次尝试", name, attempt, self.config.max_attempts());

            let parts = if attempt > 1 && !feedback.is_empty() {
                self.prompt_builder.build_retry_prompt(goal, &feedback)
            } else {
                base.clone()
            };
            let request = ProviderRequest {
                system: parts.system,
                prompt: parts.prompt,
                options: args.options.clone(),
            };

            let response = match self.send(adapter.as_ref(), &request, args).await {
                None => return Err(cancelled(name, attempt, run)),
                Some(Ok(response)) => response,
                Some(Err(err)) => {
                    warn!("[{}] ⚠️ 调用失败: {}", name, err);
                    run.log.record(PipelineStep::ApiError {
                        provider: name.to_string(),
                        attempt,
                        code: err.code,
                        message: err.message.clone(),
                        retryable: err.retryable,
                    });

                    if !err.retryable {
                        error!("[{}] ❌ 不可重试错误，终止生成", name);
                        return Err(PipelineError::NonRetryable {
                            provider: name.to_string(),
                            source: err,
                            log: std::mem::take(&mut run.log),
                        });
                    }

                    feedback = vec![Issue::new(
                        IssueCode::ProviderFailure,
                        err.message.clone(),
                        API_PATH,
                    )];
                    reason = err.to_string();
                    run.last_error = Some(err);
                    continue;
                }
            };

            match self.process_response(&response) {
                Ok(processed) => {
                    info!(
                        "[{}] ✓ 第 {} 次尝试成功 (修复 {} 处)",
                        name,
                        attempt,
                        processed.repairs.len()
                    );
                    run.log.record(PipelineStep::Success {
                        provider: name.to_string(),
                        attempt,
                        repairs: processed.repairs.len(),
                    });
                    return Ok(ProviderRun::Succeeded { processed, attempt });
                }
                Err(rejected) => {
                    warn!(
                        "[{}] ⚠️ 第 {} 次尝试校验失败 ({} 个错误)",
                        name,
                        attempt,
                        rejected.errors.len()
                    );
                    run.log.record(PipelineStep::ValidationFailed {
                        provider: name.to_string(),
                        attempt,
                        errors: rejected.errors.clone(),
                    });
                    run.last_result = Some(PartialResult {
                        provider: name.to_string(),
                        attempt,
                        errors: rejected.errors.clone(),
                        data: rejected.data,
                    });
                    feedback = rejected.errors;
                    reason = "validation_failed".to_string();
                }
            }
        }

        Ok(ProviderRun::Exhausted(reason))
    }

    /// 调用提供方，返回 None 表示被取消
    async fn send(
        &self,
        adapter: &dyn ProviderAdapter,
        request: &ProviderRequest,
        args: &GenerationArgs,
    ) -> Option<Result<RawResponse, ProviderError>> {
        let limit = args.timeout.or(self.request_timeout);
        let call = async {
            match limit {
                Some(limit) => match tokio::time::timeout(limit, adapter.send(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::timeout(limit.as_secs())),
                },
                None => adapter.send(request).await,
            }
        };

        match &args.cancel {
            Some(cancel) => tokio::select! {
                result = call => Some(result),
                _ = cancel.cancelled() => None,
            },
            None => Some(call.await),
        }
    }

    /// 取第一条通过校验的消息；都不通过时返回第一条消息的问题
    fn process_response(&self, response: &RawResponse) -> Result<ProcessedMessage, RejectedMessage> {
        let mut first_rejection = None;

        for message in &response.messages {
            match self.processor.process(message) {
                Ok(processed) => return Ok(processed),
                Err(rejected) => {
                    debug!("消息被拒绝: {} 个错误", rejected.errors.len());
                    first_rejection.get_or_insert(rejected);
                }
            }
        }

        Err(first_rejection.unwrap_or_else(|| RejectedMessage {
            errors: vec![Issue::new(
                IssueCode::NoContent,
                "No layout content found in response.",
                ROOT_PATH,
            )],
            data: None,
            repairs: Vec::new(),
        }))
    }
}

fn cancelled(provider: &str, attempt: u32, run: &mut RunState) -> PipelineError {
    warn!("[{}] ⚠️ 生成已取消 (第 {} 次尝试)", provider, attempt);
    run.log.record(PipelineStep::Cancelled {
        provider: provider.to_string(),
        attempt,
    });
    PipelineError::Cancelled {
        log: std::mem::take(&mut run.log),
    }
}

fn finish(
    processed: ProcessedMessage,
    attempt: u32,
    provider: &str,
    original_provider: Option<String>,
    log: PipelineLog,
) -> GenerationOutcome {
    let fallback_used = original_provider.as_ref().map(|_| provider.to_string());
    GenerationOutcome {
        document: processed.document,
        repairs: processed.repairs,
        warnings: processed.warnings,
        attempt_count: attempt,
        provider: provider.to_string(),
        fallback_used,
        original_provider,
        pipeline_log: log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl ProviderAdapter for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn send(&self, _request: &ProviderRequest) -> Result<RawResponse, ProviderError> {
            Ok(RawResponse::document(vec![
                "not json".to_string(),
                r#"{"elements":[{"id":"s1","elType":"section","elements":[]}]}"#.to_string(),
            ]))
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            primary_provider: "echo".to_string(),
            provider_priority: vec!["echo".to_string()],
            credentials: HashMap::from([("echo".to_string(), true)]),
            max_retries: 2,
            extended_widgets: false,
        }
    }

    #[tokio::test]
    async fn test_first_valid_message_wins() {
        let pipeline = GenerationPipeline::new(config(), Arc::new(LayoutPromptBuilder::default()))
            .with_provider(Arc::new(EchoProvider));

        let outcome = pipeline
            .generate("Hero", GenerationArgs::default(), None)
            .await
            .unwrap();
        assert_eq!(outcome.provider, "echo");
        assert_eq!(outcome.attempt_count, 1);
        assert_eq!(outcome.document.all_ids(), vec!["s1"]);
        assert_eq!(outcome.fallback_used, None);
        assert_eq!(
            outcome.pipeline_log.step_names(),
            vec!["prompt_built", "attempt", "success"]
        );
    }

    #[tokio::test]
    async fn test_unregistered_primary_goes_to_fallback() {
        let pipeline = GenerationPipeline::new(config(), Arc::new(LayoutPromptBuilder::default()))
            .with_provider(Arc::new(EchoProvider));

        let outcome = pipeline
            .generate("Hero", GenerationArgs::default(), Some("missing"))
            .await
            .unwrap();
        assert_eq!(outcome.fallback_used.as_deref(), Some("echo"));
        assert_eq!(outcome.original_provider.as_deref(), Some("missing"));
        assert!(outcome.pipeline_log.steps().any(|step| matches!(
            step,
            PipelineStep::FallbackAttempt { reason, .. } if reason == "provider_unavailable"
        )));
    }

    #[tokio::test]
    async fn test_no_registered_providers_is_exhausted() {
        let pipeline = GenerationPipeline::new(config(), Arc::new(LayoutPromptBuilder::default()));
        let err = pipeline
            .generate("Hero", GenerationArgs::default(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Exhausted { .. }));
        assert_eq!(err.log().count("provider_unavailable"), 1);
        assert_eq!(err.log().count("all_failed"), 1);
        assert_eq!(err.log().attempt_count(), 0);
    }

    #[test]
    fn test_from_config_registers_providers() {
        let pipeline = GenerationPipeline::from_config(&Config::default());
        assert_eq!(pipeline.provider_names(), vec!["anthropic", "grok", "openai"]);
        assert_eq!(pipeline.config().primary_provider, "grok");
    }
}

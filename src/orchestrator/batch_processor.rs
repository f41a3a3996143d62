//! 批量生成处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **批量加载**：读取任务文件（`Vec<GenerationJob>`）
//! 2. **并发控制**：使用 Semaphore 限制同时运行的 `generate()` 数量
//! 3. **结果落盘**：成功的布局写入输出目录，失败写入失败日志
//! 4. **全局统计**：汇总所有任务的处理结果
//!
//! 每个任务是一次独立的 `generate()` 调用，任务之间不共享可变状态。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::CancelSignal;
use crate::models::{ensure_unique_names, GenerationJob};
use crate::orchestrator::generation_pipeline::{GenerationArgs, GenerationPipeline};
use crate::services::{OutputWriter, PromptContext};

/// 单个任务的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// 已写入的布局文件
    Written(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub name: String,
    pub status: JobStatus,
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

/// 批量处理器
pub struct BatchProcessor {
    pipeline: Arc<GenerationPipeline>,
    writer: Arc<OutputWriter>,
    max_concurrent_jobs: usize,
    cancel: CancelSignal,
}

impl BatchProcessor {
    pub fn new(config: &Config, pipeline: GenerationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            writer: Arc::new(OutputWriter::new(
                &config.output_dir,
                &config.failure_log_file,
            )),
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
            cancel: CancelSignal::new(),
        }
    }

    /// 用于外部中断（如 Ctrl-C）的取消信号
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// 处理所有任务
    pub async fn run(&self, jobs: Vec<GenerationJob>) -> Result<(BatchStats, Vec<JobReport>)> {
        if jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的任务");
            return Ok((BatchStats::default(), Vec::new()));
        }
        ensure_unique_names(&jobs)?;

        log_jobs_loaded(jobs.len(), self.max_concurrent_jobs);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_jobs));
        let mut handles = Vec::with_capacity(jobs.len());

        for (index, job) in jobs.into_iter().enumerate() {
            let job_index = index + 1;
            let semaphore = semaphore.clone();
            let pipeline = self.pipeline.clone();
            let writer = self.writer.clone();
            let cancel = self.cancel.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                Ok::<_, anyhow::Error>(process_job(&pipeline, &writer, job, job_index, cancel).await)
            }));
        }

        let mut stats = BatchStats::default();
        let mut reports = Vec::new();

        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            stats.total += 1;
            match joined {
                Ok(Ok(report)) => {
                    match report.status {
                        JobStatus::Written(_) => stats.success += 1,
                        JobStatus::Failed(_) => stats.failed += 1,
                    }
                    reports.push(report);
                }
                Ok(Err(e)) => {
                    error!("[任务 {}] ❌ 无法获取并发许可: {}", index + 1, e);
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("[任务 {}] 任务执行失败: {}", index + 1, e);
                    stats.failed += 1;
                }
            }
        }

        print_final_stats(&stats, self.writer.output_dir());
        Ok((stats, reports))
    }
}

/// 处理单个任务：生成 → 写文件 / 写失败日志
async fn process_job(
    pipeline: &GenerationPipeline,
    writer: &OutputWriter,
    job: GenerationJob,
    job_index: usize,
    cancel: CancelSignal,
) -> JobReport {
    info!("[任务 {}] 📄 开始生成: {}", job_index, job.name);

    let args = GenerationArgs {
        context: job
            .knowledge
            .as_deref()
            .map(PromptContext::with_knowledge)
            .unwrap_or_default(),
        system: job.system.clone(),
        cancel: Some(cancel),
        ..GenerationArgs::default()
    };

    let status = match pipeline
        .generate(&job.prompt, args, job.provider.as_deref())
        .await
    {
        Ok(outcome) => {
            if let Some(fallback) = &outcome.fallback_used {
                info!("[任务 {}] 使用了备用提供方 {}", job_index, fallback);
            }
            match writer.write_document(&job.name, &outcome.document).await {
                Ok(path) => {
                    info!(
                        "[任务 {}] ✓ 已写入 {} ({})",
                        job_index,
                        path.display(),
                        outcome.document.structural_counts().describe()
                    );
                    JobStatus::Written(path)
                }
                Err(e) => {
                    error!("[任务 {}] ❌ 写入失败: {}", job_index, e);
                    JobStatus::Failed(e.to_string())
                }
            }
        }
        Err(e) => {
            error!("[任务 {}] ❌ 生成失败: {}", job_index, e);
            if let Err(write_err) = writer.write_failure(&job.name, &e.to_string(), e.log()).await {
                error!("[任务 {}] 失败日志写入失败: {}", job_index, write_err);
            }
            JobStatus::Failed(e.to_string())
        }
    };

    JobReport {
        name: job.name,
        status,
    }
}

// ========== 日志辅助函数 ==========

fn log_jobs_loaded(total: usize, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("✓ 找到 {} 个待处理的任务", total);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

fn print_final_stats(stats: &BatchStats, output_dir: &std::path::Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", stats.success, stats.total);
    info!("❌ 失败: {}", stats.failed);
    info!("{}", "=".repeat(60));
    info!("\n输出目录: {}", output_dir.display());
}

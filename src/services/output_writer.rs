//! 输出写入服务 - 业务能力层
//!
//! 只负责"写结果文件 / 追加失败日志"能力，不关心流程

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::document::Document;
use crate::models::loaders::sanitize_file_name;
use crate::models::pipeline_log::PipelineLog;

/// 输出写入服务
///
/// 职责：
/// - 将通过校验的布局写为 `<output_dir>/<name>.json`
/// - 将失败的任务追加到失败日志，附带步骤日志
/// - 只处理单个任务
pub struct OutputWriter {
    output_dir: PathBuf,
    failure_log_path: PathBuf,
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>, failure_log_path: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            failure_log_path: failure_log_path.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 写入布局文件，返回文件路径
    pub async fn write_document(&self, name: &str, document: &Document) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| AppError::file_write_failed(self.output_dir.display().to_string(), e))?;

        let path = self.output_dir.join(format!("{}.json", sanitize_file_name(name)));
        let json = serde_json::to_string_pretty(document)?;

        debug!("写入布局: {} ({} 字节)", path.display(), json.len());
        fs::write(&path, json)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        Ok(path)
    }

    /// 追加失败记录
    pub async fn write_failure(&self, name: &str, reason: &str, log: &PipelineLog) -> AppResult<()> {
        debug!("写入失败记录: {} | {}", name, reason);

        let mut entry = format!("任务 {} | 原因: {}\n", name, reason);
        for event in log.events() {
            entry.push_str(&format!(
                "  {} {}\n",
                event.time.format("%H:%M:%S%.3f"),
                serde_json::to_string(&event.step)?
            ));
        }

        let path = self.failure_log_path.display().to_string();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.failure_log_path)
            .await
            .map_err(|e| AppError::file_write_failed(path.clone(), e))?;

        file.write_all(entry.as_bytes())
            .await
            .map_err(|e| AppError::file_write_failed(path.clone(), e))?;
        // tokio 的文件写入在后台线程完成，返回前必须 flush
        file.flush()
            .await
            .map_err(|e| AppError::file_write_failed(path, e))?;

        Ok(())
    }
}

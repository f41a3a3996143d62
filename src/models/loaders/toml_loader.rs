use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 一个批量生成任务
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationJob {
    /// 任务名，同时作为输出文件名
    pub name: String,
    /// 用户的页面目标描述
    pub prompt: String,
    /// 指定提供方（缺省使用配置中的主提供方）
    #[serde(default)]
    pub provider: Option<String>,
    /// 覆盖系统提示词
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub knowledge: Option<String>,
}

/// 任务文件：`[[jobs]]` 列表
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFile {
    #[serde(default)]
    pub jobs: Vec<GenerationJob>,
}

/// 从 TOML 文件加载任务列表
pub async fn load_jobs_file(toml_file_path: &Path) -> Result<Vec<GenerationJob>> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取任务文件: {}", toml_file_path.display()))?;

    let file: JobFile = toml::from_str(&content)
        .with_context(|| format!("无法解析任务文件: {}", toml_file_path.display()))?;

    ensure_unique_names(&file.jobs)?;
    Ok(file.jobs)
}

/// 从文件夹中加载所有 TOML 任务文件，单个文件失败只记录警告
pub async fn load_job_folder(folder_path: &Path) -> Result<Vec<GenerationJob>> {
    if !folder_path.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path.display());
    }

    let mut toml_files: Vec<PathBuf> = Vec::new();
    let mut entries = fs::read_dir(folder_path)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut jobs = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_jobs_file(&path).await {
            Ok(loaded) => {
                tracing::info!("成功加载 {} 个任务", loaded.len());
                jobs.extend(loaded);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    ensure_unique_names(&jobs)?;
    Ok(jobs)
}

/// 检查任务的输出文件名互不相同，否则后完成的任务会覆盖先完成的
pub fn ensure_unique_names(jobs: &[GenerationJob]) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for job in jobs {
        let stem = sanitize_file_name(&job.name);
        if let Some(previous) = seen.insert(stem.clone(), &job.name) {
            anyhow::bail!(
                "任务 \"{}\" 与 \"{}\" 的输出文件名相同: {}.json",
                previous,
                job.name,
                stem
            );
        }
    }
    Ok(())
}

/// 任务名 → 安全的文件名
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized
    }
}

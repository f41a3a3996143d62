//! `layout-pipeline` 命令行入口
//!
//! - `validate <file>`：只校验，不修复
//! - `repair <file>`：修复并输出修复记录
//! - `variations <file>...`：每个文件视为一条候选消息，组装变体
//! - `generate <goal>`：调用提供方生成布局
//! - `batch <jobs>`：批量执行任务文件（或任务目录）

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};

use layout_pipeline::config::Config;
use layout_pipeline::infrastructure::RequestOptions;
use layout_pipeline::models::{load_job_folder, load_jobs_file};
use layout_pipeline::orchestrator::{BatchProcessor, GenerationArgs, GenerationPipeline};
use layout_pipeline::services::{JsonRepair, OutputWriter, PromptContext, SchemaValidator};
use layout_pipeline::utils::logging;
use layout_pipeline::utils::truncate_text;
use layout_pipeline::workflow::VariationBuilder;

#[derive(Parser)]
#[command(name = "layout-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate, repair and generate page layout JSON", long_about = None)]
struct Cli {
    /// TOML 配置文件（缺省只使用环境变量）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a layout JSON file without repairing it
    Validate { file: PathBuf },

    /// Repair a layout JSON file (or raw model output)
    Repair {
        file: PathBuf,

        /// Write the repaired layout here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build variations from several raw model outputs
    Variations {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate a layout through the provider pipeline
    Generate {
        goal: String,

        /// Provider to use instead of the configured primary
        #[arg(short, long)]
        provider: Option<String>,

        /// Name of the output file
        #[arg(short, long, default_value = "layout")]
        name: String,

        /// Extra knowledge passed to the prompt
        #[arg(short, long)]
        knowledge: Option<String>,
    },

    /// Run every job in a TOML jobs file or folder
    Batch { jobs: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { file } => validate(&config, &file).await,
        Commands::Repair { file, output } => repair(&file, output.as_deref()).await,
        Commands::Variations { files } => variations(&config, &files).await,
        Commands::Generate {
            goal,
            provider,
            name,
            knowledge,
        } => generate(&config, &goal, provider.as_deref(), &name, knowledge).await,
        Commands::Batch { jobs } => batch(&config, &jobs).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };
    Ok(config)
}

async fn read_input(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取文件: {}", path.display()))
}

async fn validate(config: &Config, file: &Path) -> Result<()> {
    let input = read_input(file).await?;
    let report = SchemaValidator::new(config.extended_widgets).validate(&input);

    if report.valid {
        info!("✓ 校验通过 ({} 个警告)", report.warnings.len());
    } else {
        warn!("⚠️ 校验失败: {} 个错误", report.errors.len());
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}

async fn repair(file: &Path, output: Option<&Path>) -> Result<()> {
    let input = read_input(file).await?;
    let result = JsonRepair::new().repair(&input);

    for entry in &result.repairs {
        info!("🔧 [{}] {} (at {})", entry.kind, entry.message, entry.path);
    }

    let Some(data) = result.data.as_ref().filter(|_| result.success) else {
        anyhow::bail!(
            "修复失败: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    };

    match output {
        Some(path) => {
            tokio::fs::write(path, serde_json::to_string_pretty(data)?)
                .await
                .with_context(|| format!("无法写入文件: {}", path.display()))?;
            info!("✓ 已写入 {} (修复 {} 处)", path.display(), result.repairs.len());
        }
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}

async fn variations(config: &Config, files: &[PathBuf]) -> Result<()> {
    let mut messages = Vec::with_capacity(files.len());
    for file in files {
        messages.push(read_input(file).await?);
    }

    let variations = VariationBuilder::new(config.extended_widgets)
        .build_document_variations(&messages, None)?;

    for variation in &variations {
        info!(
            "✓ {} | {} | 修复 {} 处",
            variation.label,
            variation.summary,
            variation.repairs.len()
        );
    }
    println!("{}", serde_json::to_string_pretty(&variations)?);
    Ok(())
}

async fn generate(
    config: &Config,
    goal: &str,
    provider: Option<&str>,
    name: &str,
    knowledge: Option<String>,
) -> Result<()> {
    logging::log_startup("generate", provider.unwrap_or(&config.pipeline.primary_provider));
    info!("🎯 目标: {}", truncate_text(goal, 80));

    let pipeline = GenerationPipeline::from_config(config);
    let args = GenerationArgs {
        context: knowledge
            .map(PromptContext::with_knowledge)
            .unwrap_or_default(),
        options: RequestOptions {
            variations: 1,
            ..RequestOptions::default()
        },
        ..GenerationArgs::default()
    };

    let writer = OutputWriter::new(&config.output_dir, &config.failure_log_file);

    match pipeline.generate(goal, args, provider).await {
        Ok(outcome) => {
            let path = writer.write_document(name, &outcome.document).await?;
            info!(
                "✓ 已写入 {} | 提供方 {} | 第 {} 次尝试 | 修复 {} 处",
                path.display(),
                outcome.provider,
                outcome.attempt_count,
                outcome.repairs.len()
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "output": path,
                    "provider": outcome.provider,
                    "fallbackUsed": outcome.fallback_used,
                    "attemptCount": outcome.attempt_count,
                    "repairs": outcome.repairs,
                    "pipelineLog": outcome.pipeline_log,
                }))?
            );
            Ok(())
        }
        Err(e) => {
            writer.write_failure(name, &e.to_string(), e.log()).await?;
            println!("{}", serde_json::to_string_pretty(e.log())?);
            Err(e.into())
        }
    }
}

async fn batch(config: &Config, jobs_path: &Path) -> Result<()> {
    logging::log_startup("batch", &config.pipeline.primary_provider);

    let jobs = if jobs_path.is_dir() {
        load_job_folder(jobs_path).await?
    } else {
        load_jobs_file(jobs_path).await?
    };

    let processor = BatchProcessor::new(config, GenerationPipeline::from_config(config));
    let cancel = processor.cancel_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，取消剩余任务");
            cancel.cancel();
        }
    });

    let (stats, _) = processor.run(jobs).await?;
    if stats.failed > 0 {
        warn!("⚠️ {} 个任务失败", stats.failed);
    }
    Ok(())
}

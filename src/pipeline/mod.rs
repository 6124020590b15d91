//! 图片转换流水线：把源图片变成一组固定命名的风格化产物
//!
//! 流水线本身是外部黑盒；CommandPipeline 以子进程方式调用，带超时并校验四个产物都已生成。

pub mod mock;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::PipelineSection;
use crate::core::BotError;

pub use mock::MockPipeline;

/// 流水线产物文件名（已按上传顺序排列）
pub const ARTIFACT_NAMES: [&str; 4] = [
    "0-resize.jpg",
    "3-find-structure.jpg",
    "4-create-painting.jpg",
    "5-create-overlay.jpg",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransformMode {
    /// 处理用户提供的图片
    Reply { source: PathBuf },
    /// 流水线自选源图片（主动发推）
    Unsolicited,
}

#[async_trait]
pub trait TransformPipeline: Send + Sync {
    /// 返回按 ARTIFACT_NAMES 顺序排列的产物路径
    async fn transform(&self, mode: &TransformMode) -> Result<Vec<PathBuf>, BotError>;
}

/// 外部程序流水线：`<program> <args..> --input <src> --output <dir>` 或 `--random --output <dir>`
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl CommandPipeline {
    /// program 与 args 之后追加 --input/--random 与 --output 参数
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    /// 从 [pipeline] 段构建，产物写入 output_dir
    pub fn from_config(cfg: &PipelineSection, output_dir: &Path) -> Self {
        Self::new(
            cfg.program.clone(),
            cfg.args.clone(),
            output_dir,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn artifact_paths(&self) -> Vec<PathBuf> {
        ARTIFACT_NAMES
            .iter()
            .map(|name| self.output_dir.join(name))
            .collect()
    }

    /// 清掉上一次的产物，避免失败时误传旧图
    async fn clear_stale_artifacts(&self) {
        for path in self.artifact_paths() {
            let _ = tokio::fs::remove_file(&path).await;
        }
    }
}

#[async_trait]
impl TransformPipeline for CommandPipeline {
    async fn transform(&self, mode: &TransformMode) -> Result<Vec<PathBuf>, BotError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| BotError::Transform(format!("output dir: {}", e)))?;
        self.clear_stale_artifacts().await;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        match mode {
            TransformMode::Reply { source } => {
                cmd.arg("--input").arg(source);
            }
            TransformMode::Unsolicited => {
                cmd.arg("--random");
            }
        }
        cmd.arg("--output").arg(&self.output_dir);
        cmd.kill_on_drop(true);

        tracing::info!(program = %self.program, ?mode, "running transform pipeline");

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| BotError::Transform(format!("pipeline timed out after {:?}", self.timeout)))?
            .map_err(|e| BotError::Transform(format!("spawn {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BotError::Transform(format!(
                "exit {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let artifacts = self.artifact_paths();
        for path in &artifacts {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(BotError::Transform(format!(
                    "missing artifact {}",
                    path.display()
                )));
            }
        }
        Ok(artifacts)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const WRITE_ALL: &str = r#"
        out=""; mode=""
        while [ $# -gt 0 ]; do
            case "$1" in
                --output) out="$2"; shift ;;
                --random) mode="random" ;;
                --input) mode="reply" ;;
            esac
            shift
        done
        for f in 0-resize 3-find-structure 4-create-painting 5-create-overlay; do
            echo "$mode" > "$out/$f.jpg"
        done
    "#;

    fn sh_pipeline(script: &str, out: &Path) -> CommandPipeline {
        CommandPipeline::new(
            "sh",
            vec!["-c".into(), script.into(), "pipeline".into()],
            out,
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn test_reply_mode_returns_artifacts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = sh_pipeline(WRITE_ALL, dir.path());
        let artifacts = pipeline
            .transform(&TransformMode::Reply {
                source: dir.path().join("in.jpg"),
            })
            .await
            .unwrap();
        let names: Vec<_> = artifacts
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ARTIFACT_NAMES);
        let content = std::fs::read_to_string(&artifacts[0]).unwrap();
        assert_eq!(content.trim(), "reply");
    }

    #[tokio::test]
    async fn test_unsolicited_mode_passes_random_flag() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = sh_pipeline(WRITE_ALL, dir.path());
        let artifacts = pipeline.transform(&TransformMode::Unsolicited).await.unwrap();
        let content = std::fs::read_to_string(&artifacts[3]).unwrap();
        assert_eq!(content.trim(), "random");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_transform_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = sh_pipeline("echo 'no contours' >&2; exit 3", dir.path());
        let err = pipeline.transform(&TransformMode::Unsolicited).await.unwrap_err();
        match err {
            BotError::Transform(msg) => assert!(msg.contains("no contours")),
            other => panic!("Expected Transform, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_artifact_is_transform_error() {
        let dir = tempfile::tempdir().unwrap();
        // 预先放一个旧产物，确认会被清理而不是被当作本次输出
        std::fs::write(dir.path().join("5-create-overlay.jpg"), "stale").unwrap();
        let pipeline = sh_pipeline(": > \"$3\"/0-resize.jpg", dir.path());
        let err = pipeline.transform(&TransformMode::Unsolicited).await.unwrap_err();
        assert!(matches!(err, BotError::Transform(_)));
        assert!(!dir.path().join("5-create-overlay.jpg").exists());
    }

    #[tokio::test]
    async fn test_timeout_is_transform_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CommandPipeline::new(
            "sh",
            vec!["-c".into(), "sleep 5".into(), "pipeline".into()],
            dir.path(),
            Duration::from_millis(100),
        );
        let err = pipeline.transform(&TransformMode::Unsolicited).await.unwrap_err();
        assert!(matches!(err, BotError::Transform(_)));
    }
}

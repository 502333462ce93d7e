use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::infrastructure::error::PipelineError;

/// 最新提交相对其父提交的 unified diff 文本
///
/// 不变式：进入后续阶段时永远非空。空 diff、无提交、无父提交
/// 都在提取阶段终止，而不是携带零长度内容继续。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffPayload(String);

impl DiffPayload {
    pub fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// diff 来源能力接口，编排器只依赖该接口
#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn diff(&self) -> Result<DiffPayload, PipelineError>;
}

/// 基于 git 命令行的 diff 提取器
///
/// 始终比较 HEAD 与其直接父提交（HEAD^），不做区间或 merge-base 比较。
pub struct GitDiffExtractor {
    repo_dir: PathBuf,
    timeout: Duration,
}

impl GitDiffExtractor {
    pub fn new(repo_dir: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            repo_dir: repo_dir.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// 在仓库目录内执行一条 git 命令，带超时
    async fn run_git(&self, args: &[&str], operation: &str) -> Result<Output, PipelineError> {
        let fut = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output();

        let output = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| PipelineError::timeout(operation.to_string(), self.timeout.as_secs()))?
            .map_err(|e| {
                PipelineError::diff_extraction(format!("Failed to run {}: {}", operation, e), None)
            })?;

        Ok(output)
    }
}

#[async_trait]
impl DiffSource for GitDiffExtractor {
    async fn diff(&self) -> Result<DiffPayload, PipelineError> {
        // 显式探测 HEAD 是否存在，而不是等 diff 命令崩溃后猜测原因
        let head = self.run_git(&["rev-parse", "--verify", "HEAD"], "git rev-parse HEAD").await?;
        if !head.status.success() {
            return Err(PipelineError::no_commits(
                "repository has no commits to review",
            ));
        }

        // 初始提交没有父提交，同样是终止条件
        let parent = self
            .run_git(&["rev-parse", "--verify", "HEAD^"], "git rev-parse HEAD^")
            .await?;
        if !parent.status.success() {
            return Err(PipelineError::no_commits(
                "latest commit has no parent (initial commit)",
            ));
        }

        let output = self.run_git(&["diff", "HEAD^", "HEAD"], "git diff").await?;
        if !output.status.success() {
            return Err(PipelineError::diff_extraction(
                format!(
                    "git diff failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                output.status.code(),
            ));
        }

        // 保留 git 输出的行序与结尾内容，不做任何整形
        let text = String::from_utf8_lossy(&output.stdout).to_string();
        if text.trim().is_empty() {
            return Err(PipelineError::no_commits(
                "latest commit introduces no textual change",
            ));
        }

        Ok(DiffPayload::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_payload_preserves_content() {
        let text = "diff --git a/f b/f\n+added line\n".to_string();
        let payload = DiffPayload::new(text.clone());
        assert_eq!(payload.as_str(), text);
        assert_eq!(payload.len(), text.len());
        assert!(!payload.is_empty());
    }

    #[tokio::test]
    async fn test_diff_outside_repository_is_classified() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let extractor = GitDiffExtractor::new(temp_dir.path(), Duration::from_secs(10));

        let result = extractor.diff().await;
        match result {
            Err(PipelineError::NoCommits { .. }) => {}
            other => panic!("expected NoCommits in a non-repository, got {:?}", other),
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::ai::{AiReviewClient, ReviewBackend};
use crate::config::{CommitMeta, Config};
use crate::git::{DiffSource, GitDiffExtractor};
use crate::infrastructure::error::PipelineError;
use crate::notification::{NotificationChannel, ReviewNotification, TokenCache, WeChatChannel};
use crate::publish::{ArtifactStore, GitLogPublisher, LogArtifact};

/// 运行状态机，只有前向迁移
///
/// 任一阶段失败直接进入 Failed；失败的运行必须从 Start 重新
/// 发起，不存在跨阶段的部分重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    DiffExtracted,
    Reviewed,
    Published,
    Notified,
    Done,
    Failed,
}

/// 一次成功运行的结果
///
/// 发布成功后通知失败不回滚发布，运行仍视为成功；
/// notified 与 notify_error 记录这种部分完成。
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub artifact: LogArtifact,
    pub notified: bool,
    pub notify_error: Option<PipelineError>,
}

/// 流水线编排器
///
/// 组合四个能力接口，严格串行推进；失败传播到调用方，
/// 由进程入口决定退出码。
pub struct ReviewPipeline {
    diff_source: Arc<dyn DiffSource>,
    backend: Arc<dyn ReviewBackend>,
    store: Arc<dyn ArtifactStore>,
    channel: Arc<dyn NotificationChannel>,
    meta: CommitMeta,
    recipient: String,
    template_id: String,
}

impl ReviewPipeline {
    pub fn new(
        diff_source: Arc<dyn DiffSource>,
        backend: Arc<dyn ReviewBackend>,
        store: Arc<dyn ArtifactStore>,
        channel: Arc<dyn NotificationChannel>,
        config: &Config,
    ) -> Self {
        Self {
            diff_source,
            backend,
            store,
            channel,
            meta: config.commit_meta(),
            recipient: config.recipient.clone(),
            template_id: config.template_id.clone(),
        }
    }

    /// 按配置装配生产组件
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let tokens = Arc::new(TokenCache::new(config));

        Self::new(
            Arc::new(GitDiffExtractor::new(".", timeout)),
            Arc::new(AiReviewClient::new(config)),
            Arc::new(GitLogPublisher::new(config)),
            Arc::new(WeChatChannel::new(config, tokens)),
            config,
        )
    }

    fn fail(state: RunState, e: PipelineError) -> PipelineError {
        error!(
            from_state = ?state,
            to_state = ?RunState::Failed,
            stage = e.stage().as_str(),
            "pipeline failed: {}",
            e
        );
        e
    }

    /// 执行一次完整的流水线运行
    pub async fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        let mut state = RunState::Start;
        info!(state = ?state, project = %self.meta.project, "pipeline run started");

        let diff = self
            .diff_source
            .diff()
            .await
            .map_err(|e| Self::fail(state, e))?;
        state = RunState::DiffExtracted;
        info!(state = ?state, diff_bytes = diff.len(), "diff extracted");

        let report = self
            .backend
            .review(&diff)
            .await
            .map_err(|e| Self::fail(state, e))?;
        state = RunState::Reviewed;
        info!(state = ?state, report_bytes = report.as_str().len(), "review completed");

        let artifact = match self.store.publish(&report, &self.meta).await {
            Ok(artifact) => artifact,
            Err(e) => {
                // 报告未能持久化时完整落入运行日志，内容不丢失
                error!("publish failed, review report follows:\n{}", report.as_str());
                return Err(Self::fail(state, e));
            }
        };
        state = RunState::Published;
        info!(state = ?state, url = %artifact.url, "report published");

        // 发布成功是持久化分界点：此后通知失败不再使运行失败
        let message = self.build_notification(&artifact);
        let (state, notified, notify_error) = match self.channel.notify(&message).await {
            Ok(()) => (RunState::Notified, true, None),
            Err(e) => {
                warn!(
                    stage = e.stage().as_str(),
                    url = %artifact.url,
                    "report was published but notification failed: {}",
                    e
                );
                (RunState::Published, false, Some(e))
            }
        };

        info!(state = ?RunState::Done, from_state = ?state, notified, "pipeline run finished");
        Ok(PipelineOutcome {
            artifact,
            notified,
            notify_error,
        })
    }

    fn build_notification(&self, artifact: &LogArtifact) -> ReviewNotification {
        ReviewNotification::new(
            self.recipient.as_str(),
            self.template_id.as_str(),
            artifact.url.as_str(),
        )
        .with_field("project", self.meta.project.as_str())
        .with_field("branch", self.meta.branch.as_str())
        .with_field("author", self.meta.author.as_str())
        .with_field("commit", self.meta.message.as_str())
    }
}

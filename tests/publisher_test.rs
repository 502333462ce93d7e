use std::path::Path;

use chrono::Utc;
use tempfile::TempDir;
use tokio::process::Command;

use ai_review::ai::ReviewResult;
use ai_review::config::{CommitMeta, Config};
use ai_review::infrastructure::error::PipelineError;
use ai_review::publish::{ArtifactStore, GitLogPublisher};

async fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

async fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await
        .expect("failed to spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// 搭建一个带 main 分支初始提交的裸仓库，返回 (守卫, file:// 地址)
async fn seed_bare_repo() -> (TempDir, String) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let bare = temp_dir.path().join("review-logs.git");
    let seed = temp_dir.path().join("seed");

    tokio::fs::create_dir_all(&bare).await.unwrap();
    git(&bare, &["init", "--bare"]).await;

    tokio::fs::create_dir_all(&seed).await.unwrap();
    git(&seed, &["init"]).await;
    git(&seed, &["checkout", "-b", "main"]).await;
    tokio::fs::write(seed.join("README.md"), "# review logs\n")
        .await
        .unwrap();
    git(&seed, &["add", "-A"]).await;
    git(
        &seed,
        &[
            "-c",
            "user.name=seed",
            "-c",
            "user.email=seed@example.com",
            "commit",
            "-m",
            "chore: seed log repository",
        ],
    )
    .await;
    git(
        &seed,
        &["push", &format!("file://{}", bare.display()), "main"],
    )
    .await;

    let url = format!("file://{}", bare.display());
    (temp_dir, url)
}

fn test_config(log_repo_url: String) -> Config {
    Config {
        app_id: "app".to_string(),
        app_secret: "secret".to_string(),
        identity_url: "https://identity.test".to_string(),
        recipient: "open-id-1".to_string(),
        template_id: "tpl-1".to_string(),
        notify_url: "https://notify.test".to_string(),
        ai_url: "https://ai.test".to_string(),
        ai_api_key: "key".to_string(),
        ai_model: "deepseek-chat".to_string(),
        log_repo_url,
        log_repo_token: "unused-for-file-remotes".to_string(),
        log_repo_branch: "main".to_string(),
        project: "demo".to_string(),
        branch: "feature/login".to_string(),
        author: "alice".to_string(),
        commit_message: "feat: add login".to_string(),
        max_diff_bytes: 51200,
        timeout_seconds: 30,
        debug: false,
    }
}

fn meta() -> CommitMeta {
    CommitMeta {
        project: "demo".to_string(),
        branch: "feature/login".to_string(),
        author: "alice".to_string(),
        message: "feat: add login".to_string(),
    }
}

#[tokio::test]
async fn test_publish_commits_report_and_composes_url() {
    let (_guard, repo_url) = seed_bare_repo().await;
    let publisher = GitLogPublisher::new(&test_config(repo_url.clone()));
    let report = ReviewResult::new("## 审查报告\n\n没有发现问题\n".to_string());

    let artifact = publisher.publish(&report, &meta()).await.unwrap();

    // 路径形如 <日期>/<项目>-<分支>-<作者>-<唯一id>.md
    let date = Utc::now().format("%Y-%m-%d").to_string();
    assert!(artifact.path.starts_with(&format!("{}/demo-feature-login-alice-", date)));
    assert!(artifact.path.ends_with(".md"));

    // 浏览链接 = 基地址(去 .git) + /blob/<分支>/<路径>
    let base = repo_url.trim_end_matches(".git");
    assert_eq!(artifact.url, format!("{}/blob/main/{}", base, artifact.path));

    // 报告确实推到了远端，且内容逐字节一致
    let bare = repo_url.trim_start_matches("file://");
    let files = git_stdout(Path::new(bare), &["ls-tree", "-r", "main", "--name-only"]).await;
    assert!(files.lines().any(|l| l == artifact.path));

    let content = git_stdout(Path::new(bare), &["show", &format!("main:{}", artifact.path)]).await;
    assert_eq!(content, "## 审查报告\n\n没有发现问题\n");

    // 提交信息点名了产物文件
    let subject = git_stdout(Path::new(bare), &["log", "-1", "--pretty=%s", "main"]).await;
    assert!(subject.starts_with("docs: add review report "));
}

#[tokio::test]
async fn test_repeated_publish_with_identical_metadata_gets_distinct_paths() {
    let (_guard, repo_url) = seed_bare_repo().await;
    let publisher = GitLogPublisher::new(&test_config(repo_url.clone()));
    let report = ReviewResult::new("## 报告\n".to_string());

    let first = publisher.publish(&report, &meta()).await.unwrap();
    let second = publisher.publish(&report, &meta()).await.unwrap();

    assert_ne!(first.path, second.path, "同日同元数据的两次发布不得碰撞");

    // 两个产物都持久化在远端
    let bare = repo_url.trim_start_matches("file://");
    let files = git_stdout(Path::new(bare), &["ls-tree", "-r", "main", "--name-only"]).await;
    assert!(files.lines().any(|l| l == first.path));
    assert!(files.lines().any(|l| l == second.path));
}

#[tokio::test]
async fn test_publish_failure_when_branch_is_missing() {
    let (_guard, repo_url) = seed_bare_repo().await;
    let mut config = test_config(repo_url);
    config.log_repo_branch = "does-not-exist".to_string();
    let publisher = GitLogPublisher::new(&config);
    let report = ReviewResult::new("## 报告\n".to_string());

    let err = publisher.publish(&report, &meta()).await.unwrap_err();
    match err {
        PipelineError::Publish { step, .. } => assert_eq!(step, "clone"),
        other => panic!("expected Publish error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_failure_when_remote_is_unreachable() {
    let temp_dir = TempDir::new().unwrap();
    let missing = format!("file://{}/no-such-repo.git", temp_dir.path().display());
    let publisher = GitLogPublisher::new(&test_config(missing));
    let report = ReviewResult::new("## 报告\n".to_string());

    let err = publisher.publish(&report, &meta()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Publish { .. }));
}

/// 固定的审查指令模板，{{git_diff}} 为 diff 占位符
const REVIEW_PROMPT_TEMPLATE: &str = r#"你是一名资深代码审查工程师。请审查以下 git diff 中的代码变更，并输出一份 Markdown 格式的审查报告。

要求：
1. 以 Markdown 标题组织报告（概述、问题清单、改进建议）
2. 指出潜在缺陷、安全隐患与可读性问题，注明涉及的文件与代码行
3. 对没有问题的变更简要确认即可，不要编造问题
4. 直接输出报告正文，不要附加额外解释

git diff:
{{git_diff}}
"#;

/// 截断标记，提示报告读者 diff 并不完整
pub const TRUNCATION_MARKER: &str = "\n\n...[diff 超出大小上限，已截断]...";

/// 构造最终提示词，超限的 diff 先截断再填入模板
pub fn build_prompt(diff: &str, max_diff_bytes: usize) -> String {
    let bounded = truncate_diff(diff, max_diff_bytes);
    REVIEW_PROMPT_TEMPLATE.replace("{{git_diff}}", &bounded)
}

/// 将 diff 限制在 max_bytes 以内，截断时附加可见标记
///
/// 截断是有意的成本与时延上界，不是缺陷：超大 diff 全文送审
/// 既贵又慢，截断后的审查仍然覆盖变更的主体。
pub fn truncate_diff(diff: &str, max_bytes: usize) -> String {
    if diff.len() <= max_bytes {
        return diff.to_string();
    }

    let safe_at = find_safe_truncate_point(diff, max_bytes);
    format!("{}{}", &diff[..safe_at], TRUNCATION_MARKER)
}

/// 找到安全的截断点，避免在 UTF-8 字符中间截断
fn find_safe_truncate_point(content: &str, max_len: usize) -> usize {
    if content.len() <= max_len {
        return content.len();
    }

    let mut truncate_at = max_len;
    while truncate_at > 0 && !content.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }

    truncate_at
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_diff_and_instructions() {
        let prompt = build_prompt("+ added line of code", 1024);
        assert!(prompt.contains("+ added line of code"));
        assert!(prompt.contains("git diff:"));
        assert!(!prompt.contains("{{git_diff}}"), "placeholder must be substituted");
    }

    #[test]
    fn test_short_diff_is_not_truncated() {
        let diff = "+ small change";
        assert_eq!(truncate_diff(diff, 1024), diff);
    }

    #[test]
    fn test_long_diff_gets_visible_marker() {
        let diff = "x".repeat(2048);
        let bounded = truncate_diff(&diff, 100);
        assert!(bounded.ends_with(TRUNCATION_MARKER));
        assert!(bounded.len() < diff.len());
        assert!(bounded.starts_with(&"x".repeat(100)));
    }

    #[test]
    fn test_truncation_respects_utf8_boundaries() {
        // 多字节字符跨越截断点时向前回退
        let diff = "变更".repeat(100);
        let bounded = truncate_diff(&diff, 7);
        assert!(bounded.ends_with(TRUNCATION_MARKER));
        // 截断产物必须仍是合法字符串前缀
        let body = bounded.trim_end_matches(TRUNCATION_MARKER);
        assert!(diff.starts_with(body));
    }

    #[test]
    fn test_exact_limit_is_kept_whole() {
        let diff = "a".repeat(64);
        assert_eq!(truncate_diff(&diff, 64), diff);
    }
}

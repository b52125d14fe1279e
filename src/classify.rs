//! 内容分类模块
//!
//! # 设计思路
//!
//! 对捕获到的文本做一次性启发式分类，供存储分目录与查看器展示使用。
//! 判定顺序是承载语义的：url 必须最先（URL 往往不满足其他任何特征），
//! log 与 prompt 必须先于通用的 code/text 兜底，否则会被兜底吞掉。
//!
//! # 实现思路
//!
//! - 使用 `RegexSet` 进行一次性多模式匹配，性能优于逐条匹配。
//! - 通过 `once_cell::sync::Lazy` 在首次调用时编译正则，后续零成本复用。
//! - 分类永远返回确定的类别（默认 `Text`），歧义不是错误。

use once_cell::sync::Lazy;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// 日志行判定采样的最大行数
const LOG_SAMPLE_LINES: usize = 5;
/// 采样行中命中日志模式的比例阈值
const LOG_MATCH_RATIO: f64 = 0.4;
/// 判定为 prompt 所需命中的指标数量
const PROMPT_MIN_INDICATORS: usize = 3;

/// 历史条目的内容类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Url,
    File,
    Code,
    Log,
    Prompt,
    Other,
}

impl ContentKind {
    /// blob 目录名（按类别分目录存放溢出文件）
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Url => "url",
            ContentKind::File => "file",
            ContentKind::Code => "code",
            ContentKind::Log => "log",
            ContentKind::Prompt => "prompt",
            ContentKind::Other => "other",
        }
    }
}

/// 预编译的正则表达式集合：用于日志行特征检测
///
/// 检测的模式包括：
/// 1. ISO / HH:MM:SS 时间戳与带括号时间戳
/// 2. 日志级别（ERROR/WARN/INFO/DEBUG/TRACE/FATAL，大小写不敏感）
/// 3. 方括号 token（模块名、线程名等）
/// 4. 栈回溯标记（`at xxx` / `in xxx` / `Traceback`）
/// 5. 系统日志标记（`kernel:` / `launchd:` / `name[PID]:`）
static LOG_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}",
        r"\b\d{2}:\d{2}:\d{2}\b",
        r"\[[^\]]*\d{2}:\d{2}:\d{2}[^\]]*\]",
        r"(?i)\b(ERROR|WARN|WARNING|INFO|DEBUG|TRACE|FATAL)\b",
        r"\[[^\]]+\]",
        r"\bat \w+",
        r"\bin \w+",
        r"Traceback",
        r"kernel:",
        r"launchd:",
        r"\w+\[\d+\]:",
    ])
    .unwrap()
});

/// 疑问词与礼貌祈使词：位于句首时视为一个 prompt 指标
const INTERROGATIVE_STARTERS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could", "would", "should",
    "is", "are", "do", "does", "please",
];

/// 动作动词：出现任意一个视为一个 prompt 指标
const ACTION_VERBS: &[&str] = &[
    "explain", "implement", "help me", "create", "fix", "debug", "write", "generate",
    "translate", "summarize", "refactor", "analyze",
];

/// 判断采样行中命中日志模式的比例是否达到阈值
///
/// 至少需要 2 行才有资格判定为日志。
fn looks_like_log(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return false;
    }

    let sample = &lines[..lines.len().min(LOG_SAMPLE_LINES)];
    let matched = sample
        .iter()
        .filter(|line| LOG_PATTERNS.is_match(line))
        .count();

    matched as f64 / sample.len() as f64 >= LOG_MATCH_RATIO
}

/// 统计 prompt 指标命中数量
///
/// 指标集合（固定）：
/// - 含问号
/// - 以疑问词或礼貌祈使词开头
/// - 含动作动词（explain / implement / help me / …）
/// - 含 "step by step" / "detailed" / "example"
/// - 词数在 10 ~ 200 之间
/// - 字符数在 50 ~ 1000 之间
fn prompt_indicator_count(text: &str) -> usize {
    let lower = text.to_lowercase();
    let mut count = 0;

    if text.contains('?') {
        count += 1;
    }

    if let Some(first_word) = lower.split_whitespace().next() {
        if INTERROGATIVE_STARTERS.contains(&first_word) {
            count += 1;
        }
    }

    if ACTION_VERBS.iter().any(|verb| lower.contains(verb)) {
        count += 1;
    }

    if lower.contains("step by step") || lower.contains("detailed") || lower.contains("example") {
        count += 1;
    }

    let word_count = text.split_whitespace().count();
    if (10..=200).contains(&word_count) {
        count += 1;
    }

    let char_count = text.chars().count();
    if (50..=1000).contains(&char_count) {
        count += 1;
    }

    count
}

/// 代码兜底判定：成对花括号或成对方括号，且内容跨行
fn looks_like_code(text: &str) -> bool {
    if !text.contains('\n') {
        return false;
    }
    (text.contains('{') && text.contains('}')) || (text.contains('[') && text.contains(']'))
}

/// 对文本内容做启发式分类
///
/// 判定顺序（首个命中生效）：url → log → prompt → code → text。
/// 永远返回确定的类别，不会失败。
pub fn classify(text: &str) -> ContentKind {
    let trimmed = text.trim();

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return ContentKind::Url;
    }

    if looks_like_log(text) {
        return ContentKind::Log;
    }

    if prompt_indicator_count(text) >= PROMPT_MIN_INDICATORS {
        return ContentKind::Prompt;
    }

    if looks_like_code(text) {
        return ContentKind::Code;
    }

    ContentKind::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_prefix_wins_first() {
        assert_eq!(
            classify("https://example.com/path/to/resource"),
            ContentKind::Url
        );
        assert_eq!(classify("http://example.com"), ContentKind::Url);
    }

    #[test]
    fn log_lines_with_levels_detected() {
        let text = "ERROR: db timeout\nWARN: retrying\nINFO: connected\n";
        assert_eq!(classify(text), ContentKind::Log);
    }

    #[test]
    fn log_with_timestamps_detected() {
        let text = "2026-08-28 10:00:01 service started\n2026-08-28 10:00:02 listening on 8080";
        assert_eq!(classify(text), ContentKind::Log);
    }

    #[test]
    fn single_line_never_log() {
        assert_eq!(classify("ERROR: one line only"), ContentKind::Text);
    }

    #[test]
    fn traceback_lines_detected_as_log() {
        let text = "Traceback (most recent call last):\n  File \"app.py\", line 3\n  at main";
        assert_eq!(classify(text), ContentKind::Log);
    }

    #[test]
    fn question_with_indicators_is_prompt() {
        let text = "Can you explain how the borrow checker works in Rust? \
                    Please give a detailed example with step by step reasoning.";
        assert_eq!(classify(text), ContentKind::Prompt);
    }

    #[test]
    fn braces_with_newline_is_code() {
        let text = "fn main() {\n    println!(\"hi\");\n}";
        assert_eq!(classify(text), ContentKind::Code);
    }

    #[test]
    fn brackets_with_newline_is_code() {
        let text = "[\n  1,\n  2\n]";
        assert_eq!(classify(text), ContentKind::Code);
    }

    #[test]
    fn braces_without_newline_is_not_code() {
        assert_eq!(classify("a short {inline} remark"), ContentKind::Text);
    }

    #[test]
    fn plain_prose_defaults_to_text() {
        let text = "This is a fairly long deliberate paste containing more than \
                    a hundred characters of content to trigger acceptance.";
        assert_eq!(classify(text), ContentKind::Text);
    }

    #[test]
    fn log_check_runs_before_code_fallback() {
        // 同时含大括号与换行，但日志特征更强，应判为 log
        let text = "[2026-08-28T09:00:00] worker {id=1} ERROR boom\n[2026-08-28T09:00:01] worker {id=2} INFO retry";
        assert_eq!(classify(text), ContentKind::Log);
    }

    #[test]
    fn kind_dir_names_are_stable() {
        assert_eq!(ContentKind::Image.as_str(), "image");
        assert_eq!(ContentKind::Url.as_str(), "url");
        assert_eq!(ContentKind::Prompt.as_str(), "prompt");
    }
}

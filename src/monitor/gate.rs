//! 文本接受门限子模块
//!
//! ## 职责
//! 判断一段文本"像一次有意的复制，而不是误触选择"。
//! 轮询监听会把光标扫过、双击选词等噪声也当成剪贴板变化送进来，
//! 此处的长度 / 词数 / 形态规则负责把它们挡在历史之外。
//!
//! ## 规则（按顺序评估，先拒后收）
//! - 长度 < 15 字符：拒绝
//! - URL 形态（http/https 前缀）：长度 > 20 即接受
//! - 无任何空白的单 token 且长度 < 150：拒绝
//! - 代码形态（花括号或可识别关键字）且长度 > 30：接受
//! - 长度 < 100 且非空词数 < 5：拒绝
//! - 去除首尾空白后长度 < 10：拒绝
//! - 长度 > 100：接受
//! - 跨越 2 行以上：接受
//! - 其余：拒绝
//!
//! 两条接受规则提前到各自的拒绝规则之前，否则不可达：
//! URL 天然是单 token，会撞上单 token 拒绝；短代码行（如一条
//! `use` 语句）往往不足 5 个词，会撞上词数拒绝。

use once_cell::sync::Lazy;
use regex::RegexSet;

/// 预编译的正则表达式集合：用于代码形态判定
///
/// 行首语言关键字、类型箭头、作用域运算符、预处理指令等。
static CODE_SHAPE_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"(?m)^[\s]*(fn|function|const|let|var|class|struct|impl|mod|use|import|export|def|async|pub|static|interface|type|enum|trait|return)\b",
        r"(?m)^[\s]*#(include|define|ifdef|ifndef|endif)",
        r"->",
        r"=>",
        r"::",
    ])
    .unwrap()
});

/// 文本是否呈代码形态：含花括号，或命中可识别关键字
fn looks_code_shaped(text: &str) -> bool {
    text.contains('{') || text.contains('}') || CODE_SHAPE_PATTERNS.is_match(text)
}

/// 文本是否呈 URL 形态
fn looks_url_shaped(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("http://") || trimmed.starts_with("https://")
}

/// 判断文本是否像一次有意的复制
pub fn is_deliberate_copy(text: &str) -> bool {
    let len = text.chars().count();

    if len < 15 {
        return false;
    }

    if looks_url_shaped(text) {
        return len > 20;
    }

    if !text.contains(char::is_whitespace) && len < 150 {
        return false;
    }

    if looks_code_shaped(text) && len > 30 {
        return true;
    }

    if len < 100 && text.split_whitespace().count() < 5 {
        return false;
    }

    if text.trim().chars().count() < 10 {
        return false;
    }

    if len > 100 {
        return true;
    }

    if text.lines().count() > 2 {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_selection_rejected() {
        assert!(!is_deliberate_copy("short"));
        assert!(!is_deliberate_copy("hello"));
    }

    #[test]
    fn long_prose_accepted() {
        let text = "This is a fairly long deliberate paste containing more than \
                    a hundred characters of content to trigger acceptance.";
        assert!(is_deliberate_copy(text));
    }

    #[test]
    fn url_over_twenty_chars_accepted() {
        assert!(is_deliberate_copy("https://example.com/path/to/resource"));
    }

    #[test]
    fn url_at_or_under_twenty_chars_rejected() {
        // 正好 20 个字符，不满足 "> 20"
        assert!(!is_deliberate_copy("https://example.org/"));
    }

    #[test]
    fn single_token_under_150_rejected() {
        let token = "a".repeat(80);
        assert!(!is_deliberate_copy(&token));
    }

    #[test]
    fn single_token_at_or_over_150_accepted() {
        let token = "a".repeat(150);
        assert!(is_deliberate_copy(&token));
    }

    #[test]
    fn few_words_under_100_chars_rejected() {
        assert!(!is_deliberate_copy("just four small words"));
    }

    #[test]
    fn code_shape_over_thirty_chars_accepted() {
        assert!(is_deliberate_copy("fn resolve(x: u32) -> Option<u32> { None }"));
        assert!(is_deliberate_copy("use std::collections::HashMap as Map;"));
    }

    #[test]
    fn short_code_line_survives_word_count_rejection() {
        // 4 个词、不足 100 字符：代码形态的接受必须先于词数拒绝
        assert!(is_deliberate_copy("let total = items.iter().map(|i| i.size).sum::<u64>();"));
        assert!(is_deliberate_copy("use std::collections::HashMap as Map;"));
    }

    #[test]
    fn single_token_code_still_rejected() {
        // 无空白的单 token 先于代码形态被拒，即便含作用域运算符
        assert!(!is_deliberate_copy("foo::bar::baz(qux)"));
    }

    #[test]
    fn multi_line_short_text_accepted() {
        let text = "first line here\nsecond line here\nthird line here";
        assert!(is_deliberate_copy(text));
    }

    #[test]
    fn two_lines_short_text_rejected() {
        // 只有 2 行、不足 100 字符、无代码形态
        assert!(!is_deliberate_copy("first line words here\nsecond line words"));
    }

    #[test]
    fn medium_plain_sentence_rejected() {
        // 5 词以上但不足 100 字符、单行、无代码形态
        assert!(!is_deliberate_copy("these are some plain ordinary words"));
    }
}

//! 近似去重模块
//!
//! # 设计思路
//!
//! 编辑器里反复选中、微调再复制同一段内容会产生一串只差几个字符的插入，
//! 本模块用归一化编辑距离吸收这类抖动：与最近一条已存内容相似度超过阈值
//! 即拒绝插入。与表头完全相同的内容由存储层的快速路径独立处理。
//!
//! # 实现思路
//!
//! - Levenshtein 距离使用两行滚动数组的迭代 DP，内存 O(min(m, n))。
//! - 超长输入（任一边超过 1000 字符）退化为仅精确相等比较，限定开销。
//! - 所有比较基于字符而非字节，避免多字节字符截断。

/// 超过此长度（字符数）只做精确相等比较
const EXACT_ONLY_THRESHOLD: usize = 1000;

/// 计算两个字符串的 Levenshtein 编辑距离
///
/// 两行滚动数组实现，不分配完整矩阵。
fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // 让 b 作为较短的一边，滚动行更小
    let (longer, shorter) = if a_chars.len() >= b_chars.len() {
        (&a_chars, &b_chars)
    } else {
        (&b_chars, &a_chars)
    };

    let mut prev: Vec<usize> = (0..=shorter.len()).collect();
    let mut curr: Vec<usize> = vec![0; shorter.len() + 1];

    for (i, lc) in longer.iter().enumerate() {
        curr[0] = i + 1;
        for (j, sc) in shorter.iter().enumerate() {
            let cost = if lc == sc { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[shorter.len()]
}

/// 归一化相似度：`1 - levenshtein(a, b) / max(len(a), len(b))`
///
/// 两个空串定义为 1.0。超长输入退化为仅精确相等（相等为 1.0，否则 0.0）。
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let max_len = a_len.max(b_len);

    if max_len == 0 {
        return 1.0;
    }

    if max_len > EXACT_ONLY_THRESHOLD {
        return if a == b { 1.0 } else { 0.0 };
    }

    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// 判断新内容是否与最近一条内容构成近似重复
///
/// 精确相等任何长度下都算重复（快速路径，不进 DP）。
pub fn is_near_duplicate(candidate: &str, head: &str, threshold: f64) -> bool {
    if candidate == head {
        return true;
    }
    similarity(candidate, head) > threshold
}

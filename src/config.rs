//! 核心配置模块
//!
//! # 设计思路
//!
//! 监控与存储的全部预算参数（字节上限、条数上限、轮询间隔、防抖延迟、
//! 相似度阈值等）均为外部配置输入，而非硬编码逻辑。
//! 配置以 `settings.json` 形式持久化在数据目录中，与历史数据库同级。
//!
//! # 实现思路
//!
//! - `CoreConfig` 派生 serde，缺省字段回退到文档化默认值。
//! - 加载时对越界值做钳制（clamp），避免把病态配置带入运行时。
//! - 设置文件缺失或损坏时回退默认配置，不视为致命错误。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 存储字节预算默认值：100 MiB
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 100 * 1024 * 1024;
/// 历史条数上限默认值
pub const DEFAULT_MAX_ITEMS: usize = 1000;
/// 剪贴板轮询间隔默认值（毫秒）
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// 变化稳定等待（settle delay）默认值（毫秒）
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
/// 近似去重相似度阈值默认值
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
/// 连续变化最小间隔默认值（毫秒），低于此视为选择抖动
pub const DEFAULT_MIN_CHANGE_GAP_MS: u64 = 300;
/// 突发判定滚动窗口默认值（毫秒）
pub const DEFAULT_BURST_WINDOW_MS: u64 = 2000;
/// 滚动窗口内允许的最大变化次数，超过视为突发
pub const DEFAULT_BURST_MAX_CHANGES: usize = 3;
/// 自写入回采抑制窗口默认值（毫秒）
pub const DEFAULT_SELF_COPY_SUPPRESS_MS: u64 = 500;
/// 文本接受后抑制图片残留的窗口默认值（毫秒）
pub const DEFAULT_TEXT_SHADOW_WINDOW_MS: u64 = 3000;

const POLL_INTERVAL_MIN_MS: u64 = 100;
const POLL_INTERVAL_MAX_MS: u64 = 10_000;
const SETTLE_DELAY_MIN_MS: u64 = 0;
const SETTLE_DELAY_MAX_MS: u64 = 10_000;

fn default_max_total_bytes() -> u64 {
    DEFAULT_MAX_TOTAL_BYTES
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_min_change_gap_ms() -> u64 {
    DEFAULT_MIN_CHANGE_GAP_MS
}

fn default_burst_window_ms() -> u64 {
    DEFAULT_BURST_WINDOW_MS
}

fn default_burst_max_changes() -> usize {
    DEFAULT_BURST_MAX_CHANGES
}

fn default_self_copy_suppress_ms() -> u64 {
    DEFAULT_SELF_COPY_SUPPRESS_MS
}

fn default_text_shadow_window_ms() -> u64 {
    DEFAULT_TEXT_SHADOW_WINDOW_MS
}

/// 监控与存储的运行时配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 所有溢出 blob 的总字节预算
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,

    /// 历史条目数量上限
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// 剪贴板变化计数器的轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 检测到变化后等待内容稳定的延迟（毫秒）
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// 相邻插入的相似度高于此值时拒绝（0.0 ~ 1.0）
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// 连续变化间隔低于此值（毫秒）视为选择过程中的抖动
    #[serde(default = "default_min_change_gap_ms")]
    pub min_change_gap_ms: u64,

    /// 突发判定的滚动窗口宽度（毫秒）
    #[serde(default = "default_burst_window_ms")]
    pub burst_window_ms: u64,

    /// 滚动窗口内超过此次数的变化视为突发并丢弃
    #[serde(default = "default_burst_max_changes")]
    pub burst_max_changes: usize,

    /// 自写入剪贴板后的回采抑制窗口（毫秒）
    #[serde(default = "default_self_copy_suppress_ms")]
    pub self_copy_suppress_ms: u64,

    /// 接受文本后的图片抑制窗口（毫秒）
    #[serde(default = "default_text_shadow_window_ms")]
    pub text_shadow_window_ms: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_items: DEFAULT_MAX_ITEMS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_change_gap_ms: DEFAULT_MIN_CHANGE_GAP_MS,
            burst_window_ms: DEFAULT_BURST_WINDOW_MS,
            burst_max_changes: DEFAULT_BURST_MAX_CHANGES,
            self_copy_suppress_ms: DEFAULT_SELF_COPY_SUPPRESS_MS,
            text_shadow_window_ms: DEFAULT_TEXT_SHADOW_WINDOW_MS,
        }
    }
}

impl CoreConfig {
    /// 对越界配置做钳制，返回归一化后的配置
    pub fn normalized(mut self) -> Self {
        self.poll_interval_ms = self
            .poll_interval_ms
            .clamp(POLL_INTERVAL_MIN_MS, POLL_INTERVAL_MAX_MS);
        self.settle_delay_ms = self
            .settle_delay_ms
            .clamp(SETTLE_DELAY_MIN_MS, SETTLE_DELAY_MAX_MS);
        self.similarity_threshold = self.similarity_threshold.clamp(0.0, 1.0);
        if self.max_items == 0 {
            self.max_items = 1;
        }
        self
    }

    /// 从数据目录加载配置
    ///
    /// 设置文件缺失或解析失败时回退默认值，不视为致命错误。
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(config) => config.normalized(),
            Err(e) => {
                log::warn!("解析设置文件失败，使用默认配置: {}", e);
                Self::default()
            }
        }
    }

    /// 将配置写入数据目录的 `settings.json`
    pub fn save(&self, data_dir: &Path) -> Result<(), CoreError> {
        fs::create_dir_all(data_dir)
            .map_err(|e| CoreError::Storage(format!("创建数据目录失败: {}", e)))?;

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(format!("序列化设置失败: {}", e)))?;

        fs::write(data_dir.join("settings.json"), content)?;
        Ok(())
    }
}

//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `CoreError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)`、`expect()` 等不一致模式。
//!
//! 监控流水线内部的失败全部就地吸收并记录日志（见 `monitor`），
//! 只有面向外部调用方的操作（手动插入、删除、清空）才向上传播本类型。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，便于查看器等外部消费方展示。

use serde::Serialize;

/// 核心库统一错误类型
///
/// 所有对外暴露的操作均返回此类型，确保调用方收到一致的错误格式。
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 溢出 blob 存储不可用或操作失败
    #[error("存储操作失败: {0}")]
    Storage(String),

    /// 历史持久化数据库操作失败
    #[error("数据库错误: {0}")]
    Database(String),

    /// 序列化 / 反序列化失败
    #[error("序列化错误: {0}")]
    Serialization(String),
}

/// 将错误序列化为人类可读的字符串，便于跨进程传递。
impl Serialize for CoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

//! 剪贴板能力抽象模块
//!
//! # 设计思路
//!
//! 系统剪贴板是被所有应用共享、全局可变的 OS 资源，只能轮询观察。
//! 把它建模为注入的能力（trait）：监控状态机只依赖 `change_count()`
//! 与按类型的 `read_*` 访问器，难以测试的时序逻辑就能用假剪贴板
//! 与合成时间驱动，和平台资源彻底解耦。
//!
//! # 实现思路
//!
//! - 真实实现 `SystemPasteboard` 基于 `arboard`。
//! - `arboard` 没有原生变化计数器，用内容指纹模拟：每轮取文本与
//!   位图的摘要指纹，指纹变化时递增内部计数器。
//! - `arboard` 的"内容不存在"错误映射为 `Ok(None)`，真正的平台
//!   错误才映射为 `CoreError::Clipboard`。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::CoreError;

/// 编码图片的探测格式（按 PNG → JPEG 顺序探测）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedImageFormat {
    Png,
    Jpeg,
}

/// 通用位图表示（RGBA 裸像素）
#[derive(Debug, Clone)]
pub struct RawBitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// 剪贴板能力接口
///
/// `read_*` 返回 `Ok(None)` 表示该类型的负载不存在；
/// `Err` 表示剪贴板 API 瞬时不可用，调用方跳过本轮重试。
pub trait Pasteboard {
    /// 单调递增的变化计数器，每次写入剪贴板时递增
    fn change_count(&mut self) -> Result<u64, CoreError>;

    /// 读取纯文本负载
    fn read_text(&mut self) -> Result<Option<String>, CoreError>;

    /// 读取文件 URL 列表负载
    fn read_file_urls(&mut self) -> Result<Option<Vec<String>>, CoreError>;

    /// 读取指定编码格式的图片字节
    fn read_encoded_image(
        &mut self,
        format: EncodedImageFormat,
    ) -> Result<Option<Vec<u8>>, CoreError>;

    /// 读取通用位图表示
    fn read_bitmap(&mut self) -> Result<Option<RawBitmap>, CoreError>;

    /// 写入纯文本（核心自身的"复制回剪贴板"路径）
    fn write_text(&mut self, text: &str) -> Result<(), CoreError>;
}

/// 基于 `arboard` 的系统剪贴板实现
pub struct SystemPasteboard {
    clipboard: arboard::Clipboard,
    counter: u64,
    last_fingerprint: Option<u64>,
}

/// 大图只采样首尾字节参与指纹，避免每轮轮询全量哈希
const FINGERPRINT_SAMPLE: usize = 256;

impl SystemPasteboard {
    pub fn new() -> Result<Self, CoreError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| CoreError::Clipboard(e.to_string()))?;
        Ok(Self {
            clipboard,
            counter: 0,
            last_fingerprint: None,
        })
    }

    /// 计算当前剪贴板内容的指纹
    fn fingerprint(&mut self) -> u64 {
        let mut hasher = DefaultHasher::new();

        if let Ok(text) = self.clipboard.get_text() {
            0u8.hash(&mut hasher);
            text.hash(&mut hasher);
        }

        if let Ok(image) = self.clipboard.get_image() {
            1u8.hash(&mut hasher);
            image.width.hash(&mut hasher);
            image.height.hash(&mut hasher);
            image.bytes.len().hash(&mut hasher);
            let head = image.bytes.len().min(FINGERPRINT_SAMPLE);
            image.bytes[..head].hash(&mut hasher);
            let tail_start = image.bytes.len().saturating_sub(FINGERPRINT_SAMPLE);
            image.bytes[tail_start..].hash(&mut hasher);
        }

        hasher.finish()
    }
}

impl Pasteboard for SystemPasteboard {
    fn change_count(&mut self) -> Result<u64, CoreError> {
        let fingerprint = self.fingerprint();
        if self.last_fingerprint != Some(fingerprint) {
            self.last_fingerprint = Some(fingerprint);
            self.counter += 1;
        }
        Ok(self.counter)
    }

    fn read_text(&mut self) -> Result<Option<String>, CoreError> {
        match self.clipboard.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(CoreError::Clipboard(e.to_string())),
        }
    }

    fn read_file_urls(&mut self) -> Result<Option<Vec<String>>, CoreError> {
        // arboard 不暴露文件列表表示；平台后端补齐前按不存在处理
        Ok(None)
    }

    fn read_encoded_image(
        &mut self,
        _format: EncodedImageFormat,
    ) -> Result<Option<Vec<u8>>, CoreError> {
        // arboard 只提供位图表示，编码格式探测落到 read_bitmap 兜底
        Ok(None)
    }

    fn read_bitmap(&mut self) -> Result<Option<RawBitmap>, CoreError> {
        match self.clipboard.get_image() {
            Ok(image) => Ok(Some(RawBitmap {
                width: image.width as u32,
                height: image.height as u32,
                rgba: image.bytes.into_owned(),
            })),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(CoreError::Clipboard(e.to_string())),
        }
    }

    fn write_text(&mut self, text: &str) -> Result<(), CoreError> {
        self.clipboard
            .set_text(text.to_string())
            .map_err(|e| CoreError::Clipboard(e.to_string()))
    }
}

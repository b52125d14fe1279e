//! 剪贴板监控模块
//!
//! # 设计思路
//!
//! 把每一次"逻辑上的用户复制"解析为至多一条最终内容事件。
//! 共享剪贴板的信号是突发且含混的：拖选文字会连续触发变化、
//! 听写等多步写入工具会先写图片再覆盖为文本。状态机通过
//! 滚动窗口突发判定 + 固定稳定延迟（settle delay）吸收这些噪声，
//! 延迟到期后以当前内容为准（last-writer-wins），不追溯中间状态。
//!
//! 状态流转：`Idle → ChangeDetected → Debouncing → Resolving →
//! (Accepted | Rejected) → Idle`。
//!
//! # 实现思路
//!
//! - 所有"最近内容 / 最近变化时间 / 待定标志"都是 `Monitor` 的显式
//!   字段，不存在环境可变量，状态流转可审计、可测试。
//! - 判定逻辑拆成纯函数（接收 `Instant` / `Duration`），单测不需要线程。
//! - 稳定延迟不用真正的取消：世代计数器在到期时校验，更新的变化
//!   事件通过替换待定项使旧延迟自然失效。
//! - 捕获优先级：文本 > 文件引用 > 图片。文本接受后的 3 秒内抑制
//!   图片，吸收多步写入工具留下的图片残影。
//! - 自写入的内容带定时抑制记录（内容 + 截止时刻），到期自动失效，
//!   防止"复制回剪贴板"被回采成新条目。
//! - 流水线内部失败全部就地吸收并记录日志；只有手动操作向外传播。

mod gate;

pub use gate::is_deliberate_copy;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::classify::{classify, ContentKind};
use crate::config::CoreConfig;
use crate::dedup;
use crate::error::CoreError;
use crate::pasteboard::{EncodedImageFormat, Pasteboard, RawBitmap};
use crate::store::{HistoryItem, Insertion, ItemStore};

/// 文本超过此字节数时落盘为溢出 blob，条目内联截断摘要
const INLINE_TEXT_MAX_BYTES: usize = 4096;
/// 溢出文本条目的内联摘要长度（字符）
const SUMMARY_MAX_CHARS: usize = 512;
/// 小于此边长的位图视为图标，不保存
const MIN_BITMAP_DIMENSION: u32 = 64;

/// 变化事件的处置决定
#[derive(Debug, PartialEq, Eq)]
enum ChangeDecision {
    /// 进入防抖，调度稳定延迟后的解析
    Debounce,
    /// 滚动窗口内变化过多，视为选择过程中的突发，丢弃
    RejectBurst,
    /// 与上次变化间隔过短，视为抖动，丢弃
    RejectJitter,
}

/// 对一次检测到的变化做处置决定
///
/// `changes_in_window` 含本次变化。窗口内超过 `burst_max` 次即为突发；
/// 与上次变化的间隔低于 `min_gap` 即为抖动。
fn decide_change_action(
    changes_in_window: usize,
    burst_max: usize,
    gap: Option<Duration>,
    min_gap: Duration,
) -> ChangeDecision {
    if changes_in_window > burst_max {
        return ChangeDecision::RejectBurst;
    }
    if let Some(gap) = gap {
        if gap < min_gap {
            return ChangeDecision::RejectJitter;
        }
    }
    ChangeDecision::Debounce
}

/// 待解析的变化事件（稳定延迟计时中）
#[derive(Debug)]
struct PendingResolve {
    generation: u64,
    fire_at: Instant,
}

/// 自写入抑制记录：内容 + 截止时刻
#[derive(Debug)]
struct Suppression {
    content: String,
    until: Instant,
}

/// 剪贴板轮询监控器
///
/// 单写者：所有对 `ItemStore` 的变更都来自持有本类型的执行上下文。
/// 展示侧通过 `Arc<RwLock<_>>` 的读锁并发取快照。
pub struct Monitor<P: Pasteboard> {
    pasteboard: P,
    store: Arc<RwLock<ItemStore>>,
    config: CoreConfig,
    last_change_count: Option<u64>,
    change_times: VecDeque<Instant>,
    last_change_at: Option<Instant>,
    pending: Option<PendingResolve>,
    generation: u64,
    last_text_accepted_at: Option<Instant>,
    suppression: Option<Suppression>,
}

impl<P: Pasteboard> Monitor<P> {
    pub fn new(pasteboard: P, store: Arc<RwLock<ItemStore>>, config: CoreConfig) -> Self {
        Self {
            pasteboard,
            store,
            config: config.normalized(),
            last_change_count: None,
            change_times: VecDeque::new(),
            last_change_at: None,
            pending: None,
            generation: 0,
            last_text_accepted_at: None,
            suppression: None,
        }
    }

    fn store_read(&self) -> RwLockReadGuard<'_, ItemStore> {
        match self.store.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("历史存储锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    fn store_write(&self) -> RwLockWriteGuard<'_, ItemStore> {
        match self.store.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("历史存储锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    /// 驱动一轮状态机：先轮询变化，再检查待解析事件是否到期
    ///
    /// 返回本轮被接受并入库的条目（若有），供上层记录或通知。
    /// 轮询失败跳过本轮，下一轮重试；变化不会丢失，至多并入下一次。
    pub fn tick(&mut self, now: Instant) -> Option<HistoryItem> {
        self.poll(now);

        match self.try_resolve(now) {
            Ok(item) => item,
            Err(e) => {
                log::debug!("解析剪贴板内容失败，跳过本轮: {}", e);
                None
            }
        }
    }

    /// Idle：比较变化计数器，检测到变化则进入处置判定
    fn poll(&mut self, now: Instant) {
        let counter = match self.pasteboard.change_count() {
            Ok(counter) => counter,
            Err(e) => {
                log::debug!("读取剪贴板变化计数失败，跳过本轮: {}", e);
                return;
            }
        };

        let changed = match self.last_change_count {
            None => {
                // 启动时的首次读数只作基线，不算变化
                self.last_change_count = Some(counter);
                false
            }
            Some(prev) if prev != counter => {
                self.last_change_count = Some(counter);
                true
            }
            _ => false,
        };

        if !changed {
            return;
        }

        // 自写入产生的变化在检测时就地吞掉，不进入防抖窗口：
        // 抑制窗口（500ms）短于稳定延迟，等到解析时早已过期
        if self.suppression.is_some() {
            if let Ok(Some(text)) = self.pasteboard.read_text() {
                if self.consume_suppression(&text, now) {
                    return;
                }
            }
        }

        // ChangeDetected：记入滚动窗口并做处置判定
        let gap = self
            .last_change_at
            .map(|prev| now.saturating_duration_since(prev));
        self.prune_change_window(now);
        self.change_times.push_back(now);
        self.last_change_at = Some(now);

        let decision = decide_change_action(
            self.change_times.len(),
            self.config.burst_max_changes,
            gap,
            Duration::from_millis(self.config.min_change_gap_ms),
        );

        match decision {
            ChangeDecision::RejectBurst => {
                log::debug!("⏱️ 滚动窗口内变化过多，视为选择中，丢弃");
                self.pending = None;
            }
            ChangeDecision::RejectJitter => {
                log::debug!("⏱️ 变化间隔过短，视为抖动，丢弃");
                self.pending = None;
            }
            ChangeDecision::Debounce => {
                // 新事件的延迟替换旧事件的延迟（last-writer-wins）
                self.generation += 1;
                self.pending = Some(PendingResolve {
                    generation: self.generation,
                    fire_at: now + Duration::from_millis(self.config.settle_delay_ms),
                });
            }
        }
    }

    fn prune_change_window(&mut self, now: Instant) {
        let window = Duration::from_millis(self.config.burst_window_ms);
        while let Some(first) = self.change_times.front() {
            if now.saturating_duration_since(*first) > window {
                self.change_times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Resolving：稳定延迟到期后，以当前内容为准解析
    fn try_resolve(&mut self, now: Instant) -> Result<Option<HistoryItem>, CoreError> {
        let Some(pending) = self.pending.as_ref() else {
            return Ok(None);
        };
        if now < pending.fire_at {
            return Ok(None);
        }

        let generation = pending.generation;
        let fire_at = pending.fire_at;
        self.pending = None;

        // 世代校验：更新的变化事件已替换待定项时，旧延迟的效果作废
        if generation != self.generation {
            return Ok(None);
        }

        // 重读计数器：延迟期间若有后续写入，直接采用当前内容，
        // 并把这些写入并入本次解析，不再单独触发新事件
        if let Ok(counter) = self.pasteboard.change_count() {
            self.last_change_count = Some(counter);
        }

        match self.capture(now, false) {
            Ok(item) => Ok(item),
            Err(e) => {
                // 瞬时读取失败不许丢变化：恢复待定事件，下一轮重试
                self.pending = Some(PendingResolve {
                    generation,
                    fire_at,
                });
                Err(e)
            }
        }
    }

    /// 按优先级捕获当前剪贴板内容：文本 > 文件引用 > 图片
    fn capture(
        &mut self,
        now: Instant,
        bypass_gate: bool,
    ) -> Result<Option<HistoryItem>, CoreError> {
        if let Some(text) = self.pasteboard.read_text()? {
            if !text.trim().is_empty() {
                if self.consume_suppression(&text, now) {
                    return Ok(None);
                }
                if !bypass_gate && !gate::is_deliberate_copy(&text) {
                    log::debug!("🚫 文本未通过接受门限（{} 字符），丢弃", text.chars().count());
                    return Ok(None);
                }
                return self.accept_text(text, now);
            }
        }

        if let Some(files) = self.pasteboard.read_file_urls()? {
            if !files.is_empty() {
                return self.accept_files(files);
            }
        }

        self.accept_image(now)
    }

    /// 自写入抑制：内容匹配且未过期则消费掉，不回采
    fn consume_suppression(&mut self, text: &str, now: Instant) -> bool {
        let Some(suppression) = self.suppression.as_ref() else {
            return false;
        };

        if now > suppression.until {
            self.suppression = None;
            return false;
        }

        if suppression.content == text {
            log::debug!("⏭️  忽略核心自身写入的剪贴板内容");
            self.suppression = None;
            return true;
        }

        false
    }

    /// 文本路径：分类 → 近似去重 → 入库
    fn accept_text(
        &mut self,
        text: String,
        now: Instant,
    ) -> Result<Option<HistoryItem>, CoreError> {
        let kind = classify(&text);

        if let Some(head) = self.store_read().head() {
            if dedup::is_near_duplicate(&text, &head.content, self.config.similarity_threshold) {
                log::debug!("⏭️  与最近条目近似重复，丢弃");
                return Ok(None);
            }
        }

        let trimmed = text.trim();
        let (content, overflow): (String, Option<Vec<u8>>) = match kind {
            ContentKind::Url => {
                let descriptor = serde_json::json!({ "url": trimmed }).to_string();
                (trimmed.to_string(), Some(descriptor.into_bytes()))
            }
            _ if text.len() > INLINE_TEXT_MAX_BYTES => {
                let summary: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
                (summary, Some(text.clone().into_bytes()))
            }
            _ => (text.clone(), None),
        };

        let outcome =
            self.store_write()
                .insert(&content, kind, overflow.as_deref(), None)?;

        match outcome {
            Insertion::Inserted(item) => {
                self.last_text_accepted_at = Some(now);
                log::info!("📋 已保存{:?}条目 #{}（{} 字符）", kind, item.id, text.chars().count());
                Ok(Some(item))
            }
            Insertion::DuplicateOfHead => Ok(None),
        }
    }

    /// 文件引用路径：以换行连接的 URL 列表入库
    fn accept_files(&mut self, files: Vec<String>) -> Result<Option<HistoryItem>, CoreError> {
        let content = files.join("\n");

        if let Some(head) = self.store_read().head() {
            if dedup::is_near_duplicate(&content, &head.content, self.config.similarity_threshold)
            {
                log::debug!("⏭️  文件列表与最近条目近似重复，丢弃");
                return Ok(None);
            }
        }

        let (inline, overflow) = if content.len() > INLINE_TEXT_MAX_BYTES {
            let summary: String = content.chars().take(SUMMARY_MAX_CHARS).collect();
            (summary, Some(content.clone().into_bytes()))
        } else {
            (content.clone(), None)
        };

        let outcome = self.store_write().insert(
            &inline,
            ContentKind::File,
            overflow.as_deref(),
            None,
        )?;

        match outcome {
            Insertion::Inserted(item) => {
                log::info!("📁 已保存文件引用条目 #{}（{} 个文件）", item.id, files.len());
                Ok(Some(item))
            }
            Insertion::DuplicateOfHead => Ok(None),
        }
    }

    /// 图片路径：按 PNG → JPEG → 位图顺序探测，取首个有数据的表示
    ///
    /// 最近 3 秒内接受过文本时不收图片（文本优先于多步工具的图片残影）。
    fn accept_image(&mut self, now: Instant) -> Result<Option<HistoryItem>, CoreError> {
        if let Some(accepted_at) = self.last_text_accepted_at {
            let shadow = Duration::from_millis(self.config.text_shadow_window_ms);
            if now.saturating_duration_since(accepted_at) <= shadow {
                log::debug!("🚫 文本抑制窗口内出现图片，视为残影，丢弃");
                return Ok(None);
            }
        }

        let Some((bytes, ext, label)) = self.probe_image()? else {
            return Ok(None);
        };

        let outcome =
            self.store_write()
                .insert(&label, ContentKind::Image, Some(&bytes), Some(ext))?;

        match outcome {
            Insertion::Inserted(item) => {
                log::info!("🖼️ 已保存图片条目 #{}（{} 字节）", item.id, bytes.len());
                Ok(Some(item))
            }
            Insertion::DuplicateOfHead => Ok(None),
        }
    }

    fn probe_image(&mut self) -> Result<Option<(Vec<u8>, &'static str, String)>, CoreError> {
        for format in [EncodedImageFormat::Png, EncodedImageFormat::Jpeg] {
            if let Some(bytes) = self.pasteboard.read_encoded_image(format)? {
                if bytes.is_empty() {
                    continue;
                }
                let ext = infer::get(&bytes)
                    .map(|t| t.extension())
                    .unwrap_or(match format {
                        EncodedImageFormat::Png => "png",
                        EncodedImageFormat::Jpeg => "jpg",
                    });
                let label = format!("Image ({}, {} bytes)", ext.to_uppercase(), bytes.len());
                return Ok(Some((bytes, ext, label)));
            }
        }

        let Some(bitmap) = self.pasteboard.read_bitmap()? else {
            return Ok(None);
        };

        if bitmap.width < MIN_BITMAP_DIMENSION || bitmap.height < MIN_BITMAP_DIMENSION {
            log::debug!(
                "🚫 位图太小 ({}x{})，可能是图标，跳过保存",
                bitmap.width,
                bitmap.height
            );
            return Ok(None);
        }

        let label = format!("Image {}x{} (PNG)", bitmap.width, bitmap.height);
        match encode_bitmap_png(&bitmap) {
            Some(png) => Ok(Some((png, "png", label))),
            None => {
                log::warn!("位图编码 PNG 失败，丢弃本次图片");
                Ok(None)
            }
        }
    }

    /// 手动插入路径（UI 的"立即保存当前剪贴板"）
    ///
    /// 绕过防抖与接受门限，但仍经过分类与近似去重。
    /// 作为用户发起的操作，失败向调用方传播。
    pub fn capture_now(&mut self, now: Instant) -> Result<Option<HistoryItem>, CoreError> {
        self.capture(now, true)
    }

    /// 将指定下标的条目复制回剪贴板
    ///
    /// 写入前先布防抑制记录，防止自写入被回采成新条目。
    /// 有溢出文本 blob 的条目优先写回完整正文。
    pub fn copy_to_clipboard(&mut self, index: usize, now: Instant) -> Result<(), CoreError> {
        let text = {
            let store = self.store_read();
            let item = store
                .items()
                .get(index)
                .ok_or_else(|| CoreError::Storage(format!("复制下标越界: {}", index)))?;

            if item.kind != ContentKind::Image {
                store
                    .read_payload(item)
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .unwrap_or_else(|| item.content.clone())
            } else {
                item.content.clone()
            }
        };

        self.suppression = Some(Suppression {
            content: text.clone(),
            until: now + Duration::from_millis(self.config.self_copy_suppress_ms),
        });
        self.pasteboard.write_text(&text)
    }

    /// 以配置的轮询间隔驱动状态机，直到停止标志置位
    pub fn run_until(mut self, stop: &AtomicBool) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        log::info!("📋 剪贴板监控已启动（轮询间隔 {}ms）", interval.as_millis());

        while !stop.load(Ordering::Relaxed) {
            self.tick(Instant::now());
            thread::sleep(interval);
        }

        log::info!("📋 剪贴板监控已停止");
    }

    /// 在后台线程启动监控
    pub fn spawn(self, stop: Arc<AtomicBool>) -> thread::JoinHandle<()>
    where
        P: Send + 'static,
    {
        thread::spawn(move || self.run_until(&stop))
    }
}

/// 将 RGBA 位图编码为 PNG 字节
fn encode_bitmap_png(bitmap: &RawBitmap) -> Option<Vec<u8>> {
    let image = image::RgbaImage::from_raw(bitmap.width, bitmap.height, bitmap.rgba.clone())?;
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, image::ImageFormat::Png)
        .ok()?;
    Some(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::{decide_change_action, ChangeDecision};
    use std::time::Duration;

    const MIN_GAP: Duration = Duration::from_millis(300);

    #[test]
    fn first_isolated_change_debounces() {
        let decision = decide_change_action(1, 3, None, MIN_GAP);
        assert_eq!(decision, ChangeDecision::Debounce);
    }

    #[test]
    fn change_with_comfortable_gap_debounces() {
        let decision = decide_change_action(2, 3, Some(Duration::from_millis(800)), MIN_GAP);
        assert_eq!(decision, ChangeDecision::Debounce);
    }

    #[test]
    fn more_than_burst_max_in_window_rejected() {
        let decision = decide_change_action(4, 3, Some(Duration::from_millis(600)), MIN_GAP);
        assert_eq!(decision, ChangeDecision::RejectBurst);
    }

    #[test]
    fn exactly_burst_max_is_still_allowed() {
        let decision = decide_change_action(3, 3, Some(Duration::from_millis(600)), MIN_GAP);
        assert_eq!(decision, ChangeDecision::Debounce);
    }

    #[test]
    fn gap_below_minimum_rejected_as_jitter() {
        let decision = decide_change_action(2, 3, Some(Duration::from_millis(120)), MIN_GAP);
        assert_eq!(decision, ChangeDecision::RejectJitter);
    }

    #[test]
    fn burst_check_takes_precedence_over_gap_check() {
        let decision = decide_change_action(5, 3, Some(Duration::from_millis(50)), MIN_GAP);
        assert_eq!(decision, ChangeDecision::RejectBurst);
    }
}

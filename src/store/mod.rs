//! 历史存储模块
//!
//! # 设计思路
//!
//! 维护一个新在前的有序条目集合，受字节预算与条数上限双重约束：
//! 任一超限都从尾部（最旧端）逐条淘汰，但最新一条永不淘汰——
//! 即使它单独超出预算，用户刚复制的内容也必须可见。
//!
//! 大负载与二进制负载落盘为溢出 blob，与条目同生共死：
//! 一起创建、一起删除，不允许孤儿文件或悬空引用。
//! blob 写入失败时条目整体不插入，存储保持一致。
//!
//! # 实现思路
//!
//! - 条目列表（不含二进制负载）在每次变更后整体序列化进 SQLite 键值槽位。
//! - 启动时读回列表；blob 缺失的条目仍然结构有效（懒加载，读到空负载）。
//! - 与表头完全相同的内容在此拒绝（快速路径）；近似去重由 `dedup` 在
//!   流水线里完成，存储层不重复计算编辑距离。
//! - 本类型不做内部加锁，遵循单写者纪律，多生产者场景需由外层包一把锁。

mod blobs;
mod persist;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use blobs::{BlobScan, BlobStore};
pub use persist::HistoryDb;

use crate::classify::ContentKind;
use crate::config::CoreConfig;
use crate::error::CoreError;

/// 单条历史记录，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    /// 进程内唯一 id，创建时分配，永不复用
    pub id: u64,
    /// 文本类条目为正文本身；二进制类条目为展示标签
    pub content: String,
    /// 内容类别
    pub kind: ContentKind,
    /// 捕获时间（Unix 毫秒）
    pub created_at: i64,
    /// 溢出 blob 的相对路径；小的内联文本为 `None`
    pub overflow_ref: Option<PathBuf>,
    /// 计入预算的字节数（无溢出 blob 的条目为 0）
    pub byte_size: u64,
}

/// 插入结果：创建的条目或拒绝信号
#[derive(Debug)]
pub enum Insertion {
    Inserted(HistoryItem),
    /// 与当前表头内容完全相同，拒绝插入
    DuplicateOfHead,
}

/// 面向查看器的存储统计（blob 部分为实时磁盘重扫）
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub blob_path: String,
    pub blob_total_size: u64,
    pub blob_file_count: u64,
    pub item_count: usize,
}

/// 有界历史存储
#[derive(Debug)]
pub struct ItemStore {
    /// 新在前的有序集合，插入永远发生在表头
    items: Vec<HistoryItem>,
    next_id: u64,
    total_blob_bytes: u64,
    max_total_bytes: u64,
    max_items: usize,
    blobs: BlobStore,
    db: HistoryDb,
}

impl ItemStore {
    /// 在数据目录下打开存储（`blobs/` 子目录 + `history.db`）
    ///
    /// 启动时读回持久化的条目列表；槽位损坏按空历史处理。
    pub fn open(data_dir: &Path, config: &CoreConfig) -> Result<Self, CoreError> {
        let blobs = BlobStore::open(data_dir.join("blobs"))?;
        let db = HistoryDb::open(&data_dir.join("history.db"))?;

        let items = db.load();
        let next_id = items.iter().map(|item| item.id + 1).max().unwrap_or(1);
        let total_blob_bytes = items.iter().map(|item| item.byte_size).sum();

        Ok(Self {
            items,
            next_id,
            total_blob_bytes,
            max_total_bytes: config.max_total_bytes,
            max_items: config.max_items,
            blobs,
            db,
        })
    }

    /// 当前条目的只读视图（新在前）
    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    /// 表头条目（最近一次接受的内容）
    pub fn head(&self) -> Option<&HistoryItem> {
        self.items.first()
    }

    /// 供展示消费方使用的快照（按值克隆，读写互不阻塞）
    pub fn snapshot(&self) -> Vec<HistoryItem> {
        self.items.clone()
    }

    /// 懒加载条目的溢出负载；blob 缺失表现为 `None`
    pub fn read_payload(&self, item: &HistoryItem) -> Option<Vec<u8>> {
        item.overflow_ref.as_deref().and_then(|rel| self.blobs.read(rel))
    }

    /// 插入新条目
    ///
    /// 与表头内容完全相同时拒绝。溢出负载先写 blob，写入失败则条目
    /// 整体不插入。插入后从尾部淘汰直到字节预算与条数上限同时满足，
    /// 但最新一条永不淘汰。
    pub fn insert(
        &mut self,
        content: &str,
        kind: ContentKind,
        overflow_bytes: Option<&[u8]>,
        overflow_ext: Option<&str>,
    ) -> Result<Insertion, CoreError> {
        if self.items.first().map(|head| head.content.as_str()) == Some(content) {
            log::debug!("⏭️  与表头内容相同，拒绝插入");
            return Ok(Insertion::DuplicateOfHead);
        }

        let id = self.next_id;
        self.next_id += 1;

        let (overflow_ref, byte_size) = match overflow_bytes {
            Some(bytes) => {
                let (rel, size) = self.blobs.write(kind, id, overflow_ext, bytes)?;
                (Some(rel), size)
            }
            None => (None, 0),
        };

        let item = HistoryItem {
            id,
            content: content.to_string(),
            kind,
            created_at: chrono::Utc::now().timestamp_millis(),
            overflow_ref,
            byte_size,
        };

        self.items.insert(0, item.clone());
        self.total_blob_bytes += byte_size;
        self.evict_to_budget();
        self.persist();

        Ok(Insertion::Inserted(item))
    }

    /// 从尾部淘汰直到两个不变量同时满足；最新一条豁免
    fn evict_to_budget(&mut self) {
        while self.items.len() > 1
            && (self.items.len() > self.max_items || self.total_blob_bytes > self.max_total_bytes)
        {
            let evicted = self
                .items
                .pop()
                .expect("eviction loop guarantees a tail item");
            self.total_blob_bytes = self.total_blob_bytes.saturating_sub(evicted.byte_size);

            if let Some(rel) = evicted.overflow_ref.as_deref() {
                if let Err(e) = self.blobs.delete(rel) {
                    log::warn!("淘汰条目 {} 时删除 blob 失败: {}", evicted.id, e);
                }
            }
            log::debug!("🧹 预算压力淘汰条目 {}（{} 字节）", evicted.id, evicted.byte_size);
        }
    }

    /// 删除指定下标的条目及其 blob；下标越界返回错误
    pub fn remove_at(&mut self, index: usize) -> Result<(), CoreError> {
        if index >= self.items.len() {
            return Err(CoreError::Storage(format!("删除下标越界: {}", index)));
        }

        let removed = self.items.remove(index);
        self.total_blob_bytes = self.total_blob_bytes.saturating_sub(removed.byte_size);

        // 条目已出集合，无论 blob 删除成败都先落盘，内存与槽位不许分叉
        if let Some(rel) = removed.overflow_ref.as_deref() {
            if let Err(e) = self.blobs.delete(rel) {
                self.persist();
                return Err(e);
            }
        }

        self.persist();
        Ok(())
    }

    /// 清空全部历史：删除整个 blob 目录并清空集合
    pub fn clear_all(&mut self) -> Result<(), CoreError> {
        self.blobs.clear_all()?;
        self.items.clear();
        self.total_blob_bytes = 0;
        self.persist();
        Ok(())
    }

    /// 面向查看器的存储统计；blob 部分实时重扫磁盘
    pub fn storage_stats(&self) -> StorageStats {
        let scan = self.blobs.scan();
        StorageStats {
            blob_path: scan.path,
            blob_total_size: scan.total_size,
            blob_file_count: scan.file_count,
            item_count: self.items.len(),
        }
    }

    /// 将条目列表覆写进键值槽位
    ///
    /// 写入失败只记录日志：内存状态已一致，下一次成功的变更会重写槽位。
    fn persist(&self) {
        if let Err(e) = self.db.save(&self.items) {
            log::warn!("持久化历史失败: {}", e);
        }
    }
}

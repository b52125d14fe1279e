//! 溢出 blob 存储子模块
//!
//! ## 职责
//! - 按内容类别分目录写入/删除溢出文件
//! - 生成时间戳 + 条目 id 短后缀的文件名
//! - 对 blob 目录做实时扫描统计（路径 + 占用大小 + 文件数）
//!
//! ## 输入/输出
//! - 输入：类别、条目 id、字节负载
//! - 输出：相对 blob 根目录的路径（持久化记录中只存相对路径）
//!
//! ## 错误语义
//! - 目录创建与写入失败统一映射为 `CoreError::Storage`
//! - 删除时文件已不存在不算错误（外部篡改按缺失处理）

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::classify::ContentKind;
use crate::error::CoreError;

/// blob 目录扫描结果（实时重扫磁盘，非缓存计数）
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlobScan {
    pub path: String,
    pub total_size: u64,
    pub file_count: u64,
}

/// 溢出 blob 目录管理器
#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
}

/// 类别到扩展名的固定映射
///
/// 图片按探测到的实际格式单独传入扩展名，不走此映射。
fn ext_for_kind(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Url => "json",
        _ => "txt",
    }
}

impl BlobStore {
    /// 打开（必要时创建）blob 根目录
    pub fn open(root: PathBuf) -> Result<Self, CoreError> {
        fs::create_dir_all(&root)
            .map_err(|e| CoreError::Storage(format!("创建 blob 目录失败: {}", e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 生成 blob 文件名：`{时间戳}_{id 低 32 位十六进制}.{ext}`
    fn file_name(id: u64, ext: &str) -> String {
        let timestamp = Local::now().format("%Y%m%d%H%M%S%3f");
        format!("{}_{:08x}.{}", timestamp, id as u32, ext)
    }

    /// 将溢出负载写入对应类别子目录
    ///
    /// 返回相对根目录的路径与写入字节数。写入失败时不留下半成品文件。
    pub fn write(
        &self,
        kind: ContentKind,
        id: u64,
        ext: Option<&str>,
        bytes: &[u8],
    ) -> Result<(PathBuf, u64), CoreError> {
        let kind_dir = self.root.join(kind.as_str());
        fs::create_dir_all(&kind_dir)
            .map_err(|e| CoreError::Storage(format!("创建类别目录失败: {}", e)))?;

        let ext = ext.unwrap_or_else(|| ext_for_kind(kind));
        let rel = PathBuf::from(kind.as_str()).join(Self::file_name(id, ext));
        let abs = self.root.join(&rel);

        if let Err(e) = fs::write(&abs, bytes) {
            let _ = fs::remove_file(&abs);
            return Err(CoreError::Storage(format!(
                "写入 blob '{}' 失败: {}",
                abs.display(),
                e
            )));
        }

        Ok((rel, bytes.len() as u64))
    }

    /// 读取 blob 内容
    ///
    /// 文件缺失返回 `None`（懒加载：缺失的 blob 表现为空负载，不是加载失败）。
    pub fn read(&self, rel: &Path) -> Option<Vec<u8>> {
        match fs::read(self.root.join(rel)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("读取 blob '{}' 失败: {}", rel.display(), e);
                None
            }
        }
    }

    /// 删除单个 blob 文件，已不存在不算错误
    pub fn delete(&self, rel: &Path) -> Result<(), CoreError> {
        let abs = self.root.join(rel);
        match fs::remove_file(&abs) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Storage(format!(
                "删除 blob '{}' 失败: {}",
                abs.display(),
                e
            ))),
        }
    }

    /// 删除整个 blob 目录并重建空目录
    pub fn clear_all(&self) -> Result<(), CoreError> {
        match fs::remove_dir_all(&self.root) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CoreError::Storage(format!("清空 blob 目录失败: {}", e)));
            }
        }
        fs::create_dir_all(&self.root)
            .map_err(|e| CoreError::Storage(format!("重建 blob 目录失败: {}", e)))
    }

    /// 实时扫描 blob 目录（遍历类别子目录，统计文件数与总大小）
    ///
    /// 反映外部篡改与部分失败后的真实磁盘状态，不依赖内存计数。
    pub fn scan(&self) -> BlobScan {
        let mut total_size: u64 = 0;
        let mut file_count: u64 = 0;

        if let Ok(kind_dirs) = fs::read_dir(&self.root) {
            for kind_dir in kind_dirs.flatten() {
                let Ok(entries) = fs::read_dir(kind_dir.path()) else {
                    continue;
                };
                for entry in entries.flatten() {
                    if let Ok(metadata) = entry.metadata() {
                        if metadata.is_file() {
                            total_size += metadata.len();
                            file_count += 1;
                        }
                    }
                }
            }
        }

        BlobScan {
            path: self.root.to_string_lossy().to_string(),
            total_size,
            file_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_store(prefix: &str) -> BlobStore {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let root = std::env::temp_dir().join(format!("{}_{}", prefix, nanos));
        BlobStore::open(root).expect("open blob store")
    }

    #[test]
    fn write_places_blob_in_kind_subdir() {
        let store = unique_temp_store("grab_blobs_write");
        let (rel, size) = store
            .write(ContentKind::Code, 7, None, b"fn main() {}")
            .expect("write blob");

        assert!(rel.starts_with("code"));
        assert_eq!(rel.extension().and_then(|e| e.to_str()), Some("txt"));
        assert_eq!(size, 12);
        assert_eq!(store.read(&rel).expect("read back"), b"fn main() {}");

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn url_blobs_use_json_extension() {
        let store = unique_temp_store("grab_blobs_url");
        let (rel, _) = store
            .write(ContentKind::Url, 1, None, br#"{"url":"https://example.com"}"#)
            .expect("write url blob");
        assert_eq!(rel.extension().and_then(|e| e.to_str()), Some("json"));
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn explicit_extension_overrides_mapping() {
        let store = unique_temp_store("grab_blobs_ext");
        let (rel, _) = store
            .write(ContentKind::Image, 2, Some("png"), &[0x89, 0x50])
            .expect("write image blob");
        assert!(rel.starts_with("image"));
        assert_eq!(rel.extension().and_then(|e| e.to_str()), Some("png"));
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn delete_missing_blob_is_not_an_error() {
        let store = unique_temp_store("grab_blobs_delete_missing");
        store
            .delete(Path::new("text/20260101000000000_00000001.txt"))
            .expect("deleting missing blob should be ok");
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn read_missing_blob_returns_none() {
        let store = unique_temp_store("grab_blobs_read_missing");
        assert!(store.read(Path::new("image/nope.png")).is_none());
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn scan_counts_files_across_kind_dirs() {
        let store = unique_temp_store("grab_blobs_scan");
        store
            .write(ContentKind::Text, 1, None, b"aaaa")
            .expect("write text blob");
        store
            .write(ContentKind::Image, 2, Some("png"), b"bbbbbb")
            .expect("write image blob");

        let scan = store.scan();
        assert_eq!(scan.file_count, 2);
        assert_eq!(scan.total_size, 10);

        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn clear_all_leaves_empty_root() {
        let store = unique_temp_store("grab_blobs_clear");
        store
            .write(ContentKind::Log, 3, None, b"ERROR boom")
            .expect("write log blob");
        store.clear_all().expect("clear all");

        let scan = store.scan();
        assert_eq!(scan.file_count, 0);
        assert!(store.root().exists());

        let _ = fs::remove_dir_all(store.root());
    }
}

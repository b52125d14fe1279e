//! 历史持久化子模块
//!
//! ## 职责
//! - 维护 SQLite 键值槽位，保存序列化后的有序条目列表（不含二进制负载）
//! - 每次变更操作后整体覆写，启动时整体读回
//! - 设置 SQLite 运行参数（WAL）与 `PRAGMA user_version` 版本标记
//!
//! ## 错误语义
//! - 写入失败映射为 `CoreError::Database`，由调用方决定是否吸收
//! - 启动时槽位缺失、损坏或无法解析一律按空历史处理，绝不致命

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CoreError;
use crate::store::HistoryItem;

const SCHEMA_VERSION: i64 = 1;
const HISTORY_KEY: &str = "history";

/// 历史键值槽位的 SQLite 封装
///
/// `Connection` 本身不可跨线程共享，包一层互斥锁使存储可以放进
/// `Arc<RwLock<_>>` 供监控线程与展示侧读者共用。
#[derive(Debug)]
pub struct HistoryDb {
    conn: Mutex<Connection>,
}

fn initialize_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(|e| CoreError::Database(format!("设置 WAL 模式失败: {}", e)))?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
    .map_err(|e| CoreError::Database(format!("创建键值表失败: {}", e)))?;

    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| CoreError::Database(format!("读取数据库版本失败: {}", e)))?;
    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))
            .map_err(|e| CoreError::Database(format!("写入数据库版本失败: {}", e)))?;
    }

    Ok(())
}

impl HistoryDb {
    /// 打开（必要时创建）历史数据库
    pub fn open(db_path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CoreError::Database(format!("创建数据库目录失败: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| CoreError::Database(format!("打开数据库失败: {}", e)))?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Database(format!("打开内存数据库失败: {}", e)))?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("数据库连接锁中毒，继续使用恢复连接");
                poisoned.into_inner()
            }
        }
    }

    /// 将完整条目列表序列化后覆写键值槽位
    pub fn save(&self, items: &[HistoryItem]) -> Result<(), CoreError> {
        let json = serde_json::to_string(items)
            .map_err(|e| CoreError::Serialization(format!("序列化历史失败: {}", e)))?;

        self.conn()
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![HISTORY_KEY, json],
            )
            .map_err(|e| CoreError::Database(format!("写入历史槽位失败: {}", e)))?;

        Ok(())
    }

    /// 读回条目列表
    ///
    /// 槽位缺失、查询失败或 JSON 损坏一律返回空历史并记录日志。
    pub fn load(&self) -> Vec<HistoryItem> {
        let json: Option<String> = match self
            .conn()
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![HISTORY_KEY],
                |row| row.get(0),
            )
            .optional()
        {
            Ok(value) => value,
            Err(e) => {
                log::warn!("读取历史槽位失败，按空历史处理: {}", e);
                return Vec::new();
            }
        };

        let Some(json) = json else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<HistoryItem>>(&json) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("历史槽位内容损坏，按空历史处理: {}", e);
                Vec::new()
            }
        }
    }
}

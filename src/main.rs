//! # Grab 捕获核心 — 守护进程入口
//!
//! 本文件仅负责初始化日志、配置与存储，然后在前台驱动监控循环。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

use grab_core::config::CoreConfig;
use grab_core::monitor::Monitor;
use grab_core::pasteboard::SystemPasteboard;
use grab_core::store::ItemStore;

/// 数据目录：系统数据目录下的 `Grab/`，取不到时回退当前目录
fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Grab")
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = data_dir();
    log::info!("数据目录: {}", data_dir.display());

    let config = CoreConfig::load(&data_dir);

    let store = match ItemStore::open(&data_dir, &config) {
        Ok(store) => Arc::new(RwLock::new(store)),
        Err(err) => {
            log::error!("历史存储初始化失败: {err}");
            process::exit(1);
        }
    };

    let pasteboard = match SystemPasteboard::new() {
        Ok(pasteboard) => pasteboard,
        Err(err) => {
            log::error!("剪贴板初始化失败: {err}");
            process::exit(1);
        }
    };

    let stop = AtomicBool::new(false);
    Monitor::new(pasteboard, store, config).run_until(&stop);
}

//! # Grab 捕获核心 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  展示侧（查看器 / 上层应用）               │
//! │                                                          │
//! │        snapshot() ── storage_stats() ── read_payload()   │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Arc<RwLock<ItemStore>>（读锁取快照）
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            捕获核心 (Rust)                        │
//! │                                                          │
//! │  ┌─ error ────── CoreError (统一错误类型)                 │
//! │  │                                                       │
//! │  ├─ monitor ──── 轮询状态机（防抖·突发·稳定延迟）          │
//! │  │   └─ gate          文本接受门限                        │
//! │  │                                                       │
//! │  ├─ classify ─── 启发式内容分类（url/log/prompt/code）     │
//! │  ├─ dedup ────── 编辑距离近似去重                         │
//! │  ├─ pasteboard ─ 剪贴板能力抽象 (arboard)                 │
//! │  ├─ config ───── 配置加载·归一化·持久化                   │
//! │  └─ store ────── 有界历史 + 溢出 blob + SQLite 槽位        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `CoreError`，所有可失败操作的返回类型 |
//! | [`monitor`] | 轮询剪贴板的状态机：防抖、突发拒绝、稳定延迟、自写入抑制 |
//! | [`classify`] | 把文本归类为 url / log / prompt / code / text |
//! | [`dedup`] | 与最近条目的编辑距离相似度判定 |
//! | [`pasteboard`] | 剪贴板能力 trait 与基于 `arboard` 的系统实现 |
//! | [`config`] | 配置默认值、JSON 加载与范围归一化 |
//! | [`store`] | 新在前的有界历史集合、溢出 blob、SQLite 持久化 |

pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod monitor;
pub mod pasteboard;
pub mod store;

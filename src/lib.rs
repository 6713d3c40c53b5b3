//! # Telegram Helper
//!
//! 一个用于自动化管理 Telegram 账号的 Rust 应用核心：
//! 登录、导入联系人、解析用户名/ID、批量创建群组并拉人。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - Telegram 客户端能力接口和内存模拟实现
//! - `TelegramApi` - 核心需要的全部远端能力
//! - `TelegramGateway` - 按会话打开客户端的工厂
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个对象
//! - `Resolver` - 带重试的实体解析能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 四个用户动作的完整处理流程
//! - 发送验证码 / 登录 / 导入校验用户 / 批量建群
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 应用控制器，唯一持有队列和可变状态
//! - `queue` - 顺序任务队列，同一会话上一次只跑一个流程
//!
//! 旁边的叶子模块：`parsers`（纯文本解析）、`delay`（拟人化停顿）、
//! `retry`（有界重试）、`settings`（持久化设置）、`error`（错误分类）。
//!
//! ## 模块结构

pub mod config;
pub mod delay;
pub mod error;
pub mod infrastructure;
pub mod orchestrator;
pub mod parsers;
pub mod queue;
pub mod retry;
pub mod services;
pub mod settings;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{SimWorld, SimulatedGateway, TelegramApi, TelegramGateway};
pub use orchestrator::App;
pub use parsers::{normalize_phone, parse_contacts, parse_user_ids, parse_user_refs};
pub use queue::{QueueEvent, QueuedTask, TaskQueue};
pub use settings::Settings;

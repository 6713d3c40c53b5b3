//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是整个系统的"指挥中心"：持有所有可变状态，对外暴露用户动作。
//!
//! ### `controller` - 应用控制器
//! - 唯一持有任务队列、登录中状态、设置和客户端工厂
//! - 同步做完输入校验后，把流程闭包整个排进队列
//! - 设置变更立即写回文件
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (接收用户动作，排队)
//!     ↓
//! queue::TaskQueue (一次只跑一个流程)
//!     ↓
//! workflow (单个流程的完整步骤)
//!     ↓
//! services (能力层：带重试的实体解析)
//!     ↓
//! infrastructure (Telegram 客户端能力接口)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一归属**：队列和登录中状态只属于控制器，没有全局可变量
//! 2. **先校验后排队**：解析类错误同步返回，不进队列
//! 3. **失败隔离**：流程失败只通过事件上报，绝不影响后续任务

pub mod controller;

pub use controller::App;

//! 流程层（Workflow Layer）
//!
//! 四个用户动作对应的完整业务流程，每个流程作为一整个任务进入队列：
//!
//! - `auth::request_code` - 发送验证码
//! - `auth::sign_in` - 登录（含两步验证分支）
//! - `users::add_users` - 导入联系人并校验用户名/ID
//! - `groups::create_groups` - 批量建群（可选添加成员）
//!
//! 流程内部的每一步远端调用都按延迟策略停顿，解析类调用走重试执行器。
//! 任何流程无论成败，退出前都要断开自己打开的连接。

pub mod auth;
pub mod groups;
pub mod users;

use std::sync::Arc;

pub use auth::{request_code, sign_in, AuthSession, SharedAuth};
pub use groups::{create_groups, GroupJob};
pub use users::add_users;

use crate::infrastructure::{ApiCredentials, TelegramGateway};
use crate::parsers::ContactRecord;

/// 所有流程共用的外部依赖
#[derive(Clone)]
pub struct WorkflowEnv {
    pub gateway: Arc<dyn TelegramGateway>,
    pub credentials: ApiCredentials,
}

/// 三类已解析好的成员输入
///
/// 进入流程前文本就已经解析完毕，流程里只剩网络调用。
#[derive(Debug, Clone, Default)]
pub struct UserInputs {
    pub contacts: Vec<ContactRecord>,
    pub refs: Vec<String>,
    pub ids: Vec<i64>,
}

impl UserInputs {
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.refs.is_empty() && self.ids.is_empty()
    }
}

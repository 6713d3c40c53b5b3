//! 实体解析服务 - 业务能力层
//!
//! 只负责"按用户名或 ID 查一个远端用户"这一件事，
//! 内部套上重试执行器：解析调用最容易碰到瞬时失败，
//! 默认 3 次尝试、0.7 秒线性退避。
//!
//! - 只处理单个引用
//! - 不关心流程顺序，也不做节奏延迟（延迟由流程层控制）

use std::sync::Arc;

use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::infrastructure::{ResolvedUser, TelegramApi, UserRef};
use crate::retry::{retry_async, RESOLVE_ATTEMPTS, RESOLVE_BASE_DELAY};

/// 带重试的实体解析
pub struct Resolver {
    client: Arc<dyn TelegramApi>,
}

impl Resolver {
    pub fn new(client: Arc<dyn TelegramApi>) -> Self {
        Self { client }
    }

    /// 解析一个用户引用
    ///
    /// 瞬时失败自动重试；重试耗尽或遇到致命错误时返回最后的错误，
    /// 要不要继续处理后面的引用由调用方决定。
    pub async fn resolve(&self, reference: &UserRef) -> AppResult<ResolvedUser> {
        retry_async(
            || async move {
                self.client
                    .resolve_entity(reference)
                    .await
                    .map_err(AppError::from)
            },
            RESOLVE_ATTEMPTS,
            RESOLVE_BASE_DELAY,
            AppError::is_transient,
            |attempt, err| {
                warn!("解析 {} 第 {} 次失败，准备重试: {}", reference, attempt, err);
            },
        )
        .await
    }
}

//! 登录流程 - 流程层
//!
//! 两步走：先发验证码，再用验证码登录。
//! 发码后连接和验证码句柄都保留着，给随后的登录复用；
//! 登录无论成败都断开连接并清掉保留的句柄。

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::WorkflowEnv;
use crate::delay::wait_secs;
use crate::error::{AppError, AppResult, TelegramError};
use crate::infrastructure::{CodeHandle, TelegramApi};
use crate::parsers::{normalize_phone, session_id_from_phone};

/// 发码后保留的登录中状态
///
/// 单一归属：只有队列里正在执行的任务会碰它，队列的串行化就是它的锁。
pub struct AuthSession {
    pub phone: String,
    pub client: Arc<dyn TelegramApi>,
    pub code_handle: CodeHandle,
}

/// 控制器持有的登录中状态槽位
pub type SharedAuth = Arc<Mutex<Option<AuthSession>>>;

/// 发送验证码流程
///
/// # 参数
/// - `phone`: 目标手机号（流程内再做一次规范化）
/// - `auth_delay_secs`: 登录前固定延迟
/// - `pending`: 登录中状态槽位，成功后把打开的连接和句柄存进去
pub async fn request_code(
    env: WorkflowEnv,
    phone: String,
    auth_delay_secs: u64,
    pending: SharedAuth,
) -> AppResult<String> {
    let phone = normalize_phone(&phone);

    // 换了手机号就丢弃上一次的登录中连接，同号则直接复用
    let reused = {
        let mut slot = pending.lock().await;
        match slot.take() {
            Some(prev) if prev.phone == phone => Some(prev.client),
            Some(prev) => {
                info!("丢弃 {} 的未完成登录会话", prev.phone);
                prev.client.disconnect().await;
                None
            }
            None => None,
        }
    };

    let client = match reused {
        Some(client) => client,
        None => {
            let client = env
                .gateway
                .open(&session_id_from_phone(&phone), &env.credentials);
            client.connect().await?;
            client
        }
    };

    wait_secs(auth_delay_secs).await;

    match client.send_code(&phone).await {
        Ok(code_handle) => {
            *pending.lock().await = Some(AuthSession {
                phone: phone.clone(),
                client,
                code_handle,
            });
            info!("✓ 验证码已发送至 {}", phone);
            Ok(format!("验证码已发送至 {}，请查收", phone))
        }
        Err(err) => {
            // 失败路径同样要释放连接
            client.disconnect().await;
            Err(err.into())
        }
    }
}

/// 登录流程
///
/// 需要之前发码保留下来的句柄，否则直接报前置条件错误。
/// 服务端要求两步验证时改用密码登录；没给密码同样是前置条件错误。
/// 成功失败都断开连接、清空保留状态。
pub async fn sign_in(
    env: WorkflowEnv,
    phone: String,
    code: String,
    password: Option<String>,
    auth_delay_secs: u64,
    pending: SharedAuth,
) -> AppResult<String> {
    let phone = normalize_phone(&phone);

    let session = pending
        .lock()
        .await
        .take()
        .ok_or_else(|| AppError::precondition("请先发送验证码"))?;

    // 手机号没变就复用发码时的连接，变了就换一条新的
    let client = if session.phone == phone {
        session.client
    } else {
        info!("登录手机号与发码时不同，重新打开连接");
        session.client.disconnect().await;
        let client = env
            .gateway
            .open(&session_id_from_phone(&phone), &env.credentials);
        client.connect().await?;
        client
    };
    let code_handle = session.code_handle;

    wait_secs(auth_delay_secs).await;

    let result = async {
        match client.sign_in_with_code(&phone, &code, &code_handle).await {
            Ok(()) => {
                info!("✓ 登录成功: {}", phone);
                Ok("登录成功".to_string())
            }
            Err(TelegramError::SecondFactorNeeded) => {
                let password =
                    password.ok_or_else(|| AppError::precondition("需要两步验证密码"))?;
                client.sign_in_with_password(&password).await?;
                info!("✓ 已通过两步验证登录: {}", phone);
                Ok("已通过两步验证登录".to_string())
            }
            Err(err) => Err(err.into()),
        }
    }
    .await;

    // 成功与失败都走到这里，保证连接被释放
    client.disconnect().await;
    result
}

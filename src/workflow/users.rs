//! 用户导入与校验流程 - 流程层
//!
//! 三类输入（联系人、用户名/链接、用户 ID）各自独立处理：
//! 联系人一次批量导入，引用和 ID 逐个走带重试的解析，
//! 单条失败只计数不中断。每次远端调用前都按联系人延迟停顿。

use std::sync::Arc;

use tracing::{info, warn};

use super::{UserInputs, WorkflowEnv};
use crate::delay::DelayRange;
use crate::error::{AppResult, TelegramError};
use crate::infrastructure::{PhoneContact, TelegramApi, UserRef};
use crate::parsers::session_id_from_phone;
use crate::services::Resolver;

/// 导入联系人并校验用户名/ID
///
/// # 参数
/// - `phone`: 当前账号手机号，用来定位会话
/// - `contacts_delay`: 联系人类动作的延迟配置
/// - `inputs`: 已解析好的三类输入，允许任意子集为空
///
/// # 返回
/// 各部分结果拼成的摘要文本。
pub async fn add_users(
    env: WorkflowEnv,
    phone: String,
    contacts_delay: DelayRange,
    inputs: UserInputs,
) -> AppResult<String> {
    let client = env
        .gateway
        .open(&session_id_from_phone(&phone), &env.credentials);
    client.connect().await?;

    let result = run(&client, &contacts_delay, &inputs).await;

    // 清理步骤：无论结果如何都断开连接
    client.disconnect().await;
    result
}

async fn run(
    client: &Arc<dyn TelegramApi>,
    contacts_delay: &DelayRange,
    inputs: &UserInputs,
) -> AppResult<String> {
    if !client.is_authorized().await? {
        return Err(TelegramError::NotAuthorized.into());
    }

    let mut logs = Vec::new();

    // ========== 批量导入联系人 ==========
    if !inputs.contacts.is_empty() {
        contacts_delay.wait().await;
        let batch = to_phone_contacts(inputs);
        let imported = client.import_contacts(&batch).await?;
        info!(
            "✓ 导入联系人 {} 条，找到 Telegram 账号 {} 个",
            batch.len(),
            imported.len()
        );
        logs.push(format!("导入联系人: {} 条", batch.len()));
        logs.push(format!("找到 Telegram 账号: {} 个", imported.len()));
    }

    // ========== 逐个校验用户名/链接 ==========
    if !inputs.refs.is_empty() {
        let resolver = Resolver::new(Arc::clone(client));
        let (mut ok, mut fail) = (0usize, 0usize);
        for handle in &inputs.refs {
            contacts_delay.wait().await;
            match resolver.resolve(&UserRef::Handle(handle.clone())).await {
                Ok(_) => ok += 1,
                Err(err) => {
                    warn!("校验用户名 {} 失败: {}", handle, err);
                    fail += 1;
                }
            }
        }
        logs.push(format!("用户名/链接校验: 成功 {} 个，失败 {} 个", ok, fail));
    }

    // ========== 逐个校验用户 ID ==========
    if !inputs.ids.is_empty() {
        let resolver = Resolver::new(Arc::clone(client));
        let (mut ok, mut fail) = (0usize, 0usize);
        for id in &inputs.ids {
            contacts_delay.wait().await;
            match resolver.resolve(&UserRef::Id(*id)).await {
                Ok(_) => ok += 1,
                Err(err) => {
                    warn!("校验用户 ID {} 失败: {}", id, err);
                    fail += 1;
                }
            }
        }
        logs.push(format!("用户 ID 校验: 成功 {} 个，失败 {} 个", ok, fail));
    }

    if logs.is_empty() {
        Ok("没有可处理的数据".to_string())
    } else {
        Ok(logs.join("\n"))
    }
}

/// 把联系人记录转成导入请求里的条目
pub(crate) fn to_phone_contacts(inputs: &UserInputs) -> Vec<PhoneContact> {
    inputs
        .contacts
        .iter()
        .enumerate()
        .map(|(i, c)| PhoneContact {
            client_id: (i + 1) as i64,
            phone: c.phone.clone(),
            full_name: c.full_name.clone(),
        })
        .collect()
}

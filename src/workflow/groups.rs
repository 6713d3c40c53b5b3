//! 批量建群流程 - 流程层
//!
//! 可选先从三个来源（联系人、用户名、ID）收集受邀成员：
//! 过滤机器人账号，按解析出的数字 ID 去重，解析失败的候选
//! 只记一行日志就跳过。然后逐个建群，每个群按顺序执行
//! 建群 → 可选话题 → 可选头像 → 可选拉人，每一步之间都按
//! 群组延迟停顿。中途出错立即中止本流程，已建好的群保持原样。

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::users::to_phone_contacts;
use super::{UserInputs, WorkflowEnv};
use crate::delay::DelayRange;
use crate::error::{AppError, AppResult, TelegramError};
use crate::infrastructure::{ResolvedUser, TelegramApi, UserRef};
use crate::parsers::session_id_from_phone;
use crate::services::Resolver;

/// 一次建群任务的全部参数
#[derive(Debug, Clone)]
pub struct GroupJob {
    pub title: String,
    pub about: String,
    pub count: u32,
    /// 群头像文件，None 表示不设头像
    pub photo_path: Option<PathBuf>,
    /// 是否开启话题模式
    pub forum: bool,
    /// 话题模式下要创建的话题名
    pub topic_title: Option<String>,
    /// 是否添加成员
    pub add_members: bool,
    /// 成员来源（已按来源开关筛过）
    pub invites: UserInputs,
}

/// 批量建群
///
/// # 返回
/// 各步骤拼成的摘要日志。
pub async fn create_groups(
    env: WorkflowEnv,
    phone: String,
    contacts_delay: DelayRange,
    groups_delay: DelayRange,
    job: GroupJob,
) -> AppResult<String> {
    let client = env
        .gateway
        .open(&session_id_from_phone(&phone), &env.credentials);
    client.connect().await?;

    let result = run(&client, &contacts_delay, &groups_delay, &job).await;

    client.disconnect().await;
    result
}

async fn run(
    client: &Arc<dyn TelegramApi>,
    contacts_delay: &DelayRange,
    groups_delay: &DelayRange,
    job: &GroupJob,
) -> AppResult<String> {
    if !client.is_authorized().await? {
        return Err(TelegramError::NotAuthorized.into());
    }

    let mut logs: Vec<String> = Vec::new();

    let invitees = if job.add_members {
        let invitees = gather_invitees(client, contacts_delay, &job.invites).await?;
        logs.push(format!("已准备成员: {} 人", invitees.len()));
        invitees
    } else {
        Vec::new()
    };

    // ========== 逐个创建群组 ==========
    for i in 0..job.count {
        groups_delay.wait().await;
        let title = if job.count == 1 {
            job.title.clone()
        } else {
            format!("{} #{}", job.title, i + 1)
        };
        let group = client
            .create_group(&title, &job.about, job.forum)
            .await?;
        info!("✓ 已创建群组: {}", title);
        logs.push(format!("已创建群组: {}", title));

        if job.forum {
            if let Some(topic) = &job.topic_title {
                groups_delay.wait().await;
                client.create_topic(&group, topic).await?;
                logs.push(format!("已在 {} 创建话题: {}", title, topic));
            }
        }

        if let Some(path) = &job.photo_path {
            // 上传前先确认文件存在，不存在属于致命错误
            if !path.exists() {
                return Err(AppError::file_not_found(path.display().to_string()));
            }
            groups_delay.wait().await;
            let photo = client.upload_photo(path).await?;
            client.set_group_photo(&group, photo).await?;
            logs.push(format!("已设置 {} 的头像", title));
        }

        if job.add_members && !invitees.is_empty() {
            groups_delay.wait().await;
            client.invite_users(&group, &invitees).await?;
            logs.push(format!("已向 {} 添加成员: {} 人", title, invitees.len()));
        }
    }

    if !job.add_members {
        logs.push("群组已创建（未添加成员）".to_string());
    }

    Ok(logs.join("\n"))
}

/// 从三个来源收集受邀成员
///
/// 机器人账号一律过滤；解析失败的候选跳过并记日志，
/// 这会悄悄缩小实际邀请名单，属于预期行为。
/// 最后按解析出的数字 ID 去重。
async fn gather_invitees(
    client: &Arc<dyn TelegramApi>,
    contacts_delay: &DelayRange,
    inputs: &UserInputs,
) -> AppResult<Vec<ResolvedUser>> {
    let mut candidates: Vec<ResolvedUser> = Vec::new();

    if !inputs.contacts.is_empty() {
        contacts_delay.wait().await;
        let batch = to_phone_contacts(inputs);
        let imported = client.import_contacts(&batch).await?;
        candidates.extend(imported.into_iter().filter(|u| !u.bot));
    }

    let resolver = Resolver::new(Arc::clone(client));

    for handle in &inputs.refs {
        contacts_delay.wait().await;
        match resolver.resolve(&UserRef::Handle(handle.clone())).await {
            Ok(user) if user.bot => debug!("跳过机器人账号: {}", handle),
            Ok(user) => candidates.push(user),
            Err(err) => warn!("候选 {} 解析失败，跳过: {}", handle, err),
        }
    }

    for id in &inputs.ids {
        contacts_delay.wait().await;
        match resolver.resolve(&UserRef::Id(*id)).await {
            Ok(user) if user.bot => debug!("跳过机器人账号: ID {}", id),
            Ok(user) => candidates.push(user),
            Err(err) => warn!("候选 ID {} 解析失败，跳过: {}", id, err),
        }
    }

    // 同一个人可能同时出现在联系人和 ID 列表里，按数字 ID 去重
    let mut seen = HashSet::new();
    candidates.retain(|u| seen.insert(u.id));

    Ok(candidates)
}

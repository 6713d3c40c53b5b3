//! Telegram 客户端能力接口 - 基础设施层
//!
//! 这里只定义核心需要的那一小块能力面：连接、登录、解析实体、
//! 导入联系人、建群相关的几个调用。线路协议、握手细节都属于
//! 具体实现，核心只负责这些调用怎么排队、怎么重试、怎么停顿。

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TelegramError;

/// Telegram 调用的结果类型
pub type TelegramResult<T> = Result<T, TelegramError>;

/// API 凭据（API ID + API HASH），登录之后的所有操作都用它
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

/// 发送验证码后服务端返回的不透明句柄，登录时必须原样带回
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeHandle(pub String);

/// 待导入的一条电话联系人
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneContact {
    pub client_id: i64,
    pub phone: String,
    pub full_name: String,
}

/// 解析出来的远端用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUser {
    pub id: i64,
    pub username: Option<String>,
    pub bot: bool,
}

/// 创建出来的群组句柄
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupHandle {
    pub id: i64,
    pub title: String,
}

/// 上传完成的照片句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadedPhoto {
    pub file_id: i64,
}

/// 一个待解析的用户引用：用户名或数字 ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Handle(String),
    Id(i64),
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Handle(h) => write!(f, "@{}", h),
            UserRef::Id(id) => write!(f, "ID {}", id),
        }
    }
}

/// Telegram 客户端能力接口
///
/// 实现方持有一条绑定到某个会话文件的连接。同一个会话不允许并发使用，
/// 调用方（任务队列）负责保证同一时刻只有一个流程在用它。
#[async_trait]
pub trait TelegramApi: Send + Sync {
    /// 建立连接
    async fn connect(&self) -> TelegramResult<()>;

    /// 断开连接。失败路径也必须调用，所以设计成不返回错误。
    async fn disconnect(&self);

    /// 当前会话是否已登录
    async fn is_authorized(&self) -> TelegramResult<bool>;

    /// 请求向手机号发送验证码
    async fn send_code(&self, phone: &str) -> TelegramResult<CodeHandle>;

    /// 用验证码登录
    ///
    /// 账号开了两步验证时返回 [`TelegramError::SecondFactorNeeded`]，
    /// 调用方应改走密码登录。
    async fn sign_in_with_code(
        &self,
        phone: &str,
        code: &str,
        handle: &CodeHandle,
    ) -> TelegramResult<()>;

    /// 两步验证密码登录
    async fn sign_in_with_password(&self, password: &str) -> TelegramResult<()>;

    /// 按用户名或 ID 解析远端用户
    async fn resolve_entity(&self, reference: &UserRef) -> TelegramResult<ResolvedUser>;

    /// 批量导入电话联系人，返回其中注册了 Telegram 的用户
    async fn import_contacts(&self, batch: &[PhoneContact]) -> TelegramResult<Vec<ResolvedUser>>;

    /// 创建超级群组，`forum` 为真时开启话题模式
    async fn create_group(
        &self,
        title: &str,
        about: &str,
        forum: bool,
    ) -> TelegramResult<GroupHandle>;

    /// 在话题模式的群组里创建一个命名话题
    async fn create_topic(&self, group: &GroupHandle, title: &str) -> TelegramResult<()>;

    /// 上传本地照片文件
    async fn upload_photo(&self, path: &Path) -> TelegramResult<UploadedPhoto>;

    /// 把上传好的照片设为群头像
    async fn set_group_photo(
        &self,
        group: &GroupHandle,
        photo: UploadedPhoto,
    ) -> TelegramResult<()>;

    /// 邀请一批用户进群
    async fn invite_users(
        &self,
        group: &GroupHandle,
        users: &[ResolvedUser],
    ) -> TelegramResult<()>;
}

/// 客户端工厂
///
/// 按会话标识 + API 凭据打开一个客户端。同一个会话标识
/// 必须映射到同一份持久登录状态。
pub trait TelegramGateway: Send + Sync {
    fn open(&self, session_id: &str, credentials: &ApiCredentials) -> Arc<dyn TelegramApi>;
}

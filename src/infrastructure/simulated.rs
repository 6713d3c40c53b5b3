//! 内存模拟客户端 - 基础设施层
//!
//! 开发期预演模式和集成测试共用的确定性实现：
//! 用户目录、解析失败脚本、建群记录全在内存里。
//! 锁都只在同步段内短暂持有，方法内部不会跨 await 持锁。

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use super::telegram::{
    ApiCredentials, CodeHandle, GroupHandle, PhoneContact, ResolvedUser, TelegramApi,
    TelegramGateway, TelegramResult, UploadedPhoto, UserRef,
};
use crate::error::TelegramError;

/// 模拟环境下固定的验证码
pub const VERIFICATION_CODE: &str = "12345";

/// 所有会话共享的模拟世界：用户目录 + 操作记录
#[derive(Default)]
pub struct SimWorld {
    inner: Mutex<WorldState>,
}

#[derive(Default)]
struct WorldState {
    users_by_handle: HashMap<String, ResolvedUser>,
    users_by_id: HashMap<i64, ResolvedUser>,
    users_by_phone: HashMap<String, ResolvedUser>,
    /// 某个引用还剩几次瞬时失败
    transient: HashMap<String, u32>,
    /// 永远解析不到的引用
    denied: HashSet<String>,
    groups: Vec<GroupHandle>,
    topics: Vec<(i64, String)>,
    photos: Vec<(i64, i64)>,
    invites: Vec<(i64, Vec<i64>)>,
    imported_batches: Vec<usize>,
    next_group_id: i64,
    next_photo_id: i64,
}

impl SimWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 在目录里登记一个用户
    pub fn register_user(&self, handle: &str, phone: Option<&str>, id: i64, bot: bool) {
        let user = ResolvedUser {
            id,
            username: Some(handle.to_string()),
            bot,
        };
        let mut state = self.lock();
        state.users_by_handle.insert(handle.to_string(), user.clone());
        state.users_by_id.insert(id, user.clone());
        if let Some(p) = phone {
            state.users_by_phone.insert(p.to_string(), user);
        }
    }

    /// 让某个引用先瞬时失败 `times` 次，之后恢复正常
    pub fn fail_resolution(&self, reference: &str, times: u32) {
        self.lock().transient.insert(reference.to_string(), times);
    }

    /// 让某个引用永远解析失败
    pub fn deny(&self, reference: &str) {
        self.lock().denied.insert(reference.to_string());
    }

    // ========== 断言用的读取接口 ==========

    pub fn created_groups(&self) -> Vec<GroupHandle> {
        self.lock().groups.clone()
    }

    pub fn created_topics(&self) -> Vec<(i64, String)> {
        self.lock().topics.clone()
    }

    pub fn group_photos(&self) -> Vec<(i64, i64)> {
        self.lock().photos.clone()
    }

    pub fn invites(&self) -> Vec<(i64, Vec<i64>)> {
        self.lock().invites.clone()
    }

    pub fn imported_batches(&self) -> Vec<usize> {
        self.lock().imported_batches.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorldState> {
        // 锁内从不 panic，中毒只可能来自测试自身的 bug
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 单个会话的登录状态
#[derive(Default)]
struct AuthState {
    connected: bool,
    authorized: bool,
    pending_code: Option<PendingCode>,
    connects: u32,
    disconnects: u32,
}

struct PendingCode {
    phone: String,
    hash: String,
}

/// 会话状态快照（测试断言用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub connects: u32,
    pub disconnects: u32,
    pub connected: bool,
    pub authorized: bool,
}

/// 模拟客户端：一条指向共享世界的"连接"
pub struct SimulatedTelegram {
    session_id: String,
    world: Arc<SimWorld>,
    auth: Arc<Mutex<AuthState>>,
    /// 账号的两步验证密码，None 表示未开启
    account_password: Option<String>,
}

impl SimulatedTelegram {
    fn lock_auth(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.auth.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TelegramApi for SimulatedTelegram {
    async fn connect(&self) -> TelegramResult<()> {
        let mut auth = self.lock_auth();
        auth.connected = true;
        auth.connects += 1;
        debug!("[模拟] 会话 {} 已连接", self.session_id);
        Ok(())
    }

    async fn disconnect(&self) {
        let mut auth = self.lock_auth();
        auth.connected = false;
        auth.disconnects += 1;
        debug!("[模拟] 会话 {} 已断开", self.session_id);
    }

    async fn is_authorized(&self) -> TelegramResult<bool> {
        Ok(self.lock_auth().authorized)
    }

    async fn send_code(&self, phone: &str) -> TelegramResult<CodeHandle> {
        let hash = format!("hash-{}", phone);
        self.lock_auth().pending_code = Some(PendingCode {
            phone: phone.to_string(),
            hash: hash.clone(),
        });
        Ok(CodeHandle(hash))
    }

    async fn sign_in_with_code(
        &self,
        phone: &str,
        code: &str,
        handle: &CodeHandle,
    ) -> TelegramResult<()> {
        let mut auth = self.lock_auth();
        let pending = auth
            .pending_code
            .as_ref()
            .ok_or_else(|| TelegramError::SignInRejected {
                message: "没有待验证的验证码".to_string(),
            })?;
        if pending.phone != phone || pending.hash != handle.0 {
            return Err(TelegramError::SignInRejected {
                message: "验证码句柄与手机号不匹配".to_string(),
            });
        }
        if code != VERIFICATION_CODE {
            return Err(TelegramError::SignInRejected {
                message: "验证码不正确".to_string(),
            });
        }
        if self.account_password.is_some() {
            return Err(TelegramError::SecondFactorNeeded);
        }
        auth.pending_code = None;
        auth.authorized = true;
        Ok(())
    }

    async fn sign_in_with_password(&self, password: &str) -> TelegramResult<()> {
        let mut auth = self.lock_auth();
        match &self.account_password {
            Some(expected) if expected == password => {
                auth.pending_code = None;
                auth.authorized = true;
                Ok(())
            }
            Some(_) => Err(TelegramError::SignInRejected {
                message: "两步验证密码不正确".to_string(),
            }),
            None => Err(TelegramError::SignInRejected {
                message: "账号未开启两步验证".to_string(),
            }),
        }
    }

    async fn resolve_entity(&self, reference: &UserRef) -> TelegramResult<ResolvedUser> {
        let key = match reference {
            UserRef::Handle(h) => h.clone(),
            UserRef::Id(id) => id.to_string(),
        };
        let mut state = self.world.lock();

        if let Some(remaining) = state.transient.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TelegramError::ResolveFailed {
                    reference: reference.to_string(),
                    message: "暂时无法解析，请稍后再试".to_string(),
                });
            }
        }
        if state.denied.contains(&key) {
            return Err(TelegramError::ResolveFailed {
                reference: reference.to_string(),
                message: "查无此用户".to_string(),
            });
        }

        let found = match reference {
            UserRef::Handle(h) => state.users_by_handle.get(h),
            UserRef::Id(id) => state.users_by_id.get(id),
        };
        found.cloned().ok_or_else(|| TelegramError::ResolveFailed {
            reference: reference.to_string(),
            message: "查无此用户".to_string(),
        })
    }

    async fn import_contacts(&self, batch: &[PhoneContact]) -> TelegramResult<Vec<ResolvedUser>> {
        let mut state = self.world.lock();
        state.imported_batches.push(batch.len());
        let found = batch
            .iter()
            .filter_map(|c| state.users_by_phone.get(&c.phone).cloned())
            .collect();
        Ok(found)
    }

    async fn create_group(
        &self,
        title: &str,
        about: &str,
        forum: bool,
    ) -> TelegramResult<GroupHandle> {
        let mut state = self.world.lock();
        state.next_group_id += 1;
        let group = GroupHandle {
            id: state.next_group_id,
            title: title.to_string(),
        };
        state.groups.push(group.clone());
        debug!(
            "[模拟] 已创建群组 {} (about: {}, forum: {})",
            title, about, forum
        );
        Ok(group)
    }

    async fn create_topic(&self, group: &GroupHandle, title: &str) -> TelegramResult<()> {
        let mut state = self.world.lock();
        if !state.groups.iter().any(|g| g.id == group.id) {
            return Err(TelegramError::Rpc {
                method: "create_topic".to_string(),
                message: format!("群组 {} 不存在", group.id),
            });
        }
        state.topics.push((group.id, title.to_string()));
        Ok(())
    }

    async fn upload_photo(&self, path: &Path) -> TelegramResult<UploadedPhoto> {
        let mut state = self.world.lock();
        state.next_photo_id += 1;
        debug!("[模拟] 已上传照片: {}", path.display());
        Ok(UploadedPhoto {
            file_id: state.next_photo_id,
        })
    }

    async fn set_group_photo(
        &self,
        group: &GroupHandle,
        photo: UploadedPhoto,
    ) -> TelegramResult<()> {
        self.world.lock().photos.push((group.id, photo.file_id));
        Ok(())
    }

    async fn invite_users(
        &self,
        group: &GroupHandle,
        users: &[ResolvedUser],
    ) -> TelegramResult<()> {
        let ids = users.iter().map(|u| u.id).collect();
        self.world.lock().invites.push((group.id, ids));
        Ok(())
    }
}

/// 模拟客户端工厂
///
/// 同一个会话标识返回同一份登录状态，跨任务复用。
pub struct SimulatedGateway {
    world: Arc<SimWorld>,
    sessions: Mutex<HashMap<String, Arc<Mutex<AuthState>>>>,
    start_authorized: bool,
    account_password: Option<String>,
}

impl SimulatedGateway {
    /// 全新环境：未登录，未开两步验证
    pub fn new(world: Arc<SimWorld>) -> Self {
        Self {
            world,
            sessions: Mutex::new(HashMap::new()),
            start_authorized: false,
            account_password: None,
        }
    }

    /// 预演模式：所有会话一开始就是已登录状态
    pub fn authorized(world: Arc<SimWorld>) -> Self {
        Self {
            start_authorized: true,
            ..Self::new(world)
        }
    }

    /// 给账号开启两步验证
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.account_password = Some(password.into());
        self
    }

    /// 读取某个会话的连接/登录统计
    pub fn stats(&self, session_id: &str) -> Option<SessionStats> {
        let sessions = self.lock_sessions();
        let auth = sessions.get(session_id)?;
        let auth = auth.lock().unwrap_or_else(|e| e.into_inner());
        Some(SessionStats {
            connects: auth.connects,
            disconnects: auth.disconnects,
            connected: auth.connected,
            authorized: auth.authorized,
        })
    }

    fn lock_sessions(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Mutex<AuthState>>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TelegramGateway for SimulatedGateway {
    fn open(&self, session_id: &str, _credentials: &ApiCredentials) -> Arc<dyn TelegramApi> {
        let auth = {
            let mut sessions = self.lock_sessions();
            Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
                Arc::new(Mutex::new(AuthState {
                    authorized: self.start_authorized,
                    ..AuthState::default()
                }))
            }))
        };
        Arc::new(SimulatedTelegram {
            session_id: session_id.to_string(),
            world: Arc::clone(&self.world),
            auth,
            account_password: self.account_password.clone(),
        })
    }
}

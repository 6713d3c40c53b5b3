//! 应用控制器 - 编排层
//!
//! 用户的每个动作先在这里做同步校验（解析输入、检查凭据），
//! 通过之后才把完整流程作为一个任务排进队列。
//! 校验错误立刻返回给调用方；流程里的错误走事件通道上报。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::infrastructure::{ApiCredentials, TelegramGateway};
use crate::parsers::{normalize_phone, parse_contacts, parse_user_ids, parse_user_refs};
use crate::queue::{QueueEvent, QueuedTask, TaskQueue};
use crate::settings::{Account, Delays, GroupSettings, Settings};
use crate::workflow::{self, GroupJob, SharedAuth, UserInputs, WorkflowEnv};

/// 应用控制器
///
/// 队列、登录中状态、设置全在这里，没有任何全局可变量。
/// 队列的串行化保证登录中状态不会被两个流程同时碰到。
pub struct App {
    settings_path: PathBuf,
    settings: Mutex<Settings>,
    gateway: Arc<dyn TelegramGateway>,
    queue: TaskQueue,
    pending_auth: SharedAuth,
}

impl App {
    /// 创建控制器并启动任务队列
    ///
    /// # 返回
    /// 控制器本体和事件接收端，事件端交给表现层去消费。
    pub fn new(
        settings_path: impl Into<PathBuf>,
        settings: Settings,
        gateway: Arc<dyn TelegramGateway>,
    ) -> (Self, UnboundedReceiver<QueueEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let queue = TaskQueue::spawn(event_tx);
        let app = Self {
            settings_path: settings_path.into(),
            settings: Mutex::new(settings),
            gateway,
            queue,
            pending_auth: Arc::new(Mutex::new(None)),
        };
        (app, event_rx)
    }

    /// 队列是否空闲
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// 当前设置的快照
    pub async fn settings(&self) -> Settings {
        self.settings.lock().await.clone()
    }

    /// 校验凭据并组装流程依赖
    async fn workflow_env(&self) -> AppResult<WorkflowEnv> {
        let settings = self.settings.lock().await;
        if settings.api.api_id <= 0 || settings.api.api_hash.trim().is_empty() {
            return Err(AppError::precondition("请先填写 API ID 和 API HASH"));
        }
        Ok(WorkflowEnv {
            gateway: Arc::clone(&self.gateway),
            credentials: ApiCredentials {
                api_id: settings.api.api_id,
                api_hash: settings.api.api_hash.clone(),
            },
        })
    }

    /// 取当前账号手机号，没选账号直接报错
    async fn active_phone(&self) -> AppResult<String> {
        let settings = self.settings.lock().await;
        if settings.active_phone.trim().is_empty() {
            return Err(AppError::precondition("请先在账号菜单里选择账号"));
        }
        Ok(settings.active_phone.clone())
    }

    // ========== 用户动作：登录 ==========

    /// 发送验证码
    pub async fn request_code(&self, phone: &str) -> AppResult<()> {
        let phone = phone.trim().to_string();
        if phone.is_empty() {
            return Err(AppError::precondition("请输入手机号"));
        }
        let env = self.workflow_env().await?;
        let auth_delay = self.settings.lock().await.delays.auth;
        let pending = Arc::clone(&self.pending_auth);

        info!("发送验证码任务已提交: {}", phone);
        self.queue.enqueue(QueuedTask::new("发送验证码", move || {
            Box::pin(workflow::request_code(env, phone, auth_delay, pending))
        }));
        Ok(())
    }

    /// 用验证码（和可选的两步验证密码）登录
    pub async fn sign_in(
        &self,
        phone: &str,
        code: &str,
        password: Option<&str>,
    ) -> AppResult<()> {
        let phone = phone.trim().to_string();
        if phone.is_empty() {
            return Err(AppError::precondition("请输入手机号"));
        }
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(AppError::precondition("请输入验证码"));
        }
        let password = password
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let env = self.workflow_env().await?;
        let auth_delay = self.settings.lock().await.delays.auth;
        let pending = Arc::clone(&self.pending_auth);

        info!("登录任务已提交: {}", phone);
        self.queue.enqueue(QueuedTask::new("登录账号", move || {
            Box::pin(workflow::sign_in(
                env, phone, code, password, auth_delay, pending,
            ))
        }));
        Ok(())
    }

    // ========== 用户动作：导入与校验用户 ==========

    /// 导入联系人并校验用户名/ID
    ///
    /// 三段文本先同步解析，任何一段格式不对立刻返回错误，不会排队。
    pub async fn add_users(
        &self,
        contacts_text: &str,
        refs_text: &str,
        ids_text: &str,
    ) -> AppResult<()> {
        let inputs = UserInputs {
            contacts: if contacts_text.trim().is_empty() {
                Vec::new()
            } else {
                parse_contacts(contacts_text)?
            },
            refs: if refs_text.trim().is_empty() {
                Vec::new()
            } else {
                parse_user_refs(refs_text)?
            },
            ids: if ids_text.trim().is_empty() {
                Vec::new()
            } else {
                parse_user_ids(ids_text)?
            },
        };

        let env = self.workflow_env().await?;
        let phone = self.active_phone().await?;
        let contacts_delay = self.settings.lock().await.delays.contacts;

        info!(
            "用户处理任务已提交: 联系人 {} 条 / 用户名 {} 个 / ID {} 个",
            inputs.contacts.len(),
            inputs.refs.len(),
            inputs.ids.len()
        );
        self.queue
            .enqueue(QueuedTask::new("校验并添加用户", move || {
                Box::pin(workflow::add_users(env, phone, contacts_delay, inputs))
            }));
        Ok(())
    }

    // ========== 用户动作：批量建群 ==========

    /// 批量建群
    ///
    /// 成员来源取自设置里的输入缓冲区，按来源开关筛选。
    /// 要求添加成员但筛完一个来源都没有时直接报错。
    pub async fn create_groups(&self, add_members: bool) -> AppResult<()> {
        let env = self.workflow_env().await?;
        let phone = self.active_phone().await?;
        let settings = self.settings.lock().await.clone();

        let title = settings.groups.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::precondition("请输入群组名称"));
        }

        let add_members = add_members && settings.groups.add_members;
        let invites = if add_members {
            UserInputs {
                contacts: if settings.groups.use_contacts
                    && !settings.inputs.contacts.trim().is_empty()
                {
                    parse_contacts(&settings.inputs.contacts)?
                } else {
                    Vec::new()
                },
                refs: if settings.groups.use_refs
                    && !settings.inputs.usernames.trim().is_empty()
                {
                    parse_user_refs(&settings.inputs.usernames)?
                } else {
                    Vec::new()
                },
                ids: if settings.groups.use_ids
                    && !settings.inputs.user_ids.trim().is_empty()
                {
                    parse_user_ids(&settings.inputs.user_ids)?
                } else {
                    Vec::new()
                },
            }
        } else {
            UserInputs::default()
        };
        if add_members && invites.is_empty() {
            return Err(AppError::precondition(
                "添加成员时至少需要一个非空的成员来源",
            ));
        }

        let photo_path = settings.groups.photo_path.trim();
        let topic_title = settings.groups.topic_title.trim();
        let job = GroupJob {
            title,
            about: settings.groups.about.clone(),
            count: settings.groups.count.max(1),
            photo_path: (!photo_path.is_empty()).then(|| PathBuf::from(photo_path)),
            forum: settings.groups.forum,
            topic_title: (!topic_title.is_empty()).then(|| topic_title.to_string()),
            add_members,
            invites,
        };
        let contacts_delay = settings.delays.contacts;
        let groups_delay = settings.delays.groups;

        info!("建群任务已提交: {} x{}", job.title, job.count);
        self.queue.enqueue(QueuedTask::new("创建群组", move || {
            Box::pin(workflow::create_groups(
                env,
                phone,
                contacts_delay,
                groups_delay,
                job,
            ))
        }));
        Ok(())
    }

    // ========== 设置维护 ==========

    /// 保存 API 凭据
    pub async fn save_api_credentials(&self, api_id: i32, api_hash: &str) -> AppResult<()> {
        if api_id <= 0 {
            return Err(AppError::precondition("API ID 必须是正整数"));
        }
        let api_hash = api_hash.trim();
        if api_hash.is_empty() {
            return Err(AppError::precondition("API HASH 不能为空"));
        }
        let mut settings = self.settings.lock().await;
        settings.api.api_id = api_id;
        settings.api.api_hash = api_hash.to_string();
        settings.save(&self.settings_path)?;
        info!("API 凭据已保存");
        Ok(())
    }

    /// 添加或更新账号（按手机号匹配）
    pub async fn upsert_account(&self, name: &str, phone: &str) -> AppResult<()> {
        let phone = normalize_phone(phone);
        if phone.is_empty() {
            return Err(AppError::precondition("账号必须填写手机号"));
        }
        let name = if name.trim().is_empty() {
            phone.clone()
        } else {
            name.trim().to_string()
        };

        let mut settings = self.settings.lock().await;
        match settings
            .accounts
            .iter_mut()
            .find(|a| normalize_phone(&a.phone) == phone)
        {
            Some(existing) => existing.name = name.clone(),
            None => settings.accounts.push(Account {
                name: name.clone(),
                phone: phone.clone(),
            }),
        }
        settings.save(&self.settings_path)?;
        info!("账号已添加/更新: {}", name);
        Ok(())
    }

    /// 删除账号
    pub async fn remove_account(&self, phone: &str) -> AppResult<()> {
        let phone = normalize_phone(phone);
        let mut settings = self.settings.lock().await;
        settings
            .accounts
            .retain(|a| normalize_phone(&a.phone) != phone);
        if normalize_phone(&settings.active_phone) == phone {
            settings.active_phone.clear();
        }
        settings.save(&self.settings_path)?;
        info!("账号已删除: {}", phone);
        Ok(())
    }

    /// 选中某个账号作为当前账号
    pub async fn select_account(&self, phone: &str) -> AppResult<()> {
        let phone = normalize_phone(phone);
        let mut settings = self.settings.lock().await;
        let name = settings
            .accounts
            .iter()
            .find(|a| normalize_phone(&a.phone) == phone)
            .map(|a| a.name.clone())
            .ok_or_else(|| AppError::precondition("账号菜单里没有这个手机号"))?;
        info!("已选中账号: {}", name);
        settings.active_phone = phone;
        settings.save(&self.settings_path)?;
        Ok(())
    }

    /// 更新三类延迟配置
    pub async fn update_delays(&self, delays: Delays) -> AppResult<()> {
        let mut settings = self.settings.lock().await;
        settings.delays = delays;
        settings.save(&self.settings_path)?;
        Ok(())
    }

    /// 更新建群参数
    pub async fn update_group_settings(&self, groups: GroupSettings) -> AppResult<()> {
        let mut settings = self.settings.lock().await;
        settings.groups = groups;
        settings.save(&self.settings_path)?;
        Ok(())
    }

    /// 更新三个输入缓冲区
    pub async fn update_inputs(
        &self,
        contacts: &str,
        usernames: &str,
        user_ids: &str,
    ) -> AppResult<()> {
        let mut settings = self.settings.lock().await;
        settings.inputs.contacts = contacts.to_string();
        settings.inputs.usernames = usernames.to_string();
        settings.inputs.user_ids = user_ids.to_string();
        settings.save(&self.settings_path)?;
        Ok(())
    }
}

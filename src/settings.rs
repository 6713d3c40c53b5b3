//! 持久化设置 - TOML 文档
//!
//! 启动时读取，文件缺失或格式损坏时退回默认值并打一条警告；
//! 任何会影响设置的修改之后都整体重写一遍文件。
//!
//! 内容：API 凭据、账号菜单、当前账号手机号、三类延迟配置、
//! 建群参数、成员来源开关、三个输入文本缓冲区。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::delay::DelayRange;
use crate::error::{AppError, AppResult};

/// API 凭据段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub api_id: i32,
    pub api_hash: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
        }
    }
}

/// 账号菜单里的一条账号
///
/// 会话文件名由手机号推导，不再单独存储。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub phone: String,
}

/// 三类延迟配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delays {
    /// 发码和登录前的固定延迟（秒）
    pub auth: u64,
    /// 联系人处理动作之间的延迟
    pub contacts: DelayRange,
    /// 群组管理动作之间的延迟
    pub groups: DelayRange,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            auth: 0,
            contacts: DelayRange {
                min: 0,
                max: 3,
                randomize: true,
            },
            groups: DelayRange {
                min: 1,
                max: 5,
                randomize: true,
            },
        }
    }
}

/// 建群参数段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    pub title: String,
    pub about: String,
    pub count: u32,
    pub photo_path: String,
    pub forum: bool,
    pub topic_title: String,
    pub add_members: bool,
    /// 成员来源开关
    pub use_contacts: bool,
    pub use_refs: bool,
    pub use_ids: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            title: "新建超级群组".to_string(),
            about: "由 telegram_helper 创建".to_string(),
            count: 1,
            photo_path: String::new(),
            forum: false,
            topic_title: String::new(),
            add_members: true,
            use_contacts: true,
            use_refs: true,
            use_ids: true,
        }
    }
}

/// 三个输入文本缓冲区
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InputBuffers {
    /// 两行一组的联系人文本
    pub contacts: String,
    /// 每行一个用户名/链接
    pub usernames: String,
    /// 每行一个用户 ID
    pub user_ids: String,
}

/// 应用设置全量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// 当前选中账号的手机号
    pub active_phone: String,
    pub api: ApiSettings,
    pub accounts: Vec<Account>,
    pub delays: Delays,
    pub groups: GroupSettings,
    pub inputs: InputBuffers,
}

impl Settings {
    /// 从文件加载设置
    ///
    /// 文件不存在或解析失败都不算错误，直接退回默认值。
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                info!("设置文件 {} 不可读（{}），使用默认设置", path.display(), err);
                return Self::default();
            }
        };
        match toml::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    "⚠️ 设置文件 {} 解析失败（{}），使用默认设置",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// 整体重写设置文件
    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let path = path.as_ref();
        let raw = toml::to_string_pretty(self)
            .map_err(|e| AppError::toml_parse_failed(path.display().to_string(), e))?;
        fs::write(path, raw)
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_expected_delays() {
        let settings = Settings::default();
        assert_eq!(settings.delays.auth, 0);
        assert_eq!(settings.delays.contacts.max, 3);
        assert!(settings.delays.contacts.randomize);
        assert_eq!(settings.delays.groups.min, 1);
        assert_eq!(settings.delays.groups.max, 5);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let settings = Settings::load("绝对不存在的设置文件.toml");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let mut settings = Settings::default();
        settings.api.api_id = 12345;
        settings.api.api_hash = "abcdef".to_string();
        settings.active_phone = "+79990001122".to_string();
        settings.accounts.push(Account {
            name: "主号".to_string(),
            phone: "+79990001122".to_string(),
        });
        settings.inputs.usernames = "@durov\ntelegram".to_string();

        let raw = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&raw).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_partial_document_fills_in_defaults() {
        let parsed: Settings = toml::from_str("[api]\napi_id = 7\n").unwrap();
        assert_eq!(parsed.api.api_id, 7);
        assert_eq!(parsed.delays, Delays::default());
        assert_eq!(parsed.groups.count, 1);
    }
}

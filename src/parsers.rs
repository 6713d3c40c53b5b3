//! 输入解析模块
//!
//! 把界面文本框里的自由文本解析成结构化记录。
//! 全部是纯函数：相同输入永远得到相同输出，不做任何网络或文件操作。
//!
//! ## 支持的格式
//!
//! - 联系人：两行一组（姓名行 + 链接行），组之间允许空行
//! - 用户名/链接：每行一个，支持 `@xxx`、`xxx`、`https://t.me/xxx`
//! - 用户 ID：每行一个纯数字
//!
//! 解析失败时错误信息会带上出错的那一行原文，方便用户定位。

use regex::Regex;

use crate::error::ParseError;

/// 会话文件名的命名空间前缀
pub const SESSION_PREFIX: &str = "tg_session_";

/// 手机号里提不出数字时使用的兜底会话名
pub const DEFAULT_SESSION_ID: &str = "tg_session_default";

/// 一条联系人记录
///
/// `full_name` 保留整行（折叠多余空白），`phone` 统一为 `+` 开头的纯数字。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub full_name: String,
    pub phone: String,
}

/// 解析联系人文本
///
/// 非空行按先后顺序两两配对：第一行是姓名，第二行是带电话的链接。
/// 组与组之间的空行会被跳过，不占配对位置。
///
/// # 参数
/// - `raw`: 文本框原文
///
/// # 返回
/// 每组产出一条 [`ContactRecord`]；姓名行落单或链接行提不出电话都会报错。
pub fn parse_contacts(raw: &str) -> Result<Vec<ContactRecord>, ParseError> {
    let phone_re = Regex::new(r"\+?\d{10,15}")?;

    let lines: Vec<&str> = raw.lines().map(str::trim).collect();
    let mut contacts = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].is_empty() {
            i += 1;
            continue;
        }
        let name_line = lines[i];
        if i + 1 >= lines.len() {
            return Err(ParseError::MissingLinkLine {
                name_line: name_line.to_string(),
            });
        }
        let link_line = lines[i + 1];

        let matched = phone_re
            .find(link_line)
            .ok_or_else(|| ParseError::PhoneNotFound {
                link_line: link_line.to_string(),
            })?;

        // 姓名保留整行，只折叠多余空白
        let full_name = name_line.split_whitespace().collect::<Vec<_>>().join(" ");

        contacts.push(ContactRecord {
            full_name,
            phone: normalize_phone(matched.as_str()),
        });
        i += 2;
    }

    Ok(contacts)
}

/// 解析用户名/链接文本
///
/// 每个非空行一个引用。去掉 `https://t.me/`、`http://t.me/` 前缀和结尾的 `/`，
/// 再去掉开头的 `@`。剥完前缀后以 `+` 开头的是邀请链接，无法解析成用户名，
/// 必须直接报错而不是悄悄丢弃。
pub fn parse_user_refs(raw: &str) -> Result<Vec<String>, ParseError> {
    let mut refs = Vec::new();

    for line in raw.lines() {
        let mut x = line.trim();
        if x.is_empty() {
            continue;
        }
        if let Some(rest) = x.strip_prefix("https://t.me/") {
            x = rest.trim_matches('/');
        } else if let Some(rest) = x.strip_prefix("http://t.me/") {
            x = rest.trim_matches('/');
        }
        if x.starts_with('+') {
            return Err(ParseError::InviteLink {
                line: line.trim().to_string(),
            });
        }
        let x = x.strip_prefix('@').unwrap_or(x);
        if !x.is_empty() {
            refs.push(x.to_string());
        }
    }

    Ok(refs)
}

/// 解析用户 ID 文本
///
/// 每个非空行必须是纯数字，任何一行不合法整个解析都失败，并指出是哪一行。
pub fn parse_user_ids(raw: &str) -> Result<Vec<i64>, ParseError> {
    let mut ids = Vec::new();

    for line in raw.lines() {
        let v = line.trim();
        if v.is_empty() {
            continue;
        }
        if !v.chars().all(|c| c.is_ascii_digit()) {
            return Err(ParseError::BadUserId {
                line: v.to_string(),
            });
        }
        // 过长的数字串同样按非法 ID 处理
        let id = v.parse::<i64>().map_err(|_| ParseError::BadUserId {
            line: v.to_string(),
        })?;
        ids.push(id);
    }

    Ok(ids)
}

/// 规范化手机号：只保留数字并补上 `+` 前缀
///
/// 一个数字都没有时返回空串，由调用方视为"未填写"，不算错误。
/// 幂等：对已规范化的号码再调用一次结果不变。
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        String::new()
    } else {
        format!("+{}", digits)
    }
}

/// 从手机号推导会话标识
///
/// 同一个手机号永远映射到同一个会话文件名，保证账号与本地会话一一对应。
pub fn session_id_from_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        DEFAULT_SESSION_ID.to_string()
    } else {
        format!("{}{}", SESSION_PREFIX, digits)
    }
}

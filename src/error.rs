use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 输入解析错误
    Parse(ParseError),
    /// Telegram 客户端错误
    Telegram(TelegramError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 前置条件不满足（例如未先发送验证码就尝试登录）
    Precondition(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Parse(e) => write!(f, "解析错误: {}", e),
            AppError::Telegram(e) => write!(f, "Telegram错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Precondition(msg) => write!(f, "前置条件不满足: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Parse(e) => Some(e),
            AppError::Telegram(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Precondition(_) => None,
        }
    }
}

impl AppError {
    /// 该错误是否属于可重试的瞬时远端错误
    ///
    /// 只有 Telegram 侧的瞬时错误（解析失败、频率限制、连接抖动）
    /// 才会进入重试执行器；校验错误和前置条件错误永远不重试。
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Telegram(e) if e.is_transient())
    }
}

/// 输入解析错误
///
/// 所有变体都携带出错的那一行原文，便于直接反馈给用户。
#[derive(Debug)]
pub enum ParseError {
    /// 姓名行后缺少链接行
    MissingLinkLine {
        name_line: String,
    },
    /// 链接行中找不到电话号码
    PhoneNotFound {
        link_line: String,
    },
    /// 邀请链接（t.me/+...）无法解析为用户名
    InviteLink {
        line: String,
    },
    /// 用户 ID 不是纯数字
    BadUserId {
        line: String,
    },
    /// 正则表达式构建失败
    Pattern(regex::Error),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingLinkLine { name_line } => {
                write!(f, "缺少链接行: {}", name_line)
            }
            ParseError::PhoneNotFound { link_line } => {
                write!(f, "无法从链接行提取电话: {}", link_line)
            }
            ParseError::InviteLink { line } => {
                write!(f, "邀请链接无法直接添加，请使用用户名或ID: {}", line)
            }
            ParseError::BadUserId { line } => {
                write!(f, "无效的用户ID: {}", line)
            }
            ParseError::Pattern(e) => write!(f, "正则表达式错误: {}", e),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Pattern(e) => Some(e),
            _ => None,
        }
    }
}

impl From<regex::Error> for ParseError {
    fn from(err: regex::Error) -> Self {
        ParseError::Pattern(err)
    }
}

/// Telegram 客户端错误
#[derive(Debug)]
pub enum TelegramError {
    /// 连接失败
    ConnectionFailed {
        message: String,
    },
    /// 尚未登录
    NotAuthorized,
    /// 账号开启了两步验证，需要密码
    SecondFactorNeeded,
    /// 登录被拒绝（验证码或密码错误）
    SignInRejected {
        message: String,
    },
    /// 触发服务端频率限制
    FloodWait {
        seconds: u64,
    },
    /// 实体解析失败（用户名或ID查不到，或被限流）
    ResolveFailed {
        reference: String,
        message: String,
    },
    /// 其余 RPC 调用失败
    Rpc {
        method: String,
        message: String,
    },
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelegramError::ConnectionFailed { message } => {
                write!(f, "连接失败: {}", message)
            }
            TelegramError::NotAuthorized => write!(f, "尚未登录，请先完成登录"),
            TelegramError::SecondFactorNeeded => write!(f, "需要两步验证密码"),
            TelegramError::SignInRejected { message } => {
                write!(f, "登录被拒绝: {}", message)
            }
            TelegramError::FloodWait { seconds } => {
                write!(f, "触发频率限制，需等待 {} 秒", seconds)
            }
            TelegramError::ResolveFailed { reference, message } => {
                write!(f, "解析用户失败 ({}): {}", reference, message)
            }
            TelegramError::Rpc { method, message } => {
                write!(f, "调用 {} 失败: {}", method, message)
            }
        }
    }
}

impl std::error::Error for TelegramError {}

impl TelegramError {
    /// 是否为可重试的瞬时错误
    ///
    /// 实体解析失败、限流、连接抖动大多是暂时的；
    /// 登录被拒绝、普通 RPC 失败则视为致命错误，立即中止当前流程。
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TelegramError::ConnectionFailed { .. }
                | TelegramError::FloodWait { .. }
                | TelegramError::ResolveFailed { .. }
        )
    }
}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound {
        path: String,
    },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 重试次数配置非法
    InvalidRetryAttempts {
        attempts: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRetryAttempts { attempts } => {
                write!(f, "重试次数必须至少为 1，当前为 {}", attempts)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从子系统错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<TelegramError> for AppError {
    fn from(err: TelegramError) -> Self {
        AppError::Telegram(err)
    }
}

impl From<FileError> for AppError {
    fn from(err: FileError) -> Self {
        AppError::File(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建前置条件错误
    pub fn precondition(msg: impl Into<String>) -> Self {
        AppError::Precondition(msg.into())
    }

    /// 创建文件不存在错误
    pub fn file_not_found(path: impl Into<String>) -> Self {
        AppError::File(FileError::NotFound { path: path.into() })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建 TOML 解析错误
    pub fn toml_parse_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

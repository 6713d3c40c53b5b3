/// 程序运行期配置
///
/// 跟持久化设置不同，这里只放进程级别的东西：路径、日志开关、
/// 无界面模式下要执行的动作。全部可以用环境变量覆盖。
#[derive(Clone, Debug)]
pub struct Config {
    /// 持久化设置文件路径
    pub settings_path: String,
    /// 运行日志输出文件
    pub output_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 无界面模式下执行的动作：status / add-users / create-groups / create-groups-bare
    pub action: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings_path: "app_settings.toml".to_string(),
            output_log_file: "telegram_helper.log".to_string(),
            verbose_logging: false,
            action: "status".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            settings_path: std::env::var("SETTINGS_PATH").unwrap_or(default.settings_path),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            action: std::env::var("ACTION").unwrap_or(default.action),
        }
    }
}

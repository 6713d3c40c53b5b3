use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use telegram_helper::infrastructure::{SimWorld, SimulatedGateway};
use telegram_helper::queue::QueueEvent;
use telegram_helper::utils::logging;
use telegram_helper::{App, Config, Settings};

/// 无界面入口
///
/// 真实的 Telegram 传输属于外部协作方，这里用内存模拟客户端
/// 跑预演模式：流程、排队、延迟、重试全部按真实节奏执行，
/// 只是远端调用落在内存里。
#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();
    logging::init_log_file(&config.output_log_file)?;
    logging::log_startup(&config.action);

    // 加载持久化设置
    let settings = Settings::load(&config.settings_path);

    // 预演环境：会话视为已登录
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::authorized(Arc::clone(&world)));
    let (app, mut events) = App::new(config.settings_path.clone(), settings.clone(), gateway);

    match config.action.as_str() {
        "add-users" => {
            app.add_users(
                &settings.inputs.contacts,
                &settings.inputs.usernames,
                &settings.inputs.user_ids,
            )
            .await?;
        }
        "create-groups" => {
            app.create_groups(true).await?;
        }
        "create-groups-bare" => {
            app.create_groups(false).await?;
        }
        "status" => {
            print_status(&settings, config.verbose_logging);
            return Ok(());
        }
        other => {
            warn!("⚠️ 未知动作: {}，支持 status / add-users / create-groups / create-groups-bare", other);
            return Ok(());
        }
    }

    // 消费事件直到队列清空
    let (mut success, mut failed) = (0usize, 0usize);
    while let Some(event) = events.recv().await {
        match event {
            QueueEvent::Finished { label, summary } => {
                success += 1;
                info!("✓ {} 结果:\n{}", label, summary);
            }
            QueueEvent::Failed { label, error } => {
                failed += 1;
                warn!("❌ {} 失败: {}", label, error);
            }
            QueueEvent::Idle => break,
            _ => {}
        }
    }

    logging::print_final_stats(success, failed, &config.output_log_file);
    Ok(())
}

/// 打印当前设置概览
fn print_status(settings: &Settings, verbose: bool) {
    info!("当前账号: {}", if settings.active_phone.is_empty() {
        "（未选择）"
    } else {
        settings.active_phone.as_str()
    });
    info!("账号菜单: {} 个账号", settings.accounts.len());
    info!(
        "延迟配置: 登录前 {} 秒 / 联系人 {}-{} 秒{} / 群组 {}-{} 秒{}",
        settings.delays.auth,
        settings.delays.contacts.min,
        settings.delays.contacts.max,
        if settings.delays.contacts.randomize { "（随机）" } else { "" },
        settings.delays.groups.min,
        settings.delays.groups.max,
        if settings.delays.groups.randomize { "（随机）" } else { "" },
    );
    info!(
        "输入缓冲: 联系人 {} / 用户名 {} / ID {}",
        logging::truncate_text(settings.inputs.contacts.trim(), 30),
        logging::truncate_text(settings.inputs.usernames.trim(), 30),
        logging::truncate_text(settings.inputs.user_ids.trim(), 30),
    );
    if verbose {
        if let Ok(json) = serde_json::to_string_pretty(settings) {
            info!("完整设置(JSON):\n{}", json);
        }
    }
    info!("队列空闲，等待操作");
}

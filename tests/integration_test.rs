//! 端到端测试：四个流程从控制器出发，经过任务队列，
//! 打在内存模拟客户端上。不需要真实网络。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use telegram_helper::delay::DelayRange;
use telegram_helper::infrastructure::{SimWorld, SimulatedGateway, VERIFICATION_CODE};
use telegram_helper::queue::QueueEvent;
use telegram_helper::settings::Delays;
use telegram_helper::{App, Settings};

const PHONE: &str = "+79990001122";
const SESSION: &str = "tg_session_79990001122";

/// 测试用设置：凭据齐全、选好账号、所有延迟归零
fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.api.api_id = 12345;
    settings.api.api_hash = "0123456789abcdef".to_string();
    settings.active_phone = PHONE.to_string();
    settings.delays = Delays {
        auth: 0,
        contacts: DelayRange::fixed(0),
        groups: DelayRange::fixed(0),
    };
    settings
}

fn settings_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("telegram_helper_test_{}.toml", tag))
}

fn build_app(
    tag: &str,
    settings: Settings,
    gateway: Arc<SimulatedGateway>,
) -> (App, UnboundedReceiver<QueueEvent>) {
    App::new(settings_path(tag), settings, gateway)
}

/// 跳过过程事件，等到下一个成功/失败结果
async fn next_terminal(rx: &mut UnboundedReceiver<QueueEvent>) -> QueueEvent {
    while let Some(event) = rx.recv().await {
        match event {
            QueueEvent::Finished { .. } | QueueEvent::Failed { .. } => return event,
            _ => {}
        }
    }
    panic!("事件通道提前关闭");
}

fn summary_of(event: QueueEvent) -> String {
    match event {
        QueueEvent::Finished { summary, .. } => summary,
        other => panic!("期望任务成功，实际是 {:?}", other),
    }
}

fn error_of(event: QueueEvent) -> String {
    match event {
        QueueEvent::Failed { error, .. } => error,
        other => panic!("期望任务失败，实际是 {:?}", other),
    }
}

// ========== 登录 ==========

#[tokio::test]
async fn test_request_code_then_sign_in() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::new(Arc::clone(&world)));
    let (app, mut events) = build_app("auth_ok", test_settings(), Arc::clone(&gateway));

    // 带修饰符的手机号也能用，流程里会规范化
    app.request_code("+7 (999) 000-11-22").await.unwrap();
    let sent = summary_of(next_terminal(&mut events).await);
    assert!(sent.contains(PHONE), "摘要应包含规范化后的手机号: {}", sent);

    app.sign_in(PHONE, VERIFICATION_CODE, None).await.unwrap();
    let signed = summary_of(next_terminal(&mut events).await);
    assert!(signed.contains("登录成功"));

    let stats = gateway.stats(SESSION).expect("会话应该已创建");
    assert!(stats.authorized, "登录后会话应处于已授权状态");
    assert!(!stats.connected, "两个流程结束后连接都应已释放");
    assert!(stats.disconnects >= 1);
}

#[tokio::test]
async fn test_sign_in_without_code_request_is_a_precondition_error() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::new(world));
    let (app, mut events) = build_app("auth_premature", test_settings(), gateway);

    app.sign_in(PHONE, VERIFICATION_CODE, None).await.unwrap();
    let error = error_of(next_terminal(&mut events).await);
    assert!(error.contains("请先发送验证码"), "实际错误: {}", error);
}

#[tokio::test]
async fn test_second_factor_requires_password_then_succeeds() {
    let world = SimWorld::new();
    let gateway =
        Arc::new(SimulatedGateway::new(Arc::clone(&world)).with_password("很安全的密码"));
    let (app, mut events) = build_app("auth_2fa", test_settings(), Arc::clone(&gateway));

    // 第一次没给密码：失败，连接释放，保留状态清空
    app.request_code(PHONE).await.unwrap();
    summary_of(next_terminal(&mut events).await);
    app.sign_in(PHONE, VERIFICATION_CODE, None).await.unwrap();
    let error = error_of(next_terminal(&mut events).await);
    assert!(error.contains("需要两步验证密码"), "实际错误: {}", error);

    let stats = gateway.stats(SESSION).unwrap();
    assert!(!stats.connected, "失败路径也要释放连接");
    assert!(!stats.authorized);

    // 重新发码并带上密码：成功
    app.request_code(PHONE).await.unwrap();
    summary_of(next_terminal(&mut events).await);
    app.sign_in(PHONE, VERIFICATION_CODE, Some("很安全的密码"))
        .await
        .unwrap();
    let signed = summary_of(next_terminal(&mut events).await);
    assert!(signed.contains("两步验证"));
    assert!(gateway.stats(SESSION).unwrap().authorized);
}

// ========== 导入与校验用户 ==========

#[tokio::test]
async fn test_add_users_tallies_per_item_failures_without_aborting() {
    let world = SimWorld::new();
    world.register_user("durov", None, 1, false);
    // 先瞬时失败一次再成功，重试执行器应该救回来
    world.register_user("flaky", None, 2, false);
    world.fail_resolution("flaky", 1);
    // 永远解析不到
    world.deny("ghost");

    let gateway = Arc::new(SimulatedGateway::authorized(Arc::clone(&world)));
    let (app, mut events) = build_app("add_users", test_settings(), Arc::clone(&gateway));

    app.add_users("", "@durov\nflaky\nghost", "1").await.unwrap();
    let summary = summary_of(next_terminal(&mut events).await);

    assert!(
        summary.contains("用户名/链接校验: 成功 2 个，失败 1 个"),
        "实际摘要: {}",
        summary
    );
    assert!(
        summary.contains("用户 ID 校验: 成功 1 个，失败 0 个"),
        "实际摘要: {}",
        summary
    );
    assert!(!gateway.stats(SESSION).unwrap().connected);
}

#[tokio::test]
async fn test_add_users_imports_contacts_in_one_batch() {
    let world = SimWorld::new();
    world.register_user("alice", Some("+79991112233"), 10, false);

    let gateway = Arc::new(SimulatedGateway::authorized(Arc::clone(&world)));
    let (app, mut events) = build_app("import", test_settings(), gateway);

    let contacts =
        "Алиса Тест 01.01.1990\nhttps://t.me/+79991112233\n\n王小明\nt.me/79994445566\n";
    app.add_users(contacts, "", "").await.unwrap();
    let summary = summary_of(next_terminal(&mut events).await);

    assert!(summary.contains("导入联系人: 2 条"), "实际摘要: {}", summary);
    assert!(
        summary.contains("找到 Telegram 账号: 1 个"),
        "实际摘要: {}",
        summary
    );
    assert_eq!(world.imported_batches(), vec![2], "联系人应一次批量导入");
}

#[tokio::test]
async fn test_add_users_requires_authorization() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::new(Arc::clone(&world)));
    let (app, mut events) = build_app("unauth", test_settings(), Arc::clone(&gateway));

    app.add_users("", "@durov", "").await.unwrap();
    let error = error_of(next_terminal(&mut events).await);
    assert!(error.contains("尚未登录"), "实际错误: {}", error);
    assert!(
        !gateway.stats(SESSION).unwrap().connected,
        "前置条件失败同样要释放连接"
    );
}

#[tokio::test]
async fn test_validation_errors_never_reach_the_queue() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::authorized(world));
    let (app, _events) = build_app("validation", test_settings(), gateway);

    // 非法 ID
    assert!(app.add_users("", "", "12a").await.is_err());
    // 邀请链接
    assert!(app
        .add_users("", "https://t.me/+79990001122", "")
        .await
        .is_err());
    // 落单的姓名行
    assert!(app.add_users("只有一行姓名", "", "").await.is_err());

    assert!(app.is_idle(), "校验失败的动作不应排进队列");
}

// ========== 批量建群 ==========

#[tokio::test]
async fn test_create_groups_filters_bots_and_dedups_by_id() {
    let world = SimWorld::new();
    world.register_user("alice", Some("+79991112233"), 10, false);
    world.register_user("robot", None, 11, true);

    let gateway = Arc::new(SimulatedGateway::authorized(Arc::clone(&world)));
    let mut settings = test_settings();
    settings.groups.title = "测试群".to_string();
    settings.groups.count = 2;
    // alice 同时出现在联系人、用户名、ID 三个来源里，最终只能被邀请一次
    settings.inputs.contacts = "Алиса Тест\nhttps://t.me/+79991112233".to_string();
    settings.inputs.usernames = "@alice\n@robot".to_string();
    settings.inputs.user_ids = "10".to_string();
    let (app, mut events) = build_app("groups_members", settings, gateway);

    app.create_groups(true).await.unwrap();
    let summary = summary_of(next_terminal(&mut events).await);
    assert!(summary.contains("已准备成员: 1 人"), "实际摘要: {}", summary);

    let groups = world.created_groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].title, "测试群 #1");
    assert_eq!(groups[1].title, "测试群 #2");

    let invites = world.invites();
    assert_eq!(invites.len(), 2, "每个群各邀请一次");
    for (_, ids) in invites {
        assert_eq!(ids, vec![10], "机器人被过滤，重复候选被去重");
    }
}

#[tokio::test]
async fn test_create_groups_missing_photo_aborts_but_keeps_created_group() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::authorized(Arc::clone(&world)));
    let mut settings = test_settings();
    settings.groups.count = 2;
    settings.groups.photo_path = "/不存在的目录/头像.png".to_string();
    let (app, mut events) = build_app("groups_photo", settings, gateway);

    app.create_groups(false).await.unwrap();
    let error = error_of(next_terminal(&mut events).await);
    assert!(error.contains("文件不存在"), "实际错误: {}", error);

    // 第一个群已经建出来了，失败不回滚
    assert_eq!(world.created_groups().len(), 1);
}

#[tokio::test]
async fn test_create_groups_forum_mode_creates_topic_per_group() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::authorized(Arc::clone(&world)));
    let mut settings = test_settings();
    settings.groups.count = 2;
    settings.groups.forum = true;
    settings.groups.topic_title = "公告".to_string();
    let (app, mut events) = build_app("groups_forum", settings, gateway);

    app.create_groups(false).await.unwrap();
    summary_of(next_terminal(&mut events).await);

    let topics = world.created_topics();
    assert_eq!(topics.len(), 2);
    assert!(topics.iter().all(|(_, title)| title == "公告"));
}

#[tokio::test]
async fn test_create_groups_with_members_requires_a_source() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::authorized(world));
    let mut settings = test_settings();
    // 三个缓冲区全空
    settings.inputs.contacts.clear();
    settings.inputs.usernames.clear();
    settings.inputs.user_ids.clear();
    let (app, _events) = build_app("groups_no_source", settings, gateway);

    let err = app.create_groups(true).await.unwrap_err();
    assert!(
        err.to_string().contains("至少需要一个非空的成员来源"),
        "实际错误: {}",
        err
    );
    assert!(app.is_idle());
}

// ========== 队列语义 ==========

#[tokio::test]
async fn test_fifo_failure_isolation_across_workflows() {
    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::authorized(world));
    let (app, mut events) = build_app("fifo", test_settings(), gateway);

    // 第一个任务必然失败（没发过验证码），第二个不受影响
    app.sign_in(PHONE, VERIFICATION_CODE, None).await.unwrap();
    app.add_users("", "", "").await.unwrap();

    let first = next_terminal(&mut events).await;
    let second = next_terminal(&mut events).await;

    assert!(matches!(first, QueueEvent::Failed { .. }), "第一个任务失败");
    let summary = summary_of(second);
    assert_eq!(summary, "没有可处理的数据", "第二个任务照常执行");
}

// ========== 设置持久化 ==========

#[tokio::test]
async fn test_account_menu_mutations_are_persisted() {
    let path = settings_path("accounts_persist");
    let _ = std::fs::remove_file(&path);

    let world = SimWorld::new();
    let gateway = Arc::new(SimulatedGateway::new(world));
    let (app, _events) = App::new(path.clone(), Settings::default(), gateway);

    app.upsert_account("主号", "+7 999 000 11 22").await.unwrap();
    app.select_account(PHONE).await.unwrap();

    let reloaded = Settings::load(&path);
    assert_eq!(reloaded.accounts.len(), 1);
    assert_eq!(reloaded.accounts[0].name, "主号");
    assert_eq!(reloaded.accounts[0].phone, PHONE);
    assert_eq!(reloaded.active_phone, PHONE);

    // 同一手机号再次添加是更新不是新增
    app.upsert_account("改名了", PHONE).await.unwrap();
    let reloaded = Settings::load(&path);
    assert_eq!(reloaded.accounts.len(), 1);
    assert_eq!(reloaded.accounts[0].name, "改名了");

    app.remove_account(PHONE).await.unwrap();
    let reloaded = Settings::load(&path);
    assert!(reloaded.accounts.is_empty());
    assert!(reloaded.active_phone.is_empty(), "删除当前账号后清空选中");

    let _ = std::fs::remove_file(&path);
}

//! 重试执行器
//!
//! 包装单个异步操作，对可重试的失败做有界的线性退避重试。
//! 主要给实体解析调用用：按用户名或 ID 查询远端用户最容易碰到
//! 瞬时网络抖动和限流，重试几次基本都能恢复。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::{AppResult, ConfigError};

/// 实体解析的默认重试次数
pub const RESOLVE_ATTEMPTS: u32 = 3;

/// 实体解析的默认基础退避
pub const RESOLVE_BASE_DELAY: Duration = Duration::from_millis(700);

/// 有界重试地执行一个异步操作
///
/// 每次失败后先调用 `on_retry(当前尝试序号, 错误)`，再等待
/// `base_delay * 尝试序号`（线性退避），然后发起下一次尝试。
///
/// # 参数
/// - `operation`: 被包装的操作，每次重试都会重新调用它构造新的 future
/// - `attempts`: 总尝试次数，必须 >= 1，否则直接返回配置错误且一次都不执行
/// - `base_delay`: 退避基数
/// - `retryable`: 判断某个错误是否值得重试；不匹配的错误第一次就原样抛出
/// - `on_retry`: 每次即将重试前的回调，一般用来打日志
///
/// # 返回
/// 成功值，或者耗尽所有尝试后最后一次的错误。
pub async fn retry_async<T, F, Fut, R, C>(
    mut operation: F,
    attempts: u32,
    base_delay: Duration,
    retryable: R,
    mut on_retry: C,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    R: Fn(&crate::error::AppError) -> bool,
    C: FnMut(u32, &crate::error::AppError),
{
    if attempts < 1 {
        return Err(ConfigError::InvalidRetryAttempts { attempts }.into());
    }

    let mut attempt: u32 = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if retryable(&err) && attempt < attempts => {
                on_retry(attempt, &err);
                sleep(base_delay * attempt).await;
                attempt += 1;
            }
            // 不可重试的错误，或者已经是最后一次尝试
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, TelegramError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn transient_err() -> AppError {
        TelegramError::ResolveFailed {
            reference: "durov".to_string(),
            message: "暂时查不到".to_string(),
        }
        .into()
    }

    fn fatal_err() -> AppError {
        AppError::precondition("不该重试的错误")
    }

    #[tokio::test]
    async fn test_succeeds_after_two_retries_and_reports_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();
        let retried = Arc::new(Mutex::new(Vec::new()));
        let retried_in_cb = retried.clone();

        let result = retry_async(
            || {
                let calls = calls_in_op.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient_err())
                    } else {
                        Ok("ok")
                    }
                }
            },
            3,
            Duration::from_millis(1),
            AppError::is_transient,
            |attempt, _err| retried_in_cb.lock().unwrap().push(attempt),
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*retried.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_reraises_last_error_after_exhaustion() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: AppResult<()> = retry_async(
            || {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(transient_err())
                }
            },
            2,
            Duration::from_millis(1),
            AppError::is_transient,
            |_, _| {},
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::Telegram(TelegramError::ResolveFailed { .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2, "应该正好尝试 2 次");
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: AppResult<()> = retry_async(
            || {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(fatal_err())
                }
            },
            3,
            Duration::from_millis(1),
            AppError::is_transient,
            |_, _| {},
        )
        .await;

        assert!(matches!(result, Err(AppError::Precondition(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "不可重试的错误只执行一次");
    }

    #[tokio::test]
    async fn test_zero_attempts_is_a_config_error_with_zero_invocations() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_op = calls.clone();

        let result: AppResult<()> = retry_async(
            || {
                let calls = calls_in_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            0,
            Duration::from_millis(1),
            AppError::is_transient,
            |_, _| {},
        )
        .await;

        assert!(matches!(result, Err(AppError::Config(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "配置非法时一次都不该执行");
    }
}

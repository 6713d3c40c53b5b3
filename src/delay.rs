//! 延迟策略模块
//!
//! 所有对 Telegram 的连续请求之间都要插入拟人化的停顿，
//! 否则很容易触发服务端的滥用检测。停顿分三类：
//!
//! - 登录前的固定延迟（单值，无随机）
//! - 联系人处理动作之间的延迟（可随机区间）
//! - 群组管理动作之间的延迟（可随机区间）

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

/// 一个延迟区间配置
///
/// `randomize` 关闭时取两个值中较小的那个；开启时在区间内均匀取随机整数。
/// min 和 max 允许写反，取值前会先归一化，所以不依赖界面保证 min <= max。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
    pub randomize: bool,
}

impl DelayRange {
    /// 构造一个固定秒数的区间
    pub fn fixed(secs: u64) -> Self {
        Self {
            min: secs,
            max: secs,
            randomize: false,
        }
    }

    /// 计算本次实际等待的秒数
    pub fn effective_secs(&self) -> u64 {
        let lo = self.min.min(self.max);
        let hi = self.min.max(self.max);
        if self.randomize {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        }
    }

    /// 按配置挂起当前流程
    ///
    /// 算出来是 0 秒时直接返回，不进睡眠。
    pub async fn wait(&self) {
        let secs = self.effective_secs();
        if secs > 0 {
            sleep(Duration::from_secs(secs)).await;
        }
    }
}

/// 挂起固定秒数（登录前延迟专用）
pub async fn wait_secs(secs: u64) {
    if secs > 0 {
        sleep(Duration::from_secs(secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_random_takes_smaller_of_the_pair() {
        let range = DelayRange {
            min: 5,
            max: 1,
            randomize: false,
        };
        assert_eq!(range.effective_secs(), 1);
    }

    #[test]
    fn test_non_random_normal_order() {
        let range = DelayRange {
            min: 2,
            max: 7,
            randomize: false,
        };
        assert_eq!(range.effective_secs(), 2);
    }

    #[test]
    fn test_random_stays_within_bounds_over_many_samples() {
        let range = DelayRange {
            min: 3,
            max: 8,
            randomize: true,
        };
        for _ in 0..200 {
            let v = range.effective_secs();
            assert!((3..=8).contains(&v), "取值 {} 超出 [3, 8]", v);
        }
    }

    #[test]
    fn test_random_tolerates_swapped_bounds() {
        let range = DelayRange {
            min: 8,
            max: 3,
            randomize: true,
        };
        for _ in 0..200 {
            let v = range.effective_secs();
            assert!((3..=8).contains(&v), "取值 {} 超出 [3, 8]", v);
        }
    }

    #[test]
    fn test_fixed_constructor() {
        let range = DelayRange::fixed(4);
        assert_eq!(range.effective_secs(), 4);
        assert!(!range.randomize);
    }

    #[test]
    fn test_zero_wait_returns_immediately() {
        // 0 秒不应进入睡眠，直接同步跑完
        tokio_test::block_on(DelayRange::fixed(0).wait());
        tokio_test::block_on(wait_secs(0));
    }
}

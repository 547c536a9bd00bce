//! 硬件忙等重试.
//!
//! 加速器返回 pending 时按固定次数重试, 每次之间短暂休眠.
//! 休眠通过 `Sleeper` 注入, 测试中可替换为不休眠的实现.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use log::trace;
use tao_core::{TaoError, TaoResult};

use crate::engine::{HwError, HwResult};

/// 默认重试次数
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 20;

/// 默认重试间隔
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1);

/// 休眠接口
pub trait Sleeper: Send + Sync {
    /// 休眠指定时长
    fn sleep(&self, duration: Duration);
}

/// 使用线程休眠的实现
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// 只记录休眠次数, 不真正休眠
#[derive(Debug, Default)]
pub struct CountingSleeper {
    count: AtomicU32,
}

impl CountingSleeper {
    /// 已发生的休眠次数
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, _duration: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最多尝试次数 (含首次)
    pub max_attempts: u32,
    /// 两次尝试之间的间隔
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// 执行 `op`, 遇到 pending 时重试.
    ///
    /// - `Ok(v)`: 立即返回
    /// - `HwError::Failed`: 不重试, 转为 `TaoError::Hardware`
    /// - 连续 pending 达到 `max_attempts`: 转为 `TaoError::Hardware`
    pub fn run<T>(
        &self,
        sleeper: &dyn Sleeper,
        what: &str,
        mut op: impl FnMut() -> HwResult<T>,
    ) -> TaoResult<T> {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(HwError::Pending) => {
                    trace!("DXVA: {} pending, attempt={}/{}", what, attempt, attempts);
                    if attempt < attempts {
                        sleeper.sleep(self.delay);
                    }
                }
                Err(HwError::Failed(code)) => {
                    return Err(TaoError::Hardware(format!(
                        "{} 失败, hr={:#010x}",
                        what, code
                    )));
                }
            }
        }
        Err(TaoError::Hardware(format!(
            "{} 在 {} 次尝试后仍为 pending",
            what, attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_后成功() {
        let policy = RetryPolicy::default();
        let sleeper = CountingSleeper::default();
        let mut calls = 0;
        let value = policy
            .run(&sleeper, "begin_frame", || {
                calls += 1;
                if calls < 3 {
                    Err(HwError::Pending)
                } else {
                    Ok(7)
                }
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls, 3);
        assert_eq!(sleeper.count(), 2);
    }

    #[test]
    fn test_持续pending_有界失败() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_millis(1),
        };
        let sleeper = CountingSleeper::default();
        let mut calls = 0;
        let err = policy
            .run(&sleeper, "begin_frame", || -> HwResult<()> {
                calls += 1;
                Err(HwError::Pending)
            })
            .unwrap_err();
        assert!(err.is_hardware());
        assert_eq!(calls, 5);
        assert_eq!(sleeper.count(), 4);
    }

    #[test]
    fn test_硬件错误不重试() {
        let policy = RetryPolicy::default();
        let sleeper = CountingSleeper::default();
        let mut calls = 0;
        let err = policy
            .run(&sleeper, "execute", || -> HwResult<()> {
                calls += 1;
                Err(HwError::Failed(0x8000_4005u32 as i32))
            })
            .unwrap_err();
        assert!(matches!(err, TaoError::Hardware(_)));
        assert_eq!(calls, 1);
        assert_eq!(sleeper.count(), 0);
    }
}

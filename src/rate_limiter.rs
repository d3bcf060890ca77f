/// 速率限制器模块
///
/// 按客户端标识的固定窗口计数器。同一标识在一个 60 秒窗口内最多放行
/// 30 次请求；过期窗口在每次调用时顺带清理，无后台任务。
///
/// 固定窗口在窗口边界处最多允许约 2 倍突发，这是已知且保留的行为，
/// 不要悄悄升级为滑动窗口。
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// 速率限制器配置
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// 窗口长度（秒）
    pub window_secs: u64,
    /// 每窗口允许的请求数
    pub max_requests: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 30,
        }
    }
}

/// 固定窗口速率限制器
pub struct RateLimiter {
    config: RateLimiterConfig,
    counters: Arc<Mutex<HashMap<(String, u64), u32>>>,
}

impl RateLimiter {
    /// 创建新的速率限制器
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 创建默认配置的速率限制器
    pub fn with_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    /// 尝试放行一次请求。被拒绝的请求同样计入当前窗口
    pub fn admit(&self, identifier: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.admit_at(identifier, now)
    }

    /// 以指定时间（秒）判定，便于测试
    pub fn admit_at(&self, identifier: &str, now_secs: u64) -> bool {
        let window = now_secs / self.config.window_secs;
        let mut counters = self.counters.lock();

        // 清理超过两个周期的旧窗口
        counters.retain(|(_, w), _| *w + 2 > window);

        let count = counters
            .entry((identifier.to_string(), window))
            .or_insert(0);
        *count += 1;
        *count <= self.config.max_requests
    }

    /// 获取配置信息
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

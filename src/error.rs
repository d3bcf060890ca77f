/// 自定义错误类型
///
/// 使用 thiserror 定义精确的错误类型，替代泛型的 anyhow::Error
/// 调用方可以按种类区分用户输入错误、面板侧故障与系统内部错误
use thiserror::Error;

/// Panel Checker 的主要错误类型
#[derive(Error, Debug)]
pub enum CheckerError {
    /// 连接字符串无法解析
    #[error("unsupported or invalid connection string format")]
    Parse,

    /// 请求频率超出限制
    #[error("Rate limit exceeded. Please try again later")]
    RateLimitExceeded,

    /// 所有面板均未找到该账号
    #[error("Account not found in any panel or failed to retrieve stats")]
    NotFound,

    /// 面板登录失败（聚合扫描内部逐面板跳过，一般不直接抛出）
    #[error("Failed to login to panel '{panel}'")]
    LoginFailed { panel: String },

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(String),

    /// 面板返回的数据无法解析
    #[error("Malformed panel data: {0}")]
    MalformedPanelData(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 其他错误（保留与 anyhow 的兼容性）
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CheckerError>;

impl CheckerError {
    /// 创建登录失败错误
    pub fn login_failed(panel: impl Into<String>) -> Self {
        Self::LoginFailed {
            panel: panel.into(),
        }
    }

    /// 创建传输层错误
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// 创建配置错误
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// 检查是否为"未找到账号"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// 检查是否为解析错误
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse)
    }

    /// 检查是否为限流错误
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimitExceeded)
    }
}

/// Panel Checker 库入口
///
/// 将核心模块导出为库，方便测试和复用
pub mod aggregator;
pub mod checker;
pub mod codec;
pub mod config;
pub mod error;
pub mod normalize;
pub mod rate_limiter;
pub mod registry;
pub mod session;

// 重新导出常用类型
pub use aggregator::{ClientRecord, InboundRecord, MatchResult, PanelApi, UsageStat};
pub use checker::Checker;
pub use codec::{CanonicalIdentifier, IdentifierKind};
pub use config::{AppConfig, PanelDescriptor, PanelKind};
pub use error::{CheckerError, Result};
pub use normalize::{ByteSize, ExpiryStatus, Report};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use registry::PanelRegistry;
pub use session::{CallOutcome, PanelSession};

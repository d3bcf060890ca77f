//! Authenticated panel HTTP client.
//!
//! One [`PanelSession`] is shared across lookups; login produces a cookie
//! token that subsequent `invoke` calls attach. Panels are frequently
//! offline or running stale credentials, so login failure is an expected
//! outcome and surfaces as a [`CallOutcome`] variant rather than an error.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PanelDescriptor;

/// 浏览器 UA，部分面板会拒绝非浏览器请求
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 单次请求超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// 重试次数（总尝试次数 = MAX_RETRIES + 1）
const MAX_RETRIES: u32 = 2;

/// 重试间隔
const RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Outcome of a single panel call.
///
/// Distinguishes transport-level failure from a response that arrived but
/// carried no usable data, so callers and retry policy can tell them apart.
#[derive(Debug, Clone)]
pub enum CallOutcome<T> {
    Success(T),
    /// 网络错误或非 2xx 状态
    Transport(String),
    /// 响应可达但不含可用数据（无 cookie、非 JSON 对象、缺 success 字段）
    NoData,
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Reusable HTTP session against the panel fleet.
#[derive(Debug, Clone)]
pub struct PanelSession {
    client: reqwest::Client,
}

impl PanelSession {
    /// 创建会话。面板普遍使用自签名证书，跳过证书校验
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }

    /// Log in to a panel and return the session cookie header value.
    ///
    /// The token is every `Set-Cookie` value truncated at its first `;`,
    /// joined with `"; "`. A 2xx response without cookies yields
    /// [`CallOutcome::NoData`]. Wrapped in the bounded retry policy.
    pub async fn login(&self, panel: &PanelDescriptor) -> CallOutcome<String> {
        with_retry(|| self.login_once(panel)).await
    }

    async fn login_once(&self, panel: &PanelDescriptor) -> CallOutcome<String> {
        let url = format!("{}/login", panel.url.trim_end_matches('/'));
        let form = [
            ("username", panel.username.as_str()),
            ("password", panel.password.as_str()),
        ];

        let response = match self.client.post(&url).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(panel = %panel.name, error = %e, "login request failed");
                return CallOutcome::Transport(e.to_string());
            }
        };

        if !response.status().is_success() {
            debug!(panel = %panel.name, status = %response.status(), "login rejected");
            return CallOutcome::Transport(format!("login returned {}", response.status()));
        }

        let cookies: Vec<String> = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(|cookie| cookie.split(';').next().unwrap_or(cookie).to_string())
            .collect();

        if cookies.is_empty() {
            warn!(panel = %panel.name, "login succeeded but no session cookie was set");
            return CallOutcome::NoData;
        }

        CallOutcome::Success(cookies.join("; "))
    }

    /// POST to a panel endpoint with the session cookie attached.
    ///
    /// The response must be a JSON object carrying a `success` field;
    /// anything else counts as no usable data. Wrapped in the bounded
    /// retry policy.
    pub async fn invoke(
        &self,
        panel_url: &str,
        token: &str,
        endpoint: &str,
        body: Option<&Value>,
    ) -> CallOutcome<Value> {
        with_retry(|| self.invoke_once(panel_url, token, endpoint, body)).await
    }

    async fn invoke_once(
        &self,
        panel_url: &str,
        token: &str,
        endpoint: &str,
        body: Option<&Value>,
    ) -> CallOutcome<Value> {
        let url = format!("{}/{}", panel_url.trim_end_matches('/'), endpoint);

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::COOKIE, token)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "panel call failed");
                return CallOutcome::Transport(e.to_string());
            }
        };

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "panel call rejected");
            return CallOutcome::Transport(format!("endpoint returned {}", response.status()));
        }

        match response.json::<Value>().await {
            Ok(json) if json.is_object() && json.get("success").is_some() => {
                CallOutcome::Success(json)
            }
            Ok(_) => {
                debug!(url = %url, "panel response is not a success-bearing object");
                CallOutcome::NoData
            }
            Err(e) => {
                debug!(url = %url, error = %e, "panel response is not JSON");
                CallOutcome::NoData
            }
        }
    }
}

/// Bounded retry: up to 3 attempts with a fixed pause, first success wins.
///
/// Transport failures and no-data responses are retried identically, which
/// mirrors the panels' historical client behavior even though only the
/// former is truly retryable.
async fn with_retry<T, F, Fut>(mut call: F) -> CallOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = CallOutcome<T>>,
{
    let mut last = CallOutcome::NoData;
    for attempt in 0..=MAX_RETRIES {
        last = call().await;
        if last.is_success() {
            return last;
        }
        if attempt < MAX_RETRIES {
            tokio::time::sleep(RETRY_PAUSE).await;
        }
    }
    last
}

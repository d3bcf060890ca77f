//! Cross-panel account search.
//!
//! Scans every panel's inbound list for a client matching a canonical
//! identifier. The scan is sequential and first-match-wins: panels in
//! search order, inbounds in panel order, clients in inbound order. Panel
//! state is always fetched fresh; nothing is cached across lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::{CanonicalIdentifier, IdentifierKind};
use crate::config::PanelDescriptor;
use crate::error::{CheckerError, Result};
use crate::registry::PanelRegistry;
use crate::session::{CallOutcome, PanelSession};

/// 面板 inbound 列表接口
const INBOUND_LIST_ENDPOINT: &str = "xui/inbound/list";

/// Panel access seam used by the aggregator.
///
/// [`PanelSession`] is the production implementation; tests inject a fake
/// so scan semantics can be exercised without a network.
#[async_trait]
pub trait PanelApi: Send + Sync {
    /// Authenticate against a panel, yielding a session token.
    async fn login(&self, panel: &PanelDescriptor) -> CallOutcome<String>;

    /// Fetch the raw inbound-list response for a panel.
    async fn inbound_list(&self, panel_url: &str, token: &str) -> CallOutcome<Value>;
}

#[async_trait]
impl PanelApi for PanelSession {
    async fn login(&self, panel: &PanelDescriptor) -> CallOutcome<String> {
        PanelSession::login(self, panel).await
    }

    async fn inbound_list(&self, panel_url: &str, token: &str) -> CallOutcome<Value> {
        self.invoke(panel_url, token, INBOUND_LIST_ENDPOINT, None).await
    }
}

/// One listener configuration as returned by a panel.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub protocol: String,
    /// Stringified JSON holding the client list.
    #[serde(default)]
    pub settings: String,
    #[serde(default, rename = "clientStats")]
    pub client_stats: Option<Vec<UsageStat>>,
    /// 旧版面板字段，仅在 clientStats 缺失时使用
    #[serde(default, rename = "clientInfo")]
    pub client_info: Option<Vec<UsageStat>>,
}

impl InboundRecord {
    /// Usage stats, preferring `clientStats` over the legacy `clientInfo`.
    pub fn stats(&self) -> &[UsageStat] {
        self.client_stats
            .as_deref()
            .or(self.client_info.as_deref())
            .unwrap_or(&[])
    }
}

/// Parsed `settings` payload of an inbound.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundSettings {
    #[serde(default)]
    pub clients: Vec<ClientRecord>,
}

/// One account entry inside an inbound's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default, rename = "totalGB")]
    pub total_gb: f64,
    #[serde(default, rename = "expiryTime")]
    pub expiry_time: i64,
    #[serde(default = "default_enable")]
    pub enable: bool,
}

fn default_enable() -> bool {
    true
}

/// Per-client traffic counters, matched to a [`ClientRecord`] by `email`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStat {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub up: i64,
    #[serde(default)]
    pub down: i64,
}

/// Result of a successful account search.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub panel_name: String,
    pub protocol: String,
    pub email: String,
    pub up: i64,
    pub down: i64,
    pub total: i64,
    pub expiry_time: i64,
    pub enable: bool,
    pub matched_by: IdentifierKind,
}

/// Full in-panel location of a client found by email, including the session
/// token and sibling clients. This is the handle panel mutations operate on.
#[derive(Debug, Clone)]
pub struct ClientLocation {
    pub panel_index: usize,
    pub panel_name: String,
    pub panel_url: String,
    pub token: String,
    pub inbound_id: i64,
    pub inbound_port: u16,
    pub client_index: usize,
    pub protocol: String,
    pub client: ClientRecord,
    pub all_clients: Vec<ClientRecord>,
}

/// 按 totalGB 推断字节数：大于一百万视为已是字节，否则按 GB 换算
///
/// 历史遗留的单位推断规则，为兼容面板数据必须原样保留
pub fn total_bytes(total_gb: f64) -> i64 {
    if total_gb > 1_000_000.0 {
        total_gb as i64
    } else {
        (total_gb * 1_073_741_824.0) as i64
    }
}

/// The client field an identifier kind is compared against.
fn comparison_value(kind: IdentifierKind, client: &ClientRecord) -> &str {
    match kind {
        IdentifierKind::Email => &client.email,
        IdentifierKind::Uuid | IdentifierKind::Vmess | IdentifierKind::Vless => {
            client.id.as_deref().unwrap_or_default()
        }
        IdentifierKind::Shadowsocks | IdentifierKind::Trojan => {
            client.password.as_deref().unwrap_or_default()
        }
    }
}

/// Search the given panels for an account matching the identifier.
///
/// Per-panel failures (login, transport, malformed inbounds) are skipped,
/// never propagated; only full exhaustion yields [`CheckerError::NotFound`].
/// A matched client without a corresponding usage stat stays invisible and
/// the scan continues.
pub async fn find_account(
    api: &dyn PanelApi,
    identifier: &CanonicalIdentifier,
    panels: &[&PanelDescriptor],
) -> Result<MatchResult> {
    for panel in panels {
        let token = match api.login(panel).await {
            CallOutcome::Success(token) => token,
            _ => {
                debug!(panel = %panel.name, "login failed, skipping panel");
                continue;
            }
        };

        let inbounds = match fetch_inbounds(api, &panel.url, &token).await {
            Some(inbounds) => inbounds,
            None => {
                debug!(panel = %panel.name, "no usable inbound list, skipping panel");
                continue;
            }
        };

        for inbound in &inbounds {
            let settings = parse_settings(&panel.name, inbound);

            for client in &settings.clients {
                let candidate = comparison_value(identifier.kind, client);
                if candidate.is_empty() || !candidate.eq_ignore_ascii_case(&identifier.value) {
                    continue;
                }

                // 匹配到的客户端必须有对应的流量统计，否则视为不存在
                let Some(stat) = inbound.stats().iter().find(|s| s.email == client.email)
                else {
                    debug!(
                        panel = %panel.name,
                        email = %client.email,
                        "matched client has no usage stat, continuing scan"
                    );
                    continue;
                };

                return Ok(MatchResult {
                    panel_name: panel.name.clone(),
                    protocol: inbound.protocol.to_lowercase(),
                    email: client.email.clone(),
                    up: stat.up,
                    down: stat.down,
                    total: total_bytes(client.total_gb),
                    expiry_time: client.expiry_time,
                    enable: client.enable,
                    matched_by: identifier.kind,
                });
            }
        }
    }

    Err(CheckerError::NotFound)
}

/// Locate a client by literal email equality across the indexed Premium
/// panels (static first, dynamically registered ones appended). Returns the
/// full in-panel location, or `None` when every panel was exhausted.
pub async fn find_client_record(
    api: &dyn PanelApi,
    email: &str,
    registry: &PanelRegistry,
) -> Option<ClientLocation> {
    for (panel_index, panel) in registry.indexed_premium() {
        let token = match api.login(panel).await {
            CallOutcome::Success(token) => token,
            _ => continue,
        };

        let Some(inbounds) = fetch_inbounds(api, &panel.url, &token).await else {
            continue;
        };

        for inbound in &inbounds {
            let settings = parse_settings(&panel.name, inbound);

            for (client_index, client) in settings.clients.iter().enumerate() {
                if client.email != email {
                    continue;
                }

                return Some(ClientLocation {
                    panel_index,
                    panel_name: panel.name.clone(),
                    panel_url: panel.url.clone(),
                    token,
                    inbound_id: inbound.id,
                    inbound_port: inbound.port,
                    client_index,
                    protocol: inbound.protocol.to_lowercase(),
                    client: client.clone(),
                    all_clients: settings.clients.clone(),
                });
            }
        }
    }

    None
}

async fn fetch_inbounds(
    api: &dyn PanelApi,
    panel_url: &str,
    token: &str,
) -> Option<Vec<InboundRecord>> {
    let response = api.inbound_list(panel_url, token).await.into_option()?;
    let obj = response.get("obj")?.as_array()?;

    let mut inbounds = Vec::with_capacity(obj.len());
    for entry in obj {
        match serde_json::from_value::<InboundRecord>(entry.clone()) {
            Ok(inbound) => inbounds.push(inbound),
            Err(e) => {
                // 单个 inbound 解析失败不影响整体扫描
                warn!(url = %panel_url, error = %e, "skipping malformed inbound entry");
            }
        }
    }
    Some(inbounds)
}

fn parse_settings(panel_name: &str, inbound: &InboundRecord) -> InboundSettings {
    serde_json::from_str(&inbound.settings).unwrap_or_else(|e| {
        debug!(
            panel = %panel_name,
            inbound = inbound.id,
            error = %e,
            "malformed inbound settings, treating as empty"
        );
        InboundSettings::default()
    })
}

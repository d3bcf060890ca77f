//! Connection-string codec.
//!
//! Parses the heterogeneous proxy URI formats (vmess / vless / trojan /
//! shadowsocks) as well as bare UUIDs and plain account names into one
//! canonical identifier, and re-encodes a provisioned client back into a
//! shareable URI.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::aggregator::ClientRecord;
use crate::error::{CheckerError, Result};

/// Default cipher for shadowsocks URIs that omit the method segment.
pub const SHADOWSOCKS_METHOD: &str = "chacha20-ietf-poly1305";

/// Sentinel returned by [`encode`] for protocols without a link format.
/// Callers compare against this string; it is not an error.
pub const LINK_NOT_SUPPORTED: &str = "N/A - Protocol Not Supported in Link Generation";

// 允许的账号名：字母数字与 _ - @ . ，长度另行限制
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_\-@.]+$").expect("valid name pattern"));

// 从面板 URL 中提取主机名
static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://([^/:]+)").expect("valid host pattern"));

/// What a canonical identifier was parsed from, which also determines the
/// client field it is compared against during a panel scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    /// Plain account name, matched against the client `email`.
    Email,
    /// Bare UUID, matched against the client `id`.
    Uuid,
    /// vmess URI, matched against the client `id`.
    Vmess,
    /// vless URI, matched against the client `id`.
    Vless,
    /// shadowsocks URI, matched against the client `password`.
    Shadowsocks,
    /// trojan URI, matched against the client `password`.
    Trojan,
}

/// Canonical identifier produced by [`decode`]. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalIdentifier {
    pub kind: IdentifierKind,
    /// The value compared against panel clients.
    pub value: String,
    /// Human-facing label (the `ps` remark for vmess, otherwise the value).
    pub email: String,
    /// Cipher method when the URI carries or implies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl CanonicalIdentifier {
    fn new(kind: IdentifierKind, value: &str, email: &str, method: Option<&str>) -> Self {
        Self {
            kind,
            value: value.to_string(),
            email: email.to_string(),
            method: method.map(str::to_string),
        }
    }
}

/// Parse a connection string into a canonical identifier.
///
/// Rules are tried in order, first match wins:
/// 1. scheme-prefixed URIs (vmess by prefix alone since its payload is pure
///    base64; the other schemes additionally require `@` and `.` so bare
///    names are never misread as URIs),
/// 2. a bare hyphenated UUID,
/// 3. a plain account name (`[a-zA-Z0-9_\-@.]`, at most 50 chars).
///
/// Scheme payloads that fail to decode fall through to the later rules
/// instead of raising.
pub fn decode(input: &str) -> Result<CanonicalIdentifier> {
    let config = input.trim();

    if let Some(payload) = config.strip_prefix("vmess://") {
        if let Some(identifier) = decode_vmess(payload) {
            return Ok(identifier);
        }
    } else if config.contains('@') && config.contains('.') {
        if let Some(rest) = config.strip_prefix("vless://") {
            let value = rest.split('@').next().unwrap_or_default();
            return Ok(CanonicalIdentifier::new(
                IdentifierKind::Vless,
                value,
                value,
                Some("none"),
            ));
        } else if let Some(rest) = config.strip_prefix("trojan://") {
            let value = rest.split('@').next().unwrap_or_default();
            return Ok(CanonicalIdentifier::new(
                IdentifierKind::Trojan,
                value,
                value,
                Some("tls"),
            ));
        } else if let Some(rest) = config.strip_prefix("ss://") {
            if let Some(identifier) = decode_shadowsocks(rest) {
                return Ok(identifier);
            }
        }
    }

    if config.len() == 36 && Uuid::try_parse(config).is_ok() {
        return Ok(CanonicalIdentifier::new(
            IdentifierKind::Uuid,
            config,
            config,
            Some("auto"),
        ));
    }

    if config.len() <= 50 && NAME_RE.is_match(config) {
        return Ok(CanonicalIdentifier::new(
            IdentifierKind::Email,
            config,
            config,
            None,
        ));
    }

    Err(CheckerError::Parse)
}

fn decode_vmess(payload: &str) -> Option<CanonicalIdentifier> {
    let decoded = STANDARD.decode(payload).ok()?;
    let json: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let id = json.get("id")?.as_str()?.to_string();
    let email = json
        .get("ps")
        .and_then(|v| v.as_str())
        .unwrap_or(&id)
        .to_string();
    let method = json
        .get("scy")
        .and_then(|v| v.as_str())
        .unwrap_or("auto")
        .to_string();
    Some(CanonicalIdentifier {
        kind: IdentifierKind::Vmess,
        value: id,
        email,
        method: Some(method),
    })
}

fn decode_shadowsocks(rest: &str) -> Option<CanonicalIdentifier> {
    let parts: Vec<&str> = rest.split('@').collect();
    if parts.len() != 2 {
        return None;
    }

    // 补齐 base64 填充到 4 的倍数
    let mut auth = parts[0].to_string();
    while auth.len() % 4 != 0 {
        auth.push('=');
    }
    let decoded = STANDARD.decode(&auth).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let segments: Vec<&str> = decoded.split(':').collect();
    let password = (*segments.last()?).to_string();
    let method = if segments.len() > 1 {
        segments[0].to_string()
    } else {
        SHADOWSOCKS_METHOD.to_string()
    };
    Some(CanonicalIdentifier {
        kind: IdentifierKind::Shadowsocks,
        email: password.clone(),
        value: password,
        method: Some(method),
    })
}

/// Build a shareable connection URI for a provisioned client.
///
/// The host is the panel URL's hostname; `unknown_host` when the URL does
/// not look like http(s). Protocols without a link format yield the
/// [`LINK_NOT_SUPPORTED`] sentinel.
pub fn encode(panel_url: &str, port: u16, client: &ClientRecord, protocol: &str) -> String {
    let server_host = HOST_RE
        .captures(panel_url)
        .and_then(|c| c.get(1))
        .map_or("unknown_host", |m| m.as_str());

    let email = if client.email.is_empty() {
        "Account".to_string()
    } else {
        client.email.clone()
    };
    let remark = urlencoding::encode(&email.replace(' ', "-")).into_owned();

    match protocol {
        "shadowsocks" => {
            let password = client.password.as_deref().unwrap_or_default();
            let method = client.method.as_deref().unwrap_or(SHADOWSOCKS_METHOD);
            let auth = STANDARD_NO_PAD.encode(format!("{method}:{password}"));
            format!("ss://{auth}@{server_host}:{port}#{remark}")
        }
        "vless" => {
            let id = client.id.as_deref().unwrap_or_default();
            format!("vless://{id}@{server_host}:{port}?security=none&type=tcp#{remark}")
        }
        "vmess" => {
            let id = client.id.as_deref().unwrap_or_default();
            let vmess_json = serde_json::json!({
                "v": "2",
                "ps": email.replace(' ', "-"),
                "add": server_host,
                "port": port,
                "id": id,
                "aid": 0,
                "net": "tcp",
                "type": "none",
                "host": "",
                "path": "",
                "tls": "",
            });
            let encoded = STANDARD.encode(vmess_json.to_string());
            format!("vmess://{encoded}")
        }
        "trojan" => {
            let password = client.password.as_deref().unwrap_or_default();
            format!("trojan://{password}@{server_host}:{port}?security=tls&type=tcp#{remark}")
        }
        _ => LINK_NOT_SUPPORTED.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(email: &str, id: Option<&str>, password: Option<&str>) -> ClientRecord {
        ClientRecord {
            email: email.to_string(),
            id: id.map(str::to_string),
            password: password.map(str::to_string),
            method: None,
            total_gb: 0.0,
            expiry_time: 0,
            enable: true,
        }
    }

    #[test]
    fn test_decode_shadowsocks_with_method() {
        let auth = STANDARD_NO_PAD.encode("aes-256-gcm:secret");
        let identifier = decode(&format!("ss://{auth}@host.example.com:443#user")).unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Shadowsocks);
        assert_eq!(identifier.value, "secret");
        assert_eq!(identifier.method.as_deref(), Some("aes-256-gcm"));
    }

    #[test]
    fn test_decode_shadowsocks_without_method_uses_default() {
        let auth = STANDARD_NO_PAD.encode("lonepassword");
        let identifier = decode(&format!("ss://{auth}@host.example.com:443")).unwrap();
        assert_eq!(identifier.value, "lonepassword");
        assert_eq!(identifier.method.as_deref(), Some(SHADOWSOCKS_METHOD));
    }

    #[test]
    fn test_decode_vless() {
        let identifier =
            decode("vless://4f6b2a1c-9d3e-4c5f-8a7b-1234567890ab@panel.example.com:405?security=none#user")
                .unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Vless);
        assert_eq!(identifier.value, "4f6b2a1c-9d3e-4c5f-8a7b-1234567890ab");
        assert_eq!(identifier.method.as_deref(), Some("none"));
    }

    #[test]
    fn test_decode_trojan() {
        let identifier = decode("trojan://s3cr3t@panel.example.com:407#user").unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Trojan);
        assert_eq!(identifier.value, "s3cr3t");
        assert_eq!(identifier.method.as_deref(), Some("tls"));
    }

    #[test]
    fn test_decode_bare_uuid() {
        let identifier = decode("4F6B2A1C-9D3E-4C5F-8A7B-1234567890AB").unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Uuid);
        assert_eq!(identifier.value, "4F6B2A1C-9D3E-4C5F-8A7B-1234567890AB");
    }

    #[test]
    fn test_decode_plain_name() {
        let identifier = decode("user_404@mail.example").unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Email);
        assert_eq!(identifier.value, "user_404@mail.example");
    }

    #[test]
    fn test_decode_rejects_disallowed_characters() {
        let err = decode("not-an-email-or-uri!!").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_decode_rejects_overlong_name() {
        let err = decode(&"a".repeat(51)).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_malformed_vmess_falls_through_to_parse_error() {
        // 非法 base64 负载不应报解码错误，而是走后续规则
        let err = decode("vmess://!!!notbase64!!!").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_roundtrip_shadowsocks() {
        let record = client("ss user", None, Some("secret"));
        let uri = encode("http://panel.example.com:54321", 50000, &record, "shadowsocks");
        let identifier = decode(&uri).unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Shadowsocks);
        assert_eq!(identifier.value, "secret");
    }

    #[test]
    fn test_roundtrip_vless() {
        let record = client(
            "vless user",
            Some("4f6b2a1c-9d3e-4c5f-8a7b-1234567890ab"),
            None,
        );
        let uri = encode("http://panel.example.com:54321", 405, &record, "vless");
        let identifier = decode(&uri).unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Vless);
        assert_eq!(identifier.value, "4f6b2a1c-9d3e-4c5f-8a7b-1234567890ab");
    }

    #[test]
    fn test_roundtrip_vmess() {
        let record = client(
            "vmess user",
            Some("4f6b2a1c-9d3e-4c5f-8a7b-1234567890ab"),
            None,
        );
        let uri = encode("https://panel.example.com", 406, &record, "vmess");
        let identifier = decode(&uri).unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Vmess);
        assert_eq!(identifier.value, "4f6b2a1c-9d3e-4c5f-8a7b-1234567890ab");
        assert_eq!(identifier.email, "vmess-user");
    }

    #[test]
    fn test_roundtrip_trojan() {
        let record = client("trojan user", None, Some("s3cr3t"));
        let uri = encode("http://panel.example.com:54321", 407, &record, "trojan");
        let identifier = decode(&uri).unwrap();
        assert_eq!(identifier.kind, IdentifierKind::Trojan);
        assert_eq!(identifier.value, "s3cr3t");
    }

    #[test]
    fn test_encode_unknown_protocol_returns_sentinel() {
        let record = client("user", None, None);
        let uri = encode("http://panel.example.com", 1, &record, "wireguard");
        assert_eq!(uri, LINK_NOT_SUPPORTED);
    }

    #[test]
    fn test_encode_host_fallback() {
        let record = client("user", None, Some("pw"));
        let uri = encode("not a url", 443, &record, "trojan");
        assert!(uri.contains("@unknown_host:443"));
    }
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// 面板类型
///
/// Premium 面板参与账号查找，Trial 面板仅由试用账号流程使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanelKind {
    Premium,
    Trial,
}

impl Default for PanelKind {
    fn default() -> Self {
        Self::Premium
    }
}

/// 单个面板的连接信息
///
/// 从配置加载后不再变更，查找过程中只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelDescriptor {
    /// 面板名称（需唯一）
    pub name: String,
    /// 面板基础 URL，例如 http://panel-a.example.com:54321
    pub url: String,
    /// 登录用户名
    pub username: String,
    /// 登录密码
    pub password: String,
    /// 面板类型
    #[serde(default)]
    pub kind: PanelKind,
}

/// 应用配置（静态面板列表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 静态配置的面板，按文件中出现顺序参与查找
    #[serde(default)]
    pub panels: Vec<PanelDescriptor>,
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {path}"))?;
        let config: AppConfig =
            toml::from_str(&content).context("Failed to parse configuration")?;
        config.validate().context("Configuration validation failed")?;
        Ok(config)
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        use std::collections::HashSet;

        if self.panels.is_empty() {
            anyhow::bail!("No panels defined");
        }

        let mut seen_names = HashSet::new();

        for panel in &self.panels {
            // 检查 name 唯一性
            if !seen_names.insert(&panel.name) {
                anyhow::bail!(
                    "Duplicate panel name '{}': each panel must have a unique name",
                    panel.name
                );
            }

            if panel.name.trim().is_empty() {
                anyhow::bail!("Panel name cannot be empty");
            }

            // URL 必须是合法的 http(s) 地址
            let url = Url::parse(&panel.url)
                .with_context(|| format!("Panel '{}': invalid url", panel.name))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                anyhow::bail!(
                    "Panel '{}': url must use the http or https scheme",
                    panel.name
                );
            }

            if panel.username.trim().is_empty() || panel.password.trim().is_empty() {
                anyhow::bail!("Panel '{}': username and password are required", panel.name);
            }
        }

        Ok(())
    }
}

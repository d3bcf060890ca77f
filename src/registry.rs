use crate::config::{PanelDescriptor, PanelKind};

/// In-memory panel registry.
///
/// Holds the statically configured panels plus any panels registered at
/// runtime (for example by an external management bot). Lookups treat the
/// registry as read-only; it is built once at process start and mutated only
/// through [`PanelRegistry::register`].
#[derive(Debug, Clone, Default)]
pub struct PanelRegistry {
    static_panels: Vec<PanelDescriptor>,
    dynamic_panels: Vec<PanelDescriptor>,
}

impl PanelRegistry {
    /// 以静态面板列表创建注册表
    pub fn new(static_panels: Vec<PanelDescriptor>) -> Self {
        Self {
            static_panels,
            dynamic_panels: Vec::new(),
        }
    }

    /// 注册一个动态面板（追加到注册顺序末尾）
    pub fn register(&mut self, panel: PanelDescriptor) {
        self.dynamic_panels.push(panel);
    }

    pub fn static_panels(&self) -> &[PanelDescriptor] {
        &self.static_panels
    }

    pub fn dynamic_panels(&self) -> &[PanelDescriptor] {
        &self.dynamic_panels
    }

    /// Panels in account-search order: static panels in configured insertion
    /// order, then dynamically registered Premium panels in registration
    /// order. Dynamic Trial panels never take part in this search.
    pub fn search_order(&self) -> Vec<&PanelDescriptor> {
        self.static_panels
            .iter()
            .chain(
                self.dynamic_panels
                    .iter()
                    .filter(|p| p.kind == PanelKind::Premium),
            )
            .collect()
    }

    /// Premium panels with their 1-based panel numbers: static Premium
    /// panels first, dynamic Premium panels appended with numbers continuing
    /// from the static count. These numbers are what callers pass back when
    /// addressing a specific panel.
    pub fn indexed_premium(&self) -> Vec<(usize, &PanelDescriptor)> {
        self.static_panels
            .iter()
            .filter(|p| p.kind == PanelKind::Premium)
            .chain(
                self.dynamic_panels
                    .iter()
                    .filter(|p| p.kind == PanelKind::Premium),
            )
            .enumerate()
            .map(|(i, p)| (i + 1, p))
            .collect()
    }
}

//! Lookup pipeline.
//!
//! Wires the pieces together: rate-limit admission, connection-string
//! decoding, the cross-panel search and report normalization. This is the
//! surface a routing layer (or the CLI) calls.

use std::sync::Arc;

use tracing::{debug, info};

use crate::aggregator::{self, PanelApi};
use crate::codec;
use crate::error::{CheckerError, Result};
use crate::normalize::{self, Report};
use crate::rate_limiter::RateLimiter;
use crate::registry::PanelRegistry;

/// Account checker with explicit, injected dependencies.
pub struct Checker {
    api: Arc<dyn PanelApi>,
    registry: PanelRegistry,
    limiter: RateLimiter,
}

impl Checker {
    pub fn new(api: Arc<dyn PanelApi>, registry: PanelRegistry, limiter: RateLimiter) -> Self {
        Self {
            api,
            registry,
            limiter,
        }
    }

    pub fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    /// Look up the account behind a connection string and report its usage.
    ///
    /// `client_id` identifies the caller for rate limiting (an IP address
    /// in a service deployment).
    pub async fn lookup(&self, client_id: &str, connection_string: &str) -> Result<Report> {
        if !self.limiter.admit(client_id) {
            debug!(client = %client_id, "request rejected by rate limiter");
            return Err(CheckerError::RateLimitExceeded);
        }

        let identifier = codec::decode(connection_string)?;
        debug!(kind = ?identifier.kind, "decoded connection string");

        let panels = self.registry.search_order();
        let matched = aggregator::find_account(self.api.as_ref(), &identifier, &panels).await?;
        info!(
            panel = %matched.panel_name,
            email = %matched.email,
            protocol = %matched.protocol,
            "account located"
        );

        Ok(normalize::normalize(&matched))
    }
}

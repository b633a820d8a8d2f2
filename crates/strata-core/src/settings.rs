//! Application-wide settings shared by every context.

use crate::proxy::{ProxyTrust, TrustPolicy};
use serde::ser::SerializeStruct;
use serde::Serialize;
use std::sync::Arc;

/// Default number of trailing host labels that form the root domain.
pub const DEFAULT_SUBDOMAIN_OFFSET: usize = 2;

/// Settings template inherited by each request context.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Deployment environment name.
    pub env: String,
    /// Trust policy for forwarded headers.
    pub trust: Arc<dyn TrustPolicy>,
    /// Host labels ignored when computing subdomains.
    pub subdomain_offset: usize,
    /// Suppresses default error logging.
    pub silent: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            trust: Arc::new(ProxyTrust::default()),
            subdomain_offset: DEFAULT_SUBDOMAIN_OFFSET,
            silent: false,
        }
    }
}

impl AppSettings {
    /// Sets the environment name.
    #[must_use]
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }

    /// Replaces the trust policy.
    #[must_use]
    pub fn with_trust(mut self, trust: impl TrustPolicy + 'static) -> Self {
        self.trust = Arc::new(trust);
        self
    }

    /// Sets the subdomain offset.
    #[must_use]
    pub fn with_subdomain_offset(mut self, offset: usize) -> Self {
        self.subdomain_offset = offset;
        self
    }

    /// Silences default error logging.
    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

impl Serialize for AppSettings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AppSettings", 3)?;
        state.serialize_field("subdomain_offset", &self.subdomain_offset)?;
        state.serialize_field("proxy", &self.trust.trusts_proxy())?;
        state.serialize_field("env", &self.env)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_fields() {
        let settings = AppSettings::default()
            .with_env("production")
            .with_trust(ProxyTrust::enabled());
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "subdomain_offset": 2, "proxy": true, "env": "production" })
        );
    }
}

//! Client configuration.

use std::time::Duration;

use secrecy::SecretString;

use firehose_types::NomadSettings;

/// Connection settings for [`NomadClient`](crate::NomadClient).
#[derive(Debug, Clone)]
pub struct NomadConfig {
    /// Agent address, e.g. `http://127.0.0.1:4646`
    pub address: String,

    /// ACL token sent as `X-Nomad-Token`
    pub token: Option<SecretString>,

    /// Namespace to list jobs from
    pub namespace: Option<String>,

    /// Region to query
    pub region: Option<String>,

    /// Timeout for non-blocking requests
    pub request_timeout: Duration,
}

impl NomadConfig {
    /// Config pointing at `address` with no token, namespace or region.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
            namespace: None,
            region: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

impl From<&NomadSettings> for NomadConfig {
    fn from(settings: &NomadSettings) -> Self {
        Self {
            address: settings.address.clone(),
            token: settings.token.clone().map(SecretString::from),
            namespace: settings.namespace.clone(),
            region: settings.region.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

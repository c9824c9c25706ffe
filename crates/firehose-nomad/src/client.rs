//! HTTP client for the Nomad jobs API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::ExposeSecret;
use tracing::debug;

use firehose_core::{ControlPlane, ControlPlaneError};
use firehose_types::{JobRecord, JobSummary, QueryMeta, QueryOptions};

use crate::config::NomadConfig;

/// Response header carrying the server's Raft index.
pub const INDEX_HEADER: &str = "X-Nomad-Index";

/// Request header carrying the ACL token.
pub const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Extra time allowed on top of the blocking wait before the client gives up.
const BLOCKING_SLACK: Duration = Duration::from_secs(10);

/// Nomad implementation of [`ControlPlane`].
pub struct NomadClient {
    client: Client,
    base_url: Url,
    config: NomadConfig,
}

impl NomadClient {
    /// Build a client.
    ///
    /// # Errors
    ///
    /// Returns `ControlPlaneError::Config` if the address is not a valid URL
    /// or the HTTP client cannot be built.
    pub fn new(config: NomadConfig) -> Result<Self, ControlPlaneError> {
        let base_url = Url::parse(&config.address)
            .map_err(|e| ControlPlaneError::Config(format!("'{}': {}", config.address, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ControlPlaneError::Config(format!(
                "'{}' cannot be used as a base address",
                config.address
            )));
        }

        // No overall timeout here: blocking queries set their own per request.
        let client = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| ControlPlaneError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Address this client talks to.
    pub fn address(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v1").extend(segments);
        }
        url
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let mut request = self.client.get(url);

        if let Some(token) = &self.config.token {
            request = request.header(TOKEN_HEADER, token.expose_secret());
        }
        if let Some(namespace) = &self.config.namespace {
            request = request.query(&[("namespace", namespace)]);
        }
        if let Some(region) = &self.config.region {
            request = request.query(&[("region", region)]);
        }

        request
    }

    /// Time a blocking query may take: the wait, the server's 1/16 jitter
    /// and some slack for the network.
    fn blocking_timeout(wait_time: Duration) -> Duration {
        wait_time + wait_time / 16 + BLOCKING_SLACK
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ControlPlaneError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ControlPlaneError::Transport(format!("request timed out: {e}"))
        } else {
            ControlPlaneError::Transport(e.to_string())
        }
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ControlPlaneError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

fn parse_index(response: &Response) -> Result<u64, ControlPlaneError> {
    response
        .headers()
        .get(INDEX_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .ok_or(ControlPlaneError::MissingIndex)
}

#[async_trait]
impl ControlPlane for NomadClient {
    async fn list_jobs(
        &self,
        query: &QueryOptions,
    ) -> Result<(Vec<JobSummary>, QueryMeta), ControlPlaneError> {
        let mut request = self
            .get(self.endpoint(&["jobs"]))
            .timeout(Self::blocking_timeout(query.wait_time));

        if query.wait_index > 0 {
            request = request.query(&[
                ("index", query.wait_index.to_string()),
                ("wait", format!("{}ms", query.wait_time.as_millis())),
            ]);
        }
        if query.allow_stale {
            request = request.query(&[("stale", "")]);
        }

        debug!(wait_index = query.wait_index, "Listing jobs");
        let response = send(request).await?;
        let last_index = parse_index(&response)?;

        let jobs: Vec<JobSummary> = response
            .json()
            .await
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))?;

        Ok((jobs, QueryMeta::new(last_index)))
    }

    async fn job_info(&self, job_id: &str) -> Result<JobRecord, ControlPlaneError> {
        let request = self
            .get(self.endpoint(&["job", job_id]))
            .timeout(self.config.request_timeout);

        let response = match send(request).await {
            Err(ControlPlaneError::Status { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                return Err(ControlPlaneError::NotFound(job_id.to_string()));
            }
            other => other?,
        };

        response
            .json()
            .await
            .map_err(|e| ControlPlaneError::Decode(e.to_string()))
    }
}

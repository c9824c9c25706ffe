//! Nomad control-plane client.
//!
//! Implements [`firehose_core::ControlPlane`] on top of the Nomad HTTP
//! API: blocking queries against `/v1/jobs` and single-job reads from
//! `/v1/job/:id`.
//!
//! ```ignore
//! use firehose_nomad::{NomadClient, NomadConfig};
//!
//! let client = NomadClient::new(NomadConfig::from(&settings.nomad))?;
//! let (jobs, meta) = client.list_jobs(&QueryOptions::default()).await?;
//! ```

mod client;
mod config;

pub use client::{NomadClient, INDEX_HEADER, TOKEN_HEADER};
pub use config::NomadConfig;

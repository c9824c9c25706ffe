//! Job types returned by the control plane.
//!
//! Field names follow the control plane's wire representation
//! (`ID`, `ModifyIndex`, ...) so records can be re-serialized without
//! reshaping them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lightweight entry from the job list endpoint.
///
/// Only the identifier and modification index matter for change
/// detection; everything else in the list stub is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job identifier
    #[serde(rename = "ID")]
    pub id: String,

    /// Human readable name
    #[serde(rename = "Name", default)]
    pub name: String,

    /// Namespace the job lives in
    #[serde(rename = "Namespace", default)]
    pub namespace: Option<String>,

    /// Raft index of the last write to this job
    #[serde(rename = "ModifyIndex")]
    pub modify_index: u64,
}

impl JobSummary {
    /// Create a summary with the given id and modification index.
    pub fn new(id: impl Into<String>, modify_index: u64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            namespace: None,
            modify_index,
        }
    }
}

/// Full job definition returned by the single-job endpoint.
///
/// The handful of fields the firehose looks at are typed; every other
/// field is kept verbatim in `extra` so the published event carries the
/// complete record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier
    #[serde(rename = "ID")]
    pub id: String,

    /// Human readable name
    #[serde(rename = "Name", default)]
    pub name: String,

    /// Namespace the job lives in
    #[serde(rename = "Namespace", default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Scheduler type (service, batch, system, sysbatch)
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,

    /// Job status (pending, running, dead)
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Raft index of the last write to this job
    #[serde(rename = "ModifyIndex", default)]
    pub modify_index: u64,

    /// Every other field of the record
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    /// Create a minimal record, mostly useful in tests and fakes.
    pub fn new(id: impl Into<String>, modify_index: u64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            namespace: None,
            job_type: None,
            status: None,
            modify_index,
            extra: Map::new(),
        }
    }

    /// Attach an extra field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

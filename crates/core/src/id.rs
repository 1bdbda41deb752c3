//! Job identifiers.
//!
//! A `JobId` is used both as a query parameter and as part of a filesystem
//! path, so the only way to obtain one is through [`JobId::parse`], which
//! enforces `^[A-Za-z0-9_-]{1,64}$`.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Maximum length of a job identifier, in bytes (all allowed chars are ASCII).
pub const MAX_JOB_ID_LEN: usize = 64;

/// Suffix appended to a job identifier to name its export artifact.
pub const ARTIFACT_SUFFIX: &str = "_result.json";

/// Validated identifier of a job result record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

/// Returns `true` iff `s` is 1..=64 chars drawn from `[A-Za-z0-9_-]`.
///
/// Must be applied to the already URL-decoded value.
pub fn is_valid_job_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_JOB_ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl JobId {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        if is_valid_job_id(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(DomainError::invalid_id("invalid job_id format"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of this job's export artifact (`{job_id}_result.json`).
    pub fn artifact_file_name(&self) -> String {
        format!("{}{}", self.0, ARTIFACT_SUFFIX)
    }
}

impl core::fmt::Display for JobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for JobId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_job_id(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::invalid_id("invalid job_id format"))
        }
    }
}

impl From<JobId> for String {
    fn from(value: JobId) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        JobId::try_from(raw).map_err(serde::de::Error::custom)
    }
}

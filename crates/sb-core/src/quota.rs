//! Storage quota policy: thresholds and classification.
//!
//! Byte accounting counts the UTF-8 encoded length of key plus value. The
//! browser build this core descends from counted UTF-16 code units against
//! the same thresholds; the difference only matters for non-ASCII content
//! and the thresholds are conservative either way.

use serde::Serialize;

/// Local store usage above this is worth warning the user about.
pub const LOCAL_WARN_BYTES: u64 = 4 * 1024 * 1024;
/// Local store usage above this blocks further writes.
pub const LOCAL_BLOCK_BYTES: u64 = 8 * 1024 * 1024;

/// Per-user ceiling for cloud-backed storage.
pub const CLOUD_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
/// Cloud usage above this triggers an advisory.
pub const CLOUD_WARN_BYTES: u64 = 8 * 1024 * 1024;
/// Uploads stop short of the ceiling so metadata writes still fit.
pub const CLOUD_BLOCK_BYTES: u64 = 9 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub used_bytes: u64,
    pub warning: bool,
    pub blocked: bool,
}

/// Classify local store usage against the warning and block thresholds.
pub fn classify(used_bytes: u64) -> QuotaUsage {
    QuotaUsage {
        used_bytes,
        warning: used_bytes >= LOCAL_WARN_BYTES,
        blocked: used_bytes >= LOCAL_BLOCK_BYTES,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuotaGuidance {
    Healthy,
    GettingFull,
    Exceeded,
}

impl QuotaGuidance {
    pub fn for_usage(usage: QuotaUsage) -> Self {
        if usage.blocked {
            Self::Exceeded
        } else if usage.warning {
            Self::GettingFull
        } else {
            Self::Healthy
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Healthy => "Storage is healthy.",
            Self::GettingFull => "Storage is getting full; consider removing an old project.",
            Self::Exceeded => "Storage limit exceeded; delete a project to keep saving.",
        }
    }
}

/// Outcome of an upload pre-check. A denial is a structured refusal with
/// the offending size, never an exception from deep in a write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Project post-upload cloud usage against the warning and block lines.
/// Crossing the warning line alone allows the upload with an advisory.
pub fn check_upload(used_bytes: u64, file_size_bytes: u64) -> UploadDecision {
    let projected = used_bytes.saturating_add(file_size_bytes);

    if projected > CLOUD_BLOCK_BYTES {
        return UploadDecision {
            allowed: false,
            message: Some(format!(
                "Upload of {} bytes would bring usage to {} bytes, over the {} byte limit.",
                file_size_bytes, projected, CLOUD_LIMIT_BYTES
            )),
        };
    }

    if projected > CLOUD_WARN_BYTES {
        return UploadDecision {
            allowed: true,
            message: Some(format!(
                "Upload allowed, but usage will reach {} of {} bytes.",
                projected, CLOUD_LIMIT_BYTES
            )),
        };
    }

    UploadDecision {
        allowed: true,
        message: None,
    }
}

//! Audit log models

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::deserialize_opaque_id;

/// Kind of change an audit entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuditEvent {
    Create,
    Delete,
    Update,
    Download,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Create => "Create",
            AuditEvent::Delete => "Delete",
            AuditEvent::Update => "Update",
            AuditEvent::Download => "Download",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(AuditEvent::Create),
            "delete" => Ok(AuditEvent::Delete),
            "update" => Ok(AuditEvent::Update),
            "download" => Ok(AuditEvent::Download),
            _ => Err(format!("Invalid audit event: {}", s)),
        }
    }
}

/// One immutable audit trail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    #[serde(deserialize_with = "deserialize_opaque_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time: DateTime<Utc>,
    pub description: String,
    pub event: AuditEvent,
    pub category: String,
    pub performed_by: String,
}

/// Accepts RFC 3339 timestamps and zone-less ones (read as UTC)
pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Query parameters accepted by the audit log endpoints
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    pub category: Option<String>,
    /// Comma-separated event kinds, e.g. `Create,Delete`
    pub actions: Option<String>,
    pub user: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// One page of filtered audit entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogPage {
    pub items: Vec<AuditLogEntry>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
}

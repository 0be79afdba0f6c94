//! Tenant and usage models

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::deserialize_opaque_id;

/// Organizational customer whose network usage is tracked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(deserialize_with = "deserialize_opaque_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data_usage_gb: f64,
}

/// Data consumed by one tenant on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantUsageRecord {
    #[serde(deserialize_with = "deserialize_usage_date")]
    pub usage_date: NaiveDate,
    pub data_usage_gb: f64,
}

impl TenantUsageRecord {
    pub fn new(usage_date: NaiveDate, data_usage_gb: f64) -> Self {
        Self {
            usage_date,
            data_usage_gb,
        }
    }
}

/// `date` columns come back as `YYYY-MM-DD`; timestamp columns carry a time suffix
fn deserialize_usage_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let day = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| serde::de::Error::custom(format!("invalid usage date {}: {}", raw, e)))
}

/// Query string for the tenant list
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TenantSearchQuery {
    pub search: Option<String>,
}

/// Query string for the usage chart
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UsageQuery {
    pub days: Option<u32>,
    pub step: Option<usize>,
}

/// Chart-ready usage series for one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantUsageResponse {
    pub tenant_id: String,
    pub window_days: u32,
    pub dates: Vec<String>,
    pub values: Vec<f64>,
    /// Sum over every record the backend returned, not just the window
    pub total_gb: f64,
}

/// Query string for the dashboard stat cards
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DashboardStatsQuery {
    pub tenant_id: Option<String>,
}

/// Stat card values for the home dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub tenant_count: usize,
    /// Tenant the usage total was computed for (the first listed tenant by default)
    pub tenant_id: Option<String>,
    pub total_data_gb: f64,
    /// Human-readable total, e.g. `1.23 TB`
    pub total_data_exchanged: String,
}

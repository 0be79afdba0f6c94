//! Tenant usage aggregation for the home dashboard

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::models::{Tenant, TenantUsageRecord};

pub const WINDOW_OPTIONS: [u32; 3] = [7, 30, 90];
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Chart series: `DD/MM` labels and the matching values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSeries {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

impl UsageSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

pub fn is_valid_window(days: u32) -> bool {
    WINDOW_OPTIONS.contains(&days)
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Records dated strictly after `now - window_days`, oldest first
pub fn aggregate(records: &[TenantUsageRecord], window_days: u32, now: DateTime<Utc>) -> UsageSeries {
    let window_start = now - Duration::days(i64::from(window_days));

    let mut recent: Vec<&TenantUsageRecord> = records
        .iter()
        .filter(|r| day_start(r.usage_date) > window_start)
        .collect();
    recent.sort_by_key(|r| r.usage_date);

    UsageSeries {
        dates: recent
            .iter()
            .map(|r| r.usage_date.format("%d/%m").to_string())
            .collect(),
        values: recent.iter().map(|r| r.data_usage_gb).collect(),
    }
}

/// Sum of every record, regardless of window
pub fn total_usage(records: &[TenantUsageRecord]) -> f64 {
    records.iter().map(|r| r.data_usage_gb).sum()
}

/// Keep every `step`-th point, starting with the first
pub fn thin(series: &UsageSeries, step: usize) -> UsageSeries {
    if step <= 1 {
        return series.clone();
    }
    UsageSeries {
        dates: series.dates.iter().step_by(step).cloned().collect(),
        values: series.values.iter().step_by(step).copied().collect(),
    }
}

/// `1234.5` GB becomes `"1.23 TB"`
pub fn format_terabytes(gb: f64) -> String {
    format!("{:.2} TB", gb / 1000.0)
}

/// Tenants whose name contains `query` (any case), heaviest users first
pub fn filter_tenants(tenants: &[Tenant], query: &str) -> Vec<Tenant> {
    let needle = query.trim().to_lowercase();
    let mut matching: Vec<Tenant> = tenants
        .iter()
        .filter(|t| needle.is_empty() || t.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.data_usage_gb.total_cmp(&a.data_usage_gb));
    matching
}

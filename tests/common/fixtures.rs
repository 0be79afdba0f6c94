//! Test fixtures for common test data

use chrono::{DateTime, TimeZone, Utc};

use futurekonnect_console::models::{AuditEvent, AuditLogEntry};

pub const TEST_JWT_SECRET: &str = "test_secret_key_that_is_at_least_32_bytes_long";
pub const TEST_BASE_URL: &str = "https://console.example.com";

/// The account most tests sign in as
pub mod alice {
    pub const USERNAME: &str = "alice";
    pub const EMAIL: &str = "alice@example.com";
    pub const PASSWORD: &str = "correct-horse-battery";
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

pub fn audit_entry(
    id: &str,
    time: DateTime<Utc>,
    event: AuditEvent,
    category: &str,
    performed_by: &str,
) -> AuditLogEntry {
    AuditLogEntry {
        id: id.to_string(),
        time,
        description: format!("{} {}", event, category.to_lowercase()),
        event,
        category: category.to_string(),
        performed_by: performed_by.to_string(),
    }
}

/// Twelve entries spread over 1-12 March 2024, one per day
///
/// | days      | event    | category | performed by        |
/// |-----------|----------|----------|---------------------|
/// | 1, 5, 9   | Create   | Router   | ops@futurekonnect   |
/// | 2, 6, 10  | Update   | Hotspot  | Jane.Doe            |
/// | 3, 7, 11  | Delete   | Router   | ops@futurekonnect   |
/// | 4, 8, 12  | Download | Reports  | auditor             |
pub fn sample_audit_entries() -> Vec<AuditLogEntry> {
    (1..=12)
        .map(|day| {
            let (event, category, by) = match day % 4 {
                1 => (AuditEvent::Create, "Router", "ops@futurekonnect"),
                2 => (AuditEvent::Update, "Hotspot", "Jane.Doe"),
                3 => (AuditEvent::Delete, "Router", "ops@futurekonnect"),
                _ => (AuditEvent::Download, "Reports", "auditor"),
            };
            audit_entry(&format!("log-{:02}", day), at(day, 10), event, category, by)
        })
        .collect()
}

/// Split CSV text into rows of fields, honouring quotes, doubled quotes and
/// newlines inside quoted fields
pub fn parse_csv(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            (true, '"') => quoted = false,
            (false, '"') => quoted = true,
            (false, ',') => row.push(std::mem::take(&mut field)),
            (false, '\n') => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            (_, c) => field.push(c),
        }
    }
    row.push(field);
    rows.push(row);
    rows
}

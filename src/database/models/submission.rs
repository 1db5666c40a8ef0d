use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Submission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub tenant_id: Uuid,
    pub ip: String,
    pub user_agent: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub form_id: Uuid,
    pub tenant_id: Uuid,
    pub ip: String,
    pub user_agent: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Clamp raw query values: pages start at 1, sizes fall in 1..=100.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: i64,
}

/// Submissions per distinct value of one data key.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ValueCount {
    pub value: Value,
    pub count: i64,
}

/// Keyword search semantics shared by the stores: some string value anywhere in `data`
/// contains `needle`, ignoring case. Keys and non-string values never match.
pub fn data_contains(data: &Value, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    contains_lowercase(data, &needle)
}

fn contains_lowercase(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| contains_lowercase(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_lowercase(v, needle)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps() {
        let p = PageRequest::new(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 100);
        assert_eq!(p.offset(), 0);

        let p = PageRequest::new(Some(3), None);
        assert_eq!(p.page_size, 20);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn keyword_matches_string_values_only() {
        let data = serde_json::json!({
            "a": "Hello World",
            "n": 42,
            "tags": ["red", {"deep": "Blue"}]
        });
        assert!(data_contains(&data, "world"));
        assert!(data_contains(&data, "BLUE"));
        assert!(!data_contains(&data, "42"));
        assert!(!data_contains(&data, "tags"));
        assert!(!data_contains(&data, r#"a":"Hello"#));
    }
}
